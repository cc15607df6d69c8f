mod callable;
mod executor;
mod future;
mod pool;

pub use callable::*;
pub use executor::*;
pub use future::*;
pub use pool::*;
