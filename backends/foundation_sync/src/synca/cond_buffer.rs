// Protected buffer synchronized by one mutex and two condition variables.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::activity::{Action, NoActivity, SharedActivityLog};

use super::{
    lock_recovering, wait_recovering, wait_timeout_recovering, ProtectedBuffer, Rejected,
    RingStore,
};

/// `CondVarBuffer` guards a [`RingStore`] with a mutex. Takers park on
/// `not_empty`, inserters park on `not_full`; every successful operation
/// broadcasts the condition it may have satisfied before releasing the
/// mutex, and every woken thread re-checks the store itself.
pub struct CondVarBuffer<T> {
    store: Mutex<RingStore<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    activity: SharedActivityLog<T>,
}

impl<T: Send + 'static> CondVarBuffer<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_activity(capacity, Arc::new(NoActivity))
    }

    #[must_use]
    pub fn with_activity(capacity: usize, activity: SharedActivityLog<T>) -> Self {
        Self {
            store: Mutex::new(RingStore::new(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            activity,
        }
    }
}

impl<T: Send> ProtectedBuffer<T> for CondVarBuffer<T> {
    fn get(&self) -> T {
        let mut store = lock_recovering(&self.store);
        loop {
            if let Some(item) = store.try_get() {
                self.not_full.notify_all();
                self.activity.record(Action::Get, Some(&item));
                return item;
            }
            store = wait_recovering(&self.not_empty, store);
        }
    }

    fn put(&self, item: T) {
        let mut store = lock_recovering(&self.store);
        let mut pending = item;
        loop {
            match store.try_put(pending) {
                Ok(()) => {
                    self.not_empty.notify_all();
                    self.activity.record(Action::Put, store.newest());
                    return;
                }
                Err(refused) => {
                    pending = refused;
                    store = wait_recovering(&self.not_full, store);
                }
            }
        }
    }

    fn remove(&self) -> Option<T> {
        let mut store = lock_recovering(&self.store);
        let item = store.try_get();
        if item.is_some() {
            self.not_full.notify_all();
        }
        self.activity.record(Action::Remove, item.as_ref());
        item
    }

    fn add(&self, item: T) -> Result<(), Rejected<T>> {
        let mut store = lock_recovering(&self.store);
        match store.try_put(item) {
            Ok(()) => {
                self.not_empty.notify_all();
                self.activity.record(Action::Add, store.newest());
                Ok(())
            }
            Err(refused) => {
                self.activity.record(Action::Add, None);
                Err(Rejected(refused))
            }
        }
    }

    fn poll(&self, deadline: Instant) -> Option<T> {
        let mut store = lock_recovering(&self.store);
        loop {
            if let Some(item) = store.try_get() {
                self.not_full.notify_all();
                self.activity.record(Action::Poll, Some(&item));
                return Some(item);
            }

            let now = Instant::now();
            if now >= deadline {
                self.activity.record(Action::Poll, None);
                return None;
            }
            store = wait_timeout_recovering(&self.not_empty, store, deadline - now);
        }
    }

    fn offer(&self, item: T, deadline: Instant) -> Result<(), Rejected<T>> {
        let mut store = lock_recovering(&self.store);
        let mut pending = item;
        loop {
            match store.try_put(pending) {
                Ok(()) => {
                    self.not_empty.notify_all();
                    self.activity.record(Action::Offer, store.newest());
                    return Ok(());
                }
                Err(refused) => pending = refused,
            }

            let now = Instant::now();
            if now >= deadline {
                self.activity.record(Action::Offer, None);
                return Err(Rejected(pending));
            }
            store = wait_timeout_recovering(&self.not_full, store, deadline - now);
        }
    }

    fn capacity(&self) -> usize {
        lock_recovering(&self.store).capacity()
    }

    fn len(&self) -> usize {
        lock_recovering(&self.store).len()
    }
}
