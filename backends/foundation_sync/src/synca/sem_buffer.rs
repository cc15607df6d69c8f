// Protected buffer synchronized by counting semaphores for availability and
// a mutex for exclusion.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::activity::{Action, NoActivity, SharedActivityLog};
use crate::config::TimedWait;

use super::{lock_recovering, ProtectedBuffer, Rejected, RingStore, Semaphore};

/// `SemaphoreBuffer` counts free slots in `empty_slots` and stored items in
/// `full_slots`. An operation first takes a permit from the semaphore for
/// the resource it needs and only then locks the store, so a thread never
/// sleeps while holding the store's mutex.
///
/// An unbounded buffer (capacity 0) has no `empty_slots` semaphore and
/// never refuses an insertion.
pub struct SemaphoreBuffer<T> {
    store: Mutex<RingStore<T>>,
    empty_slots: Option<Semaphore>,
    full_slots: Semaphore,
    timed_wait: TimedWait,
    activity: SharedActivityLog<T>,
}

impl<T: Send + 'static> SemaphoreBuffer<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_activity(capacity, TimedWait::default(), Arc::new(NoActivity))
    }

    #[must_use]
    pub fn with_activity(
        capacity: usize,
        timed_wait: TimedWait,
        activity: SharedActivityLog<T>,
    ) -> Self {
        Self {
            store: Mutex::new(RingStore::new(capacity)),
            empty_slots: (capacity > 0).then(|| Semaphore::new(capacity)),
            full_slots: Semaphore::new(0),
            timed_wait,
            activity,
        }
    }

    fn reserve_slot(&self) {
        if let Some(slots) = &self.empty_slots {
            slots.acquire();
        }
    }

    fn try_reserve_slot(&self) -> bool {
        self.empty_slots
            .as_ref()
            .is_none_or(Semaphore::try_acquire)
    }

    fn reserve_slot_until(&self, deadline: Instant) -> bool {
        self.empty_slots
            .as_ref()
            .is_none_or(|slots| slots.acquire_within(deadline, &self.timed_wait))
    }

    fn release_slot(&self) {
        if let Some(slots) = &self.empty_slots {
            slots.release();
        }
    }

    /// stores `item` into the slot reserved by the caller, then publishes
    /// it to takers.
    fn store_reserved(&self, action: Action, item: T) {
        let mut store = lock_recovering(&self.store);
        if store.try_put(item).is_err() {
            unreachable!("an empty-slot permit was held while the ring store was full");
        }
        self.activity.record(action, store.newest());
        drop(store);

        self.full_slots.release();
    }

    /// takes the item matching the full-slot permit held by the caller,
    /// then hands its slot back to inserters.
    fn take_reserved(&self, action: Action) -> T {
        let mut store = lock_recovering(&self.store);
        let Some(item) = store.try_get() else {
            unreachable!("a full-slot permit was held while the ring store was empty");
        };
        self.activity.record(action, Some(&item));
        drop(store);

        self.release_slot();
        item
    }
}

impl<T: Send + 'static> ProtectedBuffer<T> for SemaphoreBuffer<T> {
    fn get(&self) -> T {
        self.full_slots.acquire();
        self.take_reserved(Action::Get)
    }

    fn put(&self, item: T) {
        self.reserve_slot();
        self.store_reserved(Action::Put, item);
    }

    fn remove(&self) -> Option<T> {
        if !self.full_slots.try_acquire() {
            self.activity.record(Action::Remove, None);
            return None;
        }
        Some(self.take_reserved(Action::Remove))
    }

    fn add(&self, item: T) -> Result<(), Rejected<T>> {
        if !self.try_reserve_slot() {
            self.activity.record(Action::Add, None);
            return Err(Rejected(item));
        }
        self.store_reserved(Action::Add, item);
        Ok(())
    }

    fn poll(&self, deadline: Instant) -> Option<T> {
        if !self.full_slots.acquire_within(deadline, &self.timed_wait) {
            self.activity.record(Action::Poll, None);
            return None;
        }
        Some(self.take_reserved(Action::Poll))
    }

    fn offer(&self, item: T, deadline: Instant) -> Result<(), Rejected<T>> {
        if !self.reserve_slot_until(deadline) {
            self.activity.record(Action::Offer, None);
            return Err(Rejected(item));
        }
        self.store_reserved(Action::Offer, item);
        Ok(())
    }

    fn capacity(&self) -> usize {
        lock_recovering(&self.store).capacity()
    }

    fn len(&self) -> usize {
        lock_recovering(&self.store).len()
    }
}
