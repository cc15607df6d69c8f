use std::collections::VecDeque;

/// `RingStore` is a fixed-capacity circular store with no synchronization
/// of its own. Items leave in the order they entered.
///
/// A capacity of 0 builds an unbounded store whose [`RingStore::try_put`]
/// never fails.
#[derive(Debug)]
pub struct RingStore<T> {
    capacity: usize,
    slots: Vec<Option<T>>,
    head: usize,
    count: usize,
    overflow: VecDeque<T>,
}

impl<T> RingStore<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            capacity,
            slots,
            head: 0,
            count: 0,
            overflow: VecDeque::new(),
        }
    }

    /// capacity returns the number of slots, 0 when unbounded.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.capacity > 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.is_bounded() {
            self.count
        } else {
            self.overflow.len()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.is_bounded() && self.count == self.capacity
    }

    /// `try_put` stores `item` in the next free slot, handing it back when
    /// every slot is taken.
    pub fn try_put(&mut self, item: T) -> Result<(), T> {
        if !self.is_bounded() {
            self.overflow.push_back(item);
            return Ok(());
        }
        if self.is_full() {
            return Err(item);
        }

        let tail = (self.head + self.count) % self.capacity;
        self.slots[tail] = Some(item);
        self.count += 1;
        Ok(())
    }

    /// newest returns the most recently stored item still held.
    #[must_use]
    pub fn newest(&self) -> Option<&T> {
        if !self.is_bounded() {
            return self.overflow.back();
        }
        if self.count == 0 {
            return None;
        }
        self.slots[(self.head + self.count - 1) % self.capacity].as_ref()
    }

    /// `try_get` takes the oldest item out of the store.
    pub fn try_get(&mut self) -> Option<T> {
        if !self.is_bounded() {
            return self.overflow.pop_front();
        }
        if self.count == 0 {
            return None;
        }

        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity;
        self.count -= 1;
        item
    }
}
