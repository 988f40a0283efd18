/// Fixed-capacity circular buffer addressed backward from the newest slot.
///
/// Offset `0` is the most recent push, offset `len() - 1` the oldest value
/// still retained. Once full, each push overwrites the oldest slot.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Physical index the next push writes to.
    head: usize,
    len: usize,
}

impl<T: Copy + Default> Ring<T> {
    /// Creates an empty ring. A zero capacity is bumped to one slot.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![T::default(); capacity],
            capacity,
            head: 0,
            len: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, value: T) {
        self.slots[self.head] = value;
        self.head = (self.head + 1) % self.capacity;
        self.len = (self.len + 1).min(self.capacity);
    }

    fn physical(&self, offset: usize) -> Option<usize> {
        if offset >= self.len {
            return None;
        }
        Some((self.head + self.capacity - 1 - offset) % self.capacity)
    }

    #[must_use]
    pub fn get(&self, offset: usize) -> Option<T> {
        self.physical(offset).map(|index| self.slots[index])
    }

    /// Overwrites a retained slot. Returns `false` when `offset` is not retained.
    pub fn set(&mut self, offset: usize, value: T) -> bool {
        match self.physical(offset) {
            Some(index) => {
                self.slots[index] = value;
                true
            }
            None => false,
        }
    }

    /// Values from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).filter_map(|offset| self.get(offset))
    }
}
