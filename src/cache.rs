//! Fill-tracked slot cache for memoizing per-index fetch results

/// A fixed-size array of optional slots with a fill count.
///
/// One slot per source index. Slots are filled at most once, on first access,
/// and never evicted; the cache is memory-bounded only by full
/// materialization of the owning loader's sequence.
pub struct SlotCache<T> {
    slots: Vec<Option<T>>,
    filled: usize,
}

impl<T> SlotCache<T> {
    /// Creates a cache with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, filled: 0 }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The cached value at `index`, if that slot has been filled.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Stores `value` at `index`.
    ///
    /// The fill count advances only on an empty-to-filled transition;
    /// overwriting a filled slot leaves it unchanged.
    pub fn set(&mut self, index: usize, value: T) {
        if self.slots[index].is_none() {
            self.filled += 1;
        }
        self.slots[index] = Some(value);
    }

    /// Whether every slot has been filled.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.filled == self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let cache: SlotCache<i32> = SlotCache::new(3);
        assert_eq!(cache.capacity(), 3);
        assert!(!cache.is_full());
        assert_eq!(cache.get(0), None);
    }

    #[test]
    fn counts_first_time_fills_only() {
        let mut cache = SlotCache::new(2);
        cache.set(0, 10);
        assert!(!cache.is_full());
        cache.set(0, 11);
        assert!(!cache.is_full());
        cache.set(1, 20);
        assert!(cache.is_full());
        assert_eq!(cache.get(0), Some(&11));
        assert_eq!(cache.get(1), Some(&20));
    }

    #[test]
    fn zero_capacity_is_trivially_full() {
        let cache: SlotCache<i32> = SlotCache::new(0);
        assert!(cache.is_full());
    }
}
