//! Fixed-capacity history of recent identification events.
//!
//! The ring keeps the last `capacity` appended items. Appending is O(1) and
//! overwrites the oldest slot once the ring is full. Reads go through
//! [`RecordRing::recent`], which borrows the ring and yields newest first.
//!
//! # Examples
//!
//! ```
//! use rollcall_engine::ring::RecordRing;
//!
//! let mut ring = RecordRing::with_capacity(3);
//! for value in 1..=5 {
//!     ring.append(value);
//! }
//!
//! let newest: Vec<_> = ring.recent(10).copied().collect();
//! assert_eq!(newest, vec![5, 4, 3]);
//! ```

use rollcall_core::IdentificationEvent;
use rollcall_core::constants::RECORD_CAPACITY;
use std::iter::FusedIterator;

/// Circular buffer of the most recent items.
#[derive(Debug, Clone)]
pub struct RecordRing<T = IdentificationEvent> {
    slots: Box<[Option<T>]>,
    /// Slot the next append writes to.
    head: usize,
    len: usize,
}

impl<T> RecordRing<T> {
    /// Create an empty ring holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Store `item`, evicting the oldest entry when full.
    pub fn append(&mut self, item: T) {
        let capacity = self.capacity();
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
    }

    /// Up to `n` entries, newest first.
    ///
    /// The returned iterator borrows the ring; call `recent` again for a
    /// fresh pass.
    pub fn recent(&self, n: usize) -> Recent<'_, T> {
        Recent {
            ring: self,
            offset: 0,
            remaining: n.min(self.len),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Default for RecordRing<T> {
    fn default() -> Self {
        Self::with_capacity(RECORD_CAPACITY)
    }
}

/// Newest-first iterator returned by [`RecordRing::recent`].
#[derive(Debug)]
pub struct Recent<'a, T> {
    ring: &'a RecordRing<T>,
    offset: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Recent<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let capacity = self.ring.capacity();
        let index = (self.ring.head + capacity - 1 - self.offset) % capacity;
        self.offset += 1;
        self.remaining -= 1;

        self.ring.slots[index].as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Recent<'_, T> {}

impl<T> FusedIterator for Recent<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_empty_ring_yields_nothing() {
        let ring: RecordRing<u32> = RecordRing::default();
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), RECORD_CAPACITY);
        assert_eq!(ring.recent(5).count(), 0);
    }

    #[test]
    fn test_fifteen_appends_keep_last_ten() {
        let mut ring = RecordRing::with_capacity(10);
        for value in 1..=15 {
            ring.append(value);
        }

        assert_eq!(ring.len(), 10);
        let newest: Vec<u32> = ring.recent(10).copied().collect();
        assert_eq!(newest, (6..=15).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_recent_larger_than_len_before_wrap() {
        let mut ring = RecordRing::with_capacity(10);
        ring.append("a");
        ring.append("b");
        ring.append("c");

        let newest: Vec<&str> = ring.recent(100).copied().collect();
        assert_eq!(newest, vec!["c", "b", "a"]);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(4, 4)]
    #[case(100, 7)]
    fn test_recent_is_bounded(#[case] n: usize, #[case] expected: usize) {
        let mut ring = RecordRing::with_capacity(10);
        for value in 0..7 {
            ring.append(value);
        }
        let iter = ring.recent(n);
        assert_eq!(iter.len(), expected);
        assert_eq!(iter.count(), expected);
    }

    #[test]
    fn test_iterator_is_fused() {
        let mut ring = RecordRing::with_capacity(2);
        ring.append(1);
        let mut iter = ring.recent(2);
        assert_eq!(iter.next(), Some(&1));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut ring = RecordRing::with_capacity(0);
        ring.append(1);
        ring.append(2);
        assert_eq!(ring.recent(5).copied().collect::<Vec<_>>(), vec![2]);
    }

    proptest! {
        #[test]
        fn prop_recent_matches_tail_of_history(
            capacity in 1usize..16,
            values in proptest::collection::vec(any::<u16>(), 0..64),
            n in 0usize..32,
        ) {
            let mut ring = RecordRing::with_capacity(capacity);
            for value in &values {
                ring.append(*value);
            }

            let expected: Vec<u16> = values.iter().rev().take(n.min(capacity)).copied().collect();
            let actual: Vec<u16> = ring.recent(n).copied().collect();

            prop_assert!(ring.len() <= capacity);
            prop_assert_eq!(actual, expected);
        }
    }
}
