//! # Interval Free List
//!
//! Coalesced set of free id ranges. Memory is bounded by the number of gaps
//! between live ids, not by the highest id ever issued.

use std::collections::BTreeMap;
use std::ops::Range;

/// Sorted set of free, half-open id intervals `[start, end)`.
///
/// Invariants:
/// - intervals never overlap and never touch (`a.end < b.start`), so adjacent
///   frees are always merged into one interval;
/// - every interval lies inside `[base, high_water)`;
/// - every id in `[base, high_water)` is either free (inside an interval) or
///   allocated, never both.
#[derive(Debug, Clone)]
pub(crate) struct IntervalFreeList {
    /// start -> end (exclusive).
    intervals: BTreeMap<u32, u32>,
    /// Lowest id this list ever issues.
    base: u32,
    /// First id that has never been issued.
    high_water: u32,
    /// Number of ids currently inside `intervals`.
    free_count: usize,
}

impl IntervalFreeList {
    /// Creates an empty list issuing ids from `base` upward.
    pub(crate) const fn new(base: u32) -> Self {
        Self {
            intervals: BTreeMap::new(),
            base,
            high_water: base,
            free_count: 0,
        }
    }

    #[inline]
    pub(crate) const fn base(&self) -> u32 {
        self.base
    }

    #[inline]
    pub(crate) const fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Number of ids currently handed out.
    #[inline]
    pub(crate) fn allocated_count(&self) -> usize {
        (self.high_water - self.base) as usize - self.free_count
    }

    /// Takes the lowest free id, or extends the high-water mark.
    ///
    /// Returns `None` once `u32::MAX` would have to be issued.
    pub(crate) fn allocate(&mut self) -> Option<u32> {
        if let Some((start, end)) = self.intervals.pop_first() {
            if start + 1 < end {
                self.intervals.insert(start + 1, end);
            }
            self.free_count -= 1;
            return Some(start);
        }

        if self.high_water == u32::MAX {
            return None;
        }
        let id = self.high_water;
        self.high_water += 1;
        Some(id)
    }

    /// Returns `id` to the free set, merging with neighbouring intervals.
    ///
    /// Returns `false` (and changes nothing) when `id` is not allocated.
    pub(crate) fn release(&mut self, id: u32) -> bool {
        if !self.is_allocated(id) {
            return false;
        }

        let mut start = id;
        // id < high_water <= u32::MAX
        let mut end = id + 1;

        if let Some((&prev_start, &prev_end)) = self.intervals.range(..id).next_back() {
            if prev_end == id {
                self.intervals.remove(&prev_start);
                start = prev_start;
            }
        }
        if let Some(next_end) = self.intervals.remove(&end) {
            end = next_end;
        }

        self.intervals.insert(start, end);
        self.free_count += 1;
        true
    }

    /// True if `id` sits inside a free interval.
    pub(crate) fn is_free(&self, id: u32) -> bool {
        self.intervals
            .range(..=id)
            .next_back()
            .is_some_and(|(_, &end)| id < end)
    }

    /// True if `id` has been issued and not freed since.
    pub(crate) fn is_allocated(&self, id: u32) -> bool {
        id >= self.base && id < self.high_water && !self.is_free(id)
    }

    /// Snapshot of the free intervals in ascending order.
    pub(crate) fn intervals(&self) -> Vec<Range<u32>> {
        self.intervals.iter().map(|(&start, &end)| start..end).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_extends_high_water() {
        let mut list = IntervalFreeList::new(0);
        assert_eq!(list.allocate(), Some(0));
        assert_eq!(list.allocate(), Some(1));
        assert_eq!(list.high_water(), 2);
        assert_eq!(list.allocated_count(), 2);
        assert!(list.intervals().is_empty());
    }

    #[test]
    fn test_release_coalesces_both_sides() {
        let mut list = IntervalFreeList::new(0);
        for _ in 0..6 {
            list.allocate();
        }

        assert!(list.release(1));
        assert!(list.release(3));
        assert_eq!(list.intervals(), vec![1..2, 3..4]);

        // Bridges the gap between the two intervals
        assert!(list.release(2));
        assert_eq!(list.intervals(), vec![1..4]);
        assert_eq!(list.allocated_count(), 3);
    }

    #[test]
    fn test_allocate_splits_lowest_interval() {
        let mut list = IntervalFreeList::new(0);
        for _ in 0..5 {
            list.allocate();
        }
        list.release(2);
        list.release(3);
        list.release(0);
        assert_eq!(list.intervals(), vec![0..1, 2..4]);

        assert_eq!(list.allocate(), Some(0));
        assert_eq!(list.allocate(), Some(2));
        assert_eq!(list.intervals(), vec![3..4]);
    }

    #[test]
    fn test_release_rejects_unallocated() {
        let mut list = IntervalFreeList::new(10);
        assert!(!list.release(10)); // never issued
        assert_eq!(list.allocate(), Some(10));
        assert!(!list.release(9)); // below base
        assert!(list.release(10));
        assert!(!list.release(10)); // double free
        assert_eq!(list.allocated_count(), 0);
    }

    #[test]
    fn test_is_free_boundaries() {
        let mut list = IntervalFreeList::new(0);
        for _ in 0..4 {
            list.allocate();
        }
        list.release(1);
        list.release(2);

        assert!(!list.is_free(0));
        assert!(list.is_free(1));
        assert!(list.is_free(2));
        assert!(!list.is_free(3));
        assert!(list.is_allocated(3));
        assert!(!list.is_allocated(4));
    }
}
