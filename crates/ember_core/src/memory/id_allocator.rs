//! # Id Allocator
//!
//! Issues small, dense integer ids and recycles them lowest-first, with a
//! concurrent id -> object table on the side.

use std::fmt;
use std::ops::Range;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::free_list::IntervalFreeList;
use crate::error::{LifecycleError, LifecycleResult};

/// Recycling id allocator with an attached id -> object table.
///
/// Ids are handed out lowest-free-first. Freed ids are kept in a coalesced
/// interval free list, so memory is proportional to the number of gaps, not
/// to the number of ids ever issued.
///
/// # Thread Safety
///
/// All methods take `&self`. Lookups go straight to a sharded concurrent map.
/// Allocate/free serialize on a narrow mutex around the interval list; that
/// lock is never held while user code runs.
///
/// # Example
///
/// ```rust
/// use ember_core::IdAllocator;
///
/// let ids: IdAllocator<&str> = IdAllocator::new();
/// let a = ids.allocate_with("vertex buffer").unwrap();
/// let b = ids.allocate_with("index buffer").unwrap();
/// assert_eq!((a, b), (0, 1));
///
/// ids.free(a).unwrap();
/// assert_eq!(ids.allocate().unwrap(), 0); // lowest free id is reused
/// assert_eq!(ids.lookup(b), Some("index buffer"));
/// ```
pub struct IdAllocator<T> {
    /// Interval free list + high-water mark.
    free_list: Mutex<IntervalFreeList>,
    /// Objects attached to allocated ids.
    objects: DashMap<u32, T>,
}

impl<T> IdAllocator<T> {
    /// Creates an allocator issuing ids from 0.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base(0)
    }

    /// Creates an allocator issuing ids from `base` upward.
    ///
    /// # Arguments
    ///
    /// * `base` - Lowest id that will ever be returned
    #[must_use]
    pub fn with_base(base: u32) -> Self {
        Self::with_capacity(base, 0)
    }

    /// Creates an allocator with a capacity hint for the object table.
    #[must_use]
    pub fn with_capacity(base: u32, capacity: usize) -> Self {
        Self {
            free_list: Mutex::new(IntervalFreeList::new(base)),
            objects: DashMap::with_capacity(capacity),
        }
    }

    /// Allocates the lowest free id without attaching an object.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::IdSpaceExhausted`] if no id is left.
    pub fn allocate(&self) -> LifecycleResult<u32> {
        let mut free_list = self.free_list.lock();
        free_list
            .allocate()
            .ok_or_else(|| LifecycleError::IdSpaceExhausted {
                outstanding: free_list.allocated_count(),
            })
    }

    /// Allocates the lowest free id and attaches `value` to it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::IdSpaceExhausted`] if no id is left.
    pub fn allocate_with(&self, value: T) -> LifecycleResult<u32> {
        let id = self.allocate()?;
        self.objects.insert(id, value);
        Ok(id)
    }

    /// Attaches `value` to an already allocated id, returning the previous
    /// value if one was attached.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] if `id` is not allocated.
    pub fn attach(&self, id: u32, value: T) -> LifecycleResult<Option<T>> {
        // Held across the insert so a concurrent free cannot slip in between
        let free_list = self.free_list.lock();
        if !free_list.is_allocated(id) {
            return Err(LifecycleError::NotFound(format!("id {id} is not allocated")));
        }
        let previous = self.objects.insert(id, value);
        drop(free_list);
        Ok(previous)
    }

    /// Returns `id` to the free set and detaches its object.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidArgument`] if `id` is not currently
    /// allocated: double free, never issued, or below the base.
    pub fn free(&self, id: u32) -> LifecycleResult<Option<T>> {
        let mut free_list = self.free_list.lock();
        if !free_list.is_allocated(id) {
            return Err(LifecycleError::InvalidArgument(format!(
                "id {id} is not allocated (double free or never issued)"
            )));
        }
        // Detach before the id becomes reusable
        let value = self.objects.remove(&id).map(|(_, value)| value);
        free_list.release(id);
        Ok(value)
    }

    /// True if `id` is currently allocated. Pure query.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.free_list.lock().is_allocated(id)
    }

    /// Runs `f` on the object attached to `id`, if any.
    pub fn with<R>(&self, id: u32, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.objects.get(&id).map(|entry| f(entry.value()))
    }

    /// Number of currently allocated ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.free_list.lock().allocated_count()
    }

    /// True if no id is allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lowest id this allocator issues.
    #[must_use]
    pub fn base(&self) -> u32 {
        self.free_list.lock().base()
    }

    /// First id that has never been issued.
    #[must_use]
    pub fn high_water_mark(&self) -> u32 {
        self.free_list.lock().high_water()
    }

    /// Snapshot of the free intervals (half-open, ascending).
    #[must_use]
    pub fn free_intervals(&self) -> Vec<Range<u32>> {
        self.free_list.lock().intervals()
    }

    /// Snapshot of the ids that currently have an object attached, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.objects.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }
}

impl<T: Clone> IdAllocator<T> {
    /// Returns a clone of the object attached to `id`.
    #[must_use]
    pub fn lookup(&self, id: u32) -> Option<T> {
        self.objects.get(&id).map(|entry| entry.value().clone())
    }
}

impl<T> Default for IdAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IdAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let free_list = self.free_list.lock();
        f.debug_struct("IdAllocator")
            .field("base", &free_list.base())
            .field("high_water", &free_list.high_water())
            .field("allocated", &free_list.allocated_count())
            .field("free_intervals", &free_list.intervals())
            .finish()
    }
}
