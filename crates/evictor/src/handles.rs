//! Process-wide shared memory handle accounting.
//!
//! Frames are backed by shared memory segments, and each segment costs the
//! process a handle. The evictor never allocates handles itself; it only reads
//! the current count through [`HandleCounter`] to decide whether to cull.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Reports how many shared memory handles are currently allocated.
pub trait HandleCounter: Send + Sync {
    fn allocated_handle_count(&self) -> usize;
}

/// Atomic counter of allocated shared memory handles.
///
/// Owners of shared bitmaps record allocations and releases here; the evictor
/// reads it through [`HandleCounter`].
///
/// # Example
///
/// ```
/// use oxide_evictor::{HandleCounter, SharedHandleTracker};
///
/// let tracker = SharedHandleTracker::new();
/// tracker.record_allocation(3);
/// tracker.record_release(1);
/// assert_eq!(tracker.allocated_handle_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SharedHandleTracker {
    allocated: AtomicUsize,
}

impl SharedHandleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allocation(&self, handles: usize) {
        self.allocated.fetch_add(handles, Ordering::Relaxed);
    }

    /// Record released handles. Never drops below zero.
    pub fn record_release(&self, handles: usize) {
        self.allocated
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(handles))
            })
            .ok();
    }

    /// Overwrite the count, e.g. when resynchronising with the allocator.
    pub fn set_count(&self, handles: usize) {
        self.allocated.store(handles, Ordering::Relaxed);
    }

    pub fn count(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl HandleCounter for SharedHandleTracker {
    fn allocated_handle_count(&self) -> usize {
        self.count()
    }
}

/// Lets an allocator expose its own count without a wrapper type.
impl<F> HandleCounter for F
where
    F: Fn() -> usize + Send + Sync,
{
    fn allocated_handle_count(&self) -> usize {
        self()
    }
}
