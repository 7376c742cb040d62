//! Renderer frame evictor with LRU eviction of unlocked frames
//!
//! Keeps the number of resident renderer frames (and the shared memory
//! handles backing them) bounded. Tracked frames are either locked (some
//! holder needs them displayed, possibly several holders at once) or
//! unlocked. When a budget is exceeded the frame that was unlocked longest
//! ago is evicted first. Locked frames are never evicted, so the evictor can
//! legitimately sit over budget while every tracked frame is locked.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, trace, warn};

use crate::client::{FrameClient, FrameId};
use crate::config::EvictorConfig;
use crate::handles::{HandleCounter, SharedHandleTracker};
use crate::limits::EvictorLimits;

/// Misuse of the evictor by its owner.
///
/// The evictor's state is left untouched when an operation returns one of
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EvictorError {
    /// The frame was never added, or has been removed or evicted since
    #[error("{0} is not tracked by the evictor")]
    UntrackedFrame(FrameId),
    /// The frame is tracked but has no outstanding lock to release
    #[error("{0} is not locked")]
    NotLocked(FrameId),
}

/// Snapshot of evictor occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictorStats {
    /// Number of frames currently locked
    pub locked_frames: usize,
    /// Number of frames currently unlocked and evictable
    pub unlocked_frames: usize,
    /// Frames evicted since the evictor was created
    pub evictions: u64,
    /// Shared memory handles allocated process-wide at snapshot time
    pub allocated_handles: usize,
    /// Frame budget
    pub max_frames: usize,
    /// Handle budget
    pub max_handles: usize,
}

impl EvictorStats {
    pub fn tracked_frames(&self) -> usize {
        self.locked_frames + self.unlocked_frames
    }

    /// Tracked frames relative to the frame budget (may exceed 1.0 when
    /// locked frames alone are over budget)
    pub fn frame_utilization(&self) -> f64 {
        if self.max_frames == 0 {
            0.0
        } else {
            self.tracked_frames() as f64 / self.max_frames as f64
        }
    }
}

/// Bounds the number of resident renderer frames.
///
/// All operations take `&mut self` and run synchronously on the caller's
/// thread. Wrap the evictor in [`crate::SharedFrameEvictor`] to use it from
/// several threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use oxide_evictor::{weak_client, EvictorLimits, FrameClient, FrameEvictor, FrameId};
///
/// struct Frame;
///
/// impl FrameClient for Frame {
///     fn evict_current_frame(&self) {
///         // drop the frame's backing store
///     }
/// }
///
/// let mut evictor = FrameEvictor::with_limits(EvictorLimits::new(2, 128));
///
/// let frame = Arc::new(Frame);
/// let id = FrameId::next();
///
/// evictor.add_frame(id, weak_client(&frame), false);
/// evictor.lock_frame(id).unwrap();
/// evictor.unlock_frame(id).unwrap();
/// assert!(evictor.is_tracked(id));
/// ```
pub struct FrameEvictor {
    limits: EvictorLimits,
    handles: Arc<dyn HandleCounter>,
    /// Non-owning references to every tracked frame's owner
    clients: HashMap<FrameId, Weak<dyn FrameClient>>,
    /// Locked frames and their outstanding lock counts (always >= 1)
    locked: HashMap<FrameId, usize>,
    /// Unlocked frames, least recently unlocked at the front
    unlocked: VecDeque<FrameId>,
    evictions: u64,
}

impl FrameEvictor {
    /// Create an evictor reading the allocated handle count from `handles`.
    pub fn new(limits: EvictorLimits, handles: Arc<dyn HandleCounter>) -> Self {
        Self {
            limits,
            handles,
            clients: HashMap::new(),
            locked: HashMap::new(),
            unlocked: VecDeque::new(),
            evictions: 0,
        }
    }

    /// Create an evictor with its own, initially empty, handle tracker.
    pub fn with_limits(limits: EvictorLimits) -> Self {
        Self::new(limits, Arc::new(SharedHandleTracker::new()))
    }

    /// Create an evictor sized by `config`, probing the platform for
    /// anything the config leaves unset.
    pub fn from_config(config: &EvictorConfig, handles: Arc<dyn HandleCounter>) -> Self {
        Self::new(config.resolve_limits(), handles)
    }

    /// Start tracking a frame.
    ///
    /// A frame that is already tracked is removed first, discarding its lock
    /// count and its position in the eviction order. Locked frames start with
    /// a lock count of one; unlocked frames become the newest eviction
    /// candidate. May evict other frames before returning.
    pub fn add_frame(&mut self, id: FrameId, client: Weak<dyn FrameClient>, locked: bool) {
        self.remove_frame(id);

        if locked {
            self.locked.insert(id, 1);
        } else {
            self.unlocked.push_back(id);
        }
        self.clients.insert(id, client);
        trace!(frame = %id, locked, "added frame");

        self.cull_unlocked_frames();
    }

    /// Stop tracking a frame. Returns false if it was not tracked.
    ///
    /// Owners must call this before the frame's client goes away.
    pub fn remove_frame(&mut self, id: FrameId) -> bool {
        let was_locked = self.locked.remove(&id).is_some();
        let before = self.unlocked.len();
        self.unlocked.retain(|&f| f != id);
        let was_unlocked = self.unlocked.len() != before;
        self.clients.remove(&id);

        was_locked || was_unlocked
    }

    /// Take a lock on a tracked frame, protecting it from eviction.
    ///
    /// Locks nest: a frame locked twice needs two unlocks before it becomes
    /// evictable again. Locking an unlocked frame removes it from the eviction
    /// order without disturbing the order of the others.
    pub fn lock_frame(&mut self, id: FrameId) -> Result<(), EvictorError> {
        if let Some(pos) = self.unlocked.iter().position(|&f| f == id) {
            self.unlocked.remove(pos);
            self.locked.insert(id, 1);
        } else if let Some(count) = self.locked.get_mut(&id) {
            *count += 1;
        } else {
            return Err(EvictorError::UntrackedFrame(id));
        }

        trace!(frame = %id, count = self.locked[&id], "locked frame");
        Ok(())
    }

    /// Release one lock on a frame.
    ///
    /// Releasing the last lock makes the frame the newest eviction candidate
    /// and may evict other frames before returning.
    pub fn unlock_frame(&mut self, id: FrameId) -> Result<(), EvictorError> {
        let count = match self.locked.get_mut(&id) {
            Some(count) => count,
            None if self.unlocked.contains(&id) => return Err(EvictorError::NotLocked(id)),
            None => return Err(EvictorError::UntrackedFrame(id)),
        };

        if *count > 1 {
            *count -= 1;
            trace!(frame = %id, count = *count, "unlocked frame, still held");
            return Ok(());
        }

        self.locked.remove(&id);
        self.unlocked.push_back(id);
        trace!(frame = %id, "unlocked frame");

        self.cull_unlocked_frames();
        Ok(())
    }

    /// Replace the limits, evicting immediately if the new ones are tighter.
    pub fn set_limits(&mut self, limits: EvictorLimits) {
        self.limits = limits;
        self.cull_unlocked_frames();
    }

    pub fn limits(&self) -> EvictorLimits {
        self.limits
    }

    pub fn is_tracked(&self, id: FrameId) -> bool {
        self.locked.contains_key(&id) || self.unlocked.contains(&id)
    }

    pub fn is_locked(&self, id: FrameId) -> bool {
        self.locked.contains_key(&id)
    }

    /// Outstanding lock count, zero for unlocked or untracked frames
    pub fn lock_count(&self, id: FrameId) -> usize {
        self.locked.get(&id).copied().unwrap_or(0)
    }

    /// Unlocked frames in eviction order, next victim first
    pub fn unlocked_frames(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.unlocked.iter().copied()
    }

    /// Locked frames in no particular order
    pub fn locked_frames(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.locked.keys().copied()
    }

    pub fn tracked_count(&self) -> usize {
        self.locked.len() + self.unlocked.len()
    }

    pub fn stats(&self) -> EvictorStats {
        EvictorStats {
            locked_frames: self.locked.len(),
            unlocked_frames: self.unlocked.len(),
            evictions: self.evictions,
            allocated_handles: self.handles.allocated_handle_count(),
            max_frames: self.limits.max_frames,
            max_handles: self.limits.max_handles,
        }
    }

    fn over_budget(&self) -> bool {
        self.tracked_count() > self.limits.max_frames
            || self.handles.allocated_handle_count() > self.limits.max_handles
    }

    /// Evict least recently unlocked frames until both budgets are met or
    /// nothing evictable is left.
    fn cull_unlocked_frames(&mut self) {
        while self.over_budget() {
            let Some(id) = self.unlocked.pop_front() else {
                break;
            };
            let client = self.clients.remove(&id).and_then(|c| c.upgrade());
            self.evictions += 1;

            match client {
                Some(client) => {
                    debug!(
                        frame = %id,
                        locked = self.locked.len(),
                        unlocked = self.unlocked.len(),
                        "evicting frame"
                    );
                    client.evict_current_frame();
                }
                None => warn!(frame = %id, "evicted frame whose client is gone"),
            }
        }
    }
}

impl fmt::Debug for FrameEvictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameEvictor")
            .field("limits", &self.limits)
            .field("locked", &self.locked)
            .field("unlocked", &self.unlocked)
            .field("evictions", &self.evictions)
            .finish_non_exhaustive()
    }
}
