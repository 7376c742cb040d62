//! Frame identity and the eviction capability implemented by frame owners.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identity of one renderer frame tracked by the evictor.
///
/// Ids carry no data of their own; they are keys into the evictor's
/// bookkeeping. Two distinct frames never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl FrameId {
    /// Allocate a fresh process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an id minted by the caller. The caller keeps ids unique.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Implemented by whatever owns the backing store of a tracked frame.
pub trait FrameClient: Send + Sync {
    /// Release the frame's backing store now.
    ///
    /// Called synchronously while the evictor culls. Implementations must not
    /// call back into the evictor.
    fn evict_current_frame(&self);
}

/// Non-owning reference to `client`, in the form the evictor stores.
pub fn weak_client<C: FrameClient + 'static>(client: &Arc<C>) -> Weak<dyn FrameClient> {
    Arc::downgrade(client) as Weak<dyn FrameClient>
}
