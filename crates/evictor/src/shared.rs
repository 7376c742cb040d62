//! Thread-safe handle to a frame evictor
//!
//! [`FrameEvictor`] does no locking of its own. Owners that touch it from more
//! than one thread share a [`SharedFrameEvictor`] instead, which runs every
//! operation (including the cull pass it triggers) under one mutex.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::client::{FrameClient, FrameId};
use crate::evictor::{EvictorError, EvictorStats, FrameEvictor};
use crate::limits::EvictorLimits;

/// Cloneable, thread-safe frame evictor.
///
/// Eviction callbacks run while the mutex is held. A [`FrameClient`] that
/// calls back into the same `SharedFrameEvictor` (directly, or by dropping a
/// [`FrameRegistration`]) from `evict_current_frame` deadlocks.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use oxide_evictor::{weak_client, EvictorLimits, FrameClient, FrameEvictor, SharedFrameEvictor};
///
/// struct Frame;
///
/// impl FrameClient for Frame {
///     fn evict_current_frame(&self) {}
/// }
///
/// let evictor = SharedFrameEvictor::new(FrameEvictor::with_limits(EvictorLimits::new(1, 64)));
///
/// let frame = Arc::new(Frame);
/// let registration = evictor.register(weak_client(&frame), true);
/// assert!(evictor.is_tracked(registration.id()));
///
/// let id = registration.id();
/// drop(registration);
/// assert!(!evictor.is_tracked(id));
/// ```
#[derive(Debug, Clone)]
pub struct SharedFrameEvictor {
    state: Arc<Mutex<FrameEvictor>>,
}

impl SharedFrameEvictor {
    pub fn new(evictor: FrameEvictor) -> Self {
        Self {
            state: Arc::new(Mutex::new(evictor)),
        }
    }

    /// Lock the evictor for several operations in a row.
    ///
    /// A panic in another thread while it held the lock does not leave the
    /// bookkeeping half-updated, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, FrameEvictor> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`FrameEvictor::add_frame`].
    pub fn add_frame(&self, id: FrameId, client: Weak<dyn FrameClient>, locked: bool) {
        self.lock().add_frame(id, client, locked);
    }

    /// See [`FrameEvictor::remove_frame`].
    pub fn remove_frame(&self, id: FrameId) -> bool {
        self.lock().remove_frame(id)
    }

    /// See [`FrameEvictor::lock_frame`].
    pub fn lock_frame(&self, id: FrameId) -> Result<(), EvictorError> {
        self.lock().lock_frame(id)
    }

    /// See [`FrameEvictor::unlock_frame`].
    pub fn unlock_frame(&self, id: FrameId) -> Result<(), EvictorError> {
        self.lock().unlock_frame(id)
    }

    pub fn set_limits(&self, limits: EvictorLimits) {
        self.lock().set_limits(limits);
    }

    pub fn is_tracked(&self, id: FrameId) -> bool {
        self.lock().is_tracked(id)
    }

    pub fn stats(&self) -> EvictorStats {
        self.lock().stats()
    }

    /// Track a new frame under a fresh id.
    ///
    /// The frame stays tracked until the returned registration is dropped
    /// (or the evictor evicts it).
    pub fn register(&self, client: Weak<dyn FrameClient>, locked: bool) -> FrameRegistration {
        let id = FrameId::next();
        self.add_frame(id, client, locked);
        FrameRegistration {
            id,
            evictor: self.clone(),
        }
    }
}

/// Keeps a frame tracked for as long as it lives.
///
/// Dropping the registration removes the frame from the evictor, so a frame
/// owner holding one can never leave a dangling entry behind.
#[derive(Debug)]
pub struct FrameRegistration {
    id: FrameId,
    evictor: SharedFrameEvictor,
}

impl FrameRegistration {
    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn lock(&self) -> Result<(), EvictorError> {
        self.evictor.lock_frame(self.id)
    }

    pub fn unlock(&self) -> Result<(), EvictorError> {
        self.evictor.unlock_frame(self.id)
    }

    /// Whether the frame is still tracked, i.e. has not been evicted.
    pub fn is_resident(&self) -> bool {
        self.evictor.is_tracked(self.id)
    }

    /// Re-add the frame after an eviction, e.g. once a new frame has been
    /// produced for the same owner.
    pub fn readd(&self, client: Weak<dyn FrameClient>, locked: bool) {
        self.evictor.add_frame(self.id, client, locked);
    }

    pub fn evictor(&self) -> &SharedFrameEvictor {
        &self.evictor
    }
}

impl Drop for FrameRegistration {
    fn drop(&mut self) {
        self.evictor.remove_frame(self.id);
    }
}
