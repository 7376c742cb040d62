//! Oxide Frame Evictor
//!
//! Bounds how many renderer frames stay resident, evicting the least recently
//! unlocked frame first and never touching frames that are locked.

pub mod client;
pub mod config;
pub mod evictor;
pub mod handles;
pub mod limits;
pub mod shared;

pub use client::{weak_client, FrameClient, FrameId};
pub use config::{ConfigError, EvictorConfig};
pub use evictor::{EvictorError, EvictorStats, FrameEvictor};
pub use handles::{HandleCounter, SharedHandleTracker};
pub use limits::{EvictorLimits, LimitPolicy};
pub use shared::{FrameRegistration, SharedFrameEvictor};
