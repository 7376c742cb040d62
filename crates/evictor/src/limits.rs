//! Capacity limits for the frame evictor.
//!
//! Limits are derived once from the device: how many frames it can afford to
//! keep resident, and how many shared memory handles the process can hold
//! before the OS runs out. The tuning constants are empirical and live in
//! [`LimitPolicy`] so they can be overridden without code changes.

use oxide_platform::FormFactor;
use serde::{Deserialize, Serialize};

/// Tuning constants used to derive [`EvictorLimits`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitPolicy {
    /// Frame budget on phones and tablets
    pub mobile_max_frames: usize,
    /// Frame budget on a desktop before memory is taken into account
    pub desktop_base_frames: usize,
    /// Physical memory (MiB) that buys one extra desktop frame
    pub memory_mb_per_frame: u64,
    /// Upper bound on the desktop frame budget
    pub desktop_max_frames: usize,
    /// Estimated shared memory handles consumed per frame
    pub handles_per_frame: f64,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            mobile_max_frames: 1,
            desktop_base_frames: 2,
            memory_mb_per_frame: 256,
            desktop_max_frames: 5,
            handles_per_frame: 8.0,
        }
    }
}

impl LimitPolicy {
    /// Frame budget for a device.
    ///
    /// Desktops get `min(desktop_max_frames, desktop_base_frames +
    /// physical_memory_mb / memory_mb_per_frame)`; everything else gets
    /// `mobile_max_frames`.
    pub fn max_frames_for(&self, form_factor: FormFactor, physical_memory_mb: u64) -> usize {
        if !form_factor.is_desktop() {
            return self.mobile_max_frames;
        }

        let extra = physical_memory_mb / self.memory_mb_per_frame.max(1);
        let extra = usize::try_from(extra).unwrap_or(usize::MAX);
        self.desktop_max_frames
            .min(self.desktop_base_frames.saturating_add(extra))
    }

    /// Handle budget for a process allowed `handle_limit` handles in total.
    ///
    /// A non-positive or non-finite `handles_per_frame` leaves the limit
    /// unscaled.
    pub fn max_handles_for(&self, handle_limit: usize) -> usize {
        if !(self.handles_per_frame.is_finite() && self.handles_per_frame > 0.0) {
            return handle_limit;
        }
        (handle_limit as f64 / self.handles_per_frame) as usize
    }
}

/// Capacity limits enforced by the evictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictorLimits {
    /// Maximum number of tracked frames, locked and unlocked together
    pub max_frames: usize,
    /// Maximum process-wide allocated shared memory handle count
    pub max_handles: usize,
}

impl EvictorLimits {
    pub fn new(max_frames: usize, max_handles: usize) -> Self {
        Self {
            max_frames,
            max_handles,
        }
    }

    /// Derive limits from explicit device properties. Performs no OS queries.
    pub fn derive(
        form_factor: FormFactor,
        physical_memory_mb: u64,
        handle_limit: usize,
        policy: &LimitPolicy,
    ) -> Self {
        Self {
            max_frames: policy.max_frames_for(form_factor, physical_memory_mb),
            max_handles: policy.max_handles_for(handle_limit),
        }
    }

    /// Derive limits for the device we are running on.
    pub fn detect(policy: LimitPolicy) -> Self {
        crate::EvictorConfig::default()
            .with_policy(policy)
            .resolve_limits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_keeps_one_frame() {
        let policy = LimitPolicy::default();
        for form_factor in [FormFactor::Phone, FormFactor::Tablet] {
            let limits = EvictorLimits::derive(form_factor, 16 * 1024, 1024, &policy);
            assert_eq!(limits.max_frames, 1);
        }
    }

    #[test]
    fn test_desktop_scales_with_memory() {
        let policy = LimitPolicy::default();
        let frames = |mb| policy.max_frames_for(FormFactor::Desktop, mb);

        assert_eq!(frames(0), 2);
        assert_eq!(frames(255), 2);
        assert_eq!(frames(256), 3);
        assert_eq!(frames(512), 4);
        assert_eq!(frames(768), 5);
        assert_eq!(frames(16 * 1024), 5);
        assert_eq!(frames(u64::MAX), 5);
    }

    #[test]
    fn test_handle_budget_divides_limit() {
        let policy = LimitPolicy::default();
        assert_eq!(policy.max_handles_for(1024), 128);
        assert_eq!(policy.max_handles_for(1023), 127);
        assert_eq!(policy.max_handles_for(0), 0);
    }

    #[test]
    fn test_degenerate_divisors() {
        let policy = LimitPolicy {
            memory_mb_per_frame: 0,
            handles_per_frame: 0.0,
            ..LimitPolicy::default()
        };
        // A zero divisor is treated as one MiB per frame
        assert_eq!(policy.max_frames_for(FormFactor::Desktop, 1), 3);
        assert_eq!(policy.max_handles_for(4096), 4096);

        let policy = LimitPolicy {
            handles_per_frame: f64::NAN,
            ..LimitPolicy::default()
        };
        assert_eq!(policy.max_handles_for(4096), 4096);
    }

    #[test]
    fn test_overridden_policy() {
        let policy = LimitPolicy {
            mobile_max_frames: 2,
            desktop_base_frames: 1,
            memory_mb_per_frame: 1024,
            desktop_max_frames: 10,
            handles_per_frame: 4.0,
        };
        let desktop = EvictorLimits::derive(FormFactor::Desktop, 4096, 1000, &policy);
        assert_eq!(desktop, EvictorLimits::new(5, 250));

        let phone = EvictorLimits::derive(FormFactor::Phone, 4096, 1000, &policy);
        assert_eq!(phone, EvictorLimits::new(2, 250));
    }
}
