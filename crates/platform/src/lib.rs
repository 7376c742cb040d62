//! Oxide platform probes
//!
//! Answers the questions renderer-side caches ask once at startup: what kind
//! of device this is, how much memory it has, and how many shared memory
//! handles the process may hold.

pub mod form_factor;
pub mod system;

pub use form_factor::{
    classify_mobile, detect_form_factor, forced_form_factor, form_factor_hint,
    has_android_usb_class, FormFactor, ParseFormFactorError, ScreenInfo, FORCE_FORM_FACTOR_ENV,
};
pub use system::{physical_memory_mb, shared_memory_handle_limit, FALLBACK_HANDLE_LIMIT};
