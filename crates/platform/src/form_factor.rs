//! Coarse device classification.
//!
//! Phones and tablets running Ubuntu Touch ship an Android kernel, which
//! exposes an `android_usb` device class in sysfs. Anything without it is
//! treated as a desktop. The classification can be forced through the
//! `OXIDE_FORCE_FORM_FACTOR` environment variable.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable that overrides form factor detection.
pub const FORCE_FORM_FACTOR_ENV: &str = "OXIDE_FORCE_FORM_FACTOR";

/// Sysfs class directory populated on Android-kernel devices.
pub const ANDROID_USB_CLASS_DIR: &str = "/sys/class/android_usb";

/// Smallest screen side, in device independent pixels, that counts as a tablet.
const MIN_TABLET_DIP: f32 = 600.0;

/// Coarse device classification used to size per-device caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    Desktop,
    Tablet,
    Phone,
}

impl FormFactor {
    pub fn is_desktop(self) -> bool {
        matches!(self, FormFactor::Desktop)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormFactor::Desktop => "desktop",
            FormFactor::Tablet => "tablet",
            FormFactor::Phone => "phone",
        }
    }
}

impl fmt::Display for FormFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown form factor: {0:?}")]
pub struct ParseFormFactorError(String);

impl FromStr for FormFactor {
    type Err = ParseFormFactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(FormFactor::Desktop),
            "tablet" => Ok(FormFactor::Tablet),
            "phone" => Ok(FormFactor::Phone),
            other => Err(ParseFormFactorError(other.to_string())),
        }
    }
}

/// Geometry of the primary screen in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f32,
}

impl ScreenInfo {
    pub fn new(width: u32, height: u32, device_scale_factor: f32) -> Self {
        Self {
            width,
            height,
            device_scale_factor,
        }
    }

    /// Length of the shorter screen side in device independent pixels.
    pub fn min_dip(&self) -> f32 {
        let scale = if self.device_scale_factor > 0.0 {
            self.device_scale_factor
        } else {
            1.0
        };
        self.width.min(self.height) as f32 / scale
    }
}

/// Splits mobile devices into phones and tablets by screen size.
///
/// Without screen information the device is assumed to be a phone.
pub fn classify_mobile(screen: Option<&ScreenInfo>) -> FormFactor {
    match screen {
        Some(screen) if screen.min_dip() >= MIN_TABLET_DIP => FormFactor::Tablet,
        _ => FormFactor::Phone,
    }
}

/// Returns true if `class_dir` exists and contains at least one device.
pub fn has_android_usb_class(class_dir: &Path) -> bool {
    fs::read_dir(class_dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Classifies the device without consulting the environment override.
pub fn detect_form_factor(class_dir: &Path, screen: Option<&ScreenInfo>) -> FormFactor {
    if has_android_usb_class(class_dir) {
        classify_mobile(screen)
    } else {
        FormFactor::Desktop
    }
}

/// Reads `OXIDE_FORCE_FORM_FACTOR`. Unrecognised values are logged and ignored.
pub fn forced_form_factor() -> Option<FormFactor> {
    let value = std::env::var(FORCE_FORM_FACTOR_ENV).ok()?;
    match value.parse() {
        Ok(form_factor) => Some(form_factor),
        Err(err) => {
            warn!(%err, "ignoring {FORCE_FORM_FACTOR_ENV}");
            None
        }
    }
}

/// Best guess at the form factor of the device we are running on.
///
/// The environment override is consulted on every call. Automatic detection
/// runs once per process; `screen` is only used by that first detection.
pub fn form_factor_hint(screen: Option<&ScreenInfo>) -> FormFactor {
    static DETECTED: OnceLock<FormFactor> = OnceLock::new();

    if let Some(form_factor) = forced_form_factor() {
        return form_factor;
    }

    *DETECTED.get_or_init(|| detect_form_factor(Path::new(ANDROID_USB_CLASS_DIR), screen))
}
