//! Evictor configuration.
//!
//! Limits are normally derived from the device. Every input to that
//! derivation, and the derived limits themselves, can be pinned from a TOML
//! file or from environment variables. Anything left unset is probed from the
//! platform when the config is resolved.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use oxide_platform::{form_factor_hint, physical_memory_mb, shared_memory_handle_limit, FormFactor};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::limits::{EvictorLimits, LimitPolicy};

pub const PHYSICAL_MEMORY_MB_ENV: &str = "OXIDE_PHYSICAL_MEMORY_MB";
pub const HANDLE_LIMIT_ENV: &str = "OXIDE_HANDLE_LIMIT";
pub const MAX_FRAMES_ENV: &str = "OXIDE_MAX_FRAMES";
pub const MAX_HANDLES_ENV: &str = "OXIDE_MAX_HANDLES";

/// Configuration for the frame evictor.
///
/// Expected file format:
/// ```toml
/// form_factor = "desktop"
/// physical_memory_mb = 8192
/// handle_limit = 4096
/// max_frames = 3
/// max_handles = 512
///
/// [policy]
/// mobile_max_frames = 1
/// desktop_base_frames = 2
/// memory_mb_per_frame = 256
/// desktop_max_frames = 5
/// handles_per_frame = 8.0
/// ```
/// Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictorConfig {
    /// Overrides form factor detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_factor: Option<FormFactor>,
    /// Overrides the physical memory probe (MiB)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_memory_mb: Option<u64>,
    /// Overrides the shared memory handle limit probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_limit: Option<usize>,
    /// Pins the frame budget, bypassing derivation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<usize>,
    /// Pins the handle budget, bypassing derivation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_handles: Option<usize>,
    /// Tuning constants for derivation
    pub policy: LimitPolicy,
}

impl EvictorConfig {
    pub fn with_form_factor(mut self, form_factor: FormFactor) -> Self {
        self.form_factor = Some(form_factor);
        self
    }

    pub fn with_physical_memory_mb(mut self, mb: u64) -> Self {
        self.physical_memory_mb = Some(mb);
        self
    }

    pub fn with_handle_limit(mut self, limit: usize) -> Self {
        self.handle_limit = Some(limit);
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn with_max_handles(mut self, max_handles: usize) -> Self {
        self.max_handles = Some(max_handles);
        self
    }

    pub fn with_policy(mut self, policy: LimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Default location of the config file.
    ///
    /// - Linux: ~/.config/oxide/frame-evictor.toml
    /// - macOS: ~/Library/Application Support/oxide/frame-evictor.toml
    /// - Windows: %APPDATA%\oxide\frame-evictor.toml
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("oxide").join("frame-evictor.toml"),
            None => PathBuf::from("oxide").join("frame-evictor.toml"),
        }
    }

    /// Load the default config file if it exists, then apply environment
    /// overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_config_path();
        let config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env()
    }

    /// Configuration from environment variables alone.
    ///
    /// Environment variables:
    /// - `OXIDE_PHYSICAL_MEMORY_MB`: physical memory in MiB
    /// - `OXIDE_HANDLE_LIMIT`: shared memory handle limit
    /// - `OXIDE_MAX_FRAMES`: frame budget
    /// - `OXIDE_MAX_HANDLES`: handle budget
    ///
    /// The form factor override (`OXIDE_FORCE_FORM_FACTOR`) is honoured at
    /// resolve time by the platform probe.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overwrite fields with any values set in the environment.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(mb) = env_value(PHYSICAL_MEMORY_MB_ENV)? {
            self.physical_memory_mb = Some(mb);
        }
        if let Some(limit) = env_value(HANDLE_LIMIT_ENV)? {
            self.handle_limit = Some(limit);
        }
        if let Some(max_frames) = env_value(MAX_FRAMES_ENV)? {
            self.max_frames = Some(max_frames);
        }
        if let Some(max_handles) = env_value(MAX_HANDLES_ENV)? {
            self.max_handles = Some(max_handles);
        }
        Ok(self)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Write the config as TOML, creating parent directories as needed.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Compute the limits this config describes.
    ///
    /// Platform probes run only for inputs that are both unset and needed:
    /// pinning `max_frames` skips form factor and memory detection, pinning
    /// `max_handles` skips the handle limit query.
    pub fn resolve_limits(&self) -> EvictorLimits {
        let max_frames = match self.max_frames {
            Some(max_frames) => max_frames,
            None => {
                let form_factor = self.form_factor.unwrap_or_else(|| form_factor_hint(None));
                let memory_mb = self
                    .physical_memory_mb
                    .or_else(physical_memory_mb)
                    .unwrap_or(0);
                self.policy.max_frames_for(form_factor, memory_mb)
            }
        };

        let max_handles = match self.max_handles {
            Some(max_handles) => max_handles,
            None => {
                let handle_limit = self.handle_limit.unwrap_or_else(shared_memory_handle_limit);
                self.policy.max_handles_for(handle_limit)
            }
        };

        info!(max_frames, max_handles, "resolved frame evictor limits");
        EvictorLimits::new(max_frames, max_handles)
    }
}

fn env_value<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
