#![forbid(unsafe_code)]

//! Engine configuration as data.
//!
//! [`EngineConfig`] collects every tunable the runtime reads: store timeouts,
//! gesture thresholds, and layout spacing. It can be loaded from TOML or JSON
//! at startup with the `config-files` feature (on by default).
//!
//! ```toml
//! # cutline.toml
//! pending_timeout_ms = 10000
//! lock_timeout_ms = 5000
//! drag_threshold_px = 5.0
//! context_frames = 16
//! ```
//!
//! # Defaults
//!
//! Every field defaults to the constant the owning component uses on its own,
//! so `EngineConfig::default()` behaves exactly like wiring the components by
//! hand.

use std::path::PathBuf;
#[cfg(feature = "config-files")]
use std::path::Path;

use cutline_core::{Duration, Frame, GestureConfig};
use cutline_layout::{DEFAULT_CONTEXT_FRAMES, DEFAULT_FRAME_PADDING, FluidParams};
use serde::{Deserialize, Serialize};

use crate::store::StoreTimeouts;

/// Default window during which a local write shields its entry from remote
/// snapshots.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(10);

/// Default age after which an unreleased lock is considered stale.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for a [`TimelineEngine`](crate::TimelineEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a pending local write wins over a diverging remote value.
    pub pending_timeout_ms: u64,
    /// How long a position lock may be held before it is force-released.
    pub lock_timeout_ms: u64,
    /// Cooldown after a drag release during which presses are refused.
    pub release_block_ms: u64,
    /// Pixel distance a press must exceed to become a drag.
    pub drag_threshold_px: f64,
    /// Frames of headroom added around the occupied range of the axis.
    pub frame_padding: Frame,
    /// Host adjacency context; the fluid layout's minimum gap.
    pub context_frames: u32,
    /// Label attached to the engine's tracing span.
    pub session_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let gesture = GestureConfig::default();
        Self {
            pending_timeout_ms: duration_ms(DEFAULT_PENDING_TIMEOUT),
            lock_timeout_ms: duration_ms(DEFAULT_LOCK_TIMEOUT),
            release_block_ms: duration_ms(gesture.release_block),
            drag_threshold_px: gesture.threshold_px,
            frame_padding: DEFAULT_FRAME_PADDING,
            context_frames: DEFAULT_CONTEXT_FRAMES,
            session_label: "timeline".to_owned(),
        }
    }
}

#[cfg(feature = "config-files")]
fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl EngineConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-files")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read_config(path.as_ref())?)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-files")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&read_config(path.as_ref())?)
    }

    /// Load from `path`, picking the format from its `.toml` or `.json`
    /// extension, and validate the result.
    #[cfg(feature = "config-files")]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_file(path)?,
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validated()
    }

    /// Check every field is within range.
    ///
    /// Returns a list of problems. An empty list means the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.pending_timeout_ms == 0 {
            errors.push("pending_timeout_ms must be > 0".into());
        }
        if self.lock_timeout_ms == 0 {
            errors.push("lock_timeout_ms must be > 0".into());
        }
        if !self.drag_threshold_px.is_finite() || self.drag_threshold_px < 0.0 {
            errors.push(format!(
                "drag_threshold_px must be finite and >= 0, got {}",
                self.drag_threshold_px
            ));
        }
        if self.frame_padding < 0 {
            errors.push(format!(
                "frame_padding must be >= 0, got {}",
                self.frame_padding
            ));
        }
        if self.session_label.trim().is_empty() {
            errors.push("session_label must not be empty".into());
        }

        errors
    }

    /// [`validate`](Self::validate), folded into a `Result`.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    #[must_use]
    pub fn to_store_timeouts(&self) -> StoreTimeouts {
        StoreTimeouts {
            pending_timeout: Duration::from_millis(self.pending_timeout_ms),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        }
    }

    #[must_use]
    pub fn to_gesture_config(&self) -> GestureConfig {
        GestureConfig {
            threshold_px: self.drag_threshold_px,
            release_block: Duration::from_millis(self.release_block_ms),
        }
    }

    #[must_use]
    pub fn to_fluid_params(&self) -> FluidParams {
        FluidParams::from_context(self.context_frames)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading an engine configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file at `path` could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file extension names no format this crate can parse.
    UnsupportedFormat(PathBuf),
    /// TOML parse error.
    #[cfg(feature = "config-files")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config-files")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            Self::UnsupportedFormat(path) => write!(
                f,
                "{}: expected a .toml or .json engine config",
                path.display()
            ),
            #[cfg(feature = "config-files")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config-files")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            #[cfg(feature = "config-files")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config-files")]
            Self::Json(e) => Some(e),
            Self::UnsupportedFormat(_) | Self::Validation(_) => None,
        }
    }
}
