use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::face_landmarks::PoseThresholds;
use crate::monitoring::domain::violation::ViolationKind;
use crate::shared::constants::{
    AWAY_HOLD_SECS, BOOK_HOLD_SECS, FACE_CROP_PADDING, IDENTITY_DISTANCE_THRESHOLD,
    IDENTITY_HOLD_SECS, MULTI_FACE_HOLD_SECS, OBJECT_MIN_CONFIDENCE,
    OBJECT_REFRESH_INTERVAL_SECS, OBJECT_TARGET_SIZE, PHONE_HOLD_SECS,
};

const APP_DIR_NAME: &str = "Proctor";
const CONFIG_FILE_NAME: &str = "engine.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Seconds each condition must persist before it becomes a violation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldSeconds {
    pub looking_away: f64,
    pub multiple_faces: f64,
    pub phone: f64,
    pub book: f64,
    pub identity_mismatch: f64,
}

impl Default for HoldSeconds {
    fn default() -> Self {
        Self {
            looking_away: AWAY_HOLD_SECS,
            multiple_faces: MULTI_FACE_HOLD_SECS,
            phone: PHONE_HOLD_SECS,
            book: BOOK_HOLD_SECS,
            identity_mismatch: IDENTITY_HOLD_SECS,
        }
    }
}

impl HoldSeconds {
    pub fn for_kind(&self, kind: ViolationKind) -> f64 {
        match kind {
            ViolationKind::LookingAway => self.looking_away,
            ViolationKind::MultipleFaces => self.multiple_faces,
            ViolationKind::PhoneDetected => self.phone,
            ViolationKind::BookDetected => self.book,
            ViolationKind::IdentityMismatch => self.identity_mismatch,
        }
    }
}

/// Tuning of the violation engine. Missing JSON fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub hold_seconds: HoldSeconds,
    pub object_refresh_interval_secs: f64,
    /// Long side, in pixels, of the frame copy given to the object detector.
    pub object_target_size: u32,
    pub object_min_confidence: f64,
    pub identity_threshold: f64,
    pub face_crop_padding: u32,
    pub pose: PoseThresholds,
    /// Lock the identity reference on the first frame with a usable face.
    pub auto_capture_reference: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hold_seconds: HoldSeconds::default(),
            object_refresh_interval_secs: OBJECT_REFRESH_INTERVAL_SECS,
            object_target_size: OBJECT_TARGET_SIZE,
            object_min_confidence: OBJECT_MIN_CONFIDENCE,
            identity_threshold: IDENTITY_DISTANCE_THRESHOLD,
            face_crop_padding: FACE_CROP_PADDING,
            pose: PoseThresholds::default(),
            auto_capture_reference: true,
        }
    }
}

impl EngineConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Per-user config location, e.g. `~/.config/Proctor/engine.json`.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in ViolationKind::ALL {
            let hold = self.hold_seconds.for_kind(kind);
            if !hold.is_finite() || hold < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "hold for {kind} must be a non-negative number of seconds, got {hold}"
                )));
            }
        }
        if !self.object_refresh_interval_secs.is_finite() || self.object_refresh_interval_secs <= 0.0
        {
            return Err(ConfigError::Invalid(format!(
                "object_refresh_interval_secs must be positive, got {}",
                self.object_refresh_interval_secs
            )));
        }
        if self.object_target_size == 0 {
            return Err(ConfigError::Invalid(
                "object_target_size must be >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.object_min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "object_min_confidence must be in [0, 1], got {}",
                self.object_min_confidence
            )));
        }
        if !self.identity_threshold.is_finite() || self.identity_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "identity_threshold must be positive, got {}",
                self.identity_threshold
            )));
        }
        if self.pose.max_abs_yaw < 0.0 || self.pose.min_pitch > self.pose.max_pitch {
            return Err(ConfigError::Invalid(format!(
                "pose thresholds are inconsistent: {:?}",
                self.pose
            )));
        }
        Ok(())
    }

    pub fn hold(&self, kind: ViolationKind) -> Duration {
        Duration::from_secs_f64(self.hold_seconds.for_kind(kind))
    }

    pub fn object_refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(self.object_refresh_interval_secs)
    }
}
