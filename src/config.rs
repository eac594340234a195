//! Runtime configuration for the viewer

use crate::camera::FacingMode;
use crate::error::{ViewerError, ViewerResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Reference image the loop looks for
    pub template_path: PathBuf,
    /// Minimum correlation (0.0 to 1.0) that counts as a detection
    pub confidence_threshold: f32,
    /// Templates larger than this are downscaled on load
    pub max_template_width: u32,
    pub max_template_height: u32,
    /// Delay between ticks, one display refresh by default
    pub tick_interval_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("assets/DetectionImage2.jpeg"),
            confidence_threshold: 0.7,
            max_template_width: 320,
            max_template_height: 240,
            tick_interval_ms: 16,
        }
    }
}

impl DetectionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory of frames replayed as the camera feed
    pub frames_dir: PathBuf,
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("assets/frames"),
            facing: FacingMode::Environment,
            ideal_width: 1920,
            ideal_height: 1080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Simulated clip of fixed length, no window
    Timed,
    /// External player process
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Overlay clip played on detection
    pub video_path: PathBuf,
    pub player: PlayerKind,
    /// Program and arguments for the external player, `{asset}` is replaced
    /// with the clip path
    pub player_command: Vec<String>,
    /// Clip length used by the timed player
    pub timed_duration_ms: u64,
    /// Pause after a natural end before returning to the camera
    pub completion_delay_ms: u64,
    /// Restart scanning when the user closes the overlay
    pub resume_on_close: bool,
    pub start_muted: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            video_path: PathBuf::from("assets/DetectionVideo.mp4"),
            player: PlayerKind::Timed,
            player_command: ["ffplay", "-autoexit", "-fs", "-loglevel", "quiet", "{asset}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timed_duration_ms: 5_000,
            completion_delay_ms: 1_000,
            resume_on_close: false,
            start_muted: false,
        }
    }
}

impl PlaybackConfig {
    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Static access PIN, compared in cleartext
    pub pin: String,
    pub pin_max_len: usize,
    pub welcome_duration_ms: u64,
    pub welcome_fade_ms: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            pin: "2126".to_string(),
            pin_max_len: 6,
            welcome_duration_ms: 2_500,
            welcome_fade_ms: 500,
        }
    }
}

impl AccessConfig {
    pub fn welcome_total(&self) -> Duration {
        Duration::from_millis(self.welcome_duration_ms + self.welcome_fade_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub detection: DetectionConfig,
    pub camera: CameraConfig,
    pub playback: PlaybackConfig,
    pub access: AccessConfig,
}

impl ViewerConfig {
    /// Load a JSON config file; missing fields fall back to defaults
    pub fn from_json_file(path: &Path) -> ViewerResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ViewerConfig =
            serde_json::from_str(&raw).map_err(|e| ViewerError::InvalidConfig {
                description: format!("{}: {e}", path.display()),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ViewerResult<()> {
        let threshold = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ViewerError::InvalidConfig {
                description: format!("confidence threshold {threshold} outside [0, 1]"),
            });
        }
        if self.detection.max_template_width == 0 || self.detection.max_template_height == 0 {
            return Err(ViewerError::InvalidConfig {
                description: "template bounds must be non-zero".to_string(),
            });
        }
        if self.detection.tick_interval_ms == 0 {
            return Err(ViewerError::InvalidConfig {
                description: "tick interval must be at least 1ms".to_string(),
            });
        }
        if self.playback.player == PlayerKind::Command && self.playback.player_command.is_empty() {
            return Err(ViewerError::InvalidConfig {
                description: "player command is empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bundled_assets() {
        let config = ViewerConfig::default();
        assert_eq!(config.detection.confidence_threshold, 0.7);
        assert_eq!(config.detection.max_template_width, 320);
        assert_eq!(config.detection.max_template_height, 240);
        assert_eq!(config.access.pin, "2126");
        assert!(!config.playback.resume_on_close);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{ "detection": { "confidence_threshold": 0.82 } }"#).unwrap();
        assert_eq!(config.detection.confidence_threshold, 0.82);
        assert_eq!(config.detection.tick_interval_ms, 16);
        assert_eq!(config.camera.facing, FacingMode::Environment);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = ViewerConfig::default();
        config.detection.confidence_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ViewerError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut config = ViewerConfig::default();
        config.detection.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
