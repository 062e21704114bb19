use crate::ass::AssOptions;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LyrisyncConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub parse: ParseConfig,
    #[serde(default)]
    pub ass: AssStyleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How far ahead of playback a line becomes active
    #[serde(default = "default_lookahead")]
    pub lookahead_secs: f64,
    /// Global lyrics offset; positive values delay the lyrics
    #[serde(default)]
    pub lyrics_offset_secs: f64,
}

const fn default_lookahead() -> f64 {
    crate::resolver::LOOKAHEAD_SECS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: default_lookahead(),
            lyrics_offset_secs: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// A jump of the playback position beyond this is treated as a seek
    #[serde(default = "default_seek_threshold")]
    pub seek_threshold_secs: f64,
    /// Any backwards jump beyond this is treated as a seek
    #[serde(default = "default_backward_epsilon")]
    pub backward_epsilon_secs: f64,
    /// Drift beyond this snaps the visual clock to playback
    #[serde(default = "default_hard_resync")]
    pub hard_resync_secs: f64,
    /// Drift beyond this is corrected by adjusting the visual speed
    #[serde(default = "default_soft_sync")]
    pub soft_sync_secs: f64,
    #[serde(default = "default_gain")]
    pub gain: f64,
    #[serde(default = "default_min_speed")]
    pub min_speed: f64,
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

const fn default_seek_threshold() -> f64 {
    1.5
}

const fn default_backward_epsilon() -> f64 {
    0.05
}

const fn default_hard_resync() -> f64 {
    0.5
}

const fn default_soft_sync() -> f64 {
    0.05
}

const fn default_gain() -> f64 {
    2.0
}

const fn default_min_speed() -> f64 {
    0.7
}

const fn default_max_speed() -> f64 {
    1.3
}

const fn default_frame_rate() -> u32 {
    60
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            seek_threshold_secs: default_seek_threshold(),
            backward_epsilon_secs: default_backward_epsilon(),
            hard_resync_secs: default_hard_resync(),
            soft_sync_secs: default_soft_sync(),
            gain: default_gain(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            frame_rate: default_frame_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Auto-scroll is held off this long after a user jump
    #[serde(default = "default_suppress_ms")]
    pub suppress_ms: u64,
    /// Duration of the eased automatic scroll; 0 scrolls instantly
    #[serde(default = "default_animation_ms")]
    pub animation_ms: u64,
}

const fn default_suppress_ms() -> u64 {
    100
}

const fn default_animation_ms() -> u64 {
    300
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            suppress_ms: default_suppress_ms(),
            animation_ms: default_animation_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Lines parsed between cooperative yields
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

const fn default_chunk_size() -> usize {
    crate::schedule::DEFAULT_CHUNK_SIZE
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Global ASS style role overrides, applied to every script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssStyleConfig {
    #[serde(default)]
    pub original_styles: Vec<String>,
    #[serde(default)]
    pub translation_styles: Vec<String>,
}

impl AssStyleConfig {
    #[must_use]
    pub fn to_options(&self) -> AssOptions {
        AssOptions::from_style_lists(&self.original_styles, &self.translation_styles)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to `~/.config/lyrisync/lyrisync.log`
    #[serde(default)]
    pub enabled: bool,
}

impl LyrisyncConfig {
    /// Get the configuration directory path (~/.config/lyrisync/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/lyrisync/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location or create the template on first run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Load config from `path` or create the template there
    ///
    /// # Errors
    ///
    /// Same as [`Self::load_or_create`].
    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate config text
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or out-of-range values.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the sync pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(CoreError::ConfigInvalid {
                message: message.to_string(),
            })
        };

        if self.clock.frame_rate == 0 {
            return invalid("clock.frame_rate must be positive");
        }
        if self.parse.chunk_size == 0 {
            return invalid("parse.chunk_size must be positive");
        }
        if !(self.clock.min_speed > 0.0 && self.clock.min_speed <= self.clock.max_speed) {
            return invalid("clock.min_speed must be positive and not exceed clock.max_speed");
        }
        if self.clock.soft_sync_secs > self.clock.hard_resync_secs {
            return invalid("clock.soft_sync_secs must not exceed clock.hard_resync_secs");
        }
        if self.clock.seek_threshold_secs <= 0.0 || self.clock.backward_epsilon_secs < 0.0 {
            return invalid("clock seek thresholds must be positive");
        }
        if self.sync.lookahead_secs < 0.0 {
            return invalid("sync.lookahead_secs must not be negative");
        }

        Ok(())
    }
}

pub const CONFIG_TEMPLATE: &str = r#"# Lyrisync Configuration
# ~/.config/lyrisync/config.toml

[sync]
# A line becomes active this many seconds before its start time
lookahead_secs = 0.2
# Shift all lyrics; positive values delay them
lyrics_offset_secs = 0.0

[clock]
# Position jumps larger than this (or any backwards jump past the epsilon) are seeks
seek_threshold_secs = 1.5
backward_epsilon_secs = 0.05
# Visual clock drift handling
hard_resync_secs = 0.5
soft_sync_secs = 0.05
gain = 2.0
min_speed = 0.7
max_speed = 1.3
frame_rate = 60

[scroll]
suppress_ms = 100
animation_ms = 300

[parse]
chunk_size = 100

[ass]
# Style names that always count as original or translation text
original_styles = []
translation_styles = []

[logging]
# Also write logs to ~/.config/lyrisync/lyrisync.log
enabled = false
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = LyrisyncConfig::from_toml(CONFIG_TEMPLATE).unwrap();
        let defaults = LyrisyncConfig::default();
        assert!((config.sync.lookahead_secs - defaults.sync.lookahead_secs).abs() < 1e-9);
        assert_eq!(config.clock.frame_rate, defaults.clock.frame_rate);
        assert_eq!(config.scroll.animation_ms, 300);
        assert_eq!(config.parse.chunk_size, 100);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LyrisyncConfig::from_toml("").unwrap();
        assert_eq!(config.scroll.suppress_ms, 100);
        assert!((config.clock.max_speed - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_partial_section() {
        let config = LyrisyncConfig::from_toml("[clock]\nframe_rate = 30\n").unwrap();
        assert_eq!(config.clock.frame_rate, 30);
        assert!((config.clock.gain - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation_rejects_zero_frame_rate() {
        let err = LyrisyncConfig::from_toml("[clock]\nframe_rate = 0\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_validation_rejects_inverted_speed_range() {
        let err = LyrisyncConfig::from_toml("[clock]\nmin_speed = 1.5\nmax_speed = 1.2\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let err = LyrisyncConfig::from_toml("[clock\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParseError(_)));
    }

    #[test]
    fn test_ass_styles_to_options() {
        let config = LyrisyncConfig::from_toml("[ass]\ntranslation_styles = [\"Sub\"]\n").unwrap();
        let options = config.ass.to_options();
        assert_eq!(
            options.role_override("Sub"),
            Some(crate::ass::StyleRole::Translation)
        );
    }

    #[test]
    fn test_load_or_create_writes_template() {
        let dir = std::env::temp_dir().join(format!("lyrisync-config-test-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = fs::remove_file(&path);

        let err = LyrisyncConfig::load_or_create_at(&path).unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { .. }));
        assert!(path.exists());

        let config = LyrisyncConfig::load_or_create_at(&path).unwrap();
        assert_eq!(config.clock.frame_rate, 60);

        let _ = fs::remove_dir_all(&dir);
    }
}
