//! Settings for a logging run, read from a [ron] file.
//!
//! Every field has a default, so the smallest valid file is `()`. A fuller
//! example:
//!
//! ```text
//! (
//!     grid_image: "photo.png",
//!     export_dir: "export",
//!     marker_radius: 5,
//!     marker_color: (0, 0, 255, 255),
//!     log_duration_secs: Some(180),
//!     dedup_consecutive: false,
//!     clamp_to_grid: false,
//!     draw_order: Random(seed: Some(7)),
//!     participant_id: "anonymous",
//!     stimuli: [
//!         (id: "Song 1", location: "https://example.org/song1.mp3"),
//!     ],
//! )
//! ```

use crate::{
    export::MarkerStyle,
    sample_store::DedupPolicy,
    session_controller::ControllerOptions,
    stimulus::{DrawOrder, Stimulus},
};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, fs, io, path::Path, path::PathBuf, time::Duration};

/// Everything configurable about a run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    /// The arousal–valence grid image clicks are made on
    pub grid_image: PathBuf,
    /// Where exported tables and images go
    pub export_dir: PathBuf,
    /// Radius of the exported markers, in pixels
    pub marker_radius: u32,
    /// RGBA color of the exported markers
    pub marker_color: [u8; 4],
    /// Session length that triggers the ready-for-export notice
    pub log_duration_secs: Option<u64>,
    /// Drop a click identical to the previous one
    pub dedup_consecutive: bool,
    /// Keep mapped points inside `[-1, 1]`
    pub clamp_to_grid: bool,
    /// How the next stimulus is chosen
    pub draw_order: DrawOrder,
    /// Prefix of exported file names
    pub participant_id: String,
    /// Explicit stimuli, used when no stimulus folder is given
    pub stimuli: Vec<Stimulus>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let style = MarkerStyle::default();
        LoggerConfig {
            grid_image: PathBuf::from("photo.png"),
            export_dir: PathBuf::from("export"),
            marker_radius: style.radius,
            marker_color: style.color,
            log_duration_secs: Some(180),
            dedup_consecutive: false,
            clamp_to_grid: false,
            draw_order: DrawOrder::Sequential,
            participant_id: "anonymous".to_owned(),
            stimuli: Vec::new(),
        }
    }
}

/// Errors from reading a config file.
#[derive(Debug)]
pub enum ConfigError {
    /// Returned when the file cannot be read.
    IoError(io::Error),

    /// Returned when the file is not valid RON for a [LoggerConfig].
    RonSpannedError(ron::de::SpannedError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::IoError(error) => Cow::from(format!("io error: {}", error)),
            ConfigError::RonSpannedError(error) => {
                Cow::from(format!("config parse error: {}", error))
            }
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<ron::de::SpannedError> for ConfigError {
    fn from(value: ron::de::SpannedError) -> Self {
        Self::RonSpannedError(value)
    }
}

impl LoggerConfig {
    /// Reads a config from the path provided.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses a config from RON text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::de::from_str(text)?)
    }

    /// The controller settings described by this config.
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            dedup: if self.dedup_consecutive {
                DedupPolicy::SkipConsecutive
            } else {
                DedupPolicy::KeepAll
            },
            clamp_to_grid: self.clamp_to_grid,
            log_duration: self.log_duration_secs.map(Duration::from_secs),
            draw_order: self.draw_order,
        }
    }

    /// The marker style described by this config.
    pub fn marker_style(&self) -> MarkerStyle {
        MarkerStyle {
            radius: self.marker_radius,
            color: self.marker_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = LoggerConfig::parse("()").unwrap();
        assert_eq!(config, LoggerConfig::default());
        assert_eq!(config.controller_options(), ControllerOptions::default());
        assert_eq!(config.marker_style(), MarkerStyle::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = LoggerConfig::parse(
            r#"(
                marker_radius: 8,
                marker_color: (255, 0, 0, 255),
                dedup_consecutive: true,
                log_duration_secs: None,
                draw_order: Random(seed: Some(3)),
                stimuli: [(id: "trackA", location: "a.mp3")],
            )"#,
        )
        .unwrap();

        assert_eq!(config.marker_radius, 8);
        assert_eq!(config.marker_color, [255, 0, 0, 255]);
        assert_eq!(config.grid_image, PathBuf::from("photo.png"));
        assert_eq!(config.stimuli, vec![Stimulus::new("trackA", "a.mp3")]);

        let options = config.controller_options();
        assert_eq!(options.dedup, DedupPolicy::SkipConsecutive);
        assert_eq!(options.log_duration, None);
        assert_eq!(options.draw_order, DrawOrder::Random { seed: Some(3) });
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(participant_id: \"p07\", export_dir: \"out\")").unwrap();

        let config = LoggerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.participant_id, "p07");
        assert_eq!(config.export_dir, PathBuf::from("out"));
    }

    #[test]
    fn written_config_reads_back() {
        let config = LoggerConfig {
            clamp_to_grid: true,
            draw_order: DrawOrder::Random { seed: None },
            ..LoggerConfig::default()
        };
        let text = ron::ser::to_string(&config).unwrap();
        assert_eq!(LoggerConfig::parse(&text).unwrap(), config);
    }

    #[test]
    fn bad_config_is_an_error() {
        assert!(matches!(
            LoggerConfig::parse("(marker_radius: \"big\")"),
            Err(ConfigError::RonSpannedError(_))
        ));
    }
}
