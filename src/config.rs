//! Reader engine configuration.
//!
//! All tunables live here and deserialize from TOML; any missing or invalid
//! entries fall back to defaults so a session can always start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 3.0;
pub const MIN_PITCH: f32 = 0.0;
pub const MAX_PITCH: f32 = 2.0;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReaderConfig {
    /// Playback speed multiplier.
    pub rate: f32,
    pub pitch: f32,
    /// 0.0 to 1.0.
    pub volume: f32,
    /// Preferred voice id; `None` selects the first English platform voice.
    pub voice: Option<String>,
    /// Half-width of the word-matching offset window, in chars. The useful
    /// range grows with rendered text length; 20 to 40 covers most content.
    pub match_tolerance: usize,
    /// Chunk length cap handed to the speech engine.
    pub max_chunk_chars: usize,
    /// Seconds between keep-alive pause/resume cycles while speaking.
    pub keep_alive_secs: f32,
    /// Minimum spacing between auto-scroll triggers.
    pub scroll_debounce_ms: u64,
    /// Delay before indexing after a content swap, letting the view settle.
    pub index_settle_ms: u64,
    /// Delay before re-speaking on restart, letting the platform settle.
    pub restart_settle_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
            match_tolerance: crate::matcher::DEFAULT_TOLERANCE,
            max_chunk_chars: crate::chunker::MAX_CHUNK_CHARS,
            keep_alive_secs: 10.0,
            scroll_debounce_ms: 200,
            index_settle_ms: 150,
            restart_settle_ms: 250,
        }
    }
}

impl ReaderConfig {
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs_f32(self.keep_alive_secs)
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    pub fn index_settle(&self) -> Duration {
        Duration::from_millis(self.index_settle_ms)
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    /// Keep runtime values in bounds regardless of config source.
    pub fn clamp(&mut self) {
        self.rate = self.rate.clamp(MIN_RATE, MAX_RATE);
        self.pitch = self.pitch.clamp(MIN_PITCH, MAX_PITCH);
        self.volume = self.volume.clamp(0.0, 1.0);
        self.match_tolerance = self.match_tolerance.clamp(1, 200);
        self.max_chunk_chars = self.max_chunk_chars.clamp(20, 2000);
        self.keep_alive_secs = self.keep_alive_secs.clamp(1.0, 60.0);
        self.scroll_debounce_ms = self.scroll_debounce_ms.min(5_000);
        self.index_settle_ms = self.index_settle_ms.min(5_000);
        self.restart_settle_ms = self.restart_settle_ms.min(5_000);
    }
}

/// Load config from a TOML file, falling back to defaults on any failure.
pub fn load_config(path: &Path) -> ReaderConfig {
    let mut config = match fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<ReaderConfig>(&contents) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded reader config");
                config
            }
            Err(err) => {
                warn!(path = %path.display(), "Invalid reader config TOML: {err}");
                ReaderConfig::default()
            }
        },
        Err(err) => {
            warn!(path = %path.display(), "Falling back to default reader config: {err}");
            ReaderConfig::default()
        }
    };
    config.clamp();
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_bounds() {
        let mut config = ReaderConfig::default();
        let before = config.clone();
        config.clamp();
        assert_eq!(config, before);
    }

    #[test]
    fn clamp_pins_out_of_range_values() {
        let mut config = ReaderConfig {
            rate: 99.0,
            pitch: -1.0,
            volume: 2.0,
            match_tolerance: 0,
            max_chunk_chars: 1,
            keep_alive_secs: 0.0,
            ..ReaderConfig::default()
        };
        config.clamp();
        assert_eq!(config.rate, MAX_RATE);
        assert_eq!(config.pitch, MIN_PITCH);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.match_tolerance, 1);
        assert_eq!(config.max_chunk_chars, 20);
        assert_eq!(config.keep_alive_secs, 1.0);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ReaderConfig = toml::from_str("rate = 1.5\nmatch_tolerance = 40\n")
            .expect("partial config should parse");
        assert_eq!(config.rate, 1.5);
        assert_eq!(config.match_tolerance, 40);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.max_chunk_chars, crate::chunker::MAX_CHUNK_CHARS);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/lectern.toml"));
        assert_eq!(config, ReaderConfig::default());
    }
}
