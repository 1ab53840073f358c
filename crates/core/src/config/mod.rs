use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{playlist::NewTrack, PlayerError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub analyzer: AnalyzerConfig,
    pub player: PlayerConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections and fields fall back
    /// to their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.analyzer.validate()
    }
}

/// Settings for the analysis graph attached to the media element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Transform window; the spectrum holds half as many bins.
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(PlayerError::InvalidConfig(format!(
                "fft_size must be a power of two in [32, 32768], got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(PlayerError::InvalidConfig(format!(
                "smoothing_time_constant must be in [0, 1], got {}",
                self.smoothing_time_constant
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(PlayerError::InvalidConfig(
                "min_decibels must be lower than max_decibels".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(PlayerError::InvalidConfig(
                "sample_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Constants of the per-frame bass smoothing and glow mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub bass_bins: usize,
    pub smoothing_factor: f32,
    pub blur_divisor: f32,
    pub blur_min: f32,
    pub blur_max: f32,
    pub scale_divisor: f32,
    pub scale_max_boost: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bass_bins: 40,
            smoothing_factor: 0.12,
            blur_divisor: 3.0,
            blur_min: 8.0,
            blur_max: 50.0,
            scale_divisor: 2000.0,
            scale_max_boost: 0.06,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bass_bins == 0 {
            return Err(PlayerError::InvalidConfig(
                "bass_bins must be at least 1".to_string(),
            ));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(PlayerError::InvalidConfig(format!(
                "smoothing_factor must be in (0, 1], got {}",
                self.smoothing_factor
            )));
        }
        if self.blur_min > self.blur_max {
            return Err(PlayerError::InvalidConfig(
                "blur_min must not exceed blur_max".to_string(),
            ));
        }
        if self.blur_divisor <= 0.0 || self.scale_divisor <= 0.0 {
            return Err(PlayerError::InvalidConfig(
                "glow divisors must be positive".to_string(),
            ));
        }
        if self.scale_max_boost < 0.0 {
            return Err(PlayerError::InvalidConfig(
                "scale_max_boost must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Player defaults and display fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub default_volume: f32,
    pub default_rate: f32,
    /// Key under which the favorite ids are stored.
    pub favorites_key: String,
    pub placeholder_cover: String,
    /// Artist label for imported files without a metadata match.
    pub upload_artist: String,
    pub unknown_artist: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.8,
            default_rate: 1.0,
            favorites_key: "mp_favs".to_string(),
            placeholder_cover: "assets/placeholder.jpg".to_string(),
            upload_artist: "Local Upload".to_string(),
            unknown_artist: "Unknown Artist".to_string(),
        }
    }
}

/// Reads a read-only seed playlist: a JSON array of track descriptions.
pub fn load_seed_playlist(path: &Path) -> Result<Vec<NewTrack>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "analyzer": { "bass_bins": 16 } }"#).unwrap();

        assert_eq!(config.analyzer.bass_bins, 16);
        assert_eq!(config.analyzer.smoothing_factor, 0.12);
        assert_eq!(config.audio.fft_size, 256);
        assert_eq!(config.player.favorites_key, "mp_favs");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_window() {
        let mut config = AppConfig::default();
        config.audio.fft_size = 300;

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("fft_size"));
    }

    #[test]
    fn rejects_zero_smoothing_factor() {
        let mut config = AppConfig::default();
        config.analyzer.smoothing_factor = 0.0;

        assert!(matches!(
            config.validate(),
            Err(PlayerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn parses_seed_playlist_entries() {
        let tracks: Vec<NewTrack> = serde_json::from_str(
            r#"[{ "title": "That Go!", "artist": "Young Thug", "source": "songs/that_go.mp3" }]"#,
        )
        .unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "That Go!");
        assert_eq!(tracks[0].cover, None);
    }
}
