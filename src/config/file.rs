//! Configuration file management for podwave.
//!
//! Settings live in `~/.config/podwave/podwave.toml`. Every section and field
//! has a default, so a partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::player::{
    AnalyserConfig, PlayerSettings, VisualizationMode, VisualizationSettings, WaveformConfig,
};

/// Where the episode feed comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// `http(s)` URL or local path of the JSON feed
    #[serde(default = "default_feed_url")]
    pub url: String,
}

fn default_feed_url() -> String {
    "data.json".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
        }
    }
}

/// Playback defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// "auto" (waveform unless over SSH), "waveform" or "bars"
    #[serde(default)]
    pub visualization: VisualizationMode,
    /// Initial volume of every episode, 0.0 to 1.0
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            visualization: VisualizationMode::default(),
            default_volume: default_volume(),
        }
    }
}

/// Terminal UI behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Redraws per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Fraction of the episode skipped by the arrow keys
    #[serde(default = "default_seek_step")]
    pub seek_step: f64,
    /// Volume change per `+`/`-` press
    #[serde(default = "default_volume_step")]
    pub volume_step: f32,
}

fn default_frame_rate() -> u32 {
    30
}

fn default_seek_step() -> f64 {
    0.05
}

fn default_volume_step() -> f32 {
    0.1
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            seek_step: default_seek_step(),
            volume_step: default_volume_step(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodwaveConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub analyser: AnalyserConfig,
    #[serde(default)]
    pub waveform: WaveformConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

impl PodwaveConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads the config file, or defaults when it does not exist.
    ///
    /// # Errors
    /// - If the file exists but cannot be read or parsed
    pub fn load_or_default() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        tracing::debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parses and validates config text.
    ///
    /// # Errors
    /// - If the TOML is malformed
    /// - If the analyser settings are out of range
    /// - If the default volume is outside 0.0 to 1.0
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: PodwaveConfig = toml::from_str(content)?;
        config
            .analyser
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid [analyser] settings: {e}"))?;
        if !(0.0..=1.0).contains(&config.player.default_volume) {
            return Err(anyhow::anyhow!(
                "Invalid [player] default_volume {}: expected 0.0 to 1.0",
                config.player.default_volume
            ));
        }
        Ok(config)
    }

    /// Player settings derived from the `[player]`, `[analyser]` and `[waveform]` sections.
    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            visualization: VisualizationSettings {
                mode: self.player.visualization,
                analyser: self.analyser.clone(),
                waveform: self.waveform.clone(),
            },
            default_volume: self.player.default_volume,
        }
    }
}

/// Path of the config file, creating its directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
        .join(".config")
        .join("podwave");
    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("podwave.toml"))
}
