//! Configuration management for podwave.
//!
//! Loads the TOML settings file from the user's config directory. Nothing
//! about playback itself is stored here.

pub mod file;

pub use file::{get_config_path, FeedConfig, PlayerConfig, PodwaveConfig, UiConfig};
