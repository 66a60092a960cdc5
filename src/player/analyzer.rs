//! Frequency analyzer bridge.
//!
//! Wraps the platform's audio analysis capability for one episode: routes the
//! media element through an analyser, keeps a fixed-size byte buffer sized to
//! the analyser's frequency-bin count, and hands out per-frame snapshots.
//! Construction failures are soft; the visualizer falls back to its
//! position-driven strategy instead of surfacing them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use thiserror::Error;

use crate::feed::EpisodeId;

use super::media::MediaElement;

/// Smallest and largest FFT window the analyser accepts.
const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Why an analysis context could not be created or used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyzerError {
    #[error("audio analysis is not available on this platform")]
    Unavailable,
    #[error("media element is already connected to an analyser")]
    AlreadyConnected,
    #[error("invalid analyser configuration: {0}")]
    InvalidConfig(String),
    #[error("audio graph error: {0}")]
    Graph(String),
}

/// Analyser tuning, stored in the `[analyser]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyserConfig {
    /// Turns live frequency analysis off entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// FFT window in samples; must be a power of two
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Exponential smoothing across frames, `0.0..=1.0`
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Level mapped to byte value 0
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    /// Level mapped to byte value 255
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

fn default_enabled() -> bool {
    true
}

fn default_fft_size() -> usize {
    256
}

fn default_smoothing() -> f32 {
    0.8
}

fn default_min_decibels() -> f32 {
    -100.0
}

fn default_max_decibels() -> f32 {
    -30.0
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl AnalyserConfig {
    /// Number of frequency bins the analyser produces (half the FFT window).
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Checks the window size and smoothing constant.
    ///
    /// # Errors
    /// - If `fft_size` is not a power of two between 32 and 32768
    /// - If `smoothing` is outside `0.0..=1.0`
    /// - If `min_decibels` is not below `max_decibels`
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(AnalyzerError::InvalidConfig(format!(
                "fft_size {} must be a power of two between {MIN_FFT_SIZE} and {MAX_FFT_SIZE}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "smoothing {} must be between 0 and 1",
                self.smoothing
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(AnalyzerError::InvalidConfig(format!(
                "min_decibels {} must be below max_decibels {}",
                self.min_decibels, self.max_decibels
            )));
        }
        Ok(())
    }
}

/// Run state of the platform audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    /// Not producing data until resumed (autoplay gating)
    Suspended,
    Closed,
}

/// Platform analyser node together with the context that owns it.
pub trait FrequencySource {
    fn frequency_bin_count(&self) -> usize;

    /// Writes the current byte-scaled magnitudes into `out`.
    fn get_byte_frequency_data(&mut self, out: &mut [u8]);

    fn state(&self) -> ContextState;

    /// Starts resuming a suspended context. The outcome arrives as
    /// `PlayerEvent::ContextResumed`.
    fn resume(&mut self);

    /// Detaches the source and analyser nodes from the graph.
    fn disconnect(&mut self) -> Result<(), AnalyzerError>;
}

/// A live analysis graph for one episode plus its frequency buffer.
pub struct AnalyzerContext {
    episode: EpisodeId,
    source: Box<dyn FrequencySource>,
    buffer: Vec<u8>,
    connected: bool,
}

impl fmt::Debug for AnalyzerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerContext")
            .field("episode", &self.episode)
            .field("buffer_len", &self.buffer.len())
            .field("state", &self.source.state())
            .field("connected", &self.connected)
            .finish()
    }
}

impl AnalyzerContext {
    pub fn episode(&self) -> EpisodeId {
        self.episode
    }

    /// Length of the frequency buffer.
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Refreshes the buffer from the analyser and returns it.
    pub fn snapshot(&mut self) -> &[u8] {
        if self.connected {
            self.source.get_byte_frequency_data(&mut self.buffer);
        }
        &self.buffer
    }

    pub fn state(&self) -> ContextState {
        self.source.state()
    }

    pub fn resume(&mut self) {
        self.source.resume();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Disconnects the graph. Calling it again after success does nothing.
    ///
    /// # Errors
    /// - If the platform refuses to disconnect the nodes
    pub fn disconnect(&mut self) -> Result<(), AnalyzerError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.source.disconnect()
    }
}

/// Registry record kept for cleanup and debugging introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerInfo {
    pub fft_size: usize,
    pub bin_count: usize,
    pub smoothing: f32,
    pub connected_at: Instant,
}

/// Identifier → analyzer record map.
#[derive(Debug, Default)]
pub struct AnalyzerRegistry {
    entries: BTreeMap<EpisodeId, AnalyzerInfo>,
}

impl AnalyzerRegistry {
    pub fn register(&mut self, episode: EpisodeId, info: AnalyzerInfo) {
        self.entries.insert(episode, info);
    }

    pub fn remove(&mut self, episode: EpisodeId) -> Option<AnalyzerInfo> {
        self.entries.remove(&episode)
    }

    pub fn get(&self, episode: EpisodeId) -> Option<&AnalyzerInfo> {
        self.entries.get(&episode)
    }

    pub fn contains(&self, episode: EpisodeId) -> bool {
        self.entries.contains_key(&episode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Creates the analysis context for `episode`.
///
/// The media element is routed through an analyser configured with
/// `config`, a byte buffer is sized to the analyser's bin count, and the
/// context is recorded in `registry`.
///
/// # Errors
/// - [`AnalyzerError::Unavailable`] if analysis is disabled or unsupported
/// - [`AnalyzerError::AlreadyConnected`] if this episode already has a context
/// - [`AnalyzerError::InvalidConfig`] if the configuration is out of range
/// - [`AnalyzerError::Graph`] if the platform fails to build the graph
pub fn initialize(
    episode: EpisodeId,
    media: &mut dyn MediaElement,
    config: &AnalyserConfig,
    registry: &mut AnalyzerRegistry,
) -> Result<AnalyzerContext, AnalyzerError> {
    if !config.enabled {
        return Err(AnalyzerError::Unavailable);
    }
    config.validate()?;

    if registry.contains(episode) {
        return Err(AnalyzerError::AlreadyConnected);
    }

    tracing::debug!("Initializing audio analyzer for episode {}", episode);
    let source = media.create_analyser(config)?;
    let bin_count = source.frequency_bin_count();

    registry.register(
        episode,
        AnalyzerInfo {
            fft_size: config.fft_size,
            bin_count,
            smoothing: config.smoothing,
            connected_at: Instant::now(),
        },
    );

    tracing::debug!(
        "Audio analyzer initialized for episode {} ({} bins)",
        episode,
        bin_count
    );

    Ok(AnalyzerContext {
        episode,
        source,
        buffer: vec![0; bin_count],
        connected: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::{AnalyserMode, FakeMedia};

    fn id(n: u32) -> EpisodeId {
        EpisodeId::new(n)
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalyserConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fft_size, 256);
        assert_eq!(config.frequency_bin_count(), 128);
        assert!((config.smoothing - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_validation() {
        let not_pow2 = AnalyserConfig {
            fft_size: 300,
            ..AnalyserConfig::default()
        };
        assert!(matches!(not_pow2.validate(), Err(AnalyzerError::InvalidConfig(_))));

        let too_small = AnalyserConfig {
            fft_size: 16,
            ..AnalyserConfig::default()
        };
        assert!(too_small.validate().is_err());

        let bad_smoothing = AnalyserConfig {
            smoothing: 1.5,
            ..AnalyserConfig::default()
        };
        assert!(bad_smoothing.validate().is_err());
    }

    #[test]
    fn test_initialize_registers_context() {
        let media = FakeMedia::new("a.mp3", AnalyserMode::available(vec![0; 128]));
        let mut element = media.clone();
        let mut registry = AnalyzerRegistry::default();

        let context =
            initialize(id(1), &mut element, &AnalyserConfig::default(), &mut registry).unwrap();

        assert_eq!(context.buffer_len(), 128);
        assert_eq!(context.episode(), id(1));
        let info = registry.get(id(1)).unwrap();
        assert_eq!(info.fft_size, 256);
        assert_eq!(info.bin_count, 128);
    }

    #[test]
    fn test_second_initialize_is_refused() {
        let media = FakeMedia::new("a.mp3", AnalyserMode::available(vec![0; 128]));
        let mut element = media.clone();
        let mut registry = AnalyzerRegistry::default();
        let config = AnalyserConfig::default();

        let _first = initialize(id(1), &mut element, &config, &mut registry).unwrap();
        let second = initialize(id(1), &mut element, &config, &mut registry);
        assert_eq!(second.unwrap_err(), AnalyzerError::AlreadyConnected);

        // The element itself also refuses a second source node.
        registry.clear();
        let third = initialize(id(1), &mut element, &config, &mut registry);
        assert_eq!(third.unwrap_err(), AnalyzerError::AlreadyConnected);
    }

    #[test]
    fn test_unavailable_platform() {
        let mut element = FakeMedia::new("a.mp3", AnalyserMode::Unavailable);
        let mut registry = AnalyzerRegistry::default();

        let result = initialize(id(2), &mut element, &AnalyserConfig::default(), &mut registry);
        assert_eq!(result.unwrap_err(), AnalyzerError::Unavailable);
        assert!(registry.is_empty());

        let disabled = AnalyserConfig {
            enabled: false,
            ..AnalyserConfig::default()
        };
        let mut other = FakeMedia::new("b.mp3", AnalyserMode::available(vec![1; 128]));
        let result = initialize(id(3), &mut other, &disabled, &mut registry);
        assert_eq!(result.unwrap_err(), AnalyzerError::Unavailable);
    }

    #[test]
    fn test_snapshot_and_disconnect() {
        let media = FakeMedia::new("a.mp3", AnalyserMode::available(vec![7; 128]));
        let mut element = media.clone();
        let mut registry = AnalyzerRegistry::default();
        let mut context =
            initialize(id(1), &mut element, &AnalyserConfig::default(), &mut registry).unwrap();

        assert!(context.snapshot().iter().all(|&v| v == 7));

        context.disconnect().unwrap();
        context.disconnect().unwrap();
        let analyser = media.analyser().unwrap();
        assert_eq!(analyser.borrow().disconnect_calls, 1);
    }
}
