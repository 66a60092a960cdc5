//! Media element capability.
//!
//! A media element is the single audio path of one episode: it loads the
//! audio, plays it, and can optionally route its output through a frequency
//! analyser. Starting playback is asynchronous; the outcome comes back as a
//! [`PlayerEvent`](super::PlayerEvent) carrying the [`PlayTicket`] of the request.

use crate::feed::EpisodeId;

use super::analyzer::{AnalyserConfig, AnalyzerError, FrequencySource};

/// Identifies one play request so late completions can be matched to it.
///
/// The generation comes from the playback session and increases on every
/// activation; a completion whose generation is no longer current is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayTicket {
    pub episode: EpisodeId,
    pub generation: u64,
}

/// Snapshot of a media element's playback position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition {
    pub current_time: f64,
    /// Total length in seconds; `None` until metadata is loaded
    pub duration: Option<f64>,
}

impl PlaybackPosition {
    /// Fraction of the episode already played, in `[0, 1]`.
    ///
    /// Returns 0 when the duration is unknown or zero.
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(duration) if duration.is_finite() && duration > 0.0 => {
                (self.current_time / duration).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

/// Properties reported by `podwave probe` and debug logging.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDiagnostics {
    pub source: String,
    pub current_time: f64,
    pub duration: Option<f64>,
    pub paused: bool,
    pub volume: f32,
    pub playback_rate: f32,
    pub loaded: bool,
    pub analyser_connected: bool,
}

/// One episode's audio element.
pub trait MediaElement {
    /// Where the audio is loaded from.
    fn source(&self) -> &str;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Total length in seconds, `None` while unknown.
    fn duration(&self) -> Option<f64>;

    fn is_paused(&self) -> bool;

    /// Requests playback. Completion is reported asynchronously as
    /// `PlaybackStarted` or `PlaybackFailed` with the same ticket.
    fn play(&mut self, ticket: PlayTicket);

    /// Pauses playback. Pausing a paused element does nothing.
    fn pause(&mut self);

    fn set_current_time(&mut self, seconds: f64);

    fn volume(&self) -> f32;

    /// Sets the element gain, `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);

    fn playback_rate(&self) -> f32;

    fn set_playback_rate(&mut self, rate: f32);

    /// Routes the element's output through a frequency analyser.
    ///
    /// An element can be routed once; a second attempt fails with
    /// [`AnalyzerError::AlreadyConnected`]. Elements without analysis support
    /// keep the default, which reports the capability as unavailable.
    fn create_analyser(
        &mut self,
        config: &AnalyserConfig,
    ) -> Result<Box<dyn FrequencySource>, AnalyzerError> {
        let _ = config;
        Err(AnalyzerError::Unavailable)
    }

    fn position(&self) -> PlaybackPosition {
        PlaybackPosition {
            current_time: self.current_time(),
            duration: self.duration(),
        }
    }

    fn diagnostics(&self) -> MediaDiagnostics;
}
