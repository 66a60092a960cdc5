//! Platform seam for creating per-episode audio resources.

use crate::feed::Episode;

use super::media::MediaElement;
use super::waveform::{RendererError, WaveformConfig, WaveformRenderer};

/// Creates media elements and waveform renderers for episodes.
///
/// The native backend decodes and plays audio through the sound card; tests
/// use in-memory fakes. Anything asynchronous a backend starts reports back
/// through the player's event channel.
pub trait PlayerBackend {
    /// Creates the media element for an episode. Loading may be deferred
    /// until the first play request.
    fn create_media(&mut self, episode: &Episode) -> Box<dyn MediaElement>;

    /// Creates a waveform renderer bound to the episode's audio.
    ///
    /// # Errors
    /// - If the backend cannot render waveforms at all
    fn create_renderer(
        &mut self,
        episode: &Episode,
        config: &WaveformConfig,
    ) -> Result<Box<dyn WaveformRenderer>, RendererError>;
}
