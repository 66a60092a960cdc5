//! Native platform backend.
//!
//! Decodes episode audio with symphonia, resamples it with rubato, plays it
//! through cpal, taps the output for frequency analysis and computes waveform
//! peaks. Every asynchronous outcome is reported as a [`PlayerEvent`] on the
//! channel the backend was created with.

pub mod decoder;
pub mod output;
pub mod peaks;
pub mod render;
pub mod spectrum;

pub use decoder::{AudioSlot, DecodedAudio, MediaError};
pub use output::NativeMedia;
pub use peaks::{compute_peaks, PeakWaveform};
pub use spectrum::{FrequencyAnalyzer, SpectrumTap};

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use tokio::runtime::Handle;

use crate::feed::{Episode, EpisodeId};
use crate::player::{
    MediaElement, PlayerBackend, PlayerEvent, RendererError, WaveformConfig, WaveformRenderer,
};

/// Creates sound-card media elements and peak waveforms.
///
/// The media element and the waveform of one episode share a single
/// [`AudioSlot`], so each episode is downloaded and decoded at most once.
pub struct NativeBackend {
    events: Sender<PlayerEvent>,
    runtime: Handle,
    slots: HashMap<EpisodeId, AudioSlot>,
}

impl NativeBackend {
    pub fn new(events: Sender<PlayerEvent>, runtime: Handle) -> Self {
        Self {
            events,
            runtime,
            slots: HashMap::new(),
        }
    }

    fn slot(&mut self, episode: EpisodeId) -> AudioSlot {
        self.slots.entry(episode).or_default().clone()
    }
}

impl PlayerBackend for NativeBackend {
    fn create_media(&mut self, episode: &Episode) -> Box<dyn MediaElement> {
        tracing::debug!("Creating media element for episode {}", episode.id);
        Box::new(NativeMedia::new(
            episode.id,
            episode.audio_url.clone(),
            self.slot(episode.id),
            self.events.clone(),
            self.runtime.clone(),
        ))
    }

    fn create_renderer(
        &mut self,
        episode: &Episode,
        config: &WaveformConfig,
    ) -> Result<Box<dyn WaveformRenderer>, RendererError> {
        let waveform = PeakWaveform::new(
            episode.id,
            episode.audio_url.clone(),
            self.slot(episode.id),
            config,
            self.events.clone(),
            self.runtime.clone(),
        )?;
        Ok(Box::new(waveform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::episode;
    use std::sync::mpsc;

    #[test]
    fn test_media_and_waveform_share_audio() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut backend = NativeBackend::new(tx, runtime.handle().clone());
        let ep = episode(1);

        let media = backend.create_media(&ep);
        assert_eq!(media.source(), ep.audio_url);
        assert!(media.is_paused());
        assert!(backend.create_renderer(&ep, &WaveformConfig::default()).is_ok());

        let a = backend.slot(ep.id);
        let b = backend.slot(ep.id);
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert_eq!(backend.slots.len(), 1);
    }

    #[test]
    fn test_zero_bar_waveform_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, _rx) = mpsc::channel();
        let mut backend = NativeBackend::new(tx, runtime.handle().clone());
        let config = WaveformConfig {
            bars: 0,
            preload: false,
        };
        assert!(matches!(
            backend.create_renderer(&episode(1), &config),
            Err(RendererError::Unsupported)
        ));
    }
}
