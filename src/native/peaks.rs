//! Peak-overview waveform renderer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;

use crate::feed::EpisodeId;
use crate::player::{PlayerEvent, RendererError, WaveformConfig, WaveformRenderer};

use super::decoder::{load_audio, AudioSlot, MediaError};

/// Reduces samples to `bars` normalized peak amplitudes in `[0, 1]`.
///
/// Each bar holds the loudest absolute sample of its chunk. Peaks are scaled
/// so the loudest bar is 1; silent audio stays at 0.
pub fn compute_peaks(samples: &[f32], bars: usize) -> Vec<f32> {
    if bars == 0 {
        return Vec::new();
    }
    if samples.is_empty() {
        return vec![0.0; bars];
    }

    let chunk = samples.len().div_ceil(bars);
    let mut peaks: Vec<f32> = (0..bars)
        .map(|i| {
            let start = (i * chunk).min(samples.len());
            let end = ((i + 1) * chunk).min(samples.len());
            samples[start..end].iter().fold(0.0f32, |max, s| max.max(s.abs()))
        })
        .collect();

    let loudest = peaks.iter().copied().fold(0.0f32, f32::max);
    if loudest > 0.0 {
        for peak in &mut peaks {
            *peak /= loudest;
        }
    }
    peaks
}

/// Draws a static overview of an episode from its decoded audio.
///
/// Audio is shared with the episode's media element through the same
/// [`AudioSlot`], so the file is fetched and decoded once.
pub struct PeakWaveform {
    episode: EpisodeId,
    source: String,
    slot: AudioSlot,
    bars: usize,
    events: Sender<PlayerEvent>,
    runtime: Handle,
    peaks: Arc<Mutex<Option<Arc<[f32]>>>>,
    destroyed: Arc<AtomicBool>,
    load_started: bool,
    playing: bool,
    cursor: f64,
    volume: f32,
    playback_rate: f32,
}

impl PeakWaveform {
    /// # Errors
    /// - If `config.bars` is zero
    pub fn new(
        episode: EpisodeId,
        source: String,
        slot: AudioSlot,
        config: &WaveformConfig,
        events: Sender<PlayerEvent>,
        runtime: Handle,
    ) -> Result<Self, RendererError> {
        if config.bars == 0 {
            return Err(RendererError::Unsupported);
        }
        let mut waveform = Self {
            episode,
            source,
            slot,
            bars: config.bars,
            events,
            runtime,
            peaks: Arc::new(Mutex::new(None)),
            destroyed: Arc::new(AtomicBool::new(false)),
            load_started: false,
            playing: false,
            cursor: 0.0,
            volume: 1.0,
            playback_rate: 1.0,
        };
        if config.preload {
            waveform.load();
        }
        Ok(waveform)
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Gain the overview mirrors from the media element.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    fn load(&mut self) {
        if self.load_started {
            return;
        }
        self.load_started = true;

        let episode = self.episode;
        let source = self.source.clone();
        let slot = self.slot.clone();
        let bars = self.bars;
        let events = self.events.clone();
        let peaks = self.peaks.clone();
        let destroyed = self.destroyed.clone();

        self.runtime.spawn(async move {
            let result = load_audio(&slot, &source)
                .await
                .map(|audio| compute_peaks(&audio.samples, bars));
            if destroyed.load(Ordering::SeqCst) {
                return;
            }
            let event = match result {
                Ok(computed) => {
                    *peaks.lock().unwrap_or_else(PoisonError::into_inner) = Some(computed.into());
                    tracing::debug!("Waveform ready for episode {}", episode);
                    PlayerEvent::RendererReady { episode }
                }
                Err(e) => {
                    let message = renderer_error(e).to_string();
                    tracing::warn!("Waveform failed for episode {}: {}", episode, message);
                    PlayerEvent::RendererError { episode, message }
                }
            };
            let _ = events.send(event);
        });
    }
}

fn renderer_error(error: MediaError) -> RendererError {
    match error {
        MediaError::Fetch(e) | MediaError::Io(e) => RendererError::Load(e),
        other => RendererError::Decode(other.to_string()),
    }
}

impl WaveformRenderer for PeakWaveform {
    fn play(&mut self) {
        self.load();
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.cursor = 0.0;
    }

    fn seek_to(&mut self, fraction: f64) {
        self.cursor = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.playback_rate = rate;
    }

    fn peaks(&self) -> Option<Arc<[f32]>> {
        self.peaks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn destroy(&mut self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.playing = false;
        *self.peaks.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_compute_peaks_normalizes() {
        let samples = [0.1, -0.5, 0.2, 0.25, 0.0, 0.0];
        let peaks = compute_peaks(&samples, 3);
        assert_eq!(peaks, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_compute_peaks_uneven_chunks() {
        let samples = [0.5; 9];
        let peaks = compute_peaks(&samples, 4);
        assert_eq!(peaks.len(), 4);
        assert_eq!(peaks[3], 0.0, "last chunk is past the end");
        assert!(peaks[..3].iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_compute_peaks_edge_cases() {
        assert!(compute_peaks(&[0.3], 0).is_empty());
        assert_eq!(compute_peaks(&[], 2), vec![0.0, 0.0]);
        assert_eq!(compute_peaks(&[0.0; 8], 2), vec![0.0, 0.0]);
    }

    fn waveform(
        runtime: &tokio::runtime::Runtime,
        config: &WaveformConfig,
    ) -> (Result<PeakWaveform, RendererError>, mpsc::Receiver<PlayerEvent>) {
        let (tx, rx) = mpsc::channel();
        let waveform = PeakWaveform::new(
            EpisodeId::new(2),
            "/no/such/episode.mp3".to_string(),
            AudioSlot::default(),
            config,
            tx,
            runtime.handle().clone(),
        );
        (waveform, rx)
    }

    #[test]
    fn test_zero_bars_is_unsupported() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = WaveformConfig {
            bars: 0,
            preload: false,
        };
        let (waveform, _rx) = waveform(&runtime, &config);
        assert!(matches!(waveform, Err(RendererError::Unsupported)));
    }

    #[test]
    fn test_load_failure_reports_renderer_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (waveform, rx) = waveform(&runtime, &WaveformConfig::default());
        let mut waveform = waveform.unwrap();

        assert!(rx.try_recv().is_err(), "nothing loads before play");
        waveform.play();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            event,
            PlayerEvent::RendererError { episode, .. } if episode == EpisodeId::new(2)
        ));
        assert!(waveform.peaks().is_none());
    }

    #[test]
    fn test_cursor_controls() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = WaveformConfig::default();
        let (waveform, _rx) = waveform(&runtime, &config);
        let mut waveform = waveform.unwrap();

        waveform.seek_to(1.4);
        assert_eq!(waveform.cursor(), 1.0);
        waveform.seek_to(f64::NAN);
        assert_eq!(waveform.cursor(), 0.0);
        waveform.seek_to(0.3);
        waveform.stop();
        assert_eq!(waveform.cursor(), 0.0);
        assert!(!waveform.is_playing());
    }
}
