//! Waveform adapter.
//!
//! An episode's visualization is either a waveform renderer (a static peak
//! overview drawn from the decoded audio) or the bar-graph [`Visualizer`].
//! Both sit behind [`Visualization`], so callers drive them through one set
//! of operations and never branch on which one is active.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::feed::Episode;
use crate::feed::EpisodeId;

use super::analyzer::{AnalyserConfig, AnalyzerRegistry};
use super::backend::PlayerBackend;
use super::media::{MediaElement, PlaybackPosition};
use super::visualizer::{BarHeights, Visualizer};

/// Failure to build or load a waveform renderer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RendererError {
    #[error("waveform renderer is not supported here")]
    Unsupported,
    #[error("failed to load audio for waveform: {0}")]
    Load(String),
    #[error("failed to decode audio for waveform: {0}")]
    Decode(String),
}

/// Third-party style waveform renderer bound to an episode's audio.
///
/// `ready` and `error` notifications arrive as
/// [`PlayerEvent::RendererReady`](super::PlayerEvent::RendererReady) and
/// [`PlayerEvent::RendererError`](super::PlayerEvent::RendererError).
pub trait WaveformRenderer {
    fn play(&mut self);
    fn pause(&mut self);
    /// Pauses and rewinds the cursor.
    fn stop(&mut self);
    /// Moves the cursor to a fraction of the audio, `0.0..=1.0`.
    fn seek_to(&mut self, fraction: f64);
    fn set_volume(&mut self, volume: f32);
    fn set_playback_rate(&mut self, rate: f32);
    /// Normalized peaks once the waveform is ready.
    fn peaks(&self) -> Option<Arc<[f32]>>;
    fn destroy(&mut self);
}

/// Which visualization a new episode gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationMode {
    /// Waveform renderer unless the session looks low-power
    #[default]
    Auto,
    Waveform,
    Bars,
}

impl VisualizationMode {
    /// Returns whether the waveform renderer should be tried first.
    pub fn prefers_renderer(self) -> bool {
        self.prefers_renderer_with(is_low_power_session())
    }

    fn prefers_renderer_with(self, low_power: bool) -> bool {
        match self {
            Self::Auto => !low_power,
            Self::Waveform => true,
            Self::Bars => false,
        }
    }
}

/// Remote sessions pay for every decoded byte twice; keep them on bars.
fn is_low_power_session() -> bool {
    std::env::var_os("SSH_CONNECTION").is_some() || std::env::var_os("SSH_TTY").is_some()
}

/// Waveform renderer settings, stored in the `[waveform]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformConfig {
    /// Number of peaks computed across the whole episode
    #[serde(default = "default_peak_bars")]
    pub bars: usize,
    /// Decode the audio for peaks as soon as the episode is listed
    #[serde(default = "default_preload")]
    pub preload: bool,
}

fn default_peak_bars() -> usize {
    120
}

fn default_preload() -> bool {
    false
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            bars: default_peak_bars(),
            preload: default_preload(),
        }
    }
}

/// Everything the factory needs to build a visualization.
#[derive(Debug, Clone, Default)]
pub struct VisualizationSettings {
    pub mode: VisualizationMode,
    pub analyser: AnalyserConfig,
    pub waveform: WaveformConfig,
}

/// A live waveform renderer plus the card state it drives.
pub struct WaveformView {
    episode: EpisodeId,
    renderer: Box<dyn WaveformRenderer>,
    loading: bool,
    progress: f32,
    errored: bool,
    destroyed: bool,
}

impl WaveformView {
    pub fn new(episode: EpisodeId, renderer: Box<dyn WaveformRenderer>) -> Self {
        Self {
            episode,
            renderer,
            loading: true,
            progress: 0.0,
            errored: false,
            destroyed: false,
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.renderer.destroy();
    }
}

impl fmt::Debug for WaveformView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveformView")
            .field("episode", &self.episode)
            .field("loading", &self.loading)
            .field("progress", &self.progress)
            .finish()
    }
}

/// Which backing a [`Visualization`] currently has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationKind {
    Waveform,
    Bars,
}

/// The per-episode visualization handle.
#[derive(Debug)]
pub enum Visualization {
    Waveform(WaveformView),
    Bars(Visualizer),
}

impl Visualization {
    pub fn kind(&self) -> VisualizationKind {
        match self {
            Self::Waveform(_) => VisualizationKind::Waveform,
            Self::Bars(_) => VisualizationKind::Bars,
        }
    }

    pub fn episode(&self) -> EpisodeId {
        match self {
            Self::Waveform(view) => view.episode,
            Self::Bars(visualizer) => visualizer.episode(),
        }
    }

    pub fn play(&mut self, media: &mut dyn MediaElement, analyzers: &mut AnalyzerRegistry) {
        match self {
            Self::Waveform(view) => view.renderer.play(),
            Self::Bars(visualizer) => visualizer.play(media, analyzers),
        }
    }

    pub fn pause(&mut self) {
        match self {
            Self::Waveform(view) => view.renderer.pause(),
            Self::Bars(visualizer) => visualizer.pause(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Waveform(view) => {
                view.progress = 0.0;
                view.renderer.stop();
            }
            Self::Bars(visualizer) => visualizer.reset(),
        }
    }

    /// Sets the progress indicator, in percent.
    pub fn update_progress(&mut self, percent: f32) {
        match self {
            Self::Waveform(view) => {
                if percent.is_finite() {
                    view.progress = percent.clamp(0.0, 100.0);
                }
            }
            Self::Bars(visualizer) => visualizer.update_progress(percent),
        }
    }

    pub fn show_error(&mut self) {
        match self {
            Self::Waveform(view) => view.errored = true,
            Self::Bars(visualizer) => visualizer.show_error(),
        }
    }

    pub fn destroy(&mut self) {
        match self {
            Self::Waveform(view) => view.destroy(),
            Self::Bars(visualizer) => visualizer.destroy(),
        }
    }

    /// Moves the visualization to a fraction of the episode.
    pub fn seek(&mut self, fraction: f64) {
        match self {
            Self::Waveform(view) => view.renderer.seek_to(fraction),
            Self::Bars(visualizer) => visualizer.update_progress((fraction * 100.0) as f32),
        }
    }

    /// Keeps the renderer's own gain in step with the media element.
    pub fn set_volume(&mut self, volume: f32) {
        if let Self::Waveform(view) = self {
            view.renderer.set_volume(volume);
        }
    }

    pub fn set_playback_rate(&mut self, rate: f32) {
        if let Self::Waveform(view) = self {
            view.renderer.set_playback_rate(rate);
        }
    }

    pub fn frame_due(&self) -> bool {
        match self {
            Self::Waveform(_) => false,
            Self::Bars(visualizer) => visualizer.frame_due(),
        }
    }

    /// Runs a pending animation frame. Waveforms have none.
    pub fn on_frame(&mut self, position: PlaybackPosition, now: Instant) -> bool {
        match self {
            Self::Waveform(_) => false,
            Self::Bars(visualizer) => visualizer.on_frame(position, now),
        }
    }

    /// Hides the loading indicator once the renderer has drawn.
    pub fn on_renderer_ready(&mut self) {
        if let Self::Waveform(view) = self {
            view.loading = false;
        }
    }

    pub fn is_loading(&self) -> bool {
        match self {
            Self::Waveform(view) => view.loading,
            Self::Bars(_) => false,
        }
    }

    pub fn is_errored(&self) -> bool {
        match self {
            Self::Waveform(view) => view.errored,
            Self::Bars(visualizer) => visualizer.is_errored(),
        }
    }

    pub fn progress(&self) -> f32 {
        match self {
            Self::Waveform(view) => view.progress,
            Self::Bars(visualizer) => visualizer.progress(),
        }
    }

    /// Waveform peaks, when this is a ready renderer.
    pub fn peaks(&self) -> Option<Arc<[f32]>> {
        match self {
            Self::Waveform(view) => view.renderer.peaks(),
            Self::Bars(_) => None,
        }
    }

    /// Current bar heights, when this is the bar graph.
    pub fn bar_heights(&self, now: Instant) -> Option<BarHeights> {
        match self {
            Self::Waveform(_) => None,
            Self::Bars(visualizer) => Some(visualizer.heights_at(now)),
        }
    }

    pub fn as_visualizer(&self) -> Option<&Visualizer> {
        match self {
            Self::Bars(visualizer) => Some(visualizer),
            Self::Waveform(_) => None,
        }
    }

    pub fn as_visualizer_mut(&mut self) -> Option<&mut Visualizer> {
        match self {
            Self::Bars(visualizer) => Some(visualizer),
            Self::Waveform(_) => None,
        }
    }
}

/// Builds the visualization for a newly listed episode.
///
/// Tries the waveform renderer when the settings prefer it; a renderer that
/// cannot even be constructed is logged and replaced by the bar graph.
pub fn create_visualization<B: PlayerBackend + ?Sized>(
    episode: &Episode,
    backend: &mut B,
    settings: &VisualizationSettings,
) -> Visualization {
    if settings.mode.prefers_renderer() {
        match backend.create_renderer(episode, &settings.waveform) {
            Ok(renderer) => {
                tracing::debug!("Waveform renderer created for episode {}", episode.id);
                return Visualization::Waveform(WaveformView::new(episode.id, renderer));
            }
            Err(err) => {
                tracing::warn!(
                    "Waveform renderer unavailable for episode {}, using bar visualizer: {}",
                    episode.id,
                    err
                );
            }
        }
    }
    Visualization::Bars(Visualizer::new(episode.id, settings.analyser.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::{episode, AnalyserMode, FakeBackend, FakeMedia};

    fn waveform_settings() -> VisualizationSettings {
        VisualizationSettings {
            mode: VisualizationMode::Waveform,
            ..VisualizationSettings::default()
        }
    }

    #[test]
    fn test_mode_selection() {
        assert!(VisualizationMode::Auto.prefers_renderer_with(false));
        assert!(!VisualizationMode::Auto.prefers_renderer_with(true));
        assert!(VisualizationMode::Waveform.prefers_renderer_with(true));
        assert!(!VisualizationMode::Bars.prefers_renderer_with(false));
    }

    #[test]
    fn test_factory_prefers_renderer() {
        let mut backend = FakeBackend::new();
        let ep = episode(1);
        let visualization = create_visualization(&ep, &mut backend, &waveform_settings());
        assert_eq!(visualization.kind(), VisualizationKind::Waveform);
        assert!(visualization.is_loading());
        assert!(backend.renderer(ep.id).is_some());
    }

    #[test]
    fn test_factory_falls_back_on_construction_error() {
        let mut backend = FakeBackend::new();
        backend.renderer_unsupported = true;
        let ep = episode(2);
        let visualization = create_visualization(&ep, &mut backend, &waveform_settings());
        assert_eq!(visualization.kind(), VisualizationKind::Bars);
        assert!(!visualization.is_loading());
    }

    #[test]
    fn test_bars_mode_skips_renderer() {
        let mut backend = FakeBackend::new();
        let ep = episode(3);
        let settings = VisualizationSettings {
            mode: VisualizationMode::Bars,
            ..VisualizationSettings::default()
        };
        let visualization = create_visualization(&ep, &mut backend, &settings);
        assert_eq!(visualization.kind(), VisualizationKind::Bars);
        assert!(backend.renderer(ep.id).is_none());
    }

    #[test]
    fn test_same_contract_for_both_variants() {
        let mut backend = FakeBackend::new();
        let ep = episode(4);
        let mut media = FakeMedia::new("4.mp3", AnalyserMode::Unavailable);
        let mut analyzers = AnalyzerRegistry::default();

        let mut waveform = create_visualization(&ep, &mut backend, &waveform_settings());
        let mut bars = Visualization::Bars(Visualizer::new(ep.id, AnalyserConfig::default()));

        for handle in [&mut waveform, &mut bars] {
            handle.play(&mut media, &mut analyzers);
            handle.update_progress(30.0);
            handle.seek(0.5);
            handle.pause();
            handle.reset();
            handle.show_error();
            handle.destroy();
            handle.destroy();
            assert!(handle.is_errored());
        }

        let renderer = backend.renderer(ep.id).unwrap();
        let state = renderer.borrow();
        assert_eq!(state.play_calls, 1);
        assert_eq!(state.seeks, vec![0.5]);
        assert_eq!(state.stop_calls, 1);
        assert_eq!(state.destroy_calls, 1);
    }

    #[test]
    fn test_ready_hides_loading() {
        let mut backend = FakeBackend::new();
        let mut visualization = create_visualization(&episode(5), &mut backend, &waveform_settings());
        visualization.on_renderer_ready();
        assert!(!visualization.is_loading());
    }
}
