//! Bar-graph visualizer engine.
//!
//! Drives a 64-bar graph for one episode from one of two strategies:
//!
//! - **Live**: bar heights follow the analyser's frequency bins each frame.
//! - **Fallback**: bar heights are a deterministic sine pattern of playback
//!   progress, used when live data is unavailable or blocked.
//!
//! The engine starts idle, creates its analysis context on the first
//! [`Visualizer::play`], and downgrades to fallback permanently when the
//! analyser cannot be built, the context fails to resume, or the analyser
//! delivers nothing but zeros past [`BLOCKED_DATA_THRESHOLD`] seconds (the
//! signature of audio served without cross-origin headers).

use std::f64::consts::PI;
use std::fmt;
use std::time::{Duration, Instant};

use crate::feed::EpisodeId;

use super::analyzer::{self, AnalyserConfig, AnalyzerContext, AnalyzerError, AnalyzerRegistry, ContextState};
use super::animation::AnimationTask;
use super::media::{MediaElement, PlaybackPosition};

/// Number of bars in the graph.
pub const BAR_COUNT: usize = 64;

/// Height of every bar after a reset, in percent.
pub const RESET_HEIGHT: f32 = 10.0;

pub const LIVE_MIN_HEIGHT: f32 = 5.0;
pub const LIVE_MAX_HEIGHT: f32 = 95.0;
pub const FALLBACK_MIN_HEIGHT: f32 = 20.0;
pub const FALLBACK_MAX_HEIGHT: f32 = 80.0;

/// Playback position (seconds) after which all-zero data counts as blocked.
pub const BLOCKED_DATA_THRESHOLD: f64 = 0.5;

const LIVE_STAGGER: Duration = Duration::from_millis(3);
const FALLBACK_STAGGER: Duration = Duration::from_millis(5);

/// Bar heights in percent, one per bar.
pub type BarHeights = [f32; BAR_COUNT];

/// Height of a live bar for one byte-scaled frequency magnitude.
pub fn live_height(value: u8) -> f32 {
    (LIVE_MIN_HEIGHT + f32::from(value) / 255.0 * (LIVE_MAX_HEIGHT - LIVE_MIN_HEIGHT))
        .clamp(LIVE_MIN_HEIGHT, LIVE_MAX_HEIGHT)
}

/// Maps a frequency snapshot onto the bars.
///
/// Each bar reads one bin: bar `i` takes bin `i * stride` with
/// `stride = ceil(bins.len() / BAR_COUNT)`, clamped to the last bin.
pub fn live_bar_heights(bins: &[u8]) -> BarHeights {
    let mut heights = [LIVE_MIN_HEIGHT; BAR_COUNT];
    if bins.is_empty() {
        return heights;
    }

    let stride = bins.len().div_ceil(BAR_COUNT);
    let last = bins.len() - 1;
    for (i, height) in heights.iter_mut().enumerate() {
        let index = (i * stride).min(last);
        *height = live_height(bins[index]);
    }
    heights
}

/// Synthetic bar heights for a playback progress in `[0, 1]`.
///
/// Every bar follows a phase-shifted sine whose amplitude is itself modulated
/// by progress. The output depends on `progress` alone and always lies in
/// `[FALLBACK_MIN_HEIGHT, FALLBACK_MAX_HEIGHT]`.
pub fn fallback_heights(progress: f64) -> BarHeights {
    let p = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let amplitude = 0.4 + 0.2 * (4.0 * PI * p).sin();
    let span = f64::from(FALLBACK_MAX_HEIGHT - FALLBACK_MIN_HEIGHT);

    let mut heights = [FALLBACK_MIN_HEIGHT; BAR_COUNT];
    for (i, height) in heights.iter_mut().enumerate() {
        let phase = (i as f64 / BAR_COUNT as f64) * 20.0 * PI;
        let wave = (phase + 10.0 * PI * p).sin() * amplitude;
        let normalized = (wave / 0.6 + 1.0) / 2.0;
        let value = f64::from(FALLBACK_MIN_HEIGHT) + normalized * span;
        *height = (value as f32).clamp(FALLBACK_MIN_HEIGHT, FALLBACK_MAX_HEIGHT);
    }
    heights
}

/// Why the engine stopped using live frequency data.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The analysis context could not be created
    AnalyzerUnavailable(AnalyzerError),
    /// The suspended audio context refused to resume
    ResumeFailed(String),
    /// The analyser only ever produced zeros
    CrossOriginBlocked,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnalyzerUnavailable(err) => write!(f, "analyzer unavailable: {err}"),
            Self::ResumeFailed(reason) => write!(f, "audio context resume failed: {reason}"),
            Self::CrossOriginBlocked => write!(f, "frequency data blocked (missing CORS headers)"),
        }
    }
}

/// Externally visible engine state.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualizerState {
    Idle,
    /// Context exists, resume in flight
    Analyzing,
    Live,
    Fallback(FallbackReason),
    Error,
}

/// Frequency buffer summary for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerProbe {
    pub buffer_len: usize,
    pub all_zero: bool,
    pub first_bins: Vec<u8>,
    pub context_state: ContextState,
}

enum Strategy {
    Idle,
    Analyzing(AnalyzerContext),
    Live(AnalyzerContext),
    Fallback {
        reason: FallbackReason,
        /// Still routed through the analyser when the fallback came later
        context: Option<AnalyzerContext>,
    },
}

impl Strategy {
    fn context_mut(&mut self) -> Option<&mut AnalyzerContext> {
        match self {
            Self::Analyzing(context) | Self::Live(context) => Some(context),
            Self::Fallback { context, .. } => context.as_mut(),
            Self::Idle => None,
        }
    }

    fn take_context(&mut self) -> Option<AnalyzerContext> {
        match std::mem::replace(self, Self::Idle) {
            Self::Analyzing(context) | Self::Live(context) => Some(context),
            Self::Fallback { reason, context } => {
                *self = Self::Fallback {
                    reason,
                    context: None,
                };
                context
            }
            Self::Idle => None,
        }
    }
}

/// Target heights plus the staggered transition towards them.
#[derive(Debug, Clone)]
struct BarGraph {
    previous: BarHeights,
    targets: BarHeights,
    changed_at: Option<Instant>,
    stagger: Duration,
}

impl BarGraph {
    fn new() -> Self {
        Self {
            previous: [RESET_HEIGHT; BAR_COUNT],
            targets: [RESET_HEIGHT; BAR_COUNT],
            changed_at: None,
            stagger: Duration::ZERO,
        }
    }

    fn set(&mut self, targets: BarHeights, now: Instant, stagger: Duration) {
        self.previous = self.heights_at(now);
        self.targets = targets;
        self.changed_at = Some(now);
        self.stagger = stagger;
    }

    /// Bar `i` switches to its target `i * stagger` after the change.
    fn heights_at(&self, now: Instant) -> BarHeights {
        let Some(changed_at) = self.changed_at else {
            return self.targets;
        };
        let elapsed = now.saturating_duration_since(changed_at);

        let mut heights = self.targets;
        for (i, height) in heights.iter_mut().enumerate() {
            if elapsed < self.stagger * i as u32 {
                *height = self.previous[i];
            }
        }
        heights
    }
}

/// Bar-graph engine for one episode.
pub struct Visualizer {
    episode: EpisodeId,
    config: AnalyserConfig,
    strategy: Strategy,
    playing: bool,
    errored: bool,
    destroyed: bool,
    progress: f32,
    bars: BarGraph,
    animation: AnimationTask,
}

impl fmt::Debug for Visualizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visualizer")
            .field("episode", &self.episode)
            .field("state", &self.state())
            .field("playing", &self.playing)
            .field("progress", &self.progress)
            .finish()
    }
}

impl Visualizer {
    pub fn new(episode: EpisodeId, config: AnalyserConfig) -> Self {
        Self {
            episode,
            config,
            strategy: Strategy::Idle,
            playing: false,
            errored: false,
            destroyed: false,
            progress: 0.0,
            bars: BarGraph::new(),
            animation: AnimationTask::new(),
        }
    }

    pub fn episode(&self) -> EpisodeId {
        self.episode
    }

    pub fn state(&self) -> VisualizerState {
        if self.errored {
            return VisualizerState::Error;
        }
        match &self.strategy {
            Strategy::Idle => VisualizerState::Idle,
            Strategy::Analyzing(_) => VisualizerState::Analyzing,
            Strategy::Live(_) => VisualizerState::Live,
            Strategy::Fallback { reason, .. } => VisualizerState::Fallback(reason.clone()),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_errored(&self) -> bool {
        self.errored
    }

    /// Progress indicator in percent.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn frame_due(&self) -> bool {
        self.animation.is_scheduled()
    }

    /// Starts (or resumes) the animation.
    ///
    /// On the first call the analysis context is created through the
    /// analyzer bridge; a failure moves the engine to fallback for good. A
    /// suspended context is resumed and the engine waits in `Analyzing` for
    /// [`Visualizer::on_context_resumed`].
    pub fn play(&mut self, media: &mut dyn MediaElement, analyzers: &mut AnalyzerRegistry) {
        if self.destroyed {
            return;
        }

        self.strategy = match std::mem::replace(&mut self.strategy, Strategy::Idle) {
            Strategy::Idle => {
                match analyzer::initialize(self.episode, media, &self.config, analyzers) {
                    Ok(context) => self.start_context(context),
                    Err(err) => {
                        tracing::warn!(
                            "Could not create audio analyzer for episode {}: {}",
                            self.episode,
                            err
                        );
                        Strategy::Fallback {
                            reason: FallbackReason::AnalyzerUnavailable(err),
                            context: None,
                        }
                    }
                }
            }
            Strategy::Live(context) => self.start_context(context),
            other => other,
        };

        self.playing = true;
        self.animation.request();
    }

    fn start_context(&self, mut context: AnalyzerContext) -> Strategy {
        if context.state() == ContextState::Suspended {
            tracing::debug!("Resuming suspended audio context for episode {}", self.episode);
            context.resume();
            Strategy::Analyzing(context)
        } else {
            Strategy::Live(context)
        }
    }

    /// Applies the outcome of an asynchronous context resume.
    pub fn on_context_resumed(&mut self, result: Result<(), String>) {
        self.strategy = match std::mem::replace(&mut self.strategy, Strategy::Idle) {
            Strategy::Analyzing(context) => match result {
                Ok(()) => {
                    tracing::debug!("Audio context resumed for episode {}", self.episode);
                    Strategy::Live(context)
                }
                Err(reason) => {
                    tracing::warn!(
                        "Audio context resume failed for episode {}: {}",
                        self.episode,
                        reason
                    );
                    Strategy::Fallback {
                        reason: FallbackReason::ResumeFailed(reason),
                        context: Some(context),
                    }
                }
            },
            other => other,
        };
    }

    /// Stops the animation loop. Pausing a paused engine does nothing.
    pub fn pause(&mut self) {
        self.playing = false;
        self.animation.cancel();
    }

    /// Zeroes progress, drops every bar to [`RESET_HEIGHT`] and stops the loop.
    pub fn reset(&mut self) {
        self.playing = false;
        self.animation.cancel();
        self.progress = 0.0;
        self.bars = BarGraph::new();
    }

    /// Sets the progress indicator, in percent.
    pub fn update_progress(&mut self, percent: f32) {
        if percent.is_finite() {
            self.progress = percent.clamp(0.0, 100.0);
        }
    }

    /// Marks the graph as errored. The audio itself is left alone.
    pub fn show_error(&mut self) {
        self.errored = true;
    }

    /// Cancels the loop and disconnects the analysis graph.
    ///
    /// Disconnection errors are logged and dropped. Safe to call repeatedly
    /// and before any `play`.
    pub fn destroy(&mut self) {
        self.animation.cancel();
        self.playing = false;
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        if let Some(mut context) = self.strategy.take_context() {
            if let Err(err) = context.disconnect() {
                tracing::debug!(
                    "Ignoring analyzer disconnect error for episode {}: {}",
                    self.episode,
                    err
                );
            }
        }
    }

    /// Runs one animation step if a frame is pending.
    ///
    /// Returns whether a frame ran. The next frame is requested only while
    /// the engine is still playing.
    pub fn on_frame(&mut self, position: PlaybackPosition, now: Instant) -> bool {
        if self.animation.take().is_none() || !self.playing || self.destroyed {
            return false;
        }

        let mut blocked = false;
        match &mut self.strategy {
            Strategy::Live(context) => {
                let bins = context.snapshot();
                if bins.iter().all(|&v| v == 0) && position.current_time > BLOCKED_DATA_THRESHOLD {
                    blocked = true;
                } else {
                    self.bars.set(live_bar_heights(bins), now, LIVE_STAGGER);
                }
            }
            Strategy::Analyzing(context) => {
                // A suspended context reads zeros until the resume lands.
                let heights = live_bar_heights(context.snapshot());
                self.bars.set(heights, now, LIVE_STAGGER);
            }
            Strategy::Fallback { .. } => {
                self.bars
                    .set(fallback_heights(position.progress()), now, FALLBACK_STAGGER);
            }
            Strategy::Idle => {}
        }

        if blocked {
            tracing::warn!(
                "Frequency data for episode {} is all zeros at {:.2}s, audio is likely served without CORS headers; switching to fallback visualization",
                self.episode,
                position.current_time
            );
            let context = self.strategy.take_context();
            self.strategy = Strategy::Fallback {
                reason: FallbackReason::CrossOriginBlocked,
                context,
            };
            self.bars
                .set(fallback_heights(position.progress()), now, FALLBACK_STAGGER);
        }

        if self.playing {
            self.animation.request();
        }
        true
    }

    /// Bar heights as displayed at `now`, with the stagger applied.
    pub fn heights_at(&self, now: Instant) -> BarHeights {
        self.bars.heights_at(now)
    }

    /// Heights every bar is moving towards.
    pub fn targets(&self) -> BarHeights {
        self.bars.targets
    }

    /// Reads the analyser once for diagnostics, if a context exists.
    pub fn probe(&mut self) -> Option<AnalyzerProbe> {
        let context = self.strategy.context_mut()?;
        let context_state = context.state();
        let bins = context.snapshot();
        Some(AnalyzerProbe {
            buffer_len: bins.len(),
            all_zero: bins.iter().all(|&v| v == 0),
            first_bins: bins.iter().take(10).copied().collect(),
            context_state,
        })
    }
}

impl Drop for Visualizer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::{AnalyserMode, FakeMedia};

    fn position(current_time: f64, duration: f64) -> PlaybackPosition {
        PlaybackPosition {
            current_time,
            duration: Some(duration),
        }
    }

    fn playing(mode: AnalyserMode) -> (Visualizer, FakeMedia, AnalyzerRegistry) {
        let media = FakeMedia::new("a.mp3", mode);
        let mut element = media.clone();
        let mut registry = AnalyzerRegistry::default();
        let mut visualizer = Visualizer::new(EpisodeId::new(1), AnalyserConfig::default());
        visualizer.play(&mut element, &mut registry);
        (visualizer, media, registry)
    }

    #[test]
    fn test_live_height_mapping() {
        assert_eq!(live_height(0), 5.0);
        assert_eq!(live_height(255), 95.0);
        let mut last = live_height(0);
        for value in 1..=255u8 {
            let height = live_height(value);
            assert!(height >= last, "not monotonic at {value}");
            last = height;
        }
    }

    #[test]
    fn test_live_bar_stride() {
        let bins: Vec<u8> = (0..128).map(|i| i as u8).collect();
        let heights = live_bar_heights(&bins);
        assert_eq!(heights[0], live_height(0));
        assert_eq!(heights[1], live_height(2));
        assert_eq!(heights[63], live_height(126));

        // Fewer bins than bars: stride 1, index clamped to the last bin.
        let short = [255u8; 10];
        let heights = live_bar_heights(&short);
        assert!(heights.iter().all(|&h| h == 95.0));

        assert!(live_bar_heights(&[]).iter().all(|&h| h == LIVE_MIN_HEIGHT));
    }

    #[test]
    fn test_fallback_heights_bounded_and_deterministic() {
        for step in 0..=100 {
            let p = step as f64 / 100.0;
            let heights = fallback_heights(p);
            assert!(heights
                .iter()
                .all(|&h| (FALLBACK_MIN_HEIGHT..=FALLBACK_MAX_HEIGHT).contains(&h)));
            assert_eq!(heights, fallback_heights(p));
        }
        assert_eq!(fallback_heights(-3.0), fallback_heights(0.0));
        assert_eq!(fallback_heights(7.0), fallback_heights(1.0));
        assert_eq!(fallback_heights(f64::NAN), fallback_heights(0.0));
    }

    #[test]
    fn test_play_goes_live() {
        let (mut visualizer, _media, registry) = playing(AnalyserMode::available(vec![200; 128]));
        assert_eq!(visualizer.state(), VisualizerState::Live);
        assert!(visualizer.is_playing());
        assert!(registry.contains(EpisodeId::new(1)));

        let now = Instant::now();
        assert!(visualizer.on_frame(position(1.0, 60.0), now));
        assert!(visualizer.targets().iter().all(|&h| h == live_height(200)));
        assert!(visualizer.frame_due());
    }

    #[test]
    fn test_unavailable_analyzer_falls_back() {
        let (mut visualizer, _media, registry) = playing(AnalyserMode::Unavailable);
        assert_eq!(
            visualizer.state(),
            VisualizerState::Fallback(FallbackReason::AnalyzerUnavailable(
                AnalyzerError::Unavailable
            ))
        );
        assert!(registry.is_empty());

        visualizer.on_frame(position(15.0, 60.0), Instant::now());
        assert_eq!(visualizer.targets(), fallback_heights(0.25));
    }

    #[test]
    fn test_all_zero_data_switches_to_fallback_once() {
        let (mut visualizer, media, mut registry) = playing(AnalyserMode::available(vec![0; 128]));
        let now = Instant::now();

        // Silence at the very start is not a block.
        visualizer.on_frame(position(0.2, 60.0), now);
        assert_eq!(visualizer.state(), VisualizerState::Live);

        visualizer.on_frame(position(0.6, 60.0), now);
        assert_eq!(
            visualizer.state(),
            VisualizerState::Fallback(FallbackReason::CrossOriginBlocked)
        );
        assert_eq!(visualizer.targets(), fallback_heights(0.01));
        let reads = media.analyser().unwrap().borrow().reads;

        // No further live reads, and replaying does not rebuild the analyser.
        visualizer.on_frame(position(0.7, 60.0), now);
        visualizer.pause();
        let mut element = media.clone();
        visualizer.play(&mut element, &mut registry);
        visualizer.on_frame(position(0.8, 60.0), now);
        assert_eq!(media.analyser().unwrap().borrow().reads, reads);
        assert_eq!(media.state().analyser_requests, 1);
        assert_eq!(
            visualizer.state(),
            VisualizerState::Fallback(FallbackReason::CrossOriginBlocked)
        );
    }

    #[test]
    fn test_suspended_context_resumes() {
        let (mut visualizer, media, _registry) = playing(AnalyserMode::suspended(vec![0; 128]));
        assert_eq!(visualizer.state(), VisualizerState::Analyzing);
        assert_eq!(media.analyser().unwrap().borrow().resume_calls, 1);

        // Zeros while resuming are expected and not treated as a block.
        visualizer.on_frame(position(2.0, 60.0), Instant::now());
        assert_eq!(visualizer.state(), VisualizerState::Analyzing);

        visualizer.on_context_resumed(Ok(()));
        assert_eq!(visualizer.state(), VisualizerState::Live);
    }

    #[test]
    fn test_resume_failure_falls_back() {
        let (mut visualizer, _media, _registry) = playing(AnalyserMode::suspended(vec![0; 128]));
        visualizer.on_context_resumed(Err("not allowed".to_string()));
        assert_eq!(
            visualizer.state(),
            VisualizerState::Fallback(FallbackReason::ResumeFailed("not allowed".to_string()))
        );
    }

    #[test]
    fn test_pause_cancels_loop() {
        let (mut visualizer, _media, _registry) = playing(AnalyserMode::available(vec![9; 128]));
        visualizer.pause();
        visualizer.pause();
        assert!(!visualizer.frame_due());
        assert!(!visualizer.on_frame(position(3.0, 60.0), Instant::now()));
    }

    #[test]
    fn test_reset_restores_minimum_height() {
        let (mut visualizer, _media, _registry) = playing(AnalyserMode::available(vec![255; 128]));
        let now = Instant::now();
        visualizer.on_frame(position(3.0, 60.0), now);
        visualizer.update_progress(40.0);

        visualizer.reset();
        assert_eq!(visualizer.progress(), 0.0);
        assert!(visualizer.heights_at(now).iter().all(|&h| h == RESET_HEIGHT));
        assert!(!visualizer.frame_due());
        assert!(!visualizer.is_playing());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut idle = Visualizer::new(EpisodeId::new(4), AnalyserConfig::default());
        idle.destroy();
        idle.destroy();
        assert_eq!(idle.state(), VisualizerState::Idle);

        let (mut visualizer, media, _registry) = playing(AnalyserMode::available(vec![1; 128]));
        media.analyser().unwrap().borrow_mut().fail_disconnect = true;
        visualizer.destroy();
        visualizer.destroy();
        assert_eq!(media.analyser().unwrap().borrow().disconnect_calls, 1);
        assert!(!visualizer.frame_due());

        // A destroyed engine ignores play.
        let mut element = media.clone();
        let mut registry = AnalyzerRegistry::default();
        visualizer.play(&mut element, &mut registry);
        assert!(!visualizer.is_playing());
    }

    #[test]
    fn test_staggered_heights() {
        let (mut visualizer, _media, _registry) = playing(AnalyserMode::available(vec![255; 128]));
        let now = Instant::now();
        visualizer.on_frame(position(1.0, 60.0), now);

        let at_start = visualizer.heights_at(now);
        assert_eq!(at_start[0], 95.0);
        assert_eq!(at_start[63], RESET_HEIGHT);

        let settled = visualizer.heights_at(now + Duration::from_secs(1));
        assert!(settled.iter().all(|&h| h == 95.0));
    }

    #[test]
    fn test_show_error_and_probe() {
        let (mut visualizer, _media, _registry) = playing(AnalyserMode::available(vec![0; 128]));
        let probe = visualizer.probe().unwrap();
        assert!(probe.all_zero);
        assert_eq!(probe.buffer_len, 128);
        assert_eq!(probe.first_bins.len(), 10);

        visualizer.show_error();
        assert_eq!(visualizer.state(), VisualizerState::Error);
        assert!(visualizer.is_playing());
    }
}
