//! Playback registry.
//!
//! Owns every episode's media element and visualization handle, the analyzer
//! records, and the single playback session. [`PlaybackRegistry::activate`]
//! is the only place that changes the current episode, and it pauses the
//! previous one first, so at most one episode plays at any time.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use crate::feed::EpisodeId;
use crate::format::format_rate;

use super::analyzer::{AnalyserConfig, AnalyzerRegistry};
use super::media::{MediaElement, PlayTicket};
use super::visualizer::Visualizer;
use super::waveform::{Visualization, VisualizationKind};

/// Playback-rate multiplier, cycled by the speed button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackSpeed {
    #[default]
    Normal,
    Quick,
    Fast,
    Double,
    Slow,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 5] = [
        PlaybackSpeed::Normal,
        PlaybackSpeed::Quick,
        PlaybackSpeed::Fast,
        PlaybackSpeed::Double,
        PlaybackSpeed::Slow,
    ];

    /// Successor in the cycle 1 → 1.25 → 1.5 → 2 → 0.75 → 1.
    pub fn next(self) -> Self {
        match self {
            Self::Normal => Self::Quick,
            Self::Quick => Self::Fast,
            Self::Fast => Self::Double,
            Self::Double => Self::Slow,
            Self::Slow => Self::Normal,
        }
    }

    pub fn multiplier(self) -> f32 {
        match self {
            Self::Normal => 1.0,
            Self::Quick => 1.25,
            Self::Fast => 1.5,
            Self::Double => 2.0,
            Self::Slow => 0.75,
        }
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_rate(self.multiplier()))
    }
}

/// The single-slot "currently playing" state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSession {
    pub current: Option<EpisodeId>,
    pub playing: bool,
    pub speed: PlaybackSpeed,
    /// Bumped on every activation; stale play completions carry an older value
    pub generation: u64,
}

impl PlaybackSession {
    /// Returns whether a play completion still matches the live request.
    pub fn is_live_ticket(&self, ticket: PlayTicket) -> bool {
        self.playing && self.current == Some(ticket.episode) && self.generation == ticket.generation
    }

    pub fn is_playing(&self, episode: EpisodeId) -> bool {
        self.playing && self.current == Some(episode)
    }
}

/// Result of making an episode current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activation {
    pub ticket: PlayTicket,
    /// Previously current episode that was paused to make room
    pub displaced: Option<EpisodeId>,
}

/// Identifier-keyed media elements, visualization handles and analyzer records.
#[derive(Default)]
pub struct PlaybackRegistry {
    session: PlaybackSession,
    media: BTreeMap<EpisodeId, Box<dyn MediaElement>>,
    handles: BTreeMap<EpisodeId, Visualization>,
    analyzers: AnalyzerRegistry,
}

impl fmt::Debug for PlaybackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackRegistry")
            .field("session", &self.session)
            .field("episodes", &self.media.keys().collect::<Vec<_>>())
            .field("analyzers", &self.analyzers)
            .finish()
    }
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn current(&self) -> Option<EpisodeId> {
        self.session.current
    }

    pub fn contains(&self, episode: EpisodeId) -> bool {
        self.media.contains_key(&episode)
    }

    pub fn episodes(&self) -> impl Iterator<Item = EpisodeId> + '_ {
        self.media.keys().copied()
    }

    /// Registers an episode's media element and visualization handle.
    pub fn insert(
        &mut self,
        episode: EpisodeId,
        media: Box<dyn MediaElement>,
        handle: Visualization,
    ) {
        if let Some(mut old) = self.handles.insert(episode, handle) {
            old.destroy();
        }
        self.media.insert(episode, media);
    }

    pub fn media(&self, episode: EpisodeId) -> Option<&dyn MediaElement> {
        self.media.get(&episode).map(|m| m.as_ref())
    }

    pub fn media_mut(&mut self, episode: EpisodeId) -> Option<&mut (dyn MediaElement + 'static)> {
        self.media.get_mut(&episode).map(|m| m.as_mut())
    }

    pub fn handle(&self, episode: EpisodeId) -> Option<&Visualization> {
        self.handles.get(&episode)
    }

    pub fn handle_mut(&mut self, episode: EpisodeId) -> Option<&mut Visualization> {
        self.handles.get_mut(&episode)
    }

    /// The bar-graph engine for an episode, if that is its visualization.
    pub fn visualizer(&self, episode: EpisodeId) -> Option<&Visualizer> {
        self.handles.get(&episode)?.as_visualizer()
    }

    pub fn visualizer_mut(&mut self, episode: EpisodeId) -> Option<&mut Visualizer> {
        self.handles.get_mut(&episode)?.as_visualizer_mut()
    }

    pub fn has_renderer(&self, episode: EpisodeId) -> bool {
        self.handles
            .get(&episode)
            .is_some_and(|h| h.kind() == VisualizationKind::Waveform)
    }

    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.analyzers
    }

    /// Makes `episode` the current one, pausing whatever played before it.
    ///
    /// The displaced episode's media element and visualization are paused
    /// before the session changes. Returns the ticket for the new play
    /// request.
    pub fn activate(&mut self, episode: EpisodeId) -> Activation {
        let displaced = match self.session.current {
            Some(previous) if previous != episode => {
                if let Some(media) = self.media.get_mut(&previous) {
                    media.pause();
                }
                if let Some(handle) = self.handles.get_mut(&previous) {
                    handle.pause();
                }
                tracing::debug!("Paused episode {} to play episode {}", previous, episode);
                Some(previous)
            }
            _ => None,
        };

        self.session.generation += 1;
        self.session.current = Some(episode);
        self.session.playing = true;

        Activation {
            ticket: PlayTicket {
                episode,
                generation: self.session.generation,
            },
            displaced,
        }
    }

    /// Marks the session paused. The current episode stays selected.
    pub fn deactivate(&mut self) {
        self.session.playing = false;
    }

    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.session.speed = speed;
    }

    /// Starts an episode's visualization against its own media element.
    pub fn play_handle(&mut self, episode: EpisodeId) {
        let (Some(media), Some(handle)) = (self.media.get_mut(&episode), self.handles.get_mut(&episode))
        else {
            return;
        };
        handle.play(media.as_mut(), &mut self.analyzers);
    }

    /// Runs one animation step for every handle with a pending frame.
    ///
    /// Returns how many frames ran.
    pub fn run_frames(&mut self, now: Instant) -> usize {
        let mut ran = 0;
        for (episode, handle) in self.handles.iter_mut() {
            if !handle.frame_due() {
                continue;
            }
            let Some(media) = self.media.get(episode) else {
                continue;
            };
            if handle.on_frame(media.position(), now) {
                ran += 1;
            }
        }
        ran
    }

    /// Swaps a failed waveform renderer for a bar-graph visualizer.
    ///
    /// The renderer is destroyed and removed, a [`Visualizer`] is registered
    /// in its place with the same progress, and it starts immediately when
    /// the episode is playing. Returns `false` if the episode has no
    /// renderer to replace.
    pub fn promote_to_bars(&mut self, episode: EpisodeId, config: &AnalyserConfig) -> bool {
        if !self.has_renderer(episode) {
            return false;
        }
        let Some(mut failed) = self.handles.remove(&episode) else {
            return false;
        };
        let progress = failed.progress();
        failed.on_renderer_ready();
        failed.destroy();

        let mut bars = Visualization::Bars(Visualizer::new(episode, config.clone()));
        bars.update_progress(progress);
        if self.session.is_playing(episode) {
            if let Some(media) = self.media.get_mut(&episode) {
                bars.play(media.as_mut(), &mut self.analyzers);
            }
        }
        self.handles.insert(episode, bars);

        tracing::info!("Episode {} switched to bar visualizer", episode);
        true
    }

    /// Destroys an episode's handle, drops its analyzer record and media.
    pub fn remove(&mut self, episode: EpisodeId) {
        if let Some(mut handle) = self.handles.remove(&episode) {
            handle.destroy();
        }
        self.analyzers.remove(episode);
        if let Some(mut media) = self.media.remove(&episode) {
            media.pause();
        }
        if self.session.current == Some(episode) {
            self.session.current = None;
            self.session.playing = false;
        }
    }

    /// Destroys every handle, clears analyzer records and pauses all media.
    pub fn teardown(&mut self) {
        for handle in self.handles.values_mut() {
            handle.destroy();
        }
        self.handles.clear();
        self.analyzers.clear();
        for media in self.media.values_mut() {
            media.pause();
        }
        self.session.playing = false;
        tracing::debug!("Playback registry torn down");
    }
}
