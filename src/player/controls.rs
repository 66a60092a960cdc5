//! Player control surface.
//!
//! [`PlayerController`] owns the playback registry and the per-episode UI
//! state. Every user action goes through one of its operations, which fan out
//! to the episode's media element, its visualization handle and the
//! now-playing bar. Platform completions come back through
//! [`PlayerController::handle_event`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::feed::{Episode, EpisodeId};
use crate::format::format_time;

use super::analyzer::AnalyzerInfo;
use super::backend::PlayerBackend;
use super::events::PlayerEvent;
use super::media::{MediaDiagnostics, PlayTicket};
use super::registry::{PlaybackRegistry, PlaybackSession, PlaybackSpeed};
use super::visualizer::{AnalyzerProbe, VisualizerState};
use super::waveform::{create_visualization, Visualization, VisualizationKind, VisualizationSettings};

/// Volume restored by unmute when nothing was remembered.
pub const DEFAULT_UNMUTE_VOLUME: f32 = 0.75;

/// Message shown when a play request is rejected.
pub const PLAY_FAILED_MESSAGE: &str = "Could not play audio. Please try again later.";

/// Rejected control operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error("unknown episode {0}")]
    UnknownEpisode(EpisodeId),
    #[error("episode {0} cannot be played: its audio failed to load")]
    PlaybackDisabled(EpisodeId),
    #[error("invalid volume {0}")]
    InvalidVolume(f32),
}

/// Icon on an episode's play button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayGlyph {
    Play,
    Pause,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeIcon {
    Muted,
    Low,
    High,
}

impl VolumeIcon {
    pub fn for_volume(volume: f32) -> Self {
        if volume == 0.0 {
            Self::Muted
        } else if volume < 0.5 {
            Self::Low
        } else {
            Self::High
        }
    }
}

/// UI state of one episode card.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeView {
    pub glyph: PlayGlyph,
    pub is_playing: bool,
    /// Waveform still loading
    pub loading: bool,
    pub errored: bool,
    /// Last rejected play request, shown until the next attempt
    pub play_error: Option<String>,
    pub disabled: bool,
    /// Percent of the episode played
    pub progress: f32,
    pub current_label: String,
    pub duration_label: String,
    pub volume: f32,
    pub volume_icon: VolumeIcon,
    pub last_volume: Option<f32>,
    pub speed: PlaybackSpeed,
}

impl EpisodeView {
    fn new(episode: &Episode, volume: f32, loading: bool) -> Self {
        Self {
            glyph: PlayGlyph::Play,
            is_playing: false,
            loading,
            errored: false,
            play_error: None,
            disabled: false,
            progress: 0.0,
            current_label: format_time(0.0),
            duration_label: episode.duration.clone(),
            volume,
            volume_icon: VolumeIcon::for_volume(volume),
            last_volume: None,
            speed: PlaybackSpeed::default(),
        }
    }

    fn show_paused(&mut self) {
        if self.glyph != PlayGlyph::Error {
            self.glyph = PlayGlyph::Play;
        }
        self.is_playing = false;
    }

    fn show_playing(&mut self) {
        self.glyph = PlayGlyph::Pause;
        self.is_playing = true;
        self.play_error = None;
    }
}

/// The persistent strip for the current episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlayingBar {
    pub visible: bool,
    pub episode: Option<EpisodeId>,
    pub title: String,
    pub image: String,
    pub audio_url: String,
    pub current_label: String,
    pub duration_label: String,
    pub progress: f32,
    pub speed: PlaybackSpeed,
    pub glyph: Option<PlayGlyph>,
}

impl NowPlayingBar {
    fn show(&mut self, episode: &Episode, duration_label: &str, speed: PlaybackSpeed) {
        *self = Self {
            visible: true,
            episode: Some(episode.id),
            title: episode.title.clone(),
            image: episode.image.clone(),
            audio_url: episode.audio_url.clone(),
            current_label: format_time(0.0),
            duration_label: duration_label.to_string(),
            progress: 0.0,
            speed,
            glyph: Some(PlayGlyph::Pause),
        };
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn shows(&self, episode: EpisodeId) -> bool {
        self.episode == Some(episode)
    }
}

/// Player-wide settings taken from the configuration.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub visualization: VisualizationSettings,
    pub default_volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            visualization: VisualizationSettings::default(),
            default_volume: 1.0,
        }
    }
}

/// Everything known about one episode's audio path, for diagnostics.
#[derive(Debug, Clone)]
pub struct EpisodeDiagnostics {
    pub episode: EpisodeId,
    pub media: MediaDiagnostics,
    pub visualization: VisualizationKind,
    pub visualizer: Option<VisualizerState>,
    pub analyzer: Option<AnalyzerInfo>,
    pub probe: Option<AnalyzerProbe>,
}

/// Owns all playback state and applies user actions and platform events.
pub struct PlayerController<B: PlayerBackend> {
    backend: B,
    settings: PlayerSettings,
    registry: PlaybackRegistry,
    episodes: Vec<Arc<Episode>>,
    views: BTreeMap<EpisodeId, EpisodeView>,
    now_playing: NowPlayingBar,
    torn_down: bool,
}

impl<B: PlayerBackend> PlayerController<B> {
    pub fn new(backend: B, settings: PlayerSettings) -> Self {
        Self {
            backend,
            settings,
            registry: PlaybackRegistry::new(),
            episodes: Vec::new(),
            views: BTreeMap::new(),
            now_playing: NowPlayingBar::default(),
            torn_down: false,
        }
    }

    /// Wires an episode to a media element and a visualization.
    ///
    /// Adding an episode that is already known does nothing.
    pub fn add_episode(&mut self, episode: Arc<Episode>) {
        if self.views.contains_key(&episode.id) {
            return;
        }
        let volume = self.settings.default_volume.clamp(0.0, 1.0);

        let mut media = self.backend.create_media(&episode);
        media.set_volume(volume);
        let mut handle =
            create_visualization(&episode, &mut self.backend, &self.settings.visualization);
        handle.set_volume(volume);

        self.views
            .insert(episode.id, EpisodeView::new(&episode, volume, handle.is_loading()));
        self.registry.insert(episode.id, media, handle);
        tracing::debug!(
            "Episode {} ready with {:?} visualization",
            episode.id,
            self.registry.handle(episode.id).map(Visualization::kind)
        );
        self.episodes.push(episode);
    }

    pub fn episodes(&self) -> &[Arc<Episode>] {
        &self.episodes
    }

    pub fn episode(&self, id: EpisodeId) -> Option<&Arc<Episode>> {
        self.episodes.iter().find(|episode| episode.id == id)
    }

    pub fn view(&self, id: EpisodeId) -> Option<&EpisodeView> {
        self.views.get(&id)
    }

    pub fn now_playing(&self) -> &NowPlayingBar {
        &self.now_playing
    }

    pub fn session(&self) -> &PlaybackSession {
        self.registry.session()
    }

    pub fn handle(&self, id: EpisodeId) -> Option<&Visualization> {
        self.registry.handle(id)
    }

    pub fn registry(&self) -> &PlaybackRegistry {
        &self.registry
    }

    fn view_mut(&mut self, id: EpisodeId) -> Result<&mut EpisodeView, PlayerError> {
        self.views.get_mut(&id).ok_or(PlayerError::UnknownEpisode(id))
    }

    /// Plays or pauses an episode.
    ///
    /// Starting an episode pauses whichever one was current. The media
    /// element is asked to play right away; the visualization follows once
    /// the matching `PlaybackStarted` arrives.
    ///
    /// # Errors
    /// - If the episode is unknown
    /// - If the episode's audio failed to load earlier
    pub fn toggle_play(&mut self, id: EpisodeId) -> Result<(), PlayerError> {
        let view = self.view_mut(id)?;
        if view.disabled {
            return Err(PlayerError::PlaybackDisabled(id));
        }

        if self.registry.session().is_playing(id) {
            self.pause_current();
            self.now_playing.hide();
        } else {
            self.start(id);
            self.show_now_playing(id);
        }
        Ok(())
    }

    /// The now-playing bar's play button: pauses or resumes the current
    /// episode and keeps the bar visible.
    ///
    /// # Errors
    /// - If the current episode's audio failed to load
    pub fn toggle_current(&mut self) -> Result<(), PlayerError> {
        let Some(id) = self.registry.current() else {
            return Ok(());
        };
        if self.views.get(&id).is_some_and(|view| view.disabled) {
            return Err(PlayerError::PlaybackDisabled(id));
        }

        if self.registry.session().playing {
            self.pause_current();
            self.now_playing.glyph = Some(PlayGlyph::Play);
        } else {
            self.start(id);
            if self.now_playing.shows(id) {
                self.now_playing.visible = true;
                self.now_playing.glyph = Some(PlayGlyph::Pause);
            } else {
                self.show_now_playing(id);
            }
        }
        Ok(())
    }

    fn start(&mut self, id: EpisodeId) -> PlayTicket {
        let activation = self.registry.activate(id);
        if let Some(previous) = activation.displaced {
            if let Some(view) = self.views.get_mut(&previous) {
                view.show_paused();
            }
        }

        let speed = self.registry.session().speed;
        if let Some(media) = self.registry.media_mut(id) {
            media.set_playback_rate(speed.multiplier());
            media.play(activation.ticket);
        }
        if let Some(view) = self.views.get_mut(&id) {
            view.show_playing();
            view.speed = speed;
        }

        tracing::info!("Playing episode {} at {}", id, speed);
        activation.ticket
    }

    fn pause_current(&mut self) {
        let Some(id) = self.registry.current() else {
            return;
        };
        if let Some(media) = self.registry.media_mut(id) {
            media.pause();
        }
        if let Some(handle) = self.registry.handle_mut(id) {
            handle.pause();
        }
        self.registry.deactivate();
        if let Some(view) = self.views.get_mut(&id) {
            view.show_paused();
        }
        tracing::info!("Paused episode {}", id);
    }

    fn show_now_playing(&mut self, id: EpisodeId) {
        let Some(episode) = self.episodes.iter().find(|episode| episode.id == id) else {
            return;
        };
        let duration_label = self
            .views
            .get(&id)
            .map_or_else(|| episode.duration.clone(), |view| view.duration_label.clone());
        self.now_playing
            .show(episode, &duration_label, self.registry.session().speed);
    }

    /// Sets an episode's volume on the media element and its renderer.
    ///
    /// # Errors
    /// - If the episode is unknown
    /// - If `volume` is NaN
    pub fn set_volume(&mut self, id: EpisodeId, volume: f32) -> Result<(), PlayerError> {
        if volume.is_nan() {
            return Err(PlayerError::InvalidVolume(volume));
        }
        self.view_mut(id)?;
        self.apply_volume(id, volume.clamp(0.0, 1.0));
        Ok(())
    }

    fn apply_volume(&mut self, id: EpisodeId, volume: f32) {
        if let Some(media) = self.registry.media_mut(id) {
            media.set_volume(volume);
        }
        if let Some(handle) = self.registry.handle_mut(id) {
            handle.set_volume(volume);
        }
        if let Some(view) = self.views.get_mut(&id) {
            view.volume = volume;
            view.volume_icon = VolumeIcon::for_volume(volume);
        }
    }

    /// Mutes an episode, or restores the volume it had before muting.
    ///
    /// # Errors
    /// - If the episode is unknown
    pub fn toggle_mute(&mut self, id: EpisodeId) -> Result<(), PlayerError> {
        let view = self.view_mut(id)?;
        let target = if view.volume > 0.0 {
            view.last_volume = Some(view.volume);
            0.0
        } else {
            view.last_volume.unwrap_or(DEFAULT_UNMUTE_VOLUME)
        };
        self.apply_volume(id, target);
        Ok(())
    }

    /// Seeks an episode to a fraction of its length.
    ///
    /// Ignored while the duration is unknown. Seeking the current episode
    /// while it is paused resumes it.
    ///
    /// # Errors
    /// - If the episode is unknown
    pub fn seek(&mut self, id: EpisodeId, fraction: f64) -> Result<(), PlayerError> {
        self.view_mut(id)?;
        if fraction.is_nan() {
            return Ok(());
        }
        let fraction = fraction.clamp(0.0, 1.0);

        let Some(media) = self.registry.media_mut(id) else {
            return Ok(());
        };
        let duration = match media.duration() {
            Some(duration) if duration.is_finite() && duration > 0.0 => duration,
            _ => {
                tracing::debug!("Ignoring seek on episode {}: duration unknown", id);
                return Ok(());
            }
        };
        let target = fraction * duration;
        media.set_current_time(target);

        if let Some(handle) = self.registry.handle_mut(id) {
            handle.seek(fraction);
        }
        let percent = (fraction * 100.0) as f32;
        if let Some(view) = self.views.get_mut(&id) {
            view.progress = percent;
            view.current_label = format_time(target);
        }
        if self.now_playing.shows(id) {
            self.now_playing.progress = percent;
            self.now_playing.current_label = format_time(target);
        }

        let session = self.registry.session();
        if session.current == Some(id) && !session.playing {
            let disabled = self.views.get(&id).is_some_and(|view| view.disabled);
            if !disabled {
                tracing::debug!("Seek on paused episode {} resumes playback", id);
                self.start(id);
                if self.now_playing.shows(id) {
                    self.now_playing.visible = true;
                    self.now_playing.glyph = Some(PlayGlyph::Pause);
                } else {
                    self.show_now_playing(id);
                }
            }
        }
        Ok(())
    }

    /// Seeks the current episode, from the now-playing bar. Does nothing
    /// when no episode is current.
    ///
    /// # Errors
    /// - If the current episode is unknown
    pub fn seek_current(&mut self, fraction: f64) -> Result<(), PlayerError> {
        match self.registry.current() {
            Some(id) => self.seek(id, fraction),
            None => Ok(()),
        }
    }

    /// Moves an episode to the next playback speed.
    ///
    /// # Errors
    /// - If the episode is unknown
    pub fn cycle_speed(&mut self, id: EpisodeId) -> Result<(), PlayerError> {
        let view = self.view_mut(id)?;
        let next = view.speed.next();
        view.speed = next;

        let rate = next.multiplier();
        if let Some(media) = self.registry.media_mut(id) {
            media.set_playback_rate(rate);
        }
        if let Some(handle) = self.registry.handle_mut(id) {
            handle.set_playback_rate(rate);
        }
        self.registry.set_speed(next);
        if self.now_playing.shows(id) {
            self.now_playing.speed = next;
        }
        tracing::debug!("Episode {} speed set to {}", id, next);
        Ok(())
    }

    /// Cycles the current episode's speed, from the now-playing bar.
    ///
    /// # Errors
    /// - If the current episode is unknown
    pub fn cycle_current_speed(&mut self) -> Result<(), PlayerError> {
        match self.registry.current() {
            Some(id) => self.cycle_speed(id),
            None => Ok(()),
        }
    }

    /// Applies a completion or notification from the platform.
    pub fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::PlaybackStarted { ticket } => self.on_playback_started(ticket),
            PlayerEvent::PlaybackFailed { ticket, reason } => self.on_playback_failed(ticket, &reason),
            PlayerEvent::MetadataLoaded { episode, duration } => {
                let label = format_time(duration);
                if let Some(view) = self.views.get_mut(&episode) {
                    view.duration_label = label.clone();
                }
                if self.now_playing.shows(episode) {
                    self.now_playing.duration_label = label;
                }
            }
            PlayerEvent::Ended { episode } => self.on_ended(episode),
            PlayerEvent::MediaError { episode, message } => self.on_media_error(episode, &message),
            PlayerEvent::ContextResumed { episode, result } => {
                if let Some(visualizer) = self.registry.visualizer_mut(episode) {
                    visualizer.on_context_resumed(result);
                }
            }
            PlayerEvent::RendererReady { episode } => {
                if let Some(handle) = self.registry.handle_mut(episode) {
                    handle.on_renderer_ready();
                }
                if let Some(view) = self.views.get_mut(&episode) {
                    view.loading = false;
                }
                tracing::debug!("Waveform ready for episode {}", episode);
            }
            PlayerEvent::RendererError { episode, message } => {
                tracing::warn!("Waveform renderer failed for episode {}: {}", episode, message);
                self.registry
                    .promote_to_bars(episode, &self.settings.visualization.analyser);
                if let Some(view) = self.views.get_mut(&episode) {
                    view.loading = false;
                }
            }
        }
    }

    fn on_playback_started(&mut self, ticket: PlayTicket) {
        if self.registry.session().is_live_ticket(ticket) {
            self.registry.play_handle(ticket.episode);
            tracing::debug!("Playback started for episode {}", ticket.episode);
            return;
        }

        tracing::debug!(
            "Ignoring stale playback start for episode {} (generation {})",
            ticket.episode,
            ticket.generation
        );
        if !self.registry.session().is_playing(ticket.episode) {
            if let Some(media) = self.registry.media_mut(ticket.episode) {
                media.pause();
            }
        }
    }

    fn on_playback_failed(&mut self, ticket: PlayTicket, reason: &str) {
        if !self.registry.session().is_live_ticket(ticket) {
            tracing::debug!(
                "Ignoring stale playback failure for episode {}: {}",
                ticket.episode,
                reason
            );
            return;
        }

        tracing::error!("Error playing audio for episode {}: {}", ticket.episode, reason);
        self.registry.deactivate();
        if let Some(handle) = self.registry.handle_mut(ticket.episode) {
            handle.pause();
        }
        if let Some(view) = self.views.get_mut(&ticket.episode) {
            view.show_paused();
            view.play_error = Some(PLAY_FAILED_MESSAGE.to_string());
        }
        self.now_playing.hide();
    }

    fn on_ended(&mut self, episode: EpisodeId) {
        tracing::info!("Episode {} finished", episode);
        if let Some(view) = self.views.get_mut(&episode) {
            view.show_paused();
            view.progress = 0.0;
            view.current_label = format_time(0.0);
        }
        if let Some(handle) = self.registry.handle_mut(episode) {
            handle.reset();
        }
        if self.registry.current() == Some(episode) {
            self.registry.deactivate();
            self.now_playing.hide();
        }
    }

    fn on_media_error(&mut self, episode: EpisodeId, message: &str) {
        tracing::error!("Audio error for episode {}: {}", episode, message);
        let was_playing = self.registry.session().is_playing(episode);
        if let Some(handle) = self.registry.handle_mut(episode) {
            if was_playing {
                handle.pause();
            }
            handle.show_error();
        }
        if was_playing {
            self.registry.deactivate();
            self.now_playing.hide();
        }
        if let Some(view) = self.views.get_mut(&episode) {
            view.glyph = PlayGlyph::Error;
            view.is_playing = false;
            view.errored = true;
            view.disabled = true;
        }
    }

    /// Time update for the current episode plus one animation step for
    /// every visualization with a pending frame.
    pub fn tick(&mut self, now: Instant) {
        if let Some(id) = self.registry.current() {
            let playing = self.registry.session().playing;
            let position = match self.registry.media(id) {
                Some(media) if playing => Some(media.position()),
                _ => None,
            };
            if let Some(position) = position {
                let percent = (position.progress() * 100.0) as f32;
                let label = format_time(position.current_time);

                if let Some(handle) = self.registry.handle_mut(id) {
                    handle.update_progress(percent);
                }
                if let Some(view) = self.views.get_mut(&id) {
                    view.progress = percent;
                    view.current_label = label.clone();
                }
                if self.now_playing.shows(id) && self.now_playing.visible {
                    self.now_playing.current_label = label;
                    if position.duration.is_some_and(|d| d.is_finite() && d > 0.0) {
                        self.now_playing.progress = percent;
                    }
                }
            }
        }
        self.registry.run_frames(now);
    }

    /// Collects diagnostics for an episode, reading its analyser once.
    pub fn diagnostics(&mut self, id: EpisodeId) -> Option<EpisodeDiagnostics> {
        let media = self.registry.media(id)?.diagnostics();
        let analyzer = self.registry.analyzers().get(id).cloned();
        let handle = self.registry.handle_mut(id)?;
        let visualization = handle.kind();
        let (visualizer, probe) = match handle.as_visualizer_mut() {
            Some(visualizer) => (Some(visualizer.state()), visualizer.probe()),
            None => (None, None),
        };
        Some(EpisodeDiagnostics {
            episode: id,
            media,
            visualization,
            visualizer,
            analyzer,
            probe,
        })
    }

    /// Destroys every visualization, clears analyzer records and pauses all media.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.registry.teardown();
        self.now_playing.hide();
        for view in self.views.values_mut() {
            view.show_paused();
        }
    }
}

impl<B: PlayerBackend> Drop for PlayerController<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
