//! Completions and notifications delivered to the player controller.

use crate::feed::EpisodeId;

use super::media::PlayTicket;

/// Something that finished or changed outside the UI thread.
///
/// Platform backends send these over a channel; the UI loop drains the
/// channel between frames and hands each one to
/// [`PlayerController::handle_event`](super::PlayerController::handle_event).
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A play request started audible playback
    PlaybackStarted { ticket: PlayTicket },
    /// A play request was rejected
    PlaybackFailed { ticket: PlayTicket, reason: String },
    /// The media element learned its duration
    MetadataLoaded { episode: EpisodeId, duration: f64 },
    /// Playback reached the end of the audio
    Ended { episode: EpisodeId },
    /// The audio could not be loaded or decoded
    MediaError { episode: EpisodeId, message: String },
    /// A suspended analysis context finished resuming
    ContextResumed {
        episode: EpisodeId,
        result: Result<(), String>,
    },
    /// The waveform renderer finished drawing
    RendererReady { episode: EpisodeId },
    /// The waveform renderer failed to load or decode
    RendererError { episode: EpisodeId, message: String },
}

impl PlayerEvent {
    /// The episode this event concerns.
    pub fn episode(&self) -> EpisodeId {
        match self {
            Self::PlaybackStarted { ticket } | Self::PlaybackFailed { ticket, .. } => ticket.episode,
            Self::MetadataLoaded { episode, .. }
            | Self::Ended { episode }
            | Self::MediaError { episode, .. }
            | Self::ContextResumed { episode, .. }
            | Self::RendererReady { episode }
            | Self::RendererError { episode, .. } => *episode,
        }
    }
}
