//! Episode playback and audio visualization.
//!
//! [`PlayerController`] is the entry point: it owns the playback registry,
//! drives each episode's media element and visualization, and applies
//! [`PlayerEvent`]s reported by the platform backend.

pub mod analyzer;
pub mod animation;
pub mod backend;
pub mod controls;
pub mod events;
pub mod media;
pub mod registry;
pub mod visualizer;
pub mod waveform;

#[cfg(test)]
pub mod testing;

pub use analyzer::{AnalyserConfig, AnalyzerContext, AnalyzerError, ContextState, FrequencySource};
pub use backend::PlayerBackend;
pub use controls::{
    EpisodeDiagnostics, EpisodeView, NowPlayingBar, PlayGlyph, PlayerController, PlayerError,
    PlayerSettings, VolumeIcon,
};
pub use events::PlayerEvent;
pub use media::{MediaDiagnostics, MediaElement, PlayTicket, PlaybackPosition};
pub use registry::{PlaybackRegistry, PlaybackSession, PlaybackSpeed};
pub use visualizer::{Visualizer, VisualizerState, BAR_COUNT};
pub use waveform::{
    RendererError, Visualization, VisualizationKind, VisualizationMode, VisualizationSettings,
    WaveformConfig, WaveformRenderer,
};
