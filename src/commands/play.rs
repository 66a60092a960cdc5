//! Interactive episode player.
//!
//! Loads the feed, registers every episode with the player and runs the
//! terminal UI until the user quits.

use std::sync::mpsc;
use std::sync::Arc;

use crate::config::PodwaveConfig;
use crate::feed::fetch_feed;
use crate::native::NativeBackend;
use crate::player::PlayerController;
use crate::ui::{ErrorScreen, PodwaveTui, FEED_ERROR_MESSAGE};

/// Plays episodes from `feed`, or from the configured feed when `None`.
///
/// # Errors
/// - If the configuration is invalid
/// - If the error screen for an unloadable feed cannot be shown
/// - If the terminal UI fails
pub async fn handle_play(feed: Option<String>) -> Result<(), anyhow::Error> {
    tracing::info!("=== podwave player started ===");

    let config = match PodwaveConfig::load_or_default() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            let details = format!(
                "Configuration Error: {err}. Please check your ~/.config/podwave/podwave.toml file and try again."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error("podwave could not start.", Some(&details))?;
            error_screen.cleanup()?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    let source = feed.unwrap_or_else(|| config.feed.url.clone());
    let episodes = match fetch_feed(&source).await {
        Ok(episodes) => episodes,
        Err(err) => {
            tracing::error!("Error loading podcast data from {}: {}", source, err);
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(FEED_ERROR_MESSAGE, Some(&err.to_string()))?;
            error_screen.cleanup()?;
            return Ok(());
        }
    };

    tracing::info!(
        "Player configured: {} episodes, visualization={:?}, fft_size={}",
        episodes.len(),
        config.player.visualization,
        config.analyser.fft_size
    );

    let (events_tx, events_rx) = mpsc::channel();
    let backend = NativeBackend::new(events_tx, tokio::runtime::Handle::current());
    let mut controller = PlayerController::new(backend, config.player_settings());
    for episode in episodes {
        controller.add_episode(Arc::new(episode));
    }

    let mut tui = PodwaveTui::new(config.ui.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    // The UI loop blocks on terminal input; keep the runtime's workers free
    // for downloads and decoding meanwhile.
    let result = tokio::task::block_in_place(|| tui.run(&mut controller, &events_rx));

    controller.teardown();
    tui.cleanup()?;
    tracing::info!("=== podwave player stopped ===");
    result
}
