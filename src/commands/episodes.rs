//! Prints the feed's episodes.

use crate::config::PodwaveConfig;
use crate::feed::{featured_episode, fetch_feed, Episode};
use crate::format::format_date;

/// Lists every episode of `feed` (or the configured feed) on stdout.
///
/// # Errors
/// - If the configuration is invalid
/// - If the feed cannot be loaded
pub async fn handle_episodes(feed: Option<String>) -> Result<(), anyhow::Error> {
    let config = PodwaveConfig::load_or_default()?;
    let source = feed.unwrap_or(config.feed.url);

    let episodes = fetch_feed(&source)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load podcast episodes: {e}"))?;

    if episodes.is_empty() {
        println!("The feed at {source} has no episodes.");
        return Ok(());
    }

    let featured = featured_episode(&episodes).map(|e| e.id);
    for episode in &episodes {
        println!("{}", episode_row(episode, featured == Some(episode.id)));
    }
    Ok(())
}

fn episode_row(episode: &Episode, featured: bool) -> String {
    let mut marks = String::new();
    if featured {
        marks.push('★');
    }
    if episode.popular {
        marks.push('↑');
    }
    format!(
        "{:>4}  {:<14}  {:>8}  {:<2} {}",
        episode.id,
        format_date(&episode.date),
        episode.duration,
        marks,
        episode.title
    )
}
