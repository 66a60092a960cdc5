//! Cross-origin header probe for an episode's audio.
//!
//! Issues the same HEAD request the player's diagnostics use and prints the
//! headers that decide whether the audio can feed a frequency analyzer.

use crate::config::PodwaveConfig;
use crate::feed::{fetch_feed, probe_cors_headers, CorsProbe, EpisodeId};

/// Probes the audio URL of episode `id`.
///
/// # Errors
/// - If `id` is not a valid episode identifier
/// - If the feed cannot be loaded or has no such episode
/// - If the HEAD request fails
pub async fn handle_probe(feed: Option<String>, id: &str) -> Result<(), anyhow::Error> {
    let episode_id = EpisodeId::parse(id)?;
    let config = PodwaveConfig::load_or_default()?;
    let source = feed.unwrap_or(config.feed.url);

    let episodes = fetch_feed(&source).await?;
    let episode = episodes
        .iter()
        .find(|e| e.id == episode_id)
        .ok_or_else(|| anyhow::anyhow!("No episode with id {episode_id} in {source}"))?;

    tracing::info!("Probing CORS headers for episode {}: {}", episode.id, episode.audio_url);
    let probe = probe_cors_headers(&episode.audio_url).await?;

    println!("{}", episode.title);
    println!("{}", episode.audio_url);
    println!();
    for line in report_lines(&probe) {
        println!("{line}");
    }
    Ok(())
}

fn report_lines(probe: &CorsProbe) -> Vec<String> {
    let mut lines = vec![format!("HEAD {} {}", probe.status, probe.reason).trim_end().to_string()];
    for (name, value) in &probe.cors {
        lines.push(match value {
            Some(value) => format!("  {name}: {value}"),
            None => format!("  {name}: (missing)"),
        });
    }
    lines.push(String::new());
    lines.push(if probe.allows_cross_origin() {
        "Cross-origin reads allowed: live spectrum available".to_string()
    } else {
        "Cross-origin reads not allowed: waveform fallback expected".to_string()
    });
    lines
}
