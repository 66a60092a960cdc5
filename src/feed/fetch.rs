//! Feed retrieval over HTTP or from disk, plus the cross-origin header probe.

use std::path::Path;

use super::{parse_feed, Episode, FeedError};

/// Cross-origin headers whose absence explains all-zero frequency data.
pub const CORS_HEADERS: [&str; 4] = [
    "Access-Control-Allow-Origin",
    "Access-Control-Allow-Methods",
    "Access-Control-Allow-Headers",
    "Access-Control-Expose-Headers",
];

/// Returns whether a source string names an HTTP(S) resource rather than a file.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Loads and parses the episode feed from `source`.
///
/// `source` is either an `http(s)://` URL or a path to a local JSON file.
/// There is no retry; the caller shows the error to the user.
///
/// # Errors
/// - If the request fails or returns a non-success status
/// - If the file cannot be read
/// - If the document is malformed or has no `episodes`
pub async fn fetch_feed(source: &str) -> Result<Vec<Episode>, FeedError> {
    tracing::info!("Fetching podcast data from {}", source);

    let body = if is_remote(source) {
        let response = reqwest::get(source).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        response.text().await?
    } else {
        tokio::fs::read_to_string(Path::new(source)).await?
    };

    tracing::debug!("Podcast data loaded: {} bytes", body.len());
    let mut episodes = parse_feed(&body)?;
    for episode in &mut episodes {
        episode.audio_url = resolve_audio_url(source, &episode.audio_url);
    }
    Ok(episodes)
}

/// Resolves an episode's audio location against the feed it came from.
///
/// A remote feed resolves its entries the way a browser resolves links. A
/// local feed keeps absolute URLs and paths and joins relative paths to its
/// own directory.
pub fn resolve_audio_url(feed_source: &str, audio_url: &str) -> String {
    if is_remote(feed_source) {
        return reqwest::Url::parse(feed_source)
            .and_then(|base| base.join(audio_url))
            .map(String::from)
            .unwrap_or_else(|_| audio_url.to_string());
    }
    if is_remote(audio_url) || Path::new(audio_url).is_absolute() {
        return audio_url.to_string();
    }
    match Path::new(feed_source).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(audio_url).to_string_lossy().to_string(),
        _ => audio_url.to_string(),
    }
}

/// Result of a HEAD request against an episode's audio URL.
#[derive(Debug, Clone)]
pub struct CorsProbe {
    pub status: u16,
    pub reason: String,
    /// Every response header, in the order the server sent them
    pub headers: Vec<(String, String)>,
    /// Each of [`CORS_HEADERS`] with its value when present
    pub cors: Vec<(&'static str, Option<String>)>,
}

impl CorsProbe {
    /// Returns whether the server allows cross-origin reads of the audio.
    pub fn allows_cross_origin(&self) -> bool {
        self.cors
            .iter()
            .any(|(name, value)| *name == CORS_HEADERS[0] && value.is_some())
    }
}

/// Issues a HEAD request for `url` and reports which cross-origin headers it carries.
///
/// # Errors
/// - If the request cannot be sent
pub async fn probe_cors_headers(url: &str) -> Result<CorsProbe, FeedError> {
    let client = reqwest::Client::new();
    let response = client.head(url).send().await?;
    let status = response.status();

    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect();

    let cors = CORS_HEADERS
        .iter()
        .map(|&name| {
            let value = response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            (name, value)
        })
        .collect();

    tracing::debug!("HEAD {} -> {}", url, status);

    Ok(CorsProbe {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        cors,
    })
}
