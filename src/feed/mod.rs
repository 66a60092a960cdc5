//! Episode feed loading.
//!
//! Fetches the JSON episode feed from a URL or a local file and parses it into
//! [`Episode`] records.

pub mod episode;
pub mod fetch;

pub use episode::{featured_episode, parse_feed, Episode, EpisodeId};
pub use fetch::{fetch_feed, probe_cors_headers, CorsProbe};

use thiserror::Error;

/// Failure to load or understand the episode feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to fetch data: {status} {reason}")]
    Http { status: u16, reason: String },
    #[error("Failed to fetch data: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to read feed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse feed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid data format: missing episodes")]
    MissingEpisodes,
    #[error("Invalid episode id: '{0}'")]
    InvalidId(String),
}
