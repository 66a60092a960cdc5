//! Episode data model and feed document parsing.
//!
//! A feed is a JSON document with a top-level `episodes` array. Episodes are
//! immutable once parsed and are shared by reference (`Arc`) with the player,
//! which addresses them only through their normalized [`EpisodeId`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::FeedError;

/// Normalized integer identifier of an episode.
///
/// Feeds carry ids either as JSON numbers or as strings; both normalize to the
/// leading integer the way `parseInt` reads them, so `"7"`, `" 7"`, `"7-final"`
/// and `7` all name the same episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EpisodeId(u32);

impl EpisodeId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Parses an identifier from text, reading its leading digits.
    ///
    /// # Errors
    /// - If the text does not start with a digit (after whitespace and an optional `+`)
    /// - If the number does not fit in 32 bits
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        let trimmed = raw.trim_start();
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let digits: String = unsigned.chars().take_while(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return Err(FeedError::InvalidId(raw.to_string()));
        }

        digits
            .parse::<u32>()
            .map(Self)
            .map_err(|_| FeedError::InvalidId(raw.to_string()))
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for EpisodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Integer(u64),
            Float(f64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Integer(value) => u32::try_from(value)
                .map(EpisodeId)
                .map_err(|_| serde::de::Error::custom(format!("episode id {value} is out of range"))),
            RawId::Float(value) if value.is_finite() && value >= 0.0 && value < u32::MAX as f64 => {
                Ok(EpisodeId(value.trunc() as u32))
            }
            RawId::Float(value) => Err(serde::de::Error::custom(format!(
                "episode id {value} is not a valid identifier"
            ))),
            RawId::Text(text) => EpisodeId::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// A single podcast episode as listed by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: EpisodeId,
    pub title: String,
    pub description: String,
    pub image: String,
    pub audio_url: String,
    /// Display duration exactly as the feed states it (e.g. `45:12`)
    pub duration: String,
    /// Publication date, ISO formatted
    pub date: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub popular: bool,
}

#[derive(Debug, Deserialize)]
struct FeedDocument {
    episodes: Option<Vec<Episode>>,
}

/// Parses a feed document.
///
/// Episodes whose id repeats an earlier entry are dropped with a warning, since
/// the player registry is keyed by id.
///
/// # Errors
/// - If the document is not valid JSON or an episode is malformed
/// - If the document has no `episodes` field
pub fn parse_feed(json: &str) -> Result<Vec<Episode>, FeedError> {
    let document: FeedDocument = serde_json::from_str(json)?;
    let episodes = document.episodes.ok_or(FeedError::MissingEpisodes)?;

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(episodes.len());
    for episode in episodes {
        if seen.insert(episode.id) {
            unique.push(episode);
        } else {
            tracing::warn!(
                "Skipping episode '{}': id {} is already used",
                episode.title,
                episode.id
            );
        }
    }

    tracing::info!("Feed parsed: {} episodes", unique.len());
    Ok(unique)
}

/// Returns the episode to feature: the first one flagged `featured`, otherwise the first one.
pub fn featured_episode(episodes: &[Episode]) -> Option<&Episode> {
    episodes
        .iter()
        .find(|episode| episode.featured)
        .or_else(|| episodes.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{
        "episodes": [
            {
                "id": 1,
                "title": "Pilot",
                "description": "Where it all starts",
                "image": "img/1.jpg",
                "audioUrl": "https://cdn.example.com/1.mp3",
                "duration": "32:10",
                "date": "2024-01-15"
            },
            {
                "id": "2",
                "title": "Deep Dive",
                "description": "Going further",
                "image": "img/2.jpg",
                "audioUrl": "https://cdn.example.com/2.mp3",
                "duration": "48:02",
                "date": "2024-02-01",
                "featured": true,
                "popular": true
            }
        ]
    }"#;

    #[test]
    fn test_parse_feed() {
        let episodes = parse_feed(FEED).unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, EpisodeId::new(1));
        assert_eq!(episodes[1].id, EpisodeId::new(2));
        assert_eq!(episodes[0].audio_url, "https://cdn.example.com/1.mp3");
        assert!(!episodes[0].featured);
        assert!(episodes[1].popular);
    }

    #[test]
    fn test_missing_episodes_field() {
        let err = parse_feed(r#"{"podcast": "nothing here"}"#).unwrap_err();
        assert!(matches!(err, FeedError::MissingEpisodes));
        assert_eq!(err.to_string(), "Invalid data format: missing episodes");
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse_feed("{not json"), Err(FeedError::Parse(_))));
    }

    #[test]
    fn test_episode_id_normalization() {
        assert_eq!(EpisodeId::parse("42").unwrap(), EpisodeId::new(42));
        assert_eq!(EpisodeId::parse("  42").unwrap(), EpisodeId::new(42));
        assert_eq!(EpisodeId::parse("42-final").unwrap(), EpisodeId::new(42));
        assert!(EpisodeId::parse("episode-42").is_err());
        assert!(EpisodeId::parse("").is_err());
        assert!(EpisodeId::parse("99999999999").is_err());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let json = r#"{"episodes": [
            {"id": 3, "title": "A", "description": "", "image": "", "audioUrl": "a.mp3", "duration": "1:00", "date": "2024-01-01"},
            {"id": "3", "title": "B", "description": "", "image": "", "audioUrl": "b.mp3", "duration": "1:00", "date": "2024-01-02"}
        ]}"#;
        let episodes = parse_feed(json).unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].title, "A");
    }

    #[test]
    fn test_featured_episode() {
        let episodes = parse_feed(FEED).unwrap();
        assert_eq!(featured_episode(&episodes).unwrap().title, "Deep Dive");
        assert_eq!(featured_episode(&episodes[..1]).unwrap().title, "Pilot");
        assert!(featured_episode(&[]).is_none());
    }
}
