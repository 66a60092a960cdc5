//! Config version checks.
//!
//! The first line of the config file records which podwave version wrote it.

use anyhow::anyhow;
use regex::Regex;
use std::fmt;
use std::path::Path;

/// Current application version from Cargo.toml
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// major.minor.patch
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
struct SemanticVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl SemanticVersion {
    fn parse(version_str: &str) -> anyhow::Result<Self> {
        let mut parts = version_str.trim().split('.');
        let mut next = |name: &str| -> anyhow::Result<u32> {
            let part = parts
                .next()
                .ok_or_else(|| anyhow!("Invalid version format: '{version_str}'. Expected 'major.minor.patch'"))?;
            part.parse::<u32>()
                .map_err(|_| anyhow!("Invalid {name} version: '{part}'"))
        };
        let version = Self {
            major: next("major")?,
            minor: next("minor")?,
            patch: next("patch")?,
        };
        if parts.next().is_some() {
            return Err(anyhow!(
                "Invalid version format: '{version_str}'. Expected 'major.minor.patch'"
            ));
        }
        Ok(version)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// What [`ensure_config`](super::ensure_config) has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupNeeded {
    UpToDate,
    /// No config file yet
    Missing,
    /// Written by an older version, or has no version line
    Outdated(String),
}

pub fn version_line(version: &str) -> String {
    format!(r#"config_version = "{version}""#)
}

/// Reads the version from the first line, `config_version = "X.Y.Z"`.
///
/// A commented-out or later version line does not count.
fn read_config_version(content: &str) -> anyhow::Result<Option<String>> {
    let Some(first_line) = content.lines().next() else {
        return Ok(None);
    };
    let regex = Regex::new(r#"^\s*config_version\s*=\s*"([^"]+)""#)?;
    Ok(regex.captures(first_line).map(|caps| caps[1].to_string()))
}

/// Compares the config file's version with this binary's.
///
/// A config newer than the binary is left alone with a warning.
///
/// # Errors
/// - If the file exists but cannot be read
/// - If either version string is malformed
pub fn check_setup_needed(config_path: &Path) -> anyhow::Result<SetupNeeded> {
    if !config_path.exists() {
        return Ok(SetupNeeded::Missing);
    }

    let content = std::fs::read_to_string(config_path)?;
    let Some(config_version) = read_config_version(&content)? else {
        return Ok(SetupNeeded::Outdated("unknown (unversioned config)".to_string()));
    };

    let config_parsed = SemanticVersion::parse(&config_version)?;
    let current_parsed = SemanticVersion::parse(CURRENT_VERSION)?;

    if config_parsed < current_parsed {
        return Ok(SetupNeeded::Outdated(config_parsed.to_string()));
    }
    if config_parsed > current_parsed {
        tracing::warn!(
            "Config version {} is newer than app version {}",
            config_parsed,
            CURRENT_VERSION
        );
    }
    Ok(SetupNeeded::UpToDate)
}
