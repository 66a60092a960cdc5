//! First-run setup and config migration.
//!
//! Writes the embedded default configuration when none exists, and replaces
//! it (keeping a backup) when it was written by an older podwave.

pub mod version;

use anyhow::anyhow;
use std::path::Path;

use version::{check_setup_needed, SetupNeeded, CURRENT_VERSION};

/// Embedded default configuration template.
const DEFAULT_CONFIG: &str = include_str!("../../environments/podwave.toml");

/// Makes sure the config file at `config_path` exists and is current.
///
/// # Errors
/// - If the existing config has an unreadable version line
/// - If any file operation fails
pub fn ensure_config(config_path: &Path) -> anyhow::Result<()> {
    match check_setup_needed(config_path)? {
        SetupNeeded::UpToDate => {
            tracing::debug!("Config version up to date ({})", CURRENT_VERSION);
        }
        SetupNeeded::Missing => {
            tracing::info!("No config found, writing defaults to {}", config_path.display());
            write_default_config(config_path)?;
        }
        SetupNeeded::Outdated(old_version) => {
            tracing::info!(
                "Setup needed - migrating from version {} to {}",
                old_version,
                CURRENT_VERSION
            );
            let backup = config_path.with_extension("toml.bak");
            std::fs::copy(config_path, &backup)
                .map_err(|e| anyhow!("Failed to back up {}: {e}", config_path.display()))?;
            write_default_config(config_path)?;
            tracing::info!(
                "Config migrated to version {} (previous settings in {})",
                CURRENT_VERSION,
                backup.display()
            );
        }
    }
    Ok(())
}

/// Writes the template with the current version as its first line.
fn write_default_config(config_path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let full_config = format!(
        "{}\n{}",
        version::version_line(CURRENT_VERSION),
        DEFAULT_CONFIG
    );
    std::fs::write(config_path, full_config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PodwaveConfig;

    #[test]
    fn test_first_run_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podwave").join("podwave.toml");

        ensure_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&version::version_line(CURRENT_VERSION)));
        assert!(PodwaveConfig::load_from(&path).is_ok());
        assert_eq!(check_setup_needed(&path).unwrap(), SetupNeeded::UpToDate);
    }

    #[test]
    fn test_upgrade_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podwave.toml");
        std::fs::write(&path, "config_version = \"0.0.1\"\n[feed]\nurl = \"mine.json\"\n").unwrap();

        ensure_config(&path).unwrap();

        let backup = std::fs::read_to_string(dir.path().join("podwave.toml.bak")).unwrap();
        assert!(backup.contains("mine.json"));
        assert_eq!(check_setup_needed(&path).unwrap(), SetupNeeded::UpToDate);
    }

    #[test]
    fn test_current_config_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podwave.toml");
        let content = format!("{}\n[feed]\nurl = \"mine.json\"\n", version::version_line(CURRENT_VERSION));
        std::fs::write(&path, &content).unwrap();

        ensure_config(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }
}
