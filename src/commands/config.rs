//! Configuration file editor command.
//!
//! Opens podwave.toml in the user's preferred editor.

use std::process::Command;

use crate::config::{get_config_path, PodwaveConfig};
use crate::setup::ensure_config;

/// Opens the configuration file in an editor, writing the default template first
/// when there is no file yet.
///
/// Tries editors in this order:
/// 1. $EDITOR environment variable
/// 2. nano
/// 3. vi
///
/// # Errors
/// - If the config file cannot be created
/// - If no editor can be found or executed
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = get_config_path()?;
    ensure_config(&config_path)?;

    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    // Report mistakes now rather than on the next launch.
    if let Err(e) = PodwaveConfig::load_from(&config_path) {
        tracing::warn!("Edited config does not load: {e}");
        eprintln!("Warning: {e}");
    } else {
        tracing::info!("Config file edited successfully");
    }
    Ok(())
}

/// Picks the editor to open the config in.
///
/// A non-empty $EDITOR wins; otherwise the first of nano and vi found on PATH.
fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return Ok(editor);
        }
    }

    for editor in &["nano", "vi"] {
        if is_editor_available(editor) {
            return Ok(editor.to_string());
        }
    }

    Err(anyhow::anyhow!(
        "No editor found. Please set the $EDITOR environment variable."
    ))
}

/// Whether `which` can locate `editor` on PATH.
fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
