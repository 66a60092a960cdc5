//! Display recent log entries from the application.

use anyhow::anyhow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::logging::get_log_dir;

const DEFAULT_LINES: usize = 50;

/// Shows the last lines of the most recent log file.
///
/// # Errors
/// - If the log directory cannot be determined
/// - If log files cannot be read
pub fn handle_logs() -> Result<(), anyhow::Error> {
    let log_dir = get_log_dir()?;

    let Some(log_file) = find_latest_log(&log_dir)? else {
        println!("No log files found in: {}", log_dir.display());
        println!("Run 'podwave' to generate logs.");
        return Ok(());
    };

    let content = fs::read_to_string(&log_file)
        .map_err(|e| anyhow!("Failed to read log file: {e}"))?;

    if content.is_empty() {
        println!("Log file is empty: {}", log_file.display());
        return Ok(());
    }

    let (shown, total) = tail(&content, DEFAULT_LINES);
    if shown.len() < total {
        println!("Showing last {} of {} lines:", shown.len(), total);
    } else {
        println!("Showing all {total} lines:");
    }
    println!("Full log file at: {}", log_file.display());
    println!();

    for line in shown {
        println!("{line}");
    }

    Ok(())
}

/// Returns the last `count` lines of `content` and the total line count.
fn tail(content: &str, count: usize) -> (Vec<&str>, usize) {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    let start = total.saturating_sub(count);
    (lines[start..].to_vec(), total)
}

/// Most recently modified `podwave.log*` file in `log_dir`, if any.
fn find_latest_log(log_dir: &Path) -> Result<Option<PathBuf>, anyhow::Error> {
    let entries = fs::read_dir(log_dir)
        .map_err(|e| anyhow!("Failed to read log directory: {e}"))?;

    let mut latest: Option<(PathBuf, SystemTime)> = None;
    for entry in entries {
        let path = entry
            .map_err(|e| anyhow!("Failed to read directory entry: {e}"))?
            .path();

        if !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("podwave.log"))
        {
            continue;
        }

        let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) else {
            continue;
        };
        if latest.as_ref().map_or(true, |(_, seen)| modified > *seen) {
            latest = Some((path, modified));
        }
    }

    Ok(latest.map(|(path, _)| path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail() {
        let (lines, total) = tail("a\nb\nc\nd", 2);
        assert_eq!(lines, vec!["c", "d"]);
        assert_eq!(total, 4);

        let (lines, total) = tail("only", 50);
        assert_eq!(lines, vec!["only"]);
        assert_eq!(total, 1);
    }

    #[test]
    fn test_find_latest_log() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_latest_log(dir.path()).unwrap().is_none());

        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert!(find_latest_log(dir.path()).unwrap().is_none());

        let log = dir.path().join("podwave.log.2026-10-19");
        fs::write(&log, "line").unwrap();
        assert_eq!(find_latest_log(dir.path()).unwrap(), Some(log));
    }
}
