//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::config::get_config_path;
use crate::logging;
use crate::setup;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// A terminal podcast player with live frequency visualization
#[derive(Parser)]
#[command(name = "podwave")]
#[command(version)]
#[command(about = "A terminal podcast player with live frequency visualization")]
#[command(long_about = "A terminal podcast player with live frequency visualization.\n\nEpisodes whose audio can be analyzed show animated frequency bars while\nplaying; the rest fall back to a static waveform of the whole episode.\n\nDEFAULT COMMAND:\n    If no command is specified, 'play' is used by default.\n\nEXAMPLES:\n    # Play the configured feed\n    $ podwave\n\n    # Play another feed\n    $ podwave --feed https://example.com/data.json\n\n    # List episodes\n    $ podwave episodes\n\n    # Check whether an episode's audio allows cross-origin analysis\n    $ podwave probe 7")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/podwave/podwave.toml\n    Logs:               ~/.local/state/podwave/podwave.log.*"
)]
struct Cli {
    /// Feed location (URL or local JSON file), overriding the config
    #[arg(short, long, value_name = "URL|FILE", global = true)]
    feed: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play episodes with live visualization (default)
    ///
    /// Enter/Space plays or pauses the selected episode, ←/→ seek,
    /// +/- change volume, s cycles speed, q quits.
    #[command(visible_alias = "p")]
    Play,

    /// List the episodes in the feed
    #[command(visible_alias = "ls")]
    Episodes,

    /// Check an episode's audio URL for cross-origin headers
    ///
    /// Issues a HEAD request and reports whether a live frequency
    /// visualization is possible for the episode.
    Probe {
        /// Episode id
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   podwave completions bash > podwave.bash
    ///   podwave completions zsh > _podwave
    ///   podwave completions fish > podwave.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If the config file cannot be written
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging or config setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "podwave", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;
    setup::ensure_config(&get_config_path()?)?;

    match cli.command {
        None | Some(Commands::Play) => commands::handle_play(cli.feed).await?,
        Some(Commands::Episodes) => commands::handle_episodes(cli.feed).await?,
        Some(Commands::Probe { id }) => commands::handle_probe(cli.feed, &id).await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::Logs) => {
            tracing::debug!("Command already handled before setup");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_takes_feed() {
        let cli = Cli::try_parse_from(["podwave", "--feed", "feed.json"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.feed.as_deref(), Some("feed.json"));
    }

    #[test]
    fn test_probe_requires_id() {
        assert!(Cli::try_parse_from(["podwave", "probe"]).is_err());
        let cli = Cli::try_parse_from(["podwave", "probe", "7", "--feed", "x.json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Probe { ref id }) if id == "7"));
        assert_eq!(cli.feed.as_deref(), Some("x.json"));
    }
}
