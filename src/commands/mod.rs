//! Command handlers for podwave.
//!
//! # Commands
//! - `play`: Interactive player with live visualization (default)
//! - `episodes`: Print the feed's episodes
//! - `probe`: Check an episode's audio for cross-origin headers
//! - `config`: Open configuration file in user's preferred editor
//! - `logs`: Display recent log entries

pub mod config;
pub mod episodes;
pub mod logs;
pub mod play;
pub mod probe;

pub use config::handle_config;
pub use episodes::handle_episodes;
pub use logs::handle_logs;
pub use play::handle_play;
pub use probe::handle_probe;
