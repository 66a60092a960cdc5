//! Terminal user interface.

pub mod error;
pub mod player;

pub use error::{ErrorScreen, FEED_ERROR_MESSAGE};
pub use player::PodwaveTui;
