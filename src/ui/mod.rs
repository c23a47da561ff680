//! Console presentation: styles and transfer progress.

pub mod progress;
pub mod theme;

pub use progress::{format_bytes, format_duration, TransferProgress};
pub use theme::{should_use_colors, Theme};
