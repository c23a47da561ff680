//! Command-line interface.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`run`] - Wires the real runner, store and downloader into a run

pub mod args;
pub mod run;

pub use args::Cli;
pub use run::{durable_store, execute};
