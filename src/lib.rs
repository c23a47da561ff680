//! devprov - idempotent provisioning of a React Native development machine.
//!
//! One invocation brings a host from nothing to a working Node.js, JDK,
//! Android SDK, emulator image and Expo application scaffold. Every step is
//! guarded by a cheap check, so running again only repairs what is missing.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and run wiring
//! - [`config`] - Configuration defaults, overrides and filesystem layout
//! - [`environment`] - Process-local and durable environment variables
//! - [`error`] - Error types and result aliases
//! - [`fetch`] - Archive download with ranked fallback locations
//! - [`provision`] - The concrete provisioning steps
//! - [`runlog`] - Append-only run log
//! - [`shell`] - Process execution and interactive negotiation
//! - [`steps`] - Step guards and the sequencer
//! - [`ui`] - Progress bars and terminal styling
//!
//! # Example
//!
//! ```
//! use devprov::environment::merge_path_entries;
//!
//! let (value, added) = merge_path_entries("X;Y", &["A", "y"], ';');
//! assert_eq!(value, "X;Y;A");
//! assert_eq!(added, vec!["A"]);
//! ```

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod provision;
pub mod runlog;
pub mod shell;
pub mod steps;
pub mod ui;

pub use error::{ProvisionError, Result};
