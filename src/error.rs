//! Error types for provisioning runs.
//!
//! This module defines [`ProvisionError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Fatal variants abort the step sequencer immediately
//! - [`ProvisionError::PreconditionIndeterminate`] and
//!   [`ProvisionError::EnvironmentPersistError`] are logged and the run
//!   continues
//! - Leaf plumbing (HTTP, unzip) uses `anyhow::Error` and is folded into
//!   [`ProvisionError::Other`]

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A required command is not available on the execution path.
    #[error("Required tool '{tool}' not found: {message}")]
    ExternalToolMissing { tool: String, message: String },

    /// Subprocess exited non-zero in strict mode.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Every ranked location for a resource failed.
    #[error("Could not acquire {resource} from any known location: {}", locations.join(", "))]
    AllCandidatesExhausted {
        resource: String,
        locations: Vec<String>,
    },

    /// An idempotency check could not be evaluated.
    #[error("Could not determine whether '{check}' is satisfied: {message}")]
    PreconditionIndeterminate { check: String, message: String },

    /// Writing to the durable environment store failed.
    #[error("Failed to persist {name}: {message}")]
    EnvironmentPersistError { name: String, message: String },

    /// A runtime is installed but older than required.
    #[error("{tool} version {found} is too old; need >= {required}")]
    RuntimeTooOld {
        tool: String,
        found: String,
        required: u32,
    },

    /// A step aborted the run.
    #[error("Step '{step}' failed after {completed} completed step(s): {source}")]
    StepFailed {
        step: String,
        index: usize,
        completed: usize,
        #[source]
        source: Box<ProvisionError>,
    },

    /// Failed to parse a configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProvisionError {
    /// Whether this error must stop the run.
    ///
    /// Indeterminate preconditions and persistence failures are best-effort.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProvisionError::PreconditionIndeterminate { .. }
                | ProvisionError::EnvironmentPersistError { .. }
        )
    }
}

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;
