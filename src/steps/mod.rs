//! Step guards and sequencing.
//!
//! - [`Precondition`] - side-effect-free check that a step is already done
//! - [`ProvisioningStep`] - identifier, description, guard and action
//! - [`Sequencer`] - runs steps in order and aborts on the first fatal error
//! - [`RunSummary`] - per-step outcomes and next actions

pub mod guard;
pub mod sequencer;

pub use guard::{parse_version, CheckResult, Precondition, Probe, Version};
pub use sequencer::{
    ProvisioningStep, RunState, RunSummary, Sequencer, StepContext, StepOutcome, StepStatus,
};
