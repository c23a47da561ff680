//! Process execution: strict/lenient commands and scripted negotiation.

pub mod command;
pub mod mock;
pub mod negotiate;
pub mod platform;

pub use command::{
    CheckMode, CommandInvocation, CommandOutput, CommandRunner, ProcessExecutor, SystemExecutor,
};
pub use mock::{command_key, ScriptedExecutor};
pub use negotiate::{negotiate_process, NegotiationOutcome, NegotiationPolicy};
pub use platform::{is_elevated, script_name, DURABLE_PATH_VAR, PATH_SEPARATOR};
