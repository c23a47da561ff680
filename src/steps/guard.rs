//! Idempotency guards.
//!
//! A [`Precondition`] says whether a step's effect is already in place.
//! Evaluation never has side effects and is repeated on every run; nothing
//! is cached between runs.

use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::environment::{merge_path_entries, DurableStore, EnvironmentContext};
use crate::error::{ProvisionError, Result};
use crate::shell::{CommandInvocation, CommandRunner, DURABLE_PATH_VAR, PATH_SEPARATOR};

static VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+)(?:\.(\d+))?(?:\.(\d+))?").unwrap());

/// A check that holds once a step has done its work.
#[derive(Debug, Clone)]
pub enum Precondition {
    /// The path exists (file or directory).
    FileExists(PathBuf),

    /// A listing command prints `needle` on some line.
    ListingContains {
        invocation: CommandInvocation,
        needle: String,
    },

    /// A version query reports at least `minimum_major`.
    MinVersion {
        invocation: CommandInvocation,
        minimum_major: u32,
    },

    /// The durable store holds exactly this value.
    DurableValue { name: String, value: String },

    /// Every entry is on the durable search path.
    DurablePathContains(Vec<String>),

    /// Every nested condition holds.
    All(Vec<Precondition>),

    /// Never holds, so the step always runs.
    Never { reason: String },
}

/// Result of evaluating a precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Whether the step's effect is already in place.
    pub complete: bool,

    /// What was checked, shown in skip messages.
    pub description: String,

    /// Why the check did not hold.
    pub details: Option<String>,
}

impl CheckResult {
    pub fn complete(description: impl Into<String>) -> Self {
        Self {
            complete: true,
            description: description.into(),
            details: None,
        }
    }

    pub fn incomplete(description: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            complete: false,
            description: description.into(),
            details: Some(details.into()),
        }
    }
}

/// What a guard may consult.
pub struct Probe<'a> {
    pub runner: &'a CommandRunner,
    pub store: &'a dyn DurableStore,
    pub env: &'a EnvironmentContext,
}

impl Precondition {
    /// Evaluate against the current system state.
    ///
    /// Returns [`ProvisionError::PreconditionIndeterminate`] when the answer
    /// cannot be known; callers treat that as "not done".
    pub fn evaluate(&self, probe: &Probe<'_>) -> Result<CheckResult> {
        match self {
            Precondition::FileExists(path) => Ok(check_file_exists(path)),
            Precondition::ListingContains { invocation, needle } => {
                check_listing(probe, invocation, needle)
            }
            Precondition::MinVersion {
                invocation,
                minimum_major,
            } => check_min_version(probe, invocation, *minimum_major),
            Precondition::DurableValue { name, value } => check_durable_value(probe, name, value),
            Precondition::DurablePathContains(entries) => check_durable_path(probe, entries),
            Precondition::All(conditions) => check_all(probe, conditions),
            Precondition::Never { reason } => {
                Ok(CheckResult::incomplete("Not checkable", reason.clone()))
            }
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::FileExists(path) => write!(f, "{} exists", path.display()),
            Precondition::ListingContains { invocation, needle } => {
                write!(f, "'{}' lists {}", invocation.display(), needle)
            }
            Precondition::MinVersion {
                invocation,
                minimum_major,
            } => write!(f, "'{}' reports >= {}", invocation.display(), minimum_major),
            Precondition::DurableValue { name, value } => write!(f, "{}={}", name, value),
            Precondition::DurablePathContains(entries) => {
                write!(f, "{} contains {}", DURABLE_PATH_VAR, entries.join(", "))
            }
            Precondition::All(conditions) => write!(f, "{} checks", conditions.len()),
            Precondition::Never { reason } => write!(f, "never ({})", reason),
        }
    }
}

fn check_file_exists(path: &std::path::Path) -> CheckResult {
    if path.exists() {
        CheckResult::complete(format!("Found {}", path.display()))
    } else {
        CheckResult::incomplete(
            format!("Missing {}", path.display()),
            format!("Expected at: {}", path.display()),
        )
    }
}

fn with_overlay(invocation: &CommandInvocation, env: &EnvironmentContext) -> CommandInvocation {
    let mut merged = env.overlay();
    merged.extend(invocation.env.clone());
    let mut invocation = invocation.clone().lenient();
    invocation.env = merged;
    invocation
}

fn check_listing(
    probe: &Probe<'_>,
    invocation: &CommandInvocation,
    needle: &str,
) -> Result<CheckResult> {
    let indeterminate = |message: String| ProvisionError::PreconditionIndeterminate {
        check: invocation.display(),
        message,
    };

    let output = probe
        .runner
        .run(&with_overlay(invocation, probe.env))
        .map_err(|e| indeterminate(e.to_string()))?;
    if !output.success() {
        return Err(indeterminate(format!(
            "listing exited with code {:?}",
            output.exit_code
        )));
    }

    let found = output
        .stdout
        .lines()
        .any(|line| line.split_whitespace().any(|word| word == needle));
    if found {
        Ok(CheckResult::complete(format!("{} already exists", needle)))
    } else {
        Ok(CheckResult::incomplete(
            format!("{} not found", needle),
            format!("not listed by {}", invocation.display()),
        ))
    }
}

fn check_min_version(
    probe: &Probe<'_>,
    invocation: &CommandInvocation,
    minimum_major: u32,
) -> Result<CheckResult> {
    let output = match probe.runner.run(&with_overlay(invocation, probe.env)) {
        Ok(output) => output,
        Err(ProvisionError::ExternalToolMissing { tool, .. }) => {
            return Ok(CheckResult::incomplete(
                format!("{} not installed", tool),
                "not found on the search path",
            ));
        }
        Err(e) => return Err(e),
    };

    if !output.success() {
        return Ok(CheckResult::incomplete(
            format!("{} unusable", invocation.program),
            format!("version query exited with code {:?}", output.exit_code),
        ));
    }

    let Some(version) = parse_version(&output.stdout).or_else(|| parse_version(&output.stderr))
    else {
        return Ok(CheckResult::incomplete(
            format!("{} version unknown", invocation.program),
            "no version number in output",
        ));
    };

    if version.major >= minimum_major {
        Ok(CheckResult::complete(format!(
            "{} {}",
            invocation.program, version
        )))
    } else {
        Ok(CheckResult::incomplete(
            format!("{} {}", invocation.program, version),
            format!("need major version >= {}", minimum_major),
        ))
    }
}

fn check_durable_value(probe: &Probe<'_>, name: &str, value: &str) -> Result<CheckResult> {
    let current = probe
        .store
        .read(name)
        .map_err(|e| ProvisionError::PreconditionIndeterminate {
            check: name.to_string(),
            message: e.to_string(),
        })?;

    match current {
        Some(current) if current == value => Ok(CheckResult::complete(format!("{} set", name))),
        Some(current) => Ok(CheckResult::incomplete(
            format!("{} differs", name),
            format!("currently {}", current),
        )),
        None => Ok(CheckResult::incomplete(
            format!("{} unset", name),
            format!("not in {}", probe.store.describe()),
        )),
    }
}

fn check_durable_path(probe: &Probe<'_>, entries: &[String]) -> Result<CheckResult> {
    let current = probe
        .store
        .read(DURABLE_PATH_VAR)
        .map_err(|e| ProvisionError::PreconditionIndeterminate {
            check: DURABLE_PATH_VAR.to_string(),
            message: e.to_string(),
        })?
        .unwrap_or_default();

    let (_, missing) = merge_path_entries(&current, entries, PATH_SEPARATOR);
    if missing.is_empty() {
        Ok(CheckResult::complete(format!(
            "{} entries present",
            DURABLE_PATH_VAR
        )))
    } else {
        Ok(CheckResult::incomplete(
            format!("{} incomplete", DURABLE_PATH_VAR),
            format!("missing {}", missing.join(", ")),
        ))
    }
}

fn check_all(probe: &Probe<'_>, conditions: &[Precondition]) -> Result<CheckResult> {
    for condition in conditions {
        let result = condition.evaluate(probe)?;
        if !result.complete {
            return Ok(result);
        }
    }
    Ok(CheckResult::complete(format!(
        "{} checks passed",
        conditions.len()
    )))
}

/// A parsed `major[.minor[.patch]]` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parse the first version-like token in `text`.
///
/// ```
/// use devprov::steps::parse_version;
///
/// let v = parse_version("v20.11.1\n").unwrap();
/// assert_eq!((v.major, v.minor, v.patch), (20, 11, 1));
/// ```
pub fn parse_version(text: &str) -> Option<Version> {
    let caps = VERSION_REGEX.captures(text)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };
    let major = caps.get(1)?.as_str().parse().ok()?;
    Some(Version {
        major,
        minor: part(2),
        patch: part(3),
    })
}
