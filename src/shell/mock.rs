//! Scripted process executor for testing.
//!
//! `ScriptedExecutor` implements [`ProcessExecutor`] without spawning
//! anything. Responses are matched against the command key: the program's
//! file stem followed by its arguments (`"sdkmanager --licenses ..."`).
//! Every call is recorded for later assertion, and optional effects let a
//! fake tool leave files behind the way the real one would.
//!
//! # Example
//!
//! ```
//! use devprov::shell::{CommandInvocation, CommandOutput, CommandRunner, ScriptedExecutor};
//! use devprov::runlog::RunLog;
//!
//! let executor = ScriptedExecutor::new();
//! executor.respond("node -v", CommandOutput::ok("v20.11.0\n"));
//!
//! let runner = CommandRunner::new(Box::new(executor.clone()), RunLog::discard());
//! let out = runner.run(&CommandInvocation::new("node").arg("-v")).unwrap();
//!
//! assert_eq!(out.stdout.trim(), "v20.11.0");
//! assert_eq!(executor.call_keys(), vec!["node -v".to_string()]);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ProvisionError, Result};

use super::command::{CommandInvocation, CommandOutput, ProcessExecutor};
use super::negotiate::{NegotiationOutcome, NegotiationPolicy};

type Effect = Box<dyn Fn(&CommandInvocation) + Send>;

struct Rule {
    pattern: String,
    queued: VecDeque<CommandOutput>,
    fallback: Option<CommandOutput>,
}

#[derive(Default)]
struct Script {
    rules: Vec<Rule>,
    effects: Vec<(String, Effect)>,
    missing: HashSet<String>,
    locations: HashMap<String, PathBuf>,
    calls: Vec<CommandInvocation>,
    negotiations: Vec<(CommandInvocation, NegotiationPolicy)>,
}

/// Process executor that replays scripted results.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedExecutor {
    /// Create an executor where every command succeeds with no output.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Always answer commands whose key starts with `pattern`.
    ///
    /// Later rules take priority over earlier ones.
    pub fn respond(&self, pattern: &str, output: CommandOutput) {
        self.script().rules.push(Rule {
            pattern: pattern.to_string(),
            queued: VecDeque::new(),
            fallback: Some(output),
        });
    }

    /// Answer matching commands with `outputs` in order, then fall through.
    pub fn respond_sequence(&self, pattern: &str, outputs: Vec<CommandOutput>) {
        self.script().rules.push(Rule {
            pattern: pattern.to_string(),
            queued: outputs.into(),
            fallback: None,
        });
    }

    /// Run `effect` whenever a matching command executes successfully.
    pub fn on_run<F>(&self, pattern: &str, effect: F)
    where
        F: Fn(&CommandInvocation) + Send + 'static,
    {
        self.script()
            .effects
            .push((pattern.to_string(), Box::new(effect)));
    }

    /// Treat `program` as not installed.
    pub fn missing(&self, program: &str) {
        self.script().missing.insert(program.to_string());
    }

    /// Make a previously missing program available.
    pub fn install(&self, program: &str) {
        self.script().missing.remove(program);
    }

    /// Report `program` as installed at `path`.
    pub fn locate_at(&self, program: &str, path: impl Into<PathBuf>) {
        self.script()
            .locations
            .insert(program.to_string(), path.into());
    }

    /// Every executed invocation, in order.
    pub fn calls(&self) -> Vec<CommandInvocation> {
        self.script().calls.clone()
    }

    /// Keys of every executed invocation, in order.
    pub fn call_keys(&self) -> Vec<String> {
        self.script().calls.iter().map(command_key).collect()
    }

    /// Every negotiated invocation with its policy.
    pub fn negotiations(&self) -> Vec<(CommandInvocation, NegotiationPolicy)> {
        self.script().negotiations.clone()
    }

    /// Forget recorded calls, keeping rules.
    pub fn clear_calls(&self) {
        let mut script = self.script();
        script.calls.clear();
        script.negotiations.clear();
    }
}

/// Program file stem followed by the arguments.
pub fn command_key(invocation: &CommandInvocation) -> String {
    let stem = program_stem(&invocation.program);
    if invocation.args.is_empty() {
        stem
    } else {
        format!("{} {}", stem, invocation.args.join(" "))
    }
}

fn program_stem(program: &str) -> String {
    Path::new(program)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(program)
        .to_string()
}

impl Script {
    fn check_missing(&self, invocation: &CommandInvocation) -> Result<()> {
        let stem = program_stem(&invocation.program);
        if self.missing.contains(&stem) || self.missing.contains(&invocation.program) {
            return Err(ProvisionError::ExternalToolMissing {
                tool: invocation.program.clone(),
                message: "not installed (scripted)".to_string(),
            });
        }
        Ok(())
    }

    fn next_output(&mut self, key: &str) -> CommandOutput {
        for rule in self.rules.iter_mut().rev() {
            if !key.starts_with(&rule.pattern) {
                continue;
            }
            if let Some(output) = rule.queued.pop_front() {
                return output;
            }
            if let Some(output) = &rule.fallback {
                return output.clone();
            }
        }
        CommandOutput::ok("")
    }

    fn apply_effects(&self, key: &str, invocation: &CommandInvocation) {
        for (pattern, effect) in &self.effects {
            if key.starts_with(pattern.as_str()) {
                effect(invocation);
            }
        }
    }
}

impl ProcessExecutor for ScriptedExecutor {
    fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        let mut script = self.script();
        script.check_missing(invocation)?;
        script.calls.push(invocation.clone());

        let key = command_key(invocation);
        let output = script.next_output(&key);
        if output.success() {
            script.apply_effects(&key, invocation);
        }
        Ok(output)
    }

    fn negotiate(
        &self,
        invocation: &CommandInvocation,
        policy: &NegotiationPolicy,
    ) -> Result<NegotiationOutcome> {
        let mut script = self.script();
        script.check_missing(invocation)?;
        script
            .negotiations
            .push((invocation.clone(), policy.clone()));

        let key = command_key(invocation);
        let output = script.next_output(&key);
        if output.success() {
            script.apply_effects(&key, invocation);
        }
        Ok(NegotiationOutcome {
            exit_code: output.exit_code,
            feeds_sent: policy.max_feeds,
            timed_out: false,
            output: output.stdout,
        })
    }

    fn locate(&self, program: &str, _env: &HashMap<String, String>) -> Option<PathBuf> {
        let script = self.script();
        if script.missing.contains(program) || script.missing.contains(&program_stem(program)) {
            return None;
        }
        Some(
            script
                .locations
                .get(program)
                .cloned()
                .unwrap_or_else(|| PathBuf::from(program)),
        )
    }
}
