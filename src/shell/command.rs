//! External command execution.
//!
//! [`CommandRunner`] is the single entry point every provisioning step uses
//! to launch a process. It logs the command line and both captured streams
//! to the run log, then applies the invocation's [`CheckMode`]. Spawning
//! itself is delegated to a [`ProcessExecutor`] so tests can script results.

use crate::error::{ProvisionError, Result};
use crate::runlog::RunLog;
use crate::shell::negotiate::{negotiate_process, NegotiationOutcome, NegotiationPolicy};
use crate::shell::platform::search_path_for;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How a non-zero exit status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// Non-zero exit raises [`ProvisionError::CommandFailed`].
    #[default]
    Strict,
    /// The result is returned unconditionally.
    Lenient,
}

/// A program, its arguments, and how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Program name or path.
    pub program: String,

    /// Arguments, passed verbatim.
    pub args: Vec<String>,

    /// Environment overlay (merged over the parent environment).
    pub env: HashMap<String, String>,

    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Success predicate.
    pub check: CheckMode,
}

impl CommandInvocation {
    /// Start building an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            check: CheckMode::Strict,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Merge variables into the environment overlay.
    pub fn envs(mut self, vars: &HashMap<String, String>) -> Self {
        for (k, v) in vars {
            self.env.insert(k.clone(), v.clone());
        }
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Return the result regardless of exit status.
    pub fn lenient(mut self) -> Self {
        self.check = CheckMode::Lenient;
        self
    }

    /// Command line as shown in logs and errors.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(quote(&self.program));
        parts.extend(self.args.iter().map(|a| quote(a)));
        parts.join(" ")
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) {
        format!("\"{}\"", s)
    } else {
        s.to_string()
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,
}

impl CommandOutput {
    /// A zero-exit result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// A failed result with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches processes on behalf of [`CommandRunner`].
pub trait ProcessExecutor {
    /// Run to completion, capturing both streams. Never checks the exit code.
    fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput>;

    /// Run while feeding scripted responses on stdin.
    fn negotiate(
        &self,
        invocation: &CommandInvocation,
        policy: &NegotiationPolicy,
    ) -> Result<NegotiationOutcome>;

    /// Full path `program` resolves to with the given overlay.
    fn locate(&self, program: &str, env: &HashMap<String, String>) -> Option<PathBuf>;

    /// Whether `program` can be found with the given overlay.
    fn is_available(&self, program: &str, env: &HashMap<String, String>) -> bool {
        self.locate(program, env).is_some()
    }
}

/// Executor backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn command(&self, invocation: &CommandInvocation) -> Result<Command> {
        let program = resolve_program(
            &invocation.program,
            &invocation.env,
            invocation.cwd.as_deref(),
        )?;

        let mut cmd = Command::new(program);
        cmd.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        Ok(cmd)
    }
}

impl ProcessExecutor for SystemExecutor {
    fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        let start = Instant::now();
        let mut cmd = self.command(invocation)?;
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| spawn_error(&invocation.program, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_handle = thread::spawn(move || drain(stdout));
        let stderr_handle = thread::spawn(move || drain(stderr));

        let status = child.wait()?;
        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            duration: start.elapsed(),
        })
    }

    fn negotiate(
        &self,
        invocation: &CommandInvocation,
        policy: &NegotiationPolicy,
    ) -> Result<NegotiationOutcome> {
        let cmd = self.command(invocation)?;
        negotiate_process(cmd, &invocation.program, policy)
    }

    fn locate(&self, program: &str, env: &HashMap<String, String>) -> Option<PathBuf> {
        resolve_program(program, env, None).ok()
    }
}

/// Read a child pipe to the end, lossily decoding UTF-8.
pub(crate) fn drain<R: Read>(reader: Option<R>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf) {
        tracing::debug!(error = %e, "failed to read child output");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Map a spawn failure to the error taxonomy.
pub(crate) fn spawn_error(program: &str, err: std::io::Error) -> ProvisionError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ProvisionError::ExternalToolMissing {
            tool: program.to_string(),
            message: err.to_string(),
        }
    } else {
        ProvisionError::Io(err)
    }
}

/// Locate `program` on the overlay's `PATH`, then the parent's.
fn resolve_program(
    program: &str,
    env: &HashMap<String, String>,
    cwd: Option<&Path>,
) -> Result<PathBuf> {
    let search = search_path_for(env);
    let cwd = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };

    which::which_in(program, search, cwd).map_err(|e| ProvisionError::ExternalToolMissing {
        tool: program.to_string(),
        message: e.to_string(),
    })
}

/// Logs and checks every command a step runs.
pub struct CommandRunner {
    executor: Box<dyn ProcessExecutor>,
    log: RunLog,
}

impl CommandRunner {
    /// Create a runner over the given executor.
    pub fn new(executor: Box<dyn ProcessExecutor>, log: RunLog) -> Self {
        Self { executor, log }
    }

    /// Runner over real processes.
    pub fn system(log: RunLog) -> Self {
        Self::new(Box::new(SystemExecutor), log)
    }

    /// The run log commands are recorded to.
    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Run a command, logging the command line and its output.
    ///
    /// Output is logged before any error is raised. In [`CheckMode::Strict`]
    /// a non-zero exit becomes [`ProvisionError::CommandFailed`].
    pub fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        let line = invocation.display();
        self.log.record(&format!("$ {}", line));

        let output = self.executor.execute(invocation)?;
        self.log_streams(&output.stdout, &output.stderr);

        if invocation.check == CheckMode::Strict && !output.success() {
            return Err(ProvisionError::CommandFailed {
                command: line,
                code: output.exit_code,
            });
        }
        Ok(output)
    }

    /// Drive an interactive command with scripted responses.
    pub fn negotiate(
        &self,
        invocation: &CommandInvocation,
        policy: &NegotiationPolicy,
    ) -> Result<NegotiationOutcome> {
        self.log.record(&format!("$ {}", invocation.display()));

        let outcome = self.executor.negotiate(invocation, policy)?;
        self.log_streams(&outcome.output, "");

        if outcome.timed_out {
            self.log.warn(&format!(
                "{} did not finish within {}s and was terminated",
                invocation.program,
                policy.timeout.as_secs()
            ));
        } else {
            tracing::debug!(
                exit_code = ?outcome.exit_code,
                feeds = outcome.feeds_sent,
                "negotiation finished"
            );
        }
        Ok(outcome)
    }

    /// Whether `program` can be launched with the given overlay.
    pub fn is_available(&self, program: &str, env: &HashMap<String, String>) -> bool {
        self.executor.is_available(program, env)
    }

    /// Where `program` would be launched from with the given overlay.
    pub fn locate(&self, program: &str, env: &HashMap<String, String>) -> Option<PathBuf> {
        self.executor.locate(program, env)
    }

    fn log_streams(&self, stdout: &str, stderr: &str) {
        let stdout = stdout.trim();
        if !stdout.is_empty() {
            self.log.record(stdout);
        }
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            self.log.record(stderr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::mock::ScriptedExecutor;
    use std::fs;
    use tempfile::TempDir;

    fn runner_with(executor: ScriptedExecutor, log: RunLog) -> CommandRunner {
        CommandRunner::new(Box::new(executor), log)
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let inv = CommandInvocation::new("setx")
            .arg("Path")
            .arg("C:\\Program Files\\x;C:\\y");
        assert_eq!(inv.display(), "setx Path \"C:\\Program Files\\x;C:\\y\"");
    }

    #[test]
    fn builder_defaults_to_strict() {
        let inv = CommandInvocation::new("node").arg("-v");
        assert_eq!(inv.check, CheckMode::Strict);
        assert_eq!(inv.clone().lenient().check, CheckMode::Lenient);
    }

    #[test]
    fn strict_failure_raises_after_logging_output() {
        let temp = TempDir::new().unwrap();
        let log_path = temp.path().join("log.txt");
        let executor = ScriptedExecutor::new();
        executor.respond("sdkmanager", CommandOutput::failed(3, "license not accepted"));

        let runner = runner_with(executor, RunLog::new(&log_path));
        let err = runner
            .run(&CommandInvocation::new("sdkmanager").arg("emulator"))
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::CommandFailed { code: Some(3), .. }
        ));
        let logged = fs::read_to_string(&log_path).unwrap();
        assert!(logged.contains("[setup] $ sdkmanager emulator"));
        assert!(logged.contains("[setup] license not accepted"));
    }

    #[test]
    fn lenient_failure_returns_output() {
        let executor = ScriptedExecutor::new();
        executor.respond("avdmanager", CommandOutput::failed(1, "boom"));
        let runner = runner_with(executor, RunLog::discard());

        let output = runner
            .run(&CommandInvocation::new("avdmanager").arg("list").lenient())
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, Some(1));
    }

    #[test]
    fn missing_tool_propagates() {
        let executor = ScriptedExecutor::new();
        executor.missing("winget");
        let runner = runner_with(executor, RunLog::discard());

        let err = runner
            .run(&CommandInvocation::new("winget").arg("--version").lenient())
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ExternalToolMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_captures_both_streams() {
        let runner = CommandRunner::system(RunLog::discard());
        let output = runner
            .run(&CommandInvocation::new("sh").args(["-c", "echo out; echo err >&2"]))
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_applies_overlay_on_top_of_parent_env() {
        let mut overlay = HashMap::new();
        overlay.insert("DEVPROV_TEST_VAR".to_string(), "overlay".to_string());

        let runner = CommandRunner::system(RunLog::discard());
        let output = runner
            .run(
                &CommandInvocation::new("sh")
                    .args(["-c", "echo $DEVPROV_TEST_VAR; test -n \"$PATH\" && echo has-path"])
                    .envs(&overlay),
            )
            .unwrap();

        assert!(output.stdout.contains("overlay"));
        assert!(output.stdout.contains("has-path"));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_reports_exit_code() {
        let runner = CommandRunner::system(RunLog::discard());
        let err = runner
            .run(&CommandInvocation::new("sh").args(["-c", "exit 4"]))
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::CommandFailed { code: Some(4), .. }
        ));
    }

    #[test]
    fn system_executor_reports_missing_program() {
        let runner = CommandRunner::system(RunLog::discard());
        let err = runner
            .run(&CommandInvocation::new("devprov-definitely-not-installed"))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ExternalToolMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_runs_in_cwd() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("marker.txt"), "").unwrap();

        let runner = CommandRunner::system(RunLog::discard());
        let output = runner
            .run(&CommandInvocation::new("ls").current_dir(temp.path()))
            .unwrap();

        assert!(output.stdout.contains("marker.txt"));
    }
}
