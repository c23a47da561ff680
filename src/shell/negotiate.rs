//! Scripted confirmation for interactive tools.
//!
//! Some tools ask for an unknown number of confirmations on stdin (license
//! prompts are the typical case). The driver writes a fixed response a bounded
//! number of times with a pause between writes, closes stdin, then waits for
//! the child with an upper bound and kills its whole process tree when the
//! bound expires.

use crate::error::Result;
use crate::shell::command::{drain, spawn_error};
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// How long output readers may keep going once the child is gone.
///
/// Descendants that inherited the pipes can hold them open; their output
/// is abandoned after this.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

/// How responses are fed to an interactive child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationPolicy {
    /// Text written for every prompt (a newline is appended).
    pub response: String,

    /// Upper bound on responses written.
    pub max_feeds: usize,

    /// Pause after each write.
    pub feed_interval: Duration,

    /// How long to wait for the child once feeding is done.
    pub timeout: Duration,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            response: "y".to_string(),
            max_feeds: 50,
            feed_interval: Duration::from_millis(50),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Result of a negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationOutcome {
    /// Exit code (None when killed).
    pub exit_code: Option<i32>,

    /// Responses successfully written.
    pub feeds_sent: usize,

    /// Whether the child had to be killed.
    pub timed_out: bool,

    /// Collected stdout followed by stderr.
    pub output: String,
}

/// Spawn `cmd` and negotiate with it according to `policy`.
///
/// The child leads its own process group, so a timeout kills everything it
/// started (wrapper scripts launch the real tool as a grandchild).
pub fn negotiate_process(
    mut cmd: Command,
    program: &str,
    policy: &NegotiationPolicy,
) -> Result<NegotiationOutcome> {
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    own_process_group(&mut cmd);

    let mut child = cmd.spawn().map_err(|e| spawn_error(program, e))?;

    let stdout = read_in_background(child.stdout.take());
    let stderr = read_in_background(child.stderr.take());

    let mut feeds_sent = 0;
    if let Some(mut stdin) = child.stdin.take() {
        let line = format!("{}\n", policy.response);
        while feeds_sent < policy.max_feeds {
            if let Err(e) = stdin
                .write_all(line.as_bytes())
                .and_then(|()| stdin.flush())
            {
                tracing::debug!(error = %e, feeds_sent, "child stopped accepting input");
                break;
            }
            feeds_sent += 1;
            thread::sleep(policy.feed_interval);
        }
        // Dropping stdin signals EOF.
    }

    let mut timed_out = false;
    let status = match child.wait_timeout(policy.timeout)? {
        Some(status) => status,
        None => {
            tracing::warn!(
                timeout_secs = policy.timeout.as_secs(),
                "{} timed out, killing its process tree",
                program
            );
            timed_out = true;
            kill_tree(&mut child)?;
            child.wait()?
        }
    };

    let deadline = Instant::now() + OUTPUT_GRACE;
    let mut output = collect(&stdout, deadline);
    let stderr = collect(&stderr, deadline);
    if !stderr.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&stderr);
    }

    Ok(NegotiationOutcome {
        exit_code: status.code(),
        feeds_sent,
        timed_out,
        output,
    })
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kill the child and every process it started.
fn kill_tree(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        // SAFETY: killpg only sends a signal. The child was spawned as the
        // leader of its own group, so its pid is the group id.
        if unsafe { libc::killpg(child.id() as libc::pid_t, libc::SIGKILL) } == 0 {
            return Ok(());
        }
        tracing::debug!(
            error = %io::Error::last_os_error(),
            "killpg failed, killing the child only"
        );
    }

    #[cfg(windows)]
    {
        let status = Command::new("taskkill")
            .args(["/T", "/F", "/PID"])
            .arg(child.id().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if matches!(status, Ok(s) if s.success()) {
            return Ok(());
        }
        tracing::debug!("taskkill failed, killing the child only");
    }

    child.kill()
}

fn read_in_background<R: Read + Send + 'static>(reader: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(drain(reader));
    });
    rx
}

/// Output from a reader, or nothing if it is still blocked at `deadline`.
fn collect(rx: &Receiver<String>, deadline: Instant) -> String {
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => text,
        Err(_) => {
            tracing::debug!("output pipe still held open by a descendant; abandoning it");
            String::new()
        }
    }
}
