//! Durable environment stores.
//!
//! A [`DurableStore`] holds variables that outlive the run and are visible to
//! processes launched later. Windows keeps them in the user registry hive;
//! elsewhere a managed shell file is sourced from the login profile.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use regex::Regex;

use crate::error::{ProvisionError, Result};
use crate::shell::{CommandInvocation, CommandRunner, DURABLE_PATH_VAR};

/// Persistent key/value storage for environment variables.
pub trait DurableStore {
    /// Short description used in log lines.
    fn describe(&self) -> String;

    /// Read a variable. `Ok(None)` when it is not set.
    fn read(&self, name: &str) -> Result<Option<String>>;

    /// Write a variable.
    fn write(&self, name: &str, value: &str) -> Result<()>;
}

/// Windows per-user environment (`HKCU\Environment`).
///
/// Reads go through `reg query`. Writes go through `setx`, which also
/// notifies running shells; values `setx` would truncate are written with
/// `reg add` instead.
pub struct UserRegistryStore {
    runner: CommandRunner,
}

/// `setx` truncates values longer than this.
const SETX_LIMIT: usize = 1024;

const ENVIRONMENT_KEY: &str = "HKCU\\Environment";

impl UserRegistryStore {
    /// Create a store issuing commands through `runner`.
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn write_invocation(name: &str, value: &str) -> CommandInvocation {
        let invocation = if value.len() > SETX_LIMIT {
            CommandInvocation::new("reg").args([
                "add",
                ENVIRONMENT_KEY,
                "/v",
                name,
                "/t",
                "REG_EXPAND_SZ",
                "/d",
                value,
                "/f",
            ])
        } else {
            CommandInvocation::new("setx").args([name, value])
        };
        invocation.lenient()
    }
}

impl DurableStore for UserRegistryStore {
    fn describe(&self) -> String {
        format!("user environment ({})", ENVIRONMENT_KEY)
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        let output = self.runner.run(
            &CommandInvocation::new("reg")
                .args(["query", ENVIRONMENT_KEY, "/v", name])
                .lenient(),
        )?;
        if !output.success() {
            return Ok(None);
        }
        Ok(parse_reg_query(&output.stdout, name))
    }

    fn write(&self, name: &str, value: &str) -> Result<()> {
        let invocation = Self::write_invocation(name, value);
        let output = self.runner.run(&invocation)?;
        if !output.success() {
            return Err(ProvisionError::EnvironmentPersistError {
                name: name.to_string(),
                message: format!("{} exited with {:?}", invocation.program, output.exit_code),
            });
        }
        if invocation.program == "reg" {
            self.runner.log().warn(&format!(
                "{} is {} characters and was written with reg add; sign out and back in if new terminals do not see it.",
                name,
                value.len()
            ));
        }
        Ok(())
    }
}

/// Extract a value from `reg query <key> /v <name>` output.
pub fn parse_reg_query(stdout: &str, name: &str) -> Option<String> {
    let re = Regex::new(r"^\s*(\S+)\s+(REG_[A-Z_]+)\s*(.*)$").ok()?;
    stdout.lines().find_map(|line| {
        let caps = re.captures(line)?;
        if caps[1].eq_ignore_ascii_case(name) {
            Some(caps[3].trim().to_string())
        } else {
            None
        }
    })
}

/// Managed POSIX shell file of `export` lines.
///
/// The durable search path is stored as only the managed entries and is
/// rendered so the inherited `PATH` is kept:
///
/// ```text
/// export PATH="/sdk/platform-tools:/sdk/emulator${PATH:+:$PATH}"
/// ```
#[derive(Debug, Clone)]
pub struct ProfileStore {
    file: PathBuf,
    hook: Option<PathBuf>,
}

const PROFILE_HEADER: &str = "# Managed by devprov. Edits to these variables may be overwritten.";
const PATH_SUFFIX: &str = "${PATH:+:$PATH}";

impl ProfileStore {
    /// Store variables in `file`.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            hook: None,
        }
    }

    /// Also make sure `profile` sources the managed file.
    pub fn with_hook(mut self, profile: impl Into<PathBuf>) -> Self {
        self.hook = Some(profile.into());
        self
    }

    /// Path of the managed file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    fn load(&self) -> Result<Vec<(String, String)>> {
        match fs::read_to_string(&self.file) {
            Ok(content) => Ok(parse_exports(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, vars: &[(String, String)]) -> std::io::Result<()> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut content = String::from(PROFILE_HEADER);
        content.push('\n');
        for (name, value) in vars {
            content.push_str(&render_export(name, value));
            content.push('\n');
        }
        fs::write(&self.file, content)
    }

    fn ensure_hook(&self) -> std::io::Result<()> {
        let Some(profile) = &self.hook else {
            return Ok(());
        };
        let line = format!(". \"{}\"", self.file.display());
        let existing = match fs::read_to_string(profile) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        if existing.lines().any(|l| l.trim() == line) {
            return Ok(());
        }

        let mut updated = existing;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(&line);
        updated.push('\n');
        fs::write(profile, updated)
    }
}

impl DurableStore for ProfileStore {
    fn describe(&self) -> String {
        format!("profile file {}", self.file.display())
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v))
    }

    fn write(&self, name: &str, value: &str) -> Result<()> {
        let persist_error = |e: std::io::Error| ProvisionError::EnvironmentPersistError {
            name: name.to_string(),
            message: e.to_string(),
        };

        let mut vars = self.load()?;
        match vars.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => vars.push((name.to_string(), value.to_string())),
        }
        self.save(&vars).map_err(persist_error)?;
        self.ensure_hook().map_err(persist_error)
    }
}

fn render_export(name: &str, value: &str) -> String {
    let escaped = shell_escape(value);
    if name == DURABLE_PATH_VAR {
        format!("export {}=\"{}{}\"", name, escaped, PATH_SUFFIX)
    } else {
        format!("export {}=\"{}\"", name, escaped)
    }
}

fn shell_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn shell_unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_exports(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("export ")?;
            let (name, raw) = rest.split_once('=')?;
            let raw = raw.strip_prefix('"')?.strip_suffix('"')?;
            let raw = if name == DURABLE_PATH_VAR {
                raw.strip_suffix(PATH_SUFFIX).unwrap_or(raw)
            } else {
                raw
            };
            Some((name.to_string(), shell_unescape(raw)))
        })
        .collect()
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    vars: HashMap<String, String>,
    writes: Vec<(String, String)>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without recording a write.
    pub fn with(self, name: &str, value: &str) -> Self {
        self.lock().vars.insert(name.to_string(), value.to_string());
        self
    }

    /// Make every read fail.
    pub fn failing_reads(self) -> Self {
        self.lock().fail_reads = true;
        self
    }

    /// Make every write fail.
    pub fn failing_writes(self) -> Self {
        self.lock().fail_writes = true;
        self
    }

    /// Current value of a variable.
    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().vars.get(name).cloned()
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DurableStore for MemoryStore {
    fn describe(&self) -> String {
        "in-memory store".to_string()
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        if state.fail_reads {
            return Err(ProvisionError::Other(anyhow::anyhow!(
                "store unreadable"
            )));
        }
        Ok(state.vars.get(name).cloned())
    }

    fn write(&self, name: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(ProvisionError::EnvironmentPersistError {
                name: name.to_string(),
                message: "store is read-only".to_string(),
            });
        }
        state.vars.insert(name.to_string(), value.to_string());
        state.writes.push((name.to_string(), value.to_string()));
        Ok(())
    }
}
