//! Process-local environment for the current run.

use std::collections::{BTreeMap, HashMap};

use crate::shell::PATH_SEPARATOR;

/// Variables and search-path entries set during this run.
///
/// Nothing here touches the real process environment. Commands receive the
/// context as an overlay through [`EnvironmentContext::overlay`].
///
/// # Example
///
/// ```
/// use devprov::environment::EnvironmentContext;
///
/// let mut ctx = EnvironmentContext::new();
/// ctx.set("ANDROID_HOME", "/opt/android");
/// ctx.prepend_path(["/opt/android/platform-tools"]);
///
/// let overlay = ctx.overlay();
/// assert_eq!(overlay["ANDROID_HOME"], "/opt/android");
/// assert!(overlay["PATH"].starts_with("/opt/android/platform-tools"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvironmentContext {
    vars: BTreeMap<String, String>,
    path_prefix: Vec<String>,
}

impl EnvironmentContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a process-local variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Get a variable set during this run.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Put directories in front of the inherited search path.
    ///
    /// Entries already in the prefix are not repeated.
    pub fn prepend_path<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for entry in entries {
            let entry = entry.into();
            if !self
                .path_prefix
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&entry))
            {
                self.path_prefix.push(entry);
            }
        }
    }

    /// Directories added in front of the inherited search path.
    pub fn path_prefix(&self) -> &[String] {
        &self.path_prefix
    }

    /// Overlay to pass to child processes.
    pub fn overlay(&self) -> HashMap<String, String> {
        let mut overlay: HashMap<String, String> = self
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !self.path_prefix.is_empty() {
            let mut path = self.path_prefix.join(PATH_SEPARATOR.to_string().as_str());
            if let Ok(inherited) = std::env::var("PATH") {
                if !inherited.is_empty() {
                    path.push(PATH_SEPARATOR);
                    path.push_str(&inherited);
                }
            }
            overlay.insert("PATH".to_string(), path);
        }
        overlay
    }
}
