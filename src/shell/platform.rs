//! Platform-specific conventions.

use std::collections::HashMap;

/// Separator between entries of a search-path variable.
pub const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Name of the search-path variable in the durable store.
///
/// The Windows user environment spells it `Path`.
pub const DURABLE_PATH_VAR: &str = if cfg!(windows) { "Path" } else { "PATH" };

/// File name of a launcher script shipped in an SDK `bin` directory.
pub fn script_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{}.bat", base)
    } else {
        base.to_string()
    }
}

/// Effective `PATH` for a child: the overlay's value, else the parent's.
pub fn search_path_for(env: &HashMap<String, String>) -> Option<String> {
    env.get("PATH")
        .cloned()
        .or_else(|| std::env::var("PATH").ok())
}

/// Check if running as root/admin.
///
/// Returns `None` when elevation cannot be determined.
pub fn is_elevated() -> Option<bool> {
    #[cfg(unix)]
    {
        // SAFETY: geteuid() is a simple syscall that returns the effective user ID
        Some(unsafe { libc::geteuid() == 0 })
    }

    #[cfg(windows)]
    {
        // `net session` only succeeds from an elevated prompt.
        std::process::Command::new("net")
            .arg("session")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .ok()
            .map(|s| s.success())
    }

    #[cfg(not(any(unix, windows)))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_name_matches_platform() {
        let name = script_name("sdkmanager");
        if cfg!(windows) {
            assert_eq!(name, "sdkmanager.bat");
        } else {
            assert_eq!(name, "sdkmanager");
        }
    }

    #[test]
    fn overlay_path_wins() {
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/opt/sdk/bin".to_string());
        assert_eq!(search_path_for(&env).as_deref(), Some("/opt/sdk/bin"));
    }

    #[test]
    fn falls_back_to_parent_path() {
        let env = HashMap::new();
        assert_eq!(search_path_for(&env), std::env::var("PATH").ok());
    }

    #[test]
    fn is_elevated_does_not_panic() {
        let _ = is_elevated();
    }
}
