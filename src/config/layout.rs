//! Filesystem layout under the provisioning root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::shell::script_name;

/// Fixed directories every step relies on.
///
/// ```text
/// <root>/
///   tools/
///   Android/Sdk/                 SDK root
///   Android/.android/avd/        device images
///   dev/apps/                    application workspace
///   setup_log.txt
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub tools: PathBuf,
    pub sdk_root: PathBuf,
    pub avd_home: PathBuf,
    pub apps: PathBuf,
    pub log_file: PathBuf,
}

impl Layout {
    /// Derive the layout from a root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let android = root.join("Android");
        Self {
            tools: root.join("tools"),
            sdk_root: android.join("Sdk"),
            avd_home: android.join(".android").join("avd"),
            apps: root.join("dev").join("apps"),
            log_file: root.join("setup_log.txt"),
            root,
        }
    }

    /// Directories that must exist before any step runs.
    pub fn directories(&self) -> [&Path; 5] {
        [
            &self.root,
            &self.tools,
            &self.sdk_root,
            &self.avd_home,
            &self.apps,
        ]
    }

    /// Whether every required directory exists.
    pub fn exists(&self) -> bool {
        self.directories().iter().all(|d| d.is_dir())
    }

    /// Create any missing directory.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in self.directories() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Install location of the command-line tools.
    pub fn cmdline_tools(&self) -> PathBuf {
        self.sdk_root.join("cmdline-tools").join("latest")
    }

    /// Path of a launcher script in the command-line tools.
    pub fn tool_script(&self, base: &str) -> PathBuf {
        self.cmdline_tools().join("bin").join(script_name(base))
    }

    /// Directories added to the user's search path.
    pub fn path_entries(&self) -> Vec<PathBuf> {
        vec![
            self.sdk_root.join("platform-tools"),
            self.sdk_root.join("emulator"),
            self.cmdline_tools().join("bin"),
        ]
    }

    /// Directory a package id installs into (`;` separates path segments).
    pub fn package_dir(&self, package: &str) -> PathBuf {
        package
            .split(';')
            .fold(self.sdk_root.clone(), |dir, segment| dir.join(segment))
    }

    /// Directory of a scaffolded application.
    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.apps.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn derives_fixed_subdirectories() {
        let layout = Layout::new("/rn");
        assert_eq!(layout.sdk_root, PathBuf::from("/rn/Android/Sdk"));
        assert_eq!(layout.avd_home, PathBuf::from("/rn/Android/.android/avd"));
        assert_eq!(layout.apps, PathBuf::from("/rn/dev/apps"));
        assert_eq!(layout.log_file, PathBuf::from("/rn/setup_log.txt"));
        assert_eq!(
            layout.cmdline_tools(),
            PathBuf::from("/rn/Android/Sdk/cmdline-tools/latest")
        );
    }

    #[test]
    fn package_ids_map_to_directories() {
        let layout = Layout::new("/rn");
        assert_eq!(
            layout.package_dir("system-images;android-35;google_apis;x86_64"),
            PathBuf::from("/rn/Android/Sdk/system-images/android-35/google_apis/x86_64")
        );
        assert_eq!(
            layout.package_dir("platform-tools"),
            PathBuf::from("/rn/Android/Sdk/platform-tools")
        );
    }

    #[test]
    fn path_entries_cover_three_tool_dirs() {
        let layout = Layout::new("/rn");
        let entries = layout.path_entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[2].ends_with("cmdline-tools/latest/bin"));
    }

    #[test]
    fn ensure_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path().join("ReactNative"));

        assert!(!layout.exists());
        layout.ensure().unwrap();
        layout.ensure().unwrap();
        assert!(layout.exists());
    }
}
