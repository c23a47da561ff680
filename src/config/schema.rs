//! Configuration schema.
//!
//! Every field has a default reproducing the standard React Native + Android
//! setup, so an override file only needs the keys it changes:
//!
//! ```yaml
//! root: /data/ReactNative
//! device:
//!   name: Pixel_7_API_34
//!   image: "system-images;android-34;google_apis;x86_64"
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::shell::NegotiationPolicy;

/// Top-level provisioning configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Directory everything is installed under.
    pub root: PathBuf,

    /// Package manager used for language runtimes.
    pub package_manager: PackageManagerConfig,

    /// Node.js runtime.
    pub node: NodeConfig,

    /// JDK runtime.
    pub java: JavaConfig,

    /// Android SDK tools and packages.
    pub sdk: SdkConfig,

    /// Virtual device to create.
    pub device: DeviceConfig,

    /// Application workspace scaffold.
    pub app: AppConfig,

    /// License prompt negotiation.
    pub licenses: LicenseConfig,

    /// Durable environment store.
    pub environment: EnvironmentConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            package_manager: PackageManagerConfig::default(),
            node: NodeConfig::default(),
            java: JavaConfig::default(),
            sdk: SdkConfig::default(),
            device: DeviceConfig::default(),
            app: AppConfig::default(),
            licenses: LicenseConfig::default(),
            environment: EnvironmentConfig::default(),
        }
    }
}

fn default_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"D:\ReactNative")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ReactNative")
    }
}

/// Package manager invocation: `<program> <install_args...> <package id>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageManagerConfig {
    pub program: String,
    pub install_args: Vec<String>,
}

impl Default for PackageManagerConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                program: "winget".to_string(),
                install_args: [
                    "install",
                    "--silent",
                    "--accept-package-agreements",
                    "--accept-source-agreements",
                    "-e",
                    "--id",
                ]
                .map(String::from)
                .to_vec(),
            }
        } else {
            Self {
                program: "brew".to_string(),
                install_args: vec!["install".to_string()],
            }
        }
    }
}

/// Node.js runtime requirement.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Package id passed to the package manager.
    pub package_id: String,
    /// Command printing the installed version.
    pub version_command: Vec<String>,
    /// Lowest acceptable major version.
    pub min_major: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            package_id: if cfg!(windows) {
                "OpenJS.NodeJS.LTS".to_string()
            } else {
                "node".to_string()
            },
            version_command: vec!["node".to_string(), "-v".to_string()],
            min_major: 18,
        }
    }
}

/// JDK runtime requirement.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JavaConfig {
    pub package_id: String,
    /// Command printing the installed version.
    pub version_command: Vec<String>,
    /// Lowest acceptable major version.
    pub min_major: u32,
    /// Directories checked, in order, for an installed JDK.
    pub home_candidates: Vec<PathBuf>,
}

impl Default for JavaConfig {
    fn default() -> Self {
        let (package_id, home_candidates) = if cfg!(windows) {
            (
                "Microsoft.OpenJDK.17",
                vec![
                    PathBuf::from("C:/Program Files/Microsoft/jdk-17"),
                    PathBuf::from("C:/Program Files (x86)/Microsoft/jdk-17"),
                ],
            )
        } else if cfg!(target_os = "macos") {
            (
                "openjdk@17",
                vec![
                    PathBuf::from("/opt/homebrew/opt/openjdk@17"),
                    PathBuf::from("/usr/local/opt/openjdk@17"),
                ],
            )
        } else {
            (
                "openjdk@17",
                vec![
                    PathBuf::from("/usr/lib/jvm/java-17-openjdk-amd64"),
                    PathBuf::from("/usr/lib/jvm/java-17-openjdk"),
                ],
            )
        };
        Self {
            package_id: package_id.to_string(),
            version_command: vec!["java".to_string(), "-version".to_string()],
            min_major: 17,
            home_candidates,
        }
    }
}

/// Android command-line tools and SDK packages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SdkConfig {
    /// Archive locations, most preferred first.
    pub archive_candidates: Vec<String>,
    /// Top-level directory name inside the archive.
    pub archive_root: String,
    /// Packages installed with the SDK manager, in order.
    pub packages: Vec<String>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        let host = if cfg!(windows) {
            "win"
        } else if cfg!(target_os = "macos") {
            "mac"
        } else {
            "linux"
        };
        let archive_candidates = ["11076708", "10406996", "9477386"]
            .iter()
            .map(|build| {
                format!(
                    "https://dl.google.com/android/repository/commandlinetools-{}-{}_latest.zip",
                    host, build
                )
            })
            .collect();

        Self {
            archive_candidates,
            archive_root: "cmdline-tools".to_string(),
            packages: vec![
                "platform-tools".to_string(),
                "platforms;android-35".to_string(),
                "emulator".to_string(),
                "system-images;android-35;google_apis;x86_64".to_string(),
            ],
        }
    }
}

/// Virtual device definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub name: String,
    pub image: String,
    /// Hardware profile; dropped on the retry.
    pub profile: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Pixel_8_API_35".to_string(),
            image: "system-images;android-35;google_apis;x86_64".to_string(),
            profile: Some("pixel_8".to_string()),
        }
    }
}

/// Application scaffold.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub name: String,
    /// Scaffold command; the app name is appended.
    pub scaffold: Vec<String>,
    /// Command suggested once provisioning is done.
    pub start_command: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "universal-app".to_string(),
            scaffold: vec!["npx".to_string(), "create-expo-app@latest".to_string()],
            start_command: "npx expo start".to_string(),
        }
    }
}

/// License negotiation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LicenseConfig {
    pub response: String,
    pub max_feeds: usize,
    pub feed_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        let policy = NegotiationPolicy::default();
        Self {
            response: policy.response,
            max_feeds: policy.max_feeds,
            feed_interval_ms: policy.feed_interval.as_millis() as u64,
            timeout_secs: policy.timeout.as_secs(),
        }
    }
}

impl LicenseConfig {
    /// Negotiation policy for the license prompt.
    pub fn policy(&self) -> NegotiationPolicy {
        NegotiationPolicy {
            response: self.response.clone(),
            max_feeds: self.max_feeds,
            feed_interval: Duration::from_millis(self.feed_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Where durable variables are written on non-Windows hosts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Managed export file (default `<root>/environment.sh`).
    pub profile_file: Option<PathBuf>,
    /// Shell profile that sources the managed file (default `~/.profile`).
    pub profile_hook: Option<PathBuf>,
    /// Leave shell profiles untouched.
    pub skip_profile_hook: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_standard_setup() {
        let config = ProvisionConfig::default();
        assert_eq!(config.node.min_major, 18);
        assert_eq!(config.java.min_major, 17);
        assert_eq!(config.java.version_command, vec!["java", "-version"]);
        assert_eq!(config.sdk.archive_candidates.len(), 3);
        assert!(config.sdk.archive_candidates[0].contains("11076708"));
        assert_eq!(config.sdk.packages[0], "platform-tools");
        assert_eq!(config.device.name, "Pixel_8_API_35");
        assert_eq!(config.device.profile.as_deref(), Some("pixel_8"));
        assert_eq!(config.app.name, "universal-app");
        assert!(config.root.ends_with("ReactNative"));
    }

    #[test]
    fn license_policy_uses_configured_values() {
        let licenses = LicenseConfig {
            response: "yes".to_string(),
            max_feeds: 5,
            feed_interval_ms: 10,
            timeout_secs: 2,
        };
        let policy = licenses.policy();
        assert_eq!(policy.response, "yes");
        assert_eq!(policy.max_feeds, 5);
        assert_eq!(policy.feed_interval, Duration::from_millis(10));
        assert_eq!(policy.timeout, Duration::from_secs(2));
    }

    #[test]
    fn default_license_config_matches_policy() {
        assert_eq!(LicenseConfig::default().policy(), NegotiationPolicy::default());
    }
}
