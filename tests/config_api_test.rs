//! Integration tests for config module public API.

use devprov::config::{load_config_from, Layout, ProvisionConfig};
use devprov::ProvisionError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn defaults_need_no_file() {
    let config = load_config_from(None, None).unwrap();
    assert_eq!(config.node.min_major, ProvisionConfig::default().node.min_major);
}

#[test]
fn override_file_and_root_compose() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("devprov.yml");
    fs::write(
        &file,
        r#"
root: /ignored/by/env
sdk:
  archive_candidates:
    - file:///mirror/commandlinetools.zip
    - https://example.invalid/tools.zip
device:
  name: Tablet_API_35
  profile: ~
licenses:
  max_feeds: 5
"#,
    )
    .unwrap();

    let config = load_config_from(Some(file.as_path()), Some(temp.path().join("rn"))).unwrap();
    let layout = Layout::new(&config.root);

    assert_eq!(config.root, temp.path().join("rn"));
    assert_eq!(config.sdk.archive_candidates.len(), 2);
    assert_eq!(config.sdk.archive_root, "cmdline-tools");
    assert_eq!(config.device.name, "Tablet_API_35");
    assert!(config.device.profile.is_none());
    assert_eq!(config.licenses.policy().max_feeds, 5);
    assert_eq!(layout.log_file, temp.path().join("rn").join("setup_log.txt"));
}

#[test]
fn missing_override_file_is_an_error() {
    let result = load_config_from(Some(Path::new("/definitely/not/here.yml")), None);
    assert!(matches!(result, Err(ProvisionError::Io(_))));
}

#[test]
fn unknown_keys_are_rejected() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("devprov.yml");
    fs::write(&file, "node:\n  minimum: 18\n").unwrap();

    let err = load_config_from(Some(file.as_path()), None).unwrap_err();

    assert!(matches!(err, ProvisionError::ConfigParseError { .. }));
}

#[test]
fn layout_matches_documented_tree() {
    let layout = Layout::new("/rn");
    assert_eq!(layout.sdk_root, PathBuf::from("/rn/Android/Sdk"));
    assert_eq!(layout.avd_home, PathBuf::from("/rn/Android/.android/avd"));
    assert_eq!(layout.apps, PathBuf::from("/rn/dev/apps"));
    assert_eq!(
        layout.package_dir("platforms;android-35"),
        PathBuf::from("/rn/Android/Sdk/platforms/android-35")
    );
}
