//! Provisioning configuration and filesystem layout.
//!
//! - Schema definitions with complete defaults in [`schema`]
//! - Override loading in [`loader`]
//! - Directory layout under the root in [`layout`]
//!
//! # Example
//!
//! ```
//! use devprov::config::{load_config_from, Layout};
//! use std::path::PathBuf;
//!
//! let config = load_config_from(None, Some(PathBuf::from("/tmp/rn"))).unwrap();
//! let layout = Layout::new(&config.root);
//! assert!(layout.sdk_root.ends_with("Android/Sdk"));
//! ```

pub mod layout;
pub mod loader;
pub mod schema;

pub use layout::Layout;
pub use loader::{load_config, load_config_from, parse_config, CONFIG_ENV, ROOT_ENV};
pub use schema::{
    AppConfig, DeviceConfig, EnvironmentConfig, JavaConfig, LicenseConfig, NodeConfig,
    PackageManagerConfig, ProvisionConfig, SdkConfig,
};
