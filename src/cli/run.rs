//! Wiring for a real provisioning run.

use std::fs;

use crate::config::{Layout, ProvisionConfig};
use crate::environment::{DurableStore, EnvironmentContext, ProfileStore, UserRegistryStore};
use crate::error::Result;
use crate::fetch::{HttpDownloader, ResourceFetcher};
use crate::provision::{check_privileges, provision};
use crate::runlog::RunLog;
use crate::shell::CommandRunner;
use crate::steps::{RunSummary, StepContext};

/// Pick the durable store for this host.
///
/// Windows uses the per-user registry environment. Elsewhere variables go
/// to a managed export file, sourced from the login profile unless
/// `environment.skip_profile_hook` is set.
pub fn durable_store(config: &ProvisionConfig, log: &RunLog) -> Box<dyn DurableStore> {
    if cfg!(windows) {
        return Box::new(UserRegistryStore::new(CommandRunner::system(log.clone())));
    }

    let file = config
        .environment
        .profile_file
        .clone()
        .unwrap_or_else(|| config.root.join("environment.sh"));
    let store = ProfileStore::new(file);
    if config.environment.skip_profile_hook {
        return Box::new(store);
    }

    let hook = config
        .environment
        .profile_hook
        .clone()
        .or_else(|| dirs::home_dir().map(|home| home.join(".profile")));
    match hook {
        Some(profile) => Box::new(store.with_hook(profile)),
        None => Box::new(store),
    }
}

/// Provision the host described by `config`.
pub fn execute(config: &ProvisionConfig) -> Result<RunSummary> {
    let layout = Layout::new(&config.root);
    // the run log lives directly under the root
    if let Err(e) = fs::create_dir_all(&layout.root) {
        tracing::warn!("Could not create {}: {}", layout.root.display(), e);
    }

    let log = RunLog::new(&layout.log_file);
    log.start_session();
    log.info(&format!("Provisioning under {}", layout.root.display()));
    check_privileges(&log);

    let runner = CommandRunner::system(log.clone());
    let store = durable_store(config, &log);
    tracing::debug!("Durable variables go to the {}", store.describe());

    let downloader = HttpDownloader::new()?.with_progress(console::Term::stderr().is_term());
    let fetcher = ResourceFetcher::new(Box::new(downloader), log.clone());

    let mut ctx = StepContext {
        config,
        layout: &layout,
        runner: &runner,
        store: store.as_ref(),
        fetcher: &fetcher,
        env: EnvironmentContext::new(),
    };
    let summary = provision(&mut ctx)?;
    log.info(&format!(
        "Setup finished. Log saved at: {}",
        layout.log_file.display()
    ));
    Ok(summary)
}
