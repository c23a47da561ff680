//! Two-tier environment mutation.
//!
//! Values set during provisioning must be usable by the remaining steps of
//! this run and by processes launched after it. The first tier is the
//! [`EnvironmentContext`] threaded through the pipeline; the second is a
//! [`DurableStore`].
//!
//! - [`set_persistent`] - set a variable in both tiers
//! - [`append_to_path_variable`] - add directories to the durable search path
//! - [`merge_path_entries`] - pure, case-insensitive path merge

pub mod context;
pub mod path;
pub mod store;

pub use context::EnvironmentContext;
pub use path::merge_path_entries;
pub use store::{parse_reg_query, DurableStore, MemoryStore, ProfileStore, UserRegistryStore};

use crate::error::{ProvisionError, Result};
use crate::runlog::RunLog;
use crate::shell::{DURABLE_PATH_VAR, PATH_SEPARATOR};

/// Set `name` for the rest of this run and for future launches.
///
/// The process-local tier is always updated. A failed durable write is
/// returned as [`ProvisionError::EnvironmentPersistError`].
pub fn set_persistent(
    ctx: &mut EnvironmentContext,
    store: &dyn DurableStore,
    name: &str,
    value: &str,
) -> Result<()> {
    ctx.set(name, value);
    store.write(name, value).map_err(|e| match e {
        ProvisionError::EnvironmentPersistError { .. } => e,
        other => ProvisionError::EnvironmentPersistError {
            name: name.to_string(),
            message: other.to_string(),
        },
    })
}

/// Add `entries` to the durable search path in a single update.
///
/// If the store cannot be read, the inherited process `PATH` is used as the
/// starting value. The entries are also put in front of this run's search
/// path. Returns the entries that were newly written.
pub fn append_to_path_variable<S: AsRef<str>>(
    ctx: &mut EnvironmentContext,
    store: &dyn DurableStore,
    log: &RunLog,
    entries: &[S],
) -> Result<Vec<String>> {
    ctx.prepend_path(entries.iter().map(|e| e.as_ref().to_string()));

    let current = match store.read(DURABLE_PATH_VAR) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            log.warn(&format!(
                "Could not read {} from {} ({}); using the current process value",
                DURABLE_PATH_VAR,
                store.describe(),
                e
            ));
            std::env::var("PATH").unwrap_or_default()
        }
    };

    let (merged, added) = merge_path_entries(&current, entries, PATH_SEPARATOR);
    if added.is_empty() {
        return Ok(added);
    }

    store
        .write(DURABLE_PATH_VAR, &merged)
        .map_err(|e| ProvisionError::EnvironmentPersistError {
            name: DURABLE_PATH_VAR.to_string(),
            message: e.to_string(),
        })?;
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sep() -> String {
        PATH_SEPARATOR.to_string()
    }

    #[test]
    fn set_persistent_updates_both_tiers() {
        let mut ctx = EnvironmentContext::new();
        let store = MemoryStore::new();

        set_persistent(&mut ctx, &store, "ANDROID_HOME", "/sdk").unwrap();

        assert_eq!(ctx.get("ANDROID_HOME"), Some("/sdk"));
        assert_eq!(store.get("ANDROID_HOME").as_deref(), Some("/sdk"));
    }

    #[test]
    fn set_persistent_keeps_local_value_when_store_fails() {
        let mut ctx = EnvironmentContext::new();
        let store = MemoryStore::new().failing_writes();

        let err = set_persistent(&mut ctx, &store, "ANDROID_HOME", "/sdk").unwrap_err();

        assert!(!err.is_fatal());
        assert_eq!(ctx.get("ANDROID_HOME"), Some("/sdk"));
    }

    #[test]
    fn append_writes_once_and_is_idempotent() {
        let mut ctx = EnvironmentContext::new();
        let existing = ["X", "Y"].join(sep().as_str());
        let store = MemoryStore::new().with(DURABLE_PATH_VAR, &existing);
        let log = RunLog::discard();

        let added = append_to_path_variable(&mut ctx, &store, &log, &["A", "B"]).unwrap();
        assert_eq!(added, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            store.get(DURABLE_PATH_VAR).unwrap(),
            ["X", "Y", "A", "B"].join(sep().as_str())
        );
        assert_eq!(store.writes().len(), 1);

        let added = append_to_path_variable(&mut ctx, &store, &log, &["a"]).unwrap();
        assert!(added.is_empty());
        assert_eq!(store.writes().len(), 1);
        assert_eq!(ctx.path_prefix(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn unreadable_store_falls_back_to_process_path() {
        let mut ctx = EnvironmentContext::new();
        let store = MemoryStore::new().failing_reads();
        let log = RunLog::discard();

        let added =
            append_to_path_variable(&mut ctx, &store, &log, &["/devprov/unlikely/entry"]).unwrap();

        assert_eq!(added, vec!["/devprov/unlikely/entry".to_string()]);
        let written = store.get(DURABLE_PATH_VAR).unwrap();
        assert!(written.ends_with("/devprov/unlikely/entry"));
    }
}
