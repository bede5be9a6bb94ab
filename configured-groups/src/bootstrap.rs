// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, ConfigLoader, ConfigSource};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::store::{GroupStore, PermissionStore, StoreError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Seed the configured groups into the store.
///
/// Meant to be called from the host application's startup or migration sequence. It can be run
/// again at any time and converges the store to the current configuration. Returns `None` when
/// there is no configuration.
///
/// Runs must not overlap, no locking happens here.
pub fn seed_defaults<C, S>(
    loader: &ConfigLoader<C>,
    store: &mut S,
) -> Result<Option<ReconcileReport>, BootstrapError>
where
    C: ConfigSource,
    S: GroupStore + PermissionStore,
{
    let Some(config) = loader.get()? else {
        debug!("no group configuration present, nothing to seed");
        return Ok(None);
    };

    if config.is_empty() {
        debug!("group configuration is empty, nothing to seed");
        return Ok(None);
    }

    let report = Reconciler::new(&config, store).reconcile()?;
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::config::{ConfigLoader, ConfigTree, GroupsConfig, StaticConfig};
    use crate::memory::MemoryStore;
    use crate::test_utils::{FailingStore, save_group, setup_logging, staff_config};

    use super::{BootstrapError, seed_defaults};

    #[test]
    fn no_configuration_is_a_no_op() {
        setup_logging();

        let mut store = MemoryStore::new();
        save_group(&mut store, "stray", None);

        let loader = ConfigLoader::new(StaticConfig(None));
        assert_matches!(seed_defaults(&loader, &mut store), Ok(None));

        let empty = GroupsConfig::new(ConfigTree::new())
            .unwrap()
            .with_root_groups_only(true);
        let loader = ConfigLoader::new(StaticConfig(Some(empty)));
        assert_matches!(seed_defaults(&loader, &mut store), Ok(None));

        assert_eq!(store.group_count(), 1);
    }

    #[test]
    fn seeds_configured_groups() {
        let mut store = MemoryStore::new();
        let loader = ConfigLoader::new(StaticConfig(Some(staff_config(true, true))));

        let report = seed_defaults(&loader, &mut store).unwrap().unwrap();

        assert_eq!(report.groups_created, 2);
        assert_eq!(store.group_count(), 2);
    }

    #[test]
    fn store_failures_are_surfaced() {
        let mut store = FailingStore::new(MemoryStore::new(), "editors");
        let loader = ConfigLoader::new(StaticConfig(Some(staff_config(false, false))));

        assert_matches!(
            seed_defaults(&loader, &mut store),
            Err(BootstrapError::Store(_))
        );
    }
}
