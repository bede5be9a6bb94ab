// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protection of the built-in administrator group.
use tracing::{debug, info};

use crate::config::{ADMIN_PERMISSION, DEFAULT_ADMIN_GROUP};
use crate::query::PolicyQuery;
use crate::store::{GroupStore, PermissionStore, StoreError};

/// Decides after reconciliation whether the built-in administrator group can be removed.
///
/// The built-in group is only given up once the configuration declares a group granting `ADMIN`
/// and such a group, other than the built-in one, exists in the store. Configuring the built-in
/// code explicitly always keeps it.
#[derive(Debug)]
pub struct AdminGuard<'q, 'a> {
    query: &'q PolicyQuery<'a>,
}

impl<'q, 'a> AdminGuard<'q, 'a> {
    pub fn new(query: &'q PolicyQuery<'a>) -> Self {
        Self { query }
    }

    /// Returns `true` if the built-in administrator group was deleted.
    pub fn enforce<S>(&self, store: &mut S) -> Result<bool, StoreError>
    where
        S: GroupStore + PermissionStore,
    {
        if self.query.is_configured(DEFAULT_ADMIN_GROUP) {
            debug!("built-in administrator group is configured, keeping it");
            return Ok(false);
        }

        if self.query.transitive_admin_codes().is_empty() {
            return Ok(false);
        }

        let other_admin_groups =
            store.list_groups_granting_permission(ADMIN_PERMISSION, DEFAULT_ADMIN_GROUP)?;
        if other_admin_groups.is_empty() {
            debug!("no other administrator group exists yet, keeping the built-in one");
            return Ok(false);
        }

        let Some(default_admin) = store.find_by_code(DEFAULT_ADMIN_GROUP)? else {
            return Ok(false);
        };
        store.delete(&default_admin)?;

        let replacements: Vec<&str> = other_admin_groups
            .iter()
            .map(|group| group.code.as_str())
            .collect();
        info!(?replacements, "removed built-in administrator group");

        Ok(true)
    }
}
