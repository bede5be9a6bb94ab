// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converge the group store towards the configured group tree.
//!
//! Reconciliation walks the configured tree depth-first. For every node it creates or updates
//! the group record with the node's code, synchronises the permission grants and then descends
//! into the children with the id of the just written record as their parent. Records which are
//! not part of the configuration are pruned in two places only, once the whole tree was written:
//!
//! 1. Below groups marked as "children only", every child which is not configured is deleted.
//! 2. At the root level, when `root_groups_only` is set, every group which is not configured is
//!    deleted. The built-in administrator group is exempt from this.
//!
//! Deleting a group deletes its descendants. Pruning only starts after every configured group
//! sits below its configured parent, so no configured group is inside a pruned subtree.
//!
//! Finally the [`AdminGuard`] decides whether the built-in administrator group is still needed.
//!
//! Running the reconciliation twice against the same configuration leaves the store unchanged
//! the second time. Writes are not wrapped in a transaction, a failing write aborts the run and
//! everything reconciled before it stays committed.
use tracing::{debug, info, trace};

use crate::admin::AdminGuard;
use crate::config::{ConfigNode, ConfigTree, DEFAULT_ADMIN_GROUP, GroupsConfig};
use crate::query::PolicyQuery;
use crate::store::{GroupId, GroupRecord, GroupStore, PermissionStore, StoreError};


/// Changes applied to the store by one reconciliation run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub groups_created: usize,
    pub groups_updated: usize,
    pub groups_deleted: usize,
    pub grants_added: usize,
    pub grants_revoked: usize,
    pub admin_group_removed: bool,
}

/// Writes the configured group tree into a store.
#[derive(Debug)]
pub struct Reconciler<'a, S> {
    query: PolicyQuery<'a>,
    store: &'a mut S,
    report: ReconcileReport,
}

impl<'a, S> Reconciler<'a, S>
where
    S: GroupStore + PermissionStore,
{
    pub fn new(config: &'a GroupsConfig, store: &'a mut S) -> Self {
        Self {
            query: PolicyQuery::new(config),
            store,
            report: ReconcileReport::default(),
        }
    }

    /// Reconcile the whole configured tree, prune stray root groups and run the admin guard.
    pub fn reconcile(mut self) -> Result<ReconcileReport, StoreError> {
        let config = self.query.config();

        self.reconcile_tree(&config.groups, None)?;

        for node in config.groups.flatten() {
            if node.children_only {
                self.prune_children(node)?;
            }
        }

        if self.query.root_groups_only() {
            self.prune_roots()?;
        }

        self.report.admin_group_removed = AdminGuard::new(&self.query).enforce(self.store)?;

        info!(
            created = self.report.groups_created,
            updated = self.report.groups_updated,
            deleted = self.report.groups_deleted,
            granted = self.report.grants_added,
            revoked = self.report.grants_revoked,
            admin_group_removed = self.report.admin_group_removed,
            "reconciled configured groups"
        );

        Ok(self.report)
    }

    fn reconcile_tree(
        &mut self,
        tree: &ConfigTree,
        parent_id: Option<GroupId>,
    ) -> Result<(), StoreError> {
        for node in tree {
            self.reconcile_node(node, parent_id)?;
        }
        Ok(())
    }

    fn reconcile_node(
        &mut self,
        node: &ConfigNode,
        parent_id: Option<GroupId>,
    ) -> Result<(), StoreError> {
        let (mut record, is_new) = match self.store.find_by_code(&node.code)? {
            Some(record) => (record, false),
            None => (self.store.create(&node.code), true),
        };

        record.title = node.title.clone();
        record.description = node.description.clone();
        record.sort = node.sort;
        record.parent_id = parent_id;

        let record = self.store.save(record)?;
        let group_id = record
            .id
            .ok_or_else(|| StoreError::Write(format!("no id assigned to group {}", node.code)))?;

        if is_new {
            debug!(code = %node.code, id = group_id, "created configured group");
            self.report.groups_created += 1;
        } else {
            trace!(code = %node.code, id = group_id, "updated configured group");
            self.report.groups_updated += 1;
        }

        self.sync_permissions(node, group_id)?;
        self.reconcile_tree(&node.children, Some(group_id))

    }

    fn sync_permissions(&mut self, node: &ConfigNode, group_id: GroupId) -> Result<(), StoreError> {
        let existing = self.store.list_for_group(group_id)?;

        if self.query.permissions_only() {
            for grant in existing
                .iter()
                .filter(|grant| !node.permissions.contains(&grant.code))
            {
                self.store.delete_grant(grant)?;
                debug!(code = %node.code, permission = %grant.code, "revoked unconfigured permission");
                self.report.grants_revoked += 1;
            }
        }

        for permission in &node.permissions {
            if existing.iter().any(|grant| &grant.code == permission) {
                continue;
            }
            self.store.grant(group_id, permission)?;
            debug!(code = %node.code, %permission, "granted configured permission");
            self.report.grants_added += 1;
        }

        Ok(())
    }

    /// Delete children of a "children only" group which are not configured.
    ///
    /// Only the immediate children are inspected. A configured group declared under another
    /// parent has already been moved there.
    fn prune_children(&mut self, node: &ConfigNode) -> Result<(), StoreError> {
        let Some(group_id) = self.store.find_by_code(&node.code)?.and_then(|record| record.id)
        else {
            return Ok(());
        };
        for child in self.store.list_children(group_id)? {
            if node.children.contains(&child.code) || self.query.is_configured(&child.code) {
                continue;
            }
            self.delete_group(&child, "pruned unconfigured child group")?;
        }
        Ok(())
    }

    fn prune_roots(&mut self) -> Result<(), StoreError> {
        for root in self.store.list_roots(DEFAULT_ADMIN_GROUP)? {
            if self.query.is_configured(&root.code) {
                continue;
            }
            self.delete_group(&root, "pruned unconfigured root group")?;
        }
        Ok(())
    }

    fn delete_group(&mut self, record: &GroupRecord, reason: &str) -> Result<(), StoreError> {
        self.store.delete(record)?;
        debug!(code = %record.code, id = ?record.id, "{reason}");
        self.report.groups_deleted += 1;
        Ok(())
    }
}
