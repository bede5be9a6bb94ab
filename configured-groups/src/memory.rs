// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for group records and permission grants.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::store::{GroupId, GroupRecord, GroupStore, PermissionGrant, PermissionStore, StoreError};

#[derive(Clone, Debug, Default)]
pub struct InnerMemoryStore {
    next_id: GroupId,
    groups: BTreeMap<GroupId, GroupRecord>,
    grants: BTreeSet<PermissionGrant>,
}

impl InnerMemoryStore {
    fn descendants(&self, id: GroupId) -> Vec<GroupId> {
        let mut found = Vec::new();
        let mut queue = vec![id];
        while let Some(parent) = queue.pop() {
            for (child_id, child) in &self.groups {
                if child.parent_id == Some(parent) && !found.contains(child_id) && *child_id != id
                {
                    found.push(*child_id);
                    queue.push(*child_id);
                }
            }
        }
        found
    }

    fn remove_group(&mut self, id: GroupId) {
        self.groups.remove(&id);
        self.grants.retain(|grant| grant.group_id != id);
    }
}

/// An in-memory store for group records and their permission grants.
///
/// `MemoryStore` can be shared between threads by wrapping an `InnerMemoryStore` with an `RwLock`
/// and `Arc`, clones refer to the same underlying data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }

    /// Number of persisted groups.
    pub fn group_count(&self) -> usize {
        self.read_store().groups.len()
    }

    /// Number of persisted grants.
    pub fn grant_count(&self) -> usize {
        self.read_store().grants.len()
    }

    /// Permission codes granted to the group with the given code, sorted.
    pub fn permissions_of(&self, code: &str) -> Vec<String> {
        let store = self.read_store();
        let Some(id) = store
            .groups
            .values()
            .find(|group| group.code == code)
            .and_then(|group| group.id)
        else {
            return Vec::new();
        };
        store
            .grants
            .iter()
            .filter(|grant| grant.group_id == id)
            .map(|grant| grant.code.clone())
            .collect()
    }
}

impl GroupStore for MemoryStore {
    fn find_by_code(&self, code: &str) -> Result<Option<GroupRecord>, StoreError> {
        Ok(self
            .read_store()
            .groups
            .values()
            .find(|group| group.code == code)
            .cloned())
    }

    fn find_by_id(&self, id: GroupId) -> Result<Option<GroupRecord>, StoreError> {
        Ok(self.read_store().groups.get(&id).cloned())
    }

    fn save(&mut self, mut record: GroupRecord) -> Result<GroupRecord, StoreError> {
        let mut store = self.write_store();
        let id = match record.id {
            Some(id) => id,
            None => {
                store.next_id += 1;
                store.next_id
            }
        };
        if record.parent_id == Some(id) {
            return Err(StoreError::Write(format!(
                "group {} can not be its own parent",
                record.code
            )));
        }
        record.id = Some(id);
        store.groups.insert(id, record.clone());
        Ok(record)
    }

    fn delete(&mut self, record: &GroupRecord) -> Result<(), StoreError> {
        let Some(id) = record.id else {
            return Ok(());
        };
        let mut store = self.write_store();
        for descendant in store.descendants(id) {
            store.remove_group(descendant);
        }
        store.remove_group(id);
        Ok(())
    }

    fn list_children(&self, parent_id: GroupId) -> Result<Vec<GroupRecord>, StoreError> {
        Ok(self
            .read_store()
            .groups
            .values()
            .filter(|group| group.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    fn list_roots(&self, excluding_code: &str) -> Result<Vec<GroupRecord>, StoreError> {
        Ok(self
            .read_store()
            .groups
            .values()
            .filter(|group| group.is_root() && group.code != excluding_code)
            .cloned()
            .collect())
    }

    fn list_all(&self) -> Result<Vec<GroupRecord>, StoreError> {
        Ok(self.read_store().groups.values().cloned().collect())
    }
}

impl PermissionStore for MemoryStore {
    fn grant(&mut self, group_id: GroupId, code: &str) -> Result<PermissionGrant, StoreError> {
        let mut store = self.write_store();
        if !store.groups.contains_key(&group_id) {
            return Err(StoreError::Write(format!("unknown group {group_id}")));
        }
        let grant = PermissionGrant {
            group_id,
            code: code.to_owned(),
        };
        store.grants.insert(grant.clone());
        Ok(grant)
    }

    fn list_for_group(&self, group_id: GroupId) -> Result<Vec<PermissionGrant>, StoreError> {
        Ok(self
            .read_store()
            .grants
            .iter()
            .filter(|grant| grant.group_id == group_id)
            .cloned()
            .collect())
    }

    fn delete_grant(&mut self, grant: &PermissionGrant) -> Result<(), StoreError> {
        self.write_store().grants.remove(grant);
        Ok(())
    }

    fn list_groups_granting_permission(
        &self,
        code: &str,
        excluding_code: &str,
    ) -> Result<Vec<GroupRecord>, StoreError> {
        let store = self.read_store();
        let mut group_ids: Vec<GroupId> = store
            .grants
            .iter()
            .filter(|grant| grant.code == code)
            .map(|grant| grant.group_id)
            .collect();
        group_ids.dedup();
        Ok(group_ids
            .into_iter()
            .filter_map(|id| store.groups.get(&id))
            .filter(|group| group.code != excluding_code)
            .cloned()
            .collect())
    }
}
