// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the persistence layer holding group records and permission grants.
//!
//! Reconciliation only ever talks to the store through these traits, the storage engine itself
//! lives outside of this crate. An in-memory implementation is provided in
//! [`MemoryStore`](crate::MemoryStore).
use thiserror::Error;

/// Identifier assigned to a group record by the store.
pub type GroupId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed reading from group store: {0}")]
    Read(String),

    #[error("failed writing to group store: {0}")]
    Write(String),
}

/// A persisted group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRecord {
    /// `None` until the record was saved for the first time.
    pub id: Option<GroupId>,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub sort: Option<i64>,

    /// `None` for groups at the root level.
    pub parent_id: Option<GroupId>,
}

impl GroupRecord {
    /// New, not yet persisted record shell.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            title: String::new(),
            description: None,
            sort: None,
            parent_id: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Association between a group and a permission code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermissionGrant {
    pub group_id: GroupId,
    pub code: String,
}

/// Read and write access to group records.
pub trait GroupStore {
    /// Get the group with the given code.
    fn find_by_code(&self, code: &str) -> Result<Option<GroupRecord>, StoreError>;

    /// Get the group with the given id.
    fn find_by_id(&self, id: GroupId) -> Result<Option<GroupRecord>, StoreError>;

    /// Create a new record shell for the given code.
    ///
    /// Nothing is persisted until the record is passed to [`GroupStore::save`].
    fn create(&self, code: &str) -> GroupRecord {
        GroupRecord::new(code)
    }

    /// Insert or update a record, returning it with its assigned id.
    fn save(&mut self, record: GroupRecord) -> Result<GroupRecord, StoreError>;

    /// Delete a record.
    ///
    /// Implementations are expected to remove the group's permission grants and all of its
    /// descendant groups with it.
    fn delete(&mut self, record: &GroupRecord) -> Result<(), StoreError>;

    /// All groups whose parent is the given group.
    fn list_children(&self, parent_id: GroupId) -> Result<Vec<GroupRecord>, StoreError>;

    /// All root-level groups except the one with the given code.
    fn list_roots(&self, excluding_code: &str) -> Result<Vec<GroupRecord>, StoreError>;

    /// All groups in the store.
    fn list_all(&self) -> Result<Vec<GroupRecord>, StoreError>;
}

/// Read and write access to permission grants.
pub trait PermissionStore {
    /// Grant a permission to a group.
    fn grant(&mut self, group_id: GroupId, code: &str) -> Result<PermissionGrant, StoreError>;

    /// All grants held by the given group.
    fn list_for_group(&self, group_id: GroupId) -> Result<Vec<PermissionGrant>, StoreError>;

    /// Remove a grant.
    fn delete_grant(&mut self, grant: &PermissionGrant) -> Result<(), StoreError>;

    /// All groups holding a grant for the permission, except the group with the given code.
    fn list_groups_granting_permission(
        &self,
        code: &str,
        excluding_code: &str,
    ) -> Result<Vec<GroupRecord>, StoreError>;
}

/// Walks up the parents of a group and joins their titles, root first.
pub fn breadcrumbs<S>(store: &S, record: &GroupRecord, separator: &str) -> Result<String, StoreError>
where
    S: GroupStore,
{
    let mut titles = vec![record.title.clone()];
    let mut visited = vec![record.id];
    let mut parent_id = record.parent_id;
    while let Some(id) = parent_id {
        // Stop on cyclic parent chains.
        if visited.contains(&Some(id)) {
            break;
        }
        visited.push(Some(id));
        match store.find_by_id(id)? {
            Some(parent) => {
                titles.push(parent.title);
                parent_id = parent.parent_id;
            }
            None => break,
        }
    }
    titles.reverse();
    Ok(titles.join(separator))
}
