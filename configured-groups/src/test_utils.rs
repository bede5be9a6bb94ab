// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
use std::collections::HashSet;

use crate::access::Actor;
use crate::config::{ConfigNode, ConfigTree, GroupsConfig};
use crate::memory::MemoryStore;
use crate::store::{
    GroupId, GroupRecord, GroupStore, PermissionGrant, PermissionStore, StoreError,
};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Persist a group with a title derived from its code.
pub fn save_group<S>(store: &mut S, code: &str, parent_id: Option<GroupId>) -> GroupRecord
where
    S: GroupStore,
{
    let mut record = store.create(code);
    record.title = code.to_uppercase();
    record.parent_id = parent_id;
    store.save(record).expect("save group in test store")
}

/// "staff" at the root accepting only its declared child "editors", which grants `ADMIN`.
pub fn staff_config(root_groups_only: bool, permissions_only: bool) -> GroupsConfig {
    let tree = ConfigTree::new().with(
        ConfigNode::new("staff", "Staff")
            .with_permission("CMS_ACCESS")
            .children_only()
            .with_child(ConfigNode::new("editors", "Editors").with_permission("ADMIN")),
    );
    GroupsConfig::new(tree)
        .expect("valid staff configuration")
        .with_root_groups_only(root_groups_only)
        .with_permissions_only(permissions_only)
}

/// Acting identity with a fixed set of direct group memberships.
#[derive(Clone, Debug, Default)]
pub struct TestActor {
    pub groups: HashSet<String>,
    pub admin_area: bool,
}

impl TestActor {
    pub fn member_of(codes: &[&str]) -> Self {
        Self {
            groups: codes.iter().map(|code| code.to_string()).collect(),
            admin_area: false,
        }
    }

    pub fn with_admin_area(mut self) -> Self {
        self.admin_area = true;
        self
    }
}

impl Actor for TestActor {
    fn is_member_of(&self, group: &GroupRecord) -> bool {
        self.groups.contains(&group.code)
    }

    fn has_admin_area_access(&self) -> bool {
        self.admin_area
    }
}

/// Memory store which fails every write touching the group with the given code.
#[derive(Clone, Debug)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_on: String,
}

impl FailingStore {
    pub fn new(inner: MemoryStore, fail_on: &str) -> Self {
        Self {
            inner,
            fail_on: fail_on.to_owned(),
        }
    }

    fn check(&self, code: &str) -> Result<(), StoreError> {
        if code == self.fail_on {
            return Err(StoreError::Write(format!("injected failure for {code}")));
        }
        Ok(())
    }

    fn check_id(&self, id: GroupId) -> Result<(), StoreError> {
        match self.inner.find_by_id(id)? {
            Some(record) => self.check(&record.code),
            None => Ok(()),
        }
    }
}

impl GroupStore for FailingStore {
    fn find_by_code(&self, code: &str) -> Result<Option<GroupRecord>, StoreError> {
        self.inner.find_by_code(code)
    }

    fn find_by_id(&self, id: GroupId) -> Result<Option<GroupRecord>, StoreError> {
        self.inner.find_by_id(id)
    }

    fn save(&mut self, record: GroupRecord) -> Result<GroupRecord, StoreError> {
        self.check(&record.code)?;
        self.inner.save(record)
    }

    fn delete(&mut self, record: &GroupRecord) -> Result<(), StoreError> {
        self.check(&record.code)?;
        self.inner.delete(record)
    }

    fn list_children(&self, parent_id: GroupId) -> Result<Vec<GroupRecord>, StoreError> {
        self.inner.list_children(parent_id)
    }

    fn list_roots(&self, excluding_code: &str) -> Result<Vec<GroupRecord>, StoreError> {
        self.inner.list_roots(excluding_code)
    }

    fn list_all(&self) -> Result<Vec<GroupRecord>, StoreError> {
        self.inner.list_all()
    }
}

impl PermissionStore for FailingStore {
    fn grant(&mut self, group_id: GroupId, code: &str) -> Result<PermissionGrant, StoreError> {
        self.check_id(group_id)?;
        self.inner.grant(group_id, code)
    }

    fn list_for_group(&self, group_id: GroupId) -> Result<Vec<PermissionGrant>, StoreError> {
        self.inner.list_for_group(group_id)
    }

    fn delete_grant(&mut self, grant: &PermissionGrant) -> Result<(), StoreError> {
        self.check_id(grant.group_id)?;
        self.inner.delete_grant(grant)
    }

    fn list_groups_granting_permission(
        &self,
        code: &str,
        excluding_code: &str,
    ) -> Result<Vec<GroupRecord>, StoreError> {
        self.inner
            .list_groups_granting_permission(code, excluding_code)
    }
}
