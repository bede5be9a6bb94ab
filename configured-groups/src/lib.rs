// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converge a store of access-control groups towards a declarative group configuration.
//!
//! The configuration describes a tree of groups, each with a title, a set of permission codes
//! and nested child groups. [`seed_defaults`] writes this tree into a store implementing
//! [`GroupStore`] and [`PermissionStore`]: groups are created or updated by their code, declared
//! permissions are granted and, depending on the policy flags, records which are not configured
//! are pruned. The process is idempotent and meant to run at every application start.
//!
//! The same configuration answers policy questions for code handling groups at runtime:
//!
//! - [`PolicyQuery`] tells whether a group is configured, grants `ADMIN` or accepts ad-hoc
//!   children.
//! - [`ValidationGate`] rejects ad-hoc groups placed where the configuration does not allow
//!   them.
//! - [`AccessGate`] decides whether a group may be created, viewed or deleted by an actor.
//! - [`EditPolicy`] lists which fields of a group are editable and which parents can be chosen.
//!
//! ```
//! use configured_groups::{GroupsConfig, MemoryStore, Reconciler};
//!
//! let config = GroupsConfig::from_json_str(r#"{
//!     "root_groups_only": true,
//!     "groups": {
//!         "staff": {
//!             "title": "Staff",
//!             "permissions": ["CMS_ACCESS"],
//!             "children": { "editors": { "title": "Editors" } }
//!         }
//!     }
//! }"#).unwrap();
//!
//! let mut store = MemoryStore::new();
//! let report = Reconciler::new(&config, &mut store).reconcile().unwrap();
//! assert_eq!(report.groups_created, 2);
//! ```
mod access;
mod admin;
mod bootstrap;
pub mod config;
mod edit;
#[cfg(feature = "memory")]
mod memory;
mod query;
mod reconcile;
pub mod store;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod validation;

pub use access::{AccessDecision, AccessGate, Actor};
pub use admin::AdminGuard;
pub use bootstrap::{BootstrapError, seed_defaults};
pub use config::{
    ADMIN_PERMISSION, ConfigError, ConfigLoader, ConfigNode, ConfigSource, ConfigTree,
    DEFAULT_ADMIN_GROUP, GroupsConfig, JsonFile, StaticConfig,
};
pub use edit::{
    BREADCRUMB_SEPARATOR, EditConstraints, EditPolicy, FieldState, ParentField, ParentOption,
};
#[cfg(feature = "memory")]
pub use memory::{InnerMemoryStore, MemoryStore};
pub use query::PolicyQuery;
pub use reconcile::{ReconcileReport, Reconciler};
pub use store::{GroupId, GroupRecord, GroupStore, PermissionGrant, PermissionStore, StoreError};
pub use validation::{PARENT_FIELD, ValidationError, ValidationGate, ValidationResult};
