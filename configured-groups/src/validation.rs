// SPDX-License-Identifier: MIT OR Apache-2.0

//! Placement rules for groups created or edited by hand.
use thiserror::Error;

use crate::query::PolicyQuery;
use crate::store::{GroupRecord, GroupStore, StoreError};

/// Name of the form field holding a group's parent.
pub const PARENT_FIELD: &str = "parent_id";

/// User-facing reasons for rejecting a group.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Groups must be managed via configuration only.")]
    ConfigurationOnly,

    #[error("You must select a valid parent group.")]
    InvalidParent,
}

impl ValidationError {
    /// Form field the error belongs to, `None` for errors concerning the whole group.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::ConfigurationOnly => None,
            ValidationError::InvalidParent => Some(PARENT_FIELD),
        }
    }
}

/// Collected validation errors. Rejections are reported here, never as `Err`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Human readable messages of all errors.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Checks where an ad-hoc group may be placed. Configured groups are owned by the configuration
/// and pass without further checks.
#[derive(Clone, Copy, Debug)]
pub struct ValidationGate<'q, 'a> {
    query: &'q PolicyQuery<'a>,
}

impl<'q, 'a> ValidationGate<'q, 'a> {
    pub fn new(query: &'q PolicyQuery<'a>) -> Self {
        Self { query }
    }

    /// Validate a group which is about to be persisted, given its resolved parent.
    pub fn validate(&self, group: &GroupRecord, parent: Option<&GroupRecord>) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.query.is_configured(&group.code) {
            return result;
        }

        if self.query.groups_only_mode() {
            result.add_error(ValidationError::ConfigurationOnly);
            return result;
        }

        match parent {
            Some(parent) => {
                if self.query.is_children_only(&parent.code) {
                    result.add_error(ValidationError::InvalidParent);
                }
            }
            None => {
                if self.query.root_groups_only() {
                    result.add_error(ValidationError::InvalidParent);
                }
            }
        }

        result
    }

    /// Validate a group, looking up its parent in the store.
    ///
    /// A parent id pointing to a group which does not exist counts as having no parent.
    pub fn validate_in_store<S>(
        &self,
        store: &S,
        group: &GroupRecord,
    ) -> Result<ValidationResult, StoreError>
    where
        S: GroupStore,
    {
        let parent = match group.parent_id {
            Some(parent_id) => store.find_by_id(parent_id)?,
            None => None,
        };
        Ok(self.validate(group, parent.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::config::{ConfigNode, ConfigTree, GroupsConfig};
    use crate::memory::MemoryStore;
    use crate::query::PolicyQuery;
    use crate::store::GroupRecord;
    use crate::test_utils::save_group;

    use super::{PARENT_FIELD, ValidationError, ValidationGate};

    fn config(root_groups_only: bool) -> GroupsConfig {
        let tree = ConfigTree::new().with(
            ConfigNode::new("staff", "Staff")
                .with_child(ConfigNode::new("editors", "Editors").children_only()),
        );
        GroupsConfig::new(tree)
            .unwrap()
            .with_root_groups_only(root_groups_only)
    }

    #[rstest]
    #[case(true, None, Some(ValidationError::InvalidParent))]
    #[case(false, None, None)]
    #[case(true, Some("editors"), Some(ValidationError::InvalidParent))]
    #[case(true, Some("staff"), None)]
    #[case(false, Some("ad_hoc_parent"), None)]
    fn ad_hoc_group_placement(
        #[case] root_groups_only: bool,
        #[case] parent: Option<&str>,
        #[case] expected: Option<ValidationError>,
    ) {
        let config = config(root_groups_only);
        let query = PolicyQuery::new(&config);
        let parent = parent.map(GroupRecord::new);

        let result = ValidationGate::new(&query).validate(&GroupRecord::new("ad_hoc"), parent.as_ref());

        assert_eq!(result.errors().first(), expected.as_ref());
    }

    #[test]
    fn configured_groups_always_pass() {
        let config = config(true);
        let query = PolicyQuery::new(&config);

        let result = ValidationGate::new(&query).validate(&GroupRecord::new("staff"), None);
        assert!(result.is_valid());
    }

    #[test]
    fn groups_only_mode_rejects_everything_else() {
        let tree = ConfigTree::new().with(ConfigNode::new("staff", "Staff").children_only());
        let config = GroupsConfig::new(tree).unwrap().with_root_groups_only(true);
        let query = PolicyQuery::new(&config);

        let result = ValidationGate::new(&query).validate(&GroupRecord::new("ad_hoc"), None);

        assert_eq!(result.errors(), &[ValidationError::ConfigurationOnly]);
        assert_eq!(
            result.messages(),
            vec!["Groups must be managed via configuration only.".to_string()]
        );
        assert_eq!(result.errors()[0].field(), None);
    }

    #[test]
    fn parent_is_resolved_from_store() {
        let config = config(true);
        let query = PolicyQuery::new(&config);
        let mut store = MemoryStore::new();
        let editors = save_group(&mut store, "editors", None);

        let mut group = GroupRecord::new("ad_hoc");
        group.parent_id = editors.id;

        let result = ValidationGate::new(&query)
            .validate_in_store(&store, &group)
            .unwrap();

        assert_eq!(result.errors(), &[ValidationError::InvalidParent]);
        assert_eq!(result.errors()[0].field(), Some(PARENT_FIELD));
        assert_eq!(
            result.messages(),
            vec!["You must select a valid parent group.".to_string()]
        );
    }
}
