// SPDX-License-Identifier: MIT OR Apache-2.0

//! Which parts of a group may be edited by hand.
//!
//! Configured groups are owned by the configuration, their fields are shown read-only. Ad-hoc
//! groups are editable but may only be placed below parents accepting new children.
use crate::access::{AccessGate, Actor};
use crate::query::PolicyQuery;
use crate::store::{GroupId, GroupRecord, GroupStore, StoreError, breadcrumbs};

pub const BREADCRUMB_SEPARATOR: &str = " » ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldState {
    Editable,
    ReadOnly,
    Hidden,
}

/// A group which can be selected as parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentOption {
    pub id: GroupId,

    /// Titles from the root down to the group, joined by [`BREADCRUMB_SEPARATOR`].
    pub breadcrumbs: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParentField {
    Hidden,
    ReadOnly { breadcrumbs: String },
    Choice {
        options: Vec<ParentOption>,
        /// Whether "no parent" may be selected.
        allow_empty: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditConstraints {
    pub title: FieldState,
    pub description: FieldState,
    pub parent: ParentField,
    pub permissions: FieldState,
}

#[derive(Clone, Copy, Debug)]
pub struct EditPolicy<'q, 'a> {
    query: &'q PolicyQuery<'a>,
}

impl<'q, 'a> EditPolicy<'q, 'a> {
    pub fn new(query: &'q PolicyQuery<'a>) -> Self {
        Self { query }
    }

    pub fn constraints<S, A>(
        &self,
        store: &S,
        group: &GroupRecord,
        actor: Option<&A>,
    ) -> Result<EditConstraints, StoreError>
    where
        S: GroupStore,
        A: Actor,
    {
        if !self.query.is_configured(&group.code) {
            let options = self.parent_options(store, group, actor)?;
            let parent = if options.is_empty() {
                ParentField::Hidden
            } else {
                ParentField::Choice {
                    options,
                    allow_empty: !self.query.root_groups_only(),
                }
            };
            return Ok(EditConstraints {
                title: FieldState::Editable,
                description: FieldState::Editable,
                parent,
                permissions: FieldState::Editable,
            });
        }

        let description = match group.description.as_deref() {
            None | Some("") => FieldState::Hidden,
            Some(_) => FieldState::ReadOnly,
        };

        let parent = match group.parent_id {
            Some(parent_id) => match store.find_by_id(parent_id)? {
                Some(parent) => ParentField::ReadOnly {
                    breadcrumbs: breadcrumbs(store, &parent, BREADCRUMB_SEPARATOR)?,
                },
                None => ParentField::Hidden,
            },
            None => ParentField::Hidden,
        };

        let permissions = if self.query.permissions_only() {
            FieldState::ReadOnly
        } else {
            FieldState::Editable
        };

        Ok(EditConstraints {
            title: FieldState::ReadOnly,
            description,
            parent,
            permissions,
        })
    }

    /// Groups the given group may be moved below.
    ///
    /// Excludes the group itself, groups which only accept their configured children and groups
    /// the actor can not view. Nothing can be selected when groups are managed via configuration
    /// only.
    pub fn parent_options<S, A>(
        &self,
        store: &S,
        group: &GroupRecord,
        actor: Option<&A>,
    ) -> Result<Vec<ParentOption>, StoreError>
    where
        S: GroupStore,
        A: Actor,
    {
        if self.query.groups_only_mode() {
            return Ok(Vec::new());
        }

        let access = AccessGate::new(self.query);
        let default_view = actor.is_some_and(|actor| actor.has_admin_area_access());

        let mut options = Vec::new();
        for candidate in store.list_all()? {
            let Some(id) = candidate.id else {
                continue;
            };
            if group.id == Some(id) || self.query.is_children_only(&candidate.code) {
                continue;
            }
            if !access.can_view(&candidate, actor).or(default_view) {
                continue;
            }
            options.push(ParentOption {
                id,
                breadcrumbs: breadcrumbs(store, &candidate, BREADCRUMB_SEPARATOR)?,
            });
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigNode, ConfigTree, GroupsConfig};
    use crate::memory::MemoryStore;
    use crate::query::PolicyQuery;
    use crate::store::GroupStore;
    use crate::test_utils::{TestActor, save_group};

    use super::{EditPolicy, FieldState, ParentField};

    fn config(root_groups_only: bool, permissions_only: bool) -> GroupsConfig {
        let tree = ConfigTree::new().with(
            ConfigNode::new("staff", "Staff")
                .with_child(ConfigNode::new("editors", "Editors").children_only())
                .with_child(ConfigNode::new("board", "Board").hidden()),
        );
        GroupsConfig::new(tree)
            .unwrap()
            .with_root_groups_only(root_groups_only)
            .with_permissions_only(permissions_only)
    }

    #[test]
    fn configured_group_fields_are_read_only() {
        let config = config(false, true);
        let query = PolicyQuery::new(&config);
        let mut store = MemoryStore::new();
        let staff = save_group(&mut store, "staff", None);
        let mut editors = save_group(&mut store, "editors", staff.id);
        editors.description = Some("Edit all the things".into());
        let editors = store.save(editors).unwrap();

        let constraints = EditPolicy::new(&query)
            .constraints::<_, TestActor>(&store, &editors, None)
            .unwrap();

        assert_eq!(constraints.title, FieldState::ReadOnly);
        assert_eq!(constraints.description, FieldState::ReadOnly);
        assert_eq!(constraints.permissions, FieldState::ReadOnly);
        assert_eq!(
            constraints.parent,
            ParentField::ReadOnly {
                breadcrumbs: "STAFF".into()
            }
        );

        let constraints = EditPolicy::new(&query)
            .constraints::<_, TestActor>(&store, &staff, None)
            .unwrap();
        assert_eq!(constraints.description, FieldState::Hidden);
        assert_eq!(constraints.parent, ParentField::Hidden);
    }

    #[test]
    fn ad_hoc_group_chooses_among_open_parents() {
        let config = config(true, false);
        let query = PolicyQuery::new(&config);
        let mut store = MemoryStore::new();
        let staff = save_group(&mut store, "staff", None);
        save_group(&mut store, "editors", staff.id);
        save_group(&mut store, "board", staff.id);
        let authors = save_group(&mut store, "authors", staff.id);
        let ad_hoc = save_group(&mut store, "ad_hoc", authors.id);

        let actor = TestActor::default().with_admin_area();
        let constraints = EditPolicy::new(&query)
            .constraints(&store, &ad_hoc, Some(&actor))
            .unwrap();

        assert_eq!(constraints.title, FieldState::Editable);
        let ParentField::Choice {
            options,
            allow_empty,
        } = constraints.parent
        else {
            panic!("expected parent choice");
        };
        assert!(!allow_empty);

        // "editors" only accepts configured children, "board" is hidden from non-members and
        // "ad_hoc" can not be its own parent.
        let breadcrumbs: Vec<&str> = options.iter().map(|o| o.breadcrumbs.as_str()).collect();
        assert_eq!(breadcrumbs, vec!["STAFF", "STAFF » AUTHORS"]);
    }

    #[test]
    fn no_parent_options_in_groups_only_mode() {
        let tree = ConfigTree::new().with(ConfigNode::new("staff", "Staff").children_only());
        let config = GroupsConfig::new(tree).unwrap().with_root_groups_only(true);
        let query = PolicyQuery::new(&config);
        let mut store = MemoryStore::new();
        save_group(&mut store, "staff", None);
        let ad_hoc = save_group(&mut store, "ad_hoc", None);

        let actor = TestActor::default().with_admin_area();
        let constraints = EditPolicy::new(&query)
            .constraints(&store, &ad_hoc, Some(&actor))
            .unwrap();

        assert_eq!(constraints.parent, ParentField::Hidden);
    }
}
