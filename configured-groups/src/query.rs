// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only policy questions answered from the group configuration.
use std::collections::HashMap;

use crate::config::{ADMIN_PERMISSION, ConfigNode, GroupsConfig};

/// Policy queries over a loaded [`GroupsConfig`].
///
/// Lookups by code ignore the position of a node in the tree, codes are unique across the whole
/// configuration. The query never mutates anything and can be shared between threads.
#[derive(Clone, Debug)]
pub struct PolicyQuery<'a> {
    config: &'a GroupsConfig,

    /// All nodes, depth-first with parents before children.
    nodes: Vec<&'a ConfigNode>,

    by_code: HashMap<&'a str, &'a ConfigNode>,
}

impl<'a> PolicyQuery<'a> {
    pub fn new(config: &'a GroupsConfig) -> Self {
        let nodes = config.groups.flatten();
        let mut by_code = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            by_code.entry(node.code.as_str()).or_insert(*node);
        }
        Self {
            config,
            nodes,
            by_code,
        }
    }

    pub fn config(&self) -> &'a GroupsConfig {
        self.config
    }

    pub fn root_groups_only(&self) -> bool {
        self.config.root_groups_only
    }

    pub fn permissions_only(&self) -> bool {
        self.config.permissions_only
    }

    /// Returns `true` if the code appears anywhere in the configured tree.
    pub fn is_configured(&self, code: &str) -> bool {
        !code.is_empty() && self.by_code.contains_key(code)
    }

    /// Configuration of the group with the given code.
    pub fn config_of(&self, code: &str) -> Option<&'a ConfigNode> {
        self.by_code.get(code).copied()
    }

    /// Codes of all configured groups, parents before their children.
    pub fn all_codes(&self) -> Vec<&'a str> {
        self.nodes.iter().map(|&node| node.code.as_str()).collect()
    }

    /// Codes of configured groups which accept ad-hoc groups as children.
    pub fn allows_new_children_codes(&self) -> Vec<&'a str> {
        self.codes_where(|node| !node.children_only)
    }

    /// Codes of configured groups which only accept their declared children.
    pub fn disallows_new_children_codes(&self) -> Vec<&'a str> {
        self.codes_where(|node| node.children_only)
    }

    /// Returns `true` if the configured group itself holds the permission.
    pub fn is_permitted(&self, permission: &str, code: &str) -> bool {
        self.config_of(code)
            .is_some_and(|node| node.permissions.contains(permission))
    }

    /// Returns `true` if the configured group itself grants `ADMIN`.
    pub fn is_admin_granting(&self, code: &str) -> bool {
        self.is_permitted(ADMIN_PERMISSION, code)
    }

    /// Codes of configured groups directly granting `ADMIN`.
    pub fn all_admin_codes(&self) -> Vec<&'a str> {
        self.codes_where(|node| node.permissions.contains(ADMIN_PERMISSION))
    }

    /// Codes of configured groups where the group or any of its descendants grants `ADMIN`.
    pub fn transitive_admin_codes(&self) -> Vec<&'a str> {
        self.codes_where(|node| node.subtree_grants(ADMIN_PERMISSION))
    }

    pub fn is_children_only(&self, code: &str) -> bool {
        self.config_of(code).is_some_and(|node| node.children_only)
    }

    pub fn is_hidden(&self, code: &str) -> bool {
        self.config_of(code).is_some_and(|node| node.hidden)
    }

    /// Returns `true` when groups can only be managed through the configuration: root groups are
    /// restricted and no configured group accepts ad-hoc children.
    pub fn groups_only_mode(&self) -> bool {
        self.root_groups_only() && self.allows_new_children_codes().is_empty()
    }

    fn codes_where<F>(&self, predicate: F) -> Vec<&'a str>
    where
        F: Fn(&ConfigNode) -> bool,
    {
        self.nodes
            .iter()
            .copied()
            .filter(|&node| predicate(node))
            .map(|node| node.code.as_str())
            .collect()
    }
}
