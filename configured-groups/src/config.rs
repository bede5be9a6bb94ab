// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative description of configured groups.
//!
//! A configuration is a tree of group nodes keyed by their code, plus two process-wide policy
//! flags. It is loaded once (see [`ConfigLoader`]) and only read afterwards.
use std::cell::Cell;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Permission code which receives special treatment: groups granting it are administrators.
pub const ADMIN_PERMISSION: &str = "ADMIN";

/// Code of the built-in administrator group seeded by the host application.
pub const DEFAULT_ADMIN_GROUP: &str = "administrators";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed group configuration: {0}")]
    Malformed(String),

    #[error("group code \"{0}\" is configured more than once")]
    DuplicateCode(String),

    #[error("could not read group configuration from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A single configured group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigNode {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub sort: Option<i64>,
    pub permissions: BTreeSet<String>,
    pub children: ConfigTree,

    /// Only declared children may exist below this group, any other child is pruned.
    pub children_only: bool,

    /// Only members of this group may view it.
    pub hidden: bool,
}

impl ConfigNode {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            description: None,
            sort: None,
            permissions: BTreeSet::new(),
            children: ConfigTree::default(),
            children_only: false,
            hidden: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children_only(mut self) -> Self {
        self.children_only = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Returns `true` if this node or any of its descendants grants the permission.
    pub fn subtree_grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
            || self
                .children
                .iter()
                .any(|child| child.subtree_grants(permission))
    }
}

/// Ordered mapping from group code to configured node.
///
/// Declaration order is kept, it determines the order in which groups are reconciled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigTree(Vec<ConfigNode>);

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node.
    ///
    /// Codes are not checked here, a sibling with the same code is kept and rejected once the
    /// tree is passed to [`GroupsConfig::new`].
    pub fn push(&mut self, node: ConfigNode) {
        self.0.push(node);
    }

    pub fn with(mut self, node: ConfigNode) -> Self {
        self.push(node);
        self
    }

    /// Direct child node with the given code.
    pub fn get(&self, code: &str) -> Option<&ConfigNode> {
        self.0.iter().find(|node| node.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigNode> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All nodes of the tree, depth-first with parents before their children and siblings in
    /// declaration order.
    pub fn flatten(&self) -> Vec<&ConfigNode> {
        let mut nodes = Vec::new();
        let mut stack: Vec<&ConfigNode> = self.0.iter().rev().collect();
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.children.0.iter().rev());
        }
        nodes
    }

    fn check_unique_codes(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for node in self.flatten() {
            if !seen.insert(node.code.as_str()) {
                return Err(ConfigError::DuplicateCode(node.code.clone()));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ConfigTree {
    type Item = &'a ConfigNode;
    type IntoIter = std::slice::Iter<'a, ConfigNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Process-wide group configuration: the group tree and the two global policy flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupsConfig {
    /// Only configured groups may exist at the root level.
    pub root_groups_only: bool,

    /// Configured groups may only hold their declared permissions.
    pub permissions_only: bool,

    pub groups: ConfigTree,
}

impl GroupsConfig {
    /// Creates a configuration after checking that every code is unique across the whole tree.
    pub fn new(groups: ConfigTree) -> Result<Self, ConfigError> {
        groups.check_unique_codes()?;
        Ok(Self {
            root_groups_only: false,
            permissions_only: false,
            groups,
        })
    }

    pub fn with_root_groups_only(mut self, enabled: bool) -> Self {
        self.root_groups_only = enabled;
        self
    }

    pub fn with_permissions_only(mut self, enabled: bool) -> Self {
        self.permissions_only = enabled;
        self
    }

    /// Builds the configuration from a JSON string.
    ///
    /// Unlike [`GroupsConfig::from_json_value`] this also catches a group code declared twice
    /// within the same mapping, which a parsed [`Value`] has already collapsed into one entry.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        check_unique_keys(json)?;
        let value: Value =
            serde_json::from_str(json).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        Self::from_json_value(value)
    }

    /// Builds the configuration from a JSON document.
    ///
    /// The document itself must be a mapping. Malformed group branches inside it are skipped
    /// with a warning, the rest of the tree is kept.
    pub fn from_json_value(value: Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::Malformed(format!(
                "expected a mapping, found {}",
                kind_of(&value)
            )));
        }
        let raw: RawConfig = serde_json::from_value(value)
            .map_err(|err| ConfigError::Malformed(err.to_string()))?;

        let groups = match raw.groups {
            Value::Null => ConfigTree::default(),
            Value::Object(map) => parse_tree(map, "/"),
            other => {
                warn!(found = %kind_of(&other), "ignoring groups, expected a mapping");
                ConfigTree::default()
            }
        };

        Ok(Self::new(groups)?
            .with_root_groups_only(raw.root_groups_only)
            .with_permissions_only(raw.permissions_only))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default, alias = "is_configured_root_groups_only")]
    root_groups_only: bool,

    #[serde(default, alias = "is_configured_permissions_only")]
    permissions_only: bool,

    #[serde(default, alias = "configured_groups")]
    groups: Value,
}

#[derive(Deserialize)]
struct RawNode {
    title: Option<String>,
    description: Option<String>,
    sort: Option<i64>,

    #[serde(default)]
    permissions: Value,

    #[serde(default)]
    children: Value,

    #[serde(default, alias = "is_configured_children_only")]
    children_only: bool,

    #[serde(default, alias = "is_hidden")]
    hidden: bool,
}

fn parse_tree(map: Map<String, Value>, path: &str) -> ConfigTree {
    let mut tree = ConfigTree::default();
    for (code, value) in map {
        if code.trim().is_empty() {
            warn!(path, "skipping group with empty code");
            continue;
        }
        let node_path = format!("{path}{code}/");
        if let Some(node) = parse_node(code, value, &node_path) {
            tree.push(node);
        }
    }
    tree
}

fn parse_node(code: String, value: Value, path: &str) -> Option<ConfigNode> {
    if !value.is_object() {
        warn!(path, found = %kind_of(&value), "skipping group, expected a mapping");
        return None;
    }
    let raw: RawNode = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path, %err, "skipping malformed group branch");
            return None;
        }
    };

    let permissions = match raw.permissions {
        Value::Null => BTreeSet::new(),
        Value::Array(values) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(permission) if !permission.is_empty() => Some(permission),
                other => {
                    warn!(path, found = %kind_of(&other), "ignoring invalid permission code");
                    None
                }
            })
            .collect(),
        other => {
            warn!(path, found = %kind_of(&other), "ignoring permissions, expected a list");
            BTreeSet::new()
        }
    };

    let children = match raw.children {
        Value::Null => ConfigTree::default(),
        Value::Object(map) => parse_tree(map, path),
        // An empty list is how "no children" is commonly written.
        Value::Array(values) if values.is_empty() => ConfigTree::default(),
        other => {
            warn!(path, found = %kind_of(&other), "ignoring children, expected a mapping");
            ConfigTree::default()
        }
    };

    debug!(path, "parsed configured group");

    Some(ConfigNode {
        title: raw.title.unwrap_or_else(|| code.clone()),
        code,
        description: raw.description,
        sort: raw.sort,
        permissions,
        children,
        children_only: raw.children_only,
        hidden: raw.hidden,
    })
}

/// Scans a JSON document for group mappings declaring the same code twice.
fn check_unique_keys(json: &str) -> Result<(), ConfigError> {
    let duplicate = Cell::new(None);
    let mut deserializer = serde_json::Deserializer::from_str(json);
    UniqueKeys {
        position: Position::Document,
        duplicate: &duplicate,
    }
    .deserialize(&mut deserializer)
    .map_err(|err| match duplicate.take() {
        Some(code) => ConfigError::DuplicateCode(code),
        None => ConfigError::Malformed(err.to_string()),
    })
}

/// Where a JSON value sits in the configuration document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    Document,
    /// Mapping from group code to group.
    Tree,
    Group,
    Other,
}

impl Position {
    fn of_value(self, key: &str) -> Position {
        match (self, key) {
            (Position::Document, "groups" | "configured_groups") => Position::Tree,
            (Position::Tree, _) => Position::Group,
            (Position::Group, "children") => Position::Tree,
            _ => Position::Other,
        }
    }
}

struct UniqueKeys<'c> {
    position: Position,
    duplicate: &'c Cell<Option<String>>,
}

impl<'de> DeserializeSeed<'de> for UniqueKeys<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for UniqueKeys<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON value")
    }

    fn visit_bool<E>(self, _: bool) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_i64<E>(self, _: i64) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_u64<E>(self, _: u64) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_f64<E>(self, _: f64) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_str<E>(self, _: &str) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_unit<E>(self) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq
            .next_element_seed(UniqueKeys {
                position: Position::Other,
                duplicate: self.duplicate,
            })?
            .is_some()
        {}
        Ok(())
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut codes = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if self.position == Position::Tree && !codes.insert(key.clone()) {
                let message = format!("group code \"{key}\" is declared twice");
                self.duplicate.set(Some(key));
                return Err(de::Error::custom(message));
            }
            map.next_value_seed(UniqueKeys {
                position: self.position.of_value(&key),
                duplicate: self.duplicate,
            })?;
        }
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Source of the process-wide group configuration.
pub trait ConfigSource {
    /// Load the configuration, `None` if there is none.
    fn load(&self) -> Result<Option<GroupsConfig>, ConfigError>;
}

/// Configuration read from a JSON file. A missing file means no configuration.
#[derive(Clone, Debug)]
pub struct JsonFile(pub PathBuf);

impl ConfigSource for JsonFile {
    fn load(&self) -> Result<Option<GroupsConfig>, ConfigError> {
        let json = match std::fs::read_to_string(&self.0) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.0.display(), "no group configuration file");
                return Ok(None);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.0.clone(),
                    source,
                });
            }
        };
        GroupsConfig::from_json_str(&json).map(Some)
    }
}

/// Configuration which is already in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticConfig(pub Option<GroupsConfig>);

impl ConfigSource for StaticConfig {
    fn load(&self) -> Result<Option<GroupsConfig>, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Loads the configuration from its source on first access and keeps it for the rest of the
/// process lifetime.
#[derive(Debug)]
pub struct ConfigLoader<S> {
    source: S,
    loaded: OnceLock<Option<Arc<GroupsConfig>>>,
}

impl<S> ConfigLoader<S>
where
    S: ConfigSource,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            loaded: OnceLock::new(),
        }
    }

    /// Returns the loaded configuration, loading it first if this is the first call.
    ///
    /// A failed load is not cached, the next call tries again.
    pub fn get(&self) -> Result<Option<Arc<GroupsConfig>>, ConfigError> {
        if let Some(config) = self.loaded.get() {
            return Ok(config.clone());
        }
        let config = self.source.load()?.map(Arc::new);
        // Another thread may have won the race, its value is returned.
        Ok(self.loaded.get_or_init(|| config).clone())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn flatten_is_depth_first_in_declaration_order() {
        let tree = ConfigTree::new()
            .with(
                ConfigNode::new("a", "A")
                    .with_child(ConfigNode::new("a1", "A1").with_child(ConfigNode::new("a11", "")))
                    .with_child(ConfigNode::new("a2", "A2")),
            )
            .with(ConfigNode::new("b", "B"));

        let codes: Vec<&str> = tree.flatten().iter().map(|n| n.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "a1", "a11", "a2", "b"]);
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let tree = ConfigTree::new()
            .with(ConfigNode::new("staff", "Staff").with_child(ConfigNode::new("editors", "")))
            .with(ConfigNode::new("guests", "Guests").with_child(ConfigNode::new("editors", "")));

        assert_matches!(
            GroupsConfig::new(tree),
            Err(ConfigError::DuplicateCode(code)) if code == "editors"
        );
    }

    #[test]
    fn duplicate_siblings_are_rejected() {
        let tree = ConfigTree::new()
            .with(ConfigNode::new("staff", "Staff"))
            .with(ConfigNode::new("staff", "Other"));
        assert_matches!(
            GroupsConfig::new(tree),
            Err(ConfigError::DuplicateCode(code)) if code == "staff"
        );

        let tree = ConfigTree::new().with(
            ConfigNode::new("staff", "Staff")
                .with_child(ConfigNode::new("editors", "Editors"))
                .with_child(ConfigNode::new("editors", "Authors")),
        );
        assert_matches!(
            GroupsConfig::new(tree),
            Err(ConfigError::DuplicateCode(code)) if code == "editors"
        );
    }

    #[test]
    fn duplicate_json_keys_are_rejected() {
        assert_matches!(
            GroupsConfig::from_json_str(
                r#"{ "groups": { "staff": { "title": "A" }, "staff": { "title": "B" } } }"#
            ),
            Err(ConfigError::DuplicateCode(code)) if code == "staff"
        );
        assert_matches!(
            GroupsConfig::from_json_str(
                r#"{ "configured_groups": { "staff": { "children": {
                    "editors": {}, "editors": { "title": "Editors" }
                } } } }"#
            ),
            Err(ConfigError::DuplicateCode(code)) if code == "editors"
        );
    }

    #[test]
    fn repeated_keys_outside_group_mappings_are_tolerated() {
        // A group may be called "children" and a field may repeat, neither is a duplicate code.
        let config = GroupsConfig::from_json_str(
            r#"{ "groups": {
                "children": { "title": "A", "title": "Kids" },
                "staff": { "permissions": ["ADMIN", "ADMIN"] }
            } }"#,
        )
        .unwrap();

        assert_eq!(config.groups.get("children").unwrap().title, "Kids");
        assert_eq!(config.groups.get("staff").unwrap().permissions.len(), 1);
    }

    #[test]
    fn parses_json_keeping_declaration_order() {
        let config = GroupsConfig::from_json_value(json!({
            "root_groups_only": true,
            "groups": {
                "zeta": { "title": "Zeta" },
                "alpha": {
                    "title": "Alpha",
                    "description": "First letter",
                    "sort": 3,
                    "permissions": ["CMS_ACCESS", "ADMIN"],
                    "is_configured_children_only": true,
                    "is_hidden": true,
                    "children": { "beta": { "permissions": [] } }
                }
            }
        }))
        .unwrap();

        assert!(config.root_groups_only);
        assert!(!config.permissions_only);

        let codes: Vec<&str> = config.groups.iter().map(|n| n.code.as_str()).collect();
        assert_eq!(codes, vec!["zeta", "alpha"]);

        let alpha = config.groups.get("alpha").unwrap();
        assert_eq!(alpha.description.as_deref(), Some("First letter"));
        assert_eq!(alpha.sort, Some(3));
        assert!(alpha.children_only);
        assert!(alpha.hidden);
        assert!(alpha.permissions.contains("ADMIN"));

        // Missing title falls back to the code.
        assert_eq!(alpha.children.get("beta").unwrap().title, "beta");
    }

    #[test]
    fn malformed_branches_are_skipped() {
        let config = GroupsConfig::from_json_value(json!({
            "groups": {
                "broken": "not a mapping",
                "wrong_title": { "title": 42 },
                "": { "title": "No code" },
                "kept": {
                    "title": "Kept",
                    "permissions": "ADMIN",
                    "children": {
                        "also_broken": [1, 2, 3],
                        "child": { "title": "Child", "permissions": ["CMS_ACCESS", 7] }
                    }
                }
            }
        }))
        .unwrap();

        let codes: Vec<&str> = config.groups.flatten().iter().map(|n| n.code.as_str()).collect();
        assert_eq!(codes, vec!["kept", "child"]);

        let kept = config.groups.get("kept").unwrap();
        assert!(kept.permissions.is_empty());
        let child = kept.children.get("child").unwrap();
        assert_eq!(child.permissions.len(), 1);
    }

    #[test]
    fn top_level_must_be_a_mapping() {
        assert_matches!(
            GroupsConfig::from_json_value(json!(["staff"])),
            Err(ConfigError::Malformed(_))
        );
        assert_matches!(
            GroupsConfig::from_json_str("{ not json"),
            Err(ConfigError::Malformed(_))
        );
    }

    #[test]
    fn missing_file_means_no_configuration() {
        let source = JsonFile(PathBuf::from("/this/path/does/not/exist/groups.json"));
        assert_matches!(source.load(), Ok(None));
    }

    struct CountingSource(Cell<usize>);

    impl ConfigSource for CountingSource {
        fn load(&self) -> Result<Option<GroupsConfig>, ConfigError> {
            self.0.set(self.0.get() + 1);
            let tree = ConfigTree::new().with(ConfigNode::new("staff", "Staff"));
            GroupsConfig::new(tree).map(Some)
        }
    }

    #[test]
    fn loader_loads_only_once() {
        let loader = ConfigLoader::new(CountingSource(Cell::new(0)));

        let first = loader.get().unwrap().unwrap();
        let second = loader.get().unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.source.0.get(), 1);
    }
}
