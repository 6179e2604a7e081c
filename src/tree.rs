//! Content tree abstraction and the in-memory repository implementation.
//!
//! Nodes are addressed by absolute, `/`-separated paths. A node is either a
//! container with ordered, typed properties and ordered children, or a file
//! carrying an opaque byte body.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Unstructured,
    Folder,
    File,
}

/// Declared type of a property. Only `String` properties are ever templated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    String,
    Long,
    Double,
    Boolean,
    Date,
    Name,
    Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyValue {
    Value(String),
    Values(Vec<String>),
}

/// A typed property. Values are kept in their string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type", default)]
    pub kind: PropertyType,
    #[serde(flatten)]
    pub value: PropertyValue,
    /// Maintained by the repository; never copied or templated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub protected: bool,
}

impl Property {
    pub fn string<S: Into<String>>(value: S) -> Self {
        Self::single(PropertyType::String, value)
    }

    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: PropertyType::String,
            value: PropertyValue::Values(values.into_iter().map(Into::into).collect()),
            protected: false,
        }
    }

    pub fn single<S: Into<String>>(kind: PropertyType, value: S) -> Self {
        Self {
            kind,
            value: PropertyValue::Value(value.into()),
            protected: false,
        }
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self.value, PropertyValue::Values(_))
    }

    pub fn single_value(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::Value(value) => Some(value),
            PropertyValue::Values(_) => None,
        }
    }
}

/// Path-addressed access to the content being templated.
pub trait ContentTree {
    fn node_exists(&self, path: &str) -> bool;

    fn node_kind(&self, path: &str) -> Result<NodeKind>;

    /// Property names of a node, in their stored order.
    fn property_names(&self, path: &str) -> Result<Vec<String>>;

    fn property(&self, path: &str, name: &str) -> Result<Property>;

    fn set_property(&mut self, path: &str, name: &str, property: Property) -> Result<()>;

    /// Child names of a node, in their stored order.
    fn child_names(&self, path: &str) -> Result<Vec<String>>;

    /// Creates the node and any missing ancestors; an existing node is kept as is.
    fn create_node(&mut self, path: &str, kind: NodeKind) -> Result<()>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Creates or overwrites the file `name` below `parent`.
    fn put_file(&mut self, parent: &str, name: &str, content: Vec<u8>) -> Result<()>;

    /// Removes a node and its subtree.
    fn remove(&mut self, path: &str) -> Result<()>;

    /// Persists all pending changes.
    fn commit(&mut self) -> Result<()>;
}

/// Joins a parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Splits a path into its parent path and its last segment.
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    let index = path.rfind('/')?;
    let name = &path[index + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if index == 0 { "/" } else { &path[..index] };
    Some((parent, name))
}

fn segments(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(Error::InvalidPath {
            path: path.to_string(),
        });
    }
    if path == "/" {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = path[1..].split('/').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(Error::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(parts)
}

mod body {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Property>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub children: IndexMap<String, Node>,
    #[serde(default, with = "body", skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// In-memory repository, optionally persisted as a JSON document.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    root: Node,
    location: Option<PathBuf>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the document at `location`, or starts empty if it does not exist.
    /// `commit` writes back to the same location.
    pub fn open<P: AsRef<Path>>(location: P) -> Result<Self> {
        let location = location.as_ref();
        let root = if location.exists() {
            debug!("Loading repository from {}", location.display());
            serde_json::from_str(&fs::read_to_string(location)?)?
        } else {
            debug!("Starting empty repository at {}", location.display());
            Node::new(NodeKind::Folder)
        };

        Ok(Self {
            root,
            location: Some(location.to_path_buf()),
        })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    fn node(&self, path: &str) -> Result<&Node> {
        let mut node = &self.root;
        for segment in segments(path)? {
            node = node.children.get(segment).ok_or_else(|| Error::PathNotFound {
                path: path.to_string(),
            })?;
        }
        Ok(node)
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut Node> {
        let mut node = &mut self.root;
        for segment in segments(path)? {
            node = node.children.get_mut(segment).ok_or_else(|| Error::PathNotFound {
                path: path.to_string(),
            })?;
        }
        Ok(node)
    }
}

impl ContentTree for MemoryTree {
    fn node_exists(&self, path: &str) -> bool {
        self.node(path).is_ok()
    }

    fn node_kind(&self, path: &str) -> Result<NodeKind> {
        Ok(self.node(path)?.kind)
    }

    fn property_names(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.node(path)?.properties.keys().cloned().collect())
    }

    fn property(&self, path: &str, name: &str) -> Result<Property> {
        self.node(path)?
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| Error::PathNotFound {
                path: format!("{path}@{name}"),
            })
    }

    fn set_property(&mut self, path: &str, name: &str, property: Property) -> Result<()> {
        self.node_mut(path)?.properties.insert(name.to_string(), property);
        Ok(())
    }

    fn child_names(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.node(path)?.children.keys().cloned().collect())
    }

    fn create_node(&mut self, path: &str, kind: NodeKind) -> Result<()> {
        let parts = segments(path)?;
        let last = parts.len().saturating_sub(1);
        let mut node = &mut self.root;
        for (index, segment) in parts.into_iter().enumerate() {
            let segment_kind = if index == last { kind } else { NodeKind::Folder };
            node = node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| Node::new(segment_kind));
        }
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let node = self.node(path)?;
        match (&node.kind, &node.data) {
            (NodeKind::File, Some(data)) => Ok(data.clone()),
            (NodeKind::File, None) => Ok(Vec::new()),
            _ => Err(Error::NotAFile {
                path: path.to_string(),
            }),
        }
    }

    fn put_file(&mut self, parent: &str, name: &str, content: Vec<u8>) -> Result<()> {
        let parent_node = self.node_mut(parent)?;
        let file = parent_node
            .children
            .entry(name.to_string())
            .or_insert_with(|| Node::new(NodeKind::File));
        file.kind = NodeKind::File;
        file.data = Some(content);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        let (parent, name) = split_path(path).ok_or_else(|| Error::InvalidPath {
            path: path.to_string(),
        })?;
        self.node_mut(parent)?
            .children
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::PathNotFound {
                path: path.to_string(),
            })
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(location) = &self.location {
            if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(location, self.to_json()?)?;
            debug!("Repository written to {}", location.display());
        }
        Ok(())
    }
}

/// Property definition as written in a `.content.json` file: either a plain
/// JSON value or a fully typed property.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PropertyDef {
    Text(String),
    Texts(Vec<String>),
    Flag(bool),
    Integer(i64),
    Decimal(f64),
    Typed(Property),
}

impl From<PropertyDef> for Property {
    fn from(def: PropertyDef) -> Self {
        match def {
            PropertyDef::Text(value) => Property::string(value),
            PropertyDef::Texts(values) => Property::strings(values),
            PropertyDef::Flag(value) => Property::single(PropertyType::Boolean, value.to_string()),
            PropertyDef::Integer(value) => Property::single(PropertyType::Long, value.to_string()),
            PropertyDef::Decimal(value) => Property::single(PropertyType::Double, value.to_string()),
            PropertyDef::Typed(property) => property,
        }
    }
}

/// Parses the properties of a `.content.json` file, keeping their order.
pub fn parse_content_properties(text: &str) -> Result<IndexMap<String, Property>> {
    let defs: IndexMap<String, PropertyDef> = serde_json::from_str(text)?;
    Ok(defs.into_iter().map(|(name, def)| (name, def.into())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_navigate() {
        let mut tree = MemoryTree::new();
        tree.create_node("/content/site/page", NodeKind::Unstructured).unwrap();

        assert!(tree.node_exists("/content"));
        assert!(tree.node_exists("/content/site/page"));
        assert_eq!(tree.node_kind("/content/site").unwrap(), NodeKind::Folder);
        assert_eq!(tree.node_kind("/content/site/page").unwrap(), NodeKind::Unstructured);
        assert_eq!(tree.child_names("/content").unwrap(), vec!["site".to_string()]);
        assert!(!tree.node_exists("/content/other"));
        assert!(!tree.node_exists("relative/path"));
    }

    #[test]
    fn test_properties_keep_order() {
        let mut tree = MemoryTree::new();
        tree.create_node("/n", NodeKind::Unstructured).unwrap();
        tree.set_property("/n", "b", Property::string("1")).unwrap();
        tree.set_property("/n", "a", Property::strings(["x", "y"])).unwrap();

        assert_eq!(tree.property_names("/n").unwrap(), vec!["b".to_string(), "a".to_string()]);
        assert!(tree.property("/n", "a").unwrap().is_multiple());
        assert!(matches!(
            tree.property("/n", "missing"),
            Err(Error::PathNotFound { path }) if path == "/n@missing"
        ));
    }

    #[test]
    fn test_files() {
        let mut tree = MemoryTree::new();
        tree.create_node("/apps", NodeKind::Folder).unwrap();
        tree.put_file("/apps", "app.conf", b"v1".to_vec()).unwrap();
        tree.put_file("/apps", "app.conf", b"v2".to_vec()).unwrap();

        assert_eq!(tree.read_file("/apps/app.conf").unwrap(), b"v2");
        assert_eq!(tree.node_kind("/apps/app.conf").unwrap(), NodeKind::File);
        assert!(matches!(tree.read_file("/apps"), Err(Error::NotAFile { .. })));
    }

    #[test]
    fn test_remove_subtree() {
        let mut tree = MemoryTree::new();
        tree.create_node("/a/b/c", NodeKind::Unstructured).unwrap();
        tree.remove("/a/b").unwrap();

        assert!(tree.node_exists("/a"));
        assert!(!tree.node_exists("/a/b/c"));
        assert!(tree.remove("/a/b").is_err());
        assert!(tree.remove("/").is_err());
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(split_path("/a/b"), Some(("/a", "b")));
        assert_eq!(split_path("/a"), Some(("/", "a")));
        assert_eq!(split_path("/"), None);
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("/a", "b"), "/a/b");
    }

    #[test]
    fn test_commit_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("repo.json");

        let mut tree = MemoryTree::open(&location).unwrap();
        tree.create_node("/etc/system-env", NodeKind::Unstructured).unwrap();
        tree.set_property("/etc/system-env", "host", Property::string("h")).unwrap();
        tree.set_property(
            "/etc/system-env",
            "jcr:primaryType",
            Property::single(PropertyType::Name, "nt:unstructured").protected(),
        )
        .unwrap();
        tree.put_file("/etc", "bin", vec![0, 159, 146, 150]).unwrap();
        tree.commit().unwrap();

        let reopened = MemoryTree::open(&location).unwrap();
        assert_eq!(reopened.root(), tree.root());
        assert!(reopened.property("/etc/system-env", "jcr:primaryType").unwrap().protected);
        assert_eq!(reopened.read_file("/etc/bin").unwrap(), vec![0, 159, 146, 150]);
    }

    #[test]
    fn test_parse_content_properties() {
        let properties = parse_content_properties(
            r#"{
                "title": "${page.title}",
                "hosts": ["${a}", "b"],
                "enabled": true,
                "count": 3,
                "created": {"type": "date", "value": "2024-01-01", "protected": true}
            }"#,
        )
        .unwrap();

        assert_eq!(properties["title"], Property::string("${page.title}"));
        assert_eq!(properties["hosts"], Property::strings(["${a}", "b"]));
        assert_eq!(properties["enabled"].kind, PropertyType::Boolean);
        assert_eq!(properties["count"].single_value(), Some("3"));
        assert_eq!(properties["created"].kind, PropertyType::Date);
        assert!(properties["created"].protected);
        assert_eq!(
            properties.keys().collect::<Vec<_>>(),
            vec!["title", "hosts", "enabled", "count", "created"]
        );
    }
}
