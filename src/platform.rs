//! Accessibility platform boundary
//!
//! The walker only talks to the platform through [`AccessibilityTree`]. Every
//! call may fail; the walker treats failures as "no result".
//!
//! [`SnapshotTree`] is an in-memory platform loaded from a YAML or JSON
//! description of an element hierarchy:
//!
//! ```yaml
//! control_type: Window
//! properties:
//!   Name: Settings
//! children:
//!   - control_type: Hyperlink
//!     patterns: [Invoke]
//!     properties:
//!       AutomationId: help-link
//!     children:
//!       - control_type: Text
//!         properties:
//!           Name: Help
//! ```

use crate::element::{ControlTypeId, PatternId, PropertyBag, PropertyId, PropertyValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Failure reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Element is no longer available: {0}")]
    ElementNotAvailable(String),

    #[error("{operation} failed: {message}")]
    CallFailed { operation: String, message: String },
}

/// Control type, patterns and properties read from the platform for one element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertySnapshot {
    pub control_type: ControlTypeId,
    pub patterns: Vec<PatternId>,
    pub properties: PropertyBag,
}

/// Tree navigation and property access over native elements
pub trait AccessibilityTree: Send + Sync {
    /// Native element handle; equality identifies the same UI element
    type Handle: Clone + PartialEq + Send + Sync + fmt::Debug;

    fn parent(&self, element: &Self::Handle) -> Result<Option<Self::Handle>, PlatformError>;

    fn first_child(&self, element: &Self::Handle) -> Result<Option<Self::Handle>, PlatformError>;

    fn next_sibling(&self, element: &Self::Handle) -> Result<Option<Self::Handle>, PlatformError>;

    fn snapshot(&self, element: &Self::Handle) -> Result<PropertySnapshot, PlatformError>;
}

/// Error loading a snapshot description
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct SnapshotNode {
    control_type: String,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    children: Vec<SnapshotNode>,
}

#[derive(Debug)]
struct FlatNode {
    snapshot: PropertySnapshot,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Handle into a [`SnapshotTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotHandle(usize);

/// In-memory accessibility tree
#[derive(Debug)]
pub struct SnapshotTree {
    nodes: Vec<FlatNode>,
}

impl SnapshotTree {
    /// Load from a file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "json" => Self::from_json_str(&content),
            _ => Err(SnapshotError::Invalid(format!(
                "Unknown snapshot file format: {}",
                ext
            ))),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SnapshotError> {
        let root: SnapshotNode = serde_yaml::from_str(content)?;
        Self::from_root(root)
    }

    pub fn from_json_str(content: &str) -> Result<Self, SnapshotError> {
        let root: SnapshotNode = serde_json::from_str(content)?;
        Self::from_root(root)
    }

    fn from_root(root: SnapshotNode) -> Result<Self, SnapshotError> {
        let mut tree = Self { nodes: Vec::new() };
        tree.flatten(root, None)?;
        Ok(tree)
    }

    fn flatten(&mut self, node: SnapshotNode, parent: Option<usize>) -> Result<usize, SnapshotError> {
        let control_type = node
            .control_type
            .parse::<ControlTypeId>()
            .map_err(SnapshotError::Invalid)?;
        let patterns = node
            .patterns
            .iter()
            .map(|p| p.parse::<PatternId>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(SnapshotError::Invalid)?;
        let mut properties = PropertyBag::new();
        for (name, value) in node.properties {
            let id = name.parse::<PropertyId>().map_err(SnapshotError::Invalid)?;
            properties.insert(id, value);
        }
        properties.insert(PropertyId::CONTROL_TYPE, PropertyValue::Int(control_type.0.into()));

        let index = self.nodes.len();
        self.nodes.push(FlatNode {
            snapshot: PropertySnapshot {
                control_type,
                patterns,
                properties,
            },
            parent,
            children: Vec::new(),
        });

        for child in node.children {
            let child_index = self.flatten(child, Some(index))?;
            self.nodes[index].children.push(child_index);
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> SnapshotHandle {
        SnapshotHandle(0)
    }

    /// Resolve a selector to an element
    ///
    /// `#id` matches the first element (depth-first) whose AutomationId is
    /// `id`; `0/2/1` walks child indices from the root; an empty selector is
    /// the root.
    pub fn select(&self, selector: &str) -> Option<SnapshotHandle> {
        let selector = selector.trim();
        if let Some(automation_id) = selector.strip_prefix('#') {
            return self.find_automation_id(0, automation_id);
        }

        let mut current = 0;
        for part in selector.split('/').filter(|p| !p.is_empty()) {
            let position: usize = part.parse().ok()?;
            current = *self.nodes.get(current)?.children.get(position)?;
        }
        (current < self.nodes.len()).then_some(SnapshotHandle(current))
    }

    fn find_automation_id(&self, index: usize, automation_id: &str) -> Option<SnapshotHandle> {
        let node = self.nodes.get(index)?;
        let matches = node
            .snapshot
            .properties
            .get(&PropertyId::AUTOMATION_ID)
            .and_then(PropertyValue::as_str)
            == Some(automation_id);
        if matches {
            return Some(SnapshotHandle(index));
        }
        node.children
            .iter()
            .find_map(|&child| self.find_automation_id(child, automation_id))
    }

    fn node(&self, element: &SnapshotHandle) -> Result<&FlatNode, PlatformError> {
        self.nodes
            .get(element.0)
            .ok_or_else(|| PlatformError::ElementNotAvailable(format!("{:?}", element)))
    }
}

impl AccessibilityTree for SnapshotTree {
    type Handle = SnapshotHandle;

    fn parent(&self, element: &SnapshotHandle) -> Result<Option<SnapshotHandle>, PlatformError> {
        Ok(self.node(element)?.parent.map(SnapshotHandle))
    }

    fn first_child(&self, element: &SnapshotHandle) -> Result<Option<SnapshotHandle>, PlatformError> {
        Ok(self.node(element)?.children.first().copied().map(SnapshotHandle))
    }

    fn next_sibling(&self, element: &SnapshotHandle) -> Result<Option<SnapshotHandle>, PlatformError> {
        let Some(parent) = self.node(element)?.parent else {
            return Ok(None);
        };
        let siblings = &self.node(&SnapshotHandle(parent))?.children;
        let next = siblings
            .iter()
            .position(|&i| i == element.0)
            .and_then(|pos| siblings.get(pos + 1))
            .copied()
            .map(SnapshotHandle);
        Ok(next)
    }

    fn snapshot(&self, element: &SnapshotHandle) -> Result<PropertySnapshot, PlatformError> {
        Ok(self.node(element)?.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
control_type: Window
properties:
  Name: Settings
children:
  - control_type: Hyperlink
    patterns: [Invoke]
    properties:
      AutomationId: help-link
    children:
      - control_type: Text
        properties:
          Name: Help
  - control_type: Button
    properties:
      Name: OK
      IsKeyboardFocusable: true
      BoundingRectangle: { left: 0, top: 0, right: 80, bottom: 24 }
"#;

    #[test]
    fn test_load_yaml() {
        let tree = SnapshotTree::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(tree.len(), 4);

        let root = tree.root();
        let link = tree.first_child(&root).unwrap().unwrap();
        let snap = tree.snapshot(&link).unwrap();
        assert_eq!(snap.control_type, ControlTypeId::HYPERLINK);
        assert_eq!(snap.patterns, vec![PatternId::INVOKE]);

        let button = tree.next_sibling(&link).unwrap().unwrap();
        assert!(tree.next_sibling(&button).unwrap().is_none());
        assert_eq!(tree.parent(&button).unwrap(), Some(root));
        assert!(tree.parent(&root).unwrap().is_none());

        let props = tree.snapshot(&button).unwrap().properties;
        assert_eq!(props.get(&PropertyId::IS_KEYBOARD_FOCUSABLE), Some(&PropertyValue::Bool(true)));
        assert_eq!(
            props.get(&PropertyId::CONTROL_TYPE),
            Some(&PropertyValue::Int(50000))
        );
    }

    #[test]
    fn test_select() {
        let tree = SnapshotTree::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(tree.select(""), Some(tree.root()));
        assert_eq!(tree.select("#help-link"), tree.select("0"));
        let text = tree.select("0/0").unwrap();
        assert_eq!(tree.snapshot(&text).unwrap().control_type, ControlTypeId::TEXT);
        assert!(tree.select("5").is_none());
        assert!(tree.select("#missing").is_none());
        assert!(tree.select("x").is_none());
    }

    #[test]
    fn test_unknown_names_rejected() {
        let err = SnapshotTree::from_yaml_str("control_type: Widget").unwrap_err();
        assert_eq!(err.to_string(), "Invalid snapshot: Unknown control type: Widget");

        let err = SnapshotTree::from_yaml_str(
            "control_type: Button\nproperties:\n  Colour: red\n",
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::Invalid(_)));
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"control_type": "Pane", "children": [{{"control_type": "50020"}}]}}"#
        )
        .unwrap();

        let tree = SnapshotTree::load(file.path()).unwrap();
        assert_eq!(tree.len(), 2);
        let child = tree.select("0").unwrap();
        assert_eq!(tree.snapshot(&child).unwrap().control_type, ControlTypeId::TEXT);
    }

    #[test]
    fn test_stale_handle() {
        let tree = SnapshotTree::from_yaml_str("control_type: Pane").unwrap();
        assert!(matches!(
            tree.parent(&SnapshotHandle(9)),
            Err(PlatformError::ElementNotAvailable(_))
        ));
    }
}
