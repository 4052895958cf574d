//! Element model: identifiers, typed property values and the per-walk element arena
//!
//! Elements are stored in an [`ElementTree`] owned by a single walk. Navigation
//! goes through [`ElementRef`], a copyable borrowed handle that resolves parent
//! and children through the arena.

use crate::results::ScanResults;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const CONTROL_TYPE_NAMES: &[(i32, &str)] = &[
    (50000, "Button"),
    (50001, "Calendar"),
    (50002, "CheckBox"),
    (50003, "ComboBox"),
    (50004, "Edit"),
    (50005, "Hyperlink"),
    (50006, "Image"),
    (50007, "ListItem"),
    (50008, "List"),
    (50009, "Menu"),
    (50010, "MenuBar"),
    (50011, "MenuItem"),
    (50012, "ProgressBar"),
    (50013, "RadioButton"),
    (50014, "ScrollBar"),
    (50015, "Slider"),
    (50016, "Spinner"),
    (50017, "StatusBar"),
    (50018, "Tab"),
    (50019, "TabItem"),
    (50020, "Text"),
    (50021, "ToolBar"),
    (50022, "ToolTip"),
    (50023, "Tree"),
    (50024, "TreeItem"),
    (50025, "Custom"),
    (50026, "Group"),
    (50027, "Thumb"),
    (50028, "DataGrid"),
    (50029, "DataItem"),
    (50030, "Document"),
    (50031, "SplitButton"),
    (50032, "Window"),
    (50033, "Pane"),
    (50034, "Header"),
    (50035, "HeaderItem"),
    (50036, "Table"),
    (50037, "TitleBar"),
    (50038, "Separator"),
    (50039, "SemanticZoom"),
    (50040, "AppBar"),
];

const PATTERN_NAMES: &[(i32, &str)] = &[
    (10000, "Invoke"),
    (10001, "Selection"),
    (10002, "Value"),
    (10003, "RangeValue"),
    (10004, "Scroll"),
    (10005, "ExpandCollapse"),
    (10006, "Grid"),
    (10007, "GridItem"),
    (10008, "MultipleView"),
    (10009, "Window"),
    (10010, "SelectionItem"),
    (10011, "Dock"),
    (10012, "Table"),
    (10013, "TableItem"),
    (10014, "Text"),
    (10015, "Toggle"),
    (10016, "Transform"),
    (10017, "ScrollItem"),
    (10018, "LegacyIAccessible"),
];

const PROPERTY_NAMES: &[(i32, &str)] = &[
    (30000, "RuntimeId"),
    (30001, "BoundingRectangle"),
    (30002, "ProcessId"),
    (30003, "ControlType"),
    (30004, "LocalizedControlType"),
    (30005, "Name"),
    (30006, "AcceleratorKey"),
    (30007, "AccessKey"),
    (30008, "HasKeyboardFocus"),
    (30009, "IsKeyboardFocusable"),
    (30010, "IsEnabled"),
    (30011, "AutomationId"),
    (30012, "ClassName"),
    (30013, "HelpText"),
    (30016, "IsControlElement"),
    (30017, "IsContentElement"),
    (30022, "IsOffscreen"),
    (30024, "FrameworkId"),
];

fn lookup_name(table: &[(i32, &'static str)], id: i32) -> Option<&'static str> {
    table
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}

fn lookup_id(table: &[(i32, &str)], s: &str) -> Option<i32> {
    let s = s.trim();
    if let Ok(raw) = s.parse::<i32>() {
        return Some(raw);
    }
    table
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(s))
        .map(|(id, _)| *id)
}

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident, $table:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl $name {
            /// Well-known name for this identifier, if any
            pub fn name(&self) -> Option<&'static str> {
                lookup_name($table, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(name) => write!(f, "{}", name),
                    None => write!(f, "{}", self.0),
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                lookup_id($table, s)
                    .map($name)
                    .ok_or_else(|| format!(concat!("Unknown ", $what, ": {}"), s))
            }
        }
    };
}

platform_id!(
    /// Control type identifier (e.g. Button, Hyperlink)
    ControlTypeId,
    CONTROL_TYPE_NAMES,
    "control type"
);

platform_id!(
    /// Control pattern identifier (e.g. Invoke, Value)
    PatternId,
    PATTERN_NAMES,
    "pattern"
);

platform_id!(
    /// Property identifier (e.g. Name, BoundingRectangle)
    PropertyId,
    PROPERTY_NAMES,
    "property"
);

impl ControlTypeId {
    pub const BUTTON: Self = Self(50000);
    pub const CHECK_BOX: Self = Self(50002);
    pub const COMBO_BOX: Self = Self(50003);
    pub const EDIT: Self = Self(50004);
    pub const HYPERLINK: Self = Self(50005);
    pub const IMAGE: Self = Self(50006);
    pub const LIST_ITEM: Self = Self(50007);
    pub const LIST: Self = Self(50008);
    pub const MENU_ITEM: Self = Self(50011);
    pub const RADIO_BUTTON: Self = Self(50013);
    pub const TAB_ITEM: Self = Self(50019);
    pub const TEXT: Self = Self(50020);
    pub const TREE_ITEM: Self = Self(50024);
    pub const CUSTOM: Self = Self(50025);
    pub const GROUP: Self = Self(50026);
    pub const DOCUMENT: Self = Self(50030);
    pub const WINDOW: Self = Self(50032);
    pub const PANE: Self = Self(50033);
}

impl PatternId {
    pub const INVOKE: Self = Self(10000);
    pub const SELECTION: Self = Self(10001);
    pub const VALUE: Self = Self(10002);
    pub const EXPAND_COLLAPSE: Self = Self(10005);
    pub const SELECTION_ITEM: Self = Self(10010);
    pub const TEXT: Self = Self(10014);
    pub const TOGGLE: Self = Self(10015);
}

impl PropertyId {
    /// No property; used by rules that are not keyed to one
    pub const NONE: Self = Self(0);
    pub const BOUNDING_RECTANGLE: Self = Self(30001);
    pub const CONTROL_TYPE: Self = Self(30003);
    pub const LOCALIZED_CONTROL_TYPE: Self = Self(30004);
    pub const NAME: Self = Self(30005);
    pub const IS_KEYBOARD_FOCUSABLE: Self = Self(30009);
    pub const IS_ENABLED: Self = Self(30010);
    pub const AUTOMATION_ID: Self = Self(30011);
    pub const CLASS_NAME: Self = Self(30012);
    pub const IS_OFFSCREEN: Self = Self(30022);
    pub const FRAMEWORK_ID: Self = Self(30024);
}

/// Screen rectangle in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// True when the rectangle has no positive area
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// A typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Rect(Rect),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_rect(&self) -> Option<&Rect> {
        match self {
            PropertyValue::Rect(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Double(d) => write!(f, "{}", d),
            PropertyValue::Str(s) => write!(f, "{}", s),
            PropertyValue::Rect(r) => write!(
                f,
                "[l={},t={},r={},b={}]",
                r.left, r.top, r.right, r.bottom
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Str(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(d: f64) -> Self {
        PropertyValue::Double(d)
    }
}

impl From<Rect> for PropertyValue {
    fn from(r: Rect) -> Self {
        PropertyValue::Rect(r)
    }
}

/// Property values keyed by property identifier
pub type PropertyBag = BTreeMap<PropertyId, PropertyValue>;

/// Index of a node inside an [`ElementTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn get(&self) -> usize {
        self.0
    }
}

/// One element of the inspected tree
#[derive(Debug, Default)]
pub struct ElementNode {
    unique_id: i32,
    control_type: ControlTypeId,
    patterns: Vec<PatternId>,
    properties: Option<PropertyBag>,
    parent: Option<NodeIndex>,
    children: Vec<NodeIndex>,
    scan_results: ScanResults,
}

impl ElementNode {
    pub fn new(unique_id: i32, control_type: ControlTypeId) -> Self {
        Self {
            unique_id,
            control_type,
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: PatternId) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn with_property(mut self, id: PropertyId, value: impl Into<PropertyValue>) -> Self {
        self.properties
            .get_or_insert_with(PropertyBag::new)
            .insert(id, value.into());
        self
    }

    pub fn unique_id(&self) -> i32 {
        self.unique_id
    }

    pub fn control_type(&self) -> ControlTypeId {
        self.control_type
    }

    /// Whether property population has completed for this node
    pub fn is_populated(&self) -> bool {
        self.properties.is_some()
    }

    /// Install a populated property snapshot
    pub fn populate(
        &mut self,
        control_type: ControlTypeId,
        patterns: Vec<PatternId>,
        properties: PropertyBag,
    ) {
        self.control_type = control_type;
        self.patterns = patterns;
        self.properties = Some(properties);
    }
}

/// Arena of elements built by one walk
#[derive(Debug, Default)]
pub struct ElementTree {
    nodes: Vec<ElementNode>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a detached node
    pub fn push(&mut self, node: ElementNode) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(node);
        index
    }

    /// Add a node as the last child of `parent`
    pub fn push_child(&mut self, parent: NodeIndex, node: ElementNode) -> NodeIndex {
        let index = self.push(node);
        self.link(parent, index);
        index
    }

    /// Append an existing node to `parent`'s children
    pub fn link(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Replace `parent`'s children with `children`, in order
    pub fn adopt_children(&mut self, parent: NodeIndex, children: Vec<NodeIndex>) {
        for child in &children {
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[parent.0].children = children;
    }

    pub fn get(&self, index: NodeIndex) -> Option<ElementRef<'_>> {
        (index.0 < self.nodes.len()).then_some(ElementRef { tree: self, index })
    }

    /// Find an element by its walker-assigned id
    pub fn find(&self, unique_id: i32) -> Option<ElementRef<'_>> {
        self.iter().find(|e| e.unique_id() == unique_id)
    }

    /// All elements in insertion order
    pub fn iter(&self) -> impl Iterator<Item = ElementRef<'_>> + '_ {
        (0..self.nodes.len()).map(move |i| ElementRef {
            tree: self,
            index: NodeIndex(i),
        })
    }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex)
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [ElementNode] {
        &mut self.nodes
    }
}

/// Borrowed handle to an element in an [`ElementTree`]
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    tree: &'a ElementTree,
    index: NodeIndex,
}

impl<'a> ElementRef<'a> {
    fn node(&self) -> &'a ElementNode {
        &self.tree.nodes[self.index.0]
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn unique_id(&self) -> i32 {
        self.node().unique_id
    }

    pub fn control_type(&self) -> ControlTypeId {
        self.node().control_type
    }

    pub fn patterns(&self) -> &'a [PatternId] {
        &self.node().patterns
    }

    pub fn has_pattern(&self, pattern: PatternId) -> bool {
        self.node().patterns.contains(&pattern)
    }

    pub fn properties(&self) -> Option<&'a PropertyBag> {
        self.node().properties.as_ref()
    }

    pub fn property(&self, id: PropertyId) -> Option<&'a PropertyValue> {
        self.properties().and_then(|p| p.get(&id))
    }

    pub fn name(&self) -> Option<&'a str> {
        self.property(PropertyId::NAME).and_then(PropertyValue::as_str)
    }

    pub fn parent(&self) -> Option<ElementRef<'a>> {
        self.node().parent.map(|index| ElementRef {
            tree: self.tree,
            index,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |&index| ElementRef { tree, index })
    }

    pub fn child_count(&self) -> usize {
        self.node().children.len()
    }

    pub fn scan_results(&self) -> &'a ScanResults {
        &self.node().scan_results
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("unique_id", &self.unique_id())
            .field("control_type", &self.control_type())
            .field("children", &self.child_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_type_names() {
        assert_eq!(ControlTypeId::HYPERLINK.to_string(), "Hyperlink");
        assert_eq!(ControlTypeId(12345).to_string(), "12345");
        assert_eq!("button".parse::<ControlTypeId>(), Ok(ControlTypeId::BUTTON));
        assert_eq!("50020".parse::<ControlTypeId>(), Ok(ControlTypeId::TEXT));
        assert!("Widget".parse::<ControlTypeId>().is_err());
    }

    #[test]
    fn test_property_and_pattern_names() {
        assert_eq!(PropertyId::NAME.to_string(), "Name");
        assert_eq!("IsOffscreen".parse::<PropertyId>(), Ok(PropertyId::IS_OFFSCREEN));
        assert_eq!(PatternId::INVOKE.to_string(), "Invoke");
    }

    #[test]
    fn test_rect() {
        let r = Rect::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.height(), 5.0);
        assert!(!r.is_empty());
        assert!(Rect::new(5.0, 5.0, 5.0, 10.0).is_empty());
    }

    #[test]
    fn test_property_value_deserialize() {
        let v: PropertyValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, PropertyValue::Bool(true));
        let v: PropertyValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, PropertyValue::Int(42));
        let v: PropertyValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(v, PropertyValue::Double(1.5));
        let v: PropertyValue = serde_json::from_str("\"OK\"").unwrap();
        assert_eq!(v.as_str(), Some("OK"));
        let v: PropertyValue =
            serde_json::from_str(r#"{"left":1,"top":2,"right":3,"bottom":4}"#).unwrap();
        assert_eq!(v.as_rect(), Some(&Rect::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn test_tree_navigation() {
        let mut tree = ElementTree::new();
        let root = tree.push(ElementNode::new(0, ControlTypeId::WINDOW));
        let button = tree.push_child(
            root,
            ElementNode::new(1, ControlTypeId::BUTTON).with_property(PropertyId::NAME, "OK"),
        );
        tree.push_child(root, ElementNode::new(2, ControlTypeId::TEXT));

        let root_ref = tree.get(root).unwrap();
        assert!(root_ref.parent().is_none());
        assert_eq!(root_ref.child_count(), 2);
        let ids: Vec<i32> = root_ref.children().map(|c| c.unique_id()).collect();
        assert_eq!(ids, vec![1, 2]);

        let button_ref = tree.get(button).unwrap();
        assert_eq!(button_ref.name(), Some("OK"));
        assert_eq!(button_ref.parent().unwrap().unique_id(), 0);
        assert_eq!(tree.find(2).unwrap().control_type(), ControlTypeId::TEXT);
        assert!(tree.find(7).is_none());
    }

    #[test]
    fn test_adopt_children_keeps_order() {
        let mut tree = ElementTree::new();
        let parent = tree.push(ElementNode::new(-1, ControlTypeId::PANE));
        let a = tree.push(ElementNode::new(1, ControlTypeId::TEXT));
        let b = tree.push(ElementNode::new(2, ControlTypeId::TEXT));
        tree.adopt_children(parent, vec![b, a]);

        let ids: Vec<i32> = tree
            .get(parent)
            .unwrap()
            .children()
            .map(|c| c.unique_id())
            .collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(tree.get(a).unwrap().parent().unwrap().unique_id(), -1);
    }

    #[test]
    fn test_populate_marks_node() {
        let mut node = ElementNode::new(3, ControlTypeId::default());
        assert!(!node.is_populated());
        node.populate(ControlTypeId::EDIT, vec![PatternId::VALUE], PropertyBag::new());
        assert!(node.is_populated());
    }
}
