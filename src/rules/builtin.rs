//! Built-in rule implementations
//!
//! Each rule carries its registration metadata as an associated `METADATA`
//! constant and builds its condition once in `new`.

use crate::condition::Condition;
use crate::element::{ControlTypeId, ElementRef, PropertyId};
use crate::rule::{EvaluationCode, Rule, RuleCore, RuleError, RuleInfo, RuleMetadata};

/// A hyperlink containing text must expose that text through a Name
#[derive(Debug)]
pub struct HyperlinkHasText {
    core: RuleCore,
}

impl HyperlinkHasText {
    pub const METADATA: RuleMetadata = RuleMetadata::new(
        "hyperlink-has-text",
        "Hyperlink text must be readable by assistive technology",
        "Give the hyperlink's Text child a non-empty Name",
        "WCAG 2.4.4",
    );

    pub fn new(metadata: &RuleMetadata) -> Self {
        Self {
            core: RuleCore::new(metadata, || {
                Some(
                    Condition::control_type(ControlTypeId::HYPERLINK)
                        / Condition::control_type(ControlTypeId::TEXT),
                )
            }),
        }
    }
}

impl Rule for HyperlinkHasText {
    fn info(&self) -> &RuleInfo {
        self.core.info()
    }

    fn condition(&self) -> Option<&Condition> {
        self.core.condition()
    }

    fn evaluate(&self, element: ElementRef<'_>) -> Result<EvaluationCode, RuleError> {
        let readable = element
            .children()
            .filter(|c| c.control_type() == ControlTypeId::TEXT)
            .any(|c| c.name().is_some_and(|n| !n.trim().is_empty()));
        Ok(if readable {
            EvaluationCode::Pass
        } else {
            EvaluationCode::Error
        })
    }
}

const INTERACTIVE: &[ControlTypeId] = &[
    ControlTypeId::BUTTON,
    ControlTypeId::CHECK_BOX,
    ControlTypeId::COMBO_BOX,
    ControlTypeId::EDIT,
    ControlTypeId::HYPERLINK,
    ControlTypeId::LIST_ITEM,
    ControlTypeId::MENU_ITEM,
    ControlTypeId::RADIO_BUTTON,
    ControlTypeId::TAB_ITEM,
    ControlTypeId::TREE_ITEM,
];

/// Interactive controls need an accessible name
#[derive(Debug)]
pub struct NameNotEmpty {
    core: RuleCore,
}

impl NameNotEmpty {
    pub const METADATA: RuleMetadata = RuleMetadata::new(
        "name-not-empty",
        "Interactive controls must have a non-empty Name",
        "Set the control's Name, for example from its visible label",
        "WCAG 4.1.2",
    )
    .with_property(PropertyId::NAME);

    pub fn new(metadata: &RuleMetadata) -> Self {
        Self {
            core: RuleCore::new(metadata, || Some(Condition::any_control_type(INTERACTIVE))),
        }
    }
}

impl Rule for NameNotEmpty {
    fn info(&self) -> &RuleInfo {
        self.core.info()
    }

    fn condition(&self) -> Option<&Condition> {
        self.core.condition()
    }

    fn evaluate(&self, element: ElementRef<'_>) -> Result<EvaluationCode, RuleError> {
        if element.name().is_some_and(|n| !n.trim().is_empty()) {
            return Ok(EvaluationCode::Pass);
        }
        let focusable = element
            .property(PropertyId::IS_KEYBOARD_FOCUSABLE)
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        // Unreachable by keyboard: still worth a look, but not a failure.
        Ok(if focusable {
            EvaluationCode::Error
        } else {
            EvaluationCode::Warning
        })
    }
}

/// On-screen elements need a rectangle with positive area
#[derive(Debug)]
pub struct BoundingRectValid {
    core: RuleCore,
}

impl BoundingRectValid {
    pub const METADATA: RuleMetadata = RuleMetadata::new(
        "bounding-rect-valid",
        "On-screen elements must have a non-empty bounding rectangle",
        "Report the element's real screen bounds, or mark it offscreen",
        "WCAG 1.3.1",
    )
    .with_property(PropertyId::BOUNDING_RECTANGLE);

    pub fn new(metadata: &RuleMetadata) -> Self {
        Self {
            core: RuleCore::new(metadata, || None),
        }
    }
}

impl Rule for BoundingRectValid {
    fn info(&self) -> &RuleInfo {
        self.core.info()
    }

    fn condition(&self) -> Option<&Condition> {
        self.core.condition()
    }

    fn evaluate(&self, element: ElementRef<'_>) -> Result<EvaluationCode, RuleError> {
        let offscreen = element
            .property(PropertyId::IS_OFFSCREEN)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if offscreen {
            return Ok(EvaluationCode::NotApplicable);
        }
        let Some(value) = element.property(PropertyId::BOUNDING_RECTANGLE) else {
            return Ok(EvaluationCode::NotApplicable);
        };
        let rect = value.as_rect().ok_or_else(|| {
            RuleError::Failed(format!(
                "Element {} has a BoundingRectangle that is not a rectangle: {}",
                element.unique_id(),
                value
            ))
        })?;
        Ok(if rect.is_empty() {
            EvaluationCode::Error
        } else {
            EvaluationCode::Pass
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementNode, ElementTree, Rect};

    fn evaluate(rule: &dyn Rule, tree: &ElementTree, id: i32) -> Result<EvaluationCode, RuleError> {
        let element = tree.find(id).unwrap();
        assert!(rule.condition().is_none_or(|c| c.matches(element)));
        rule.evaluate(element)
    }

    #[test]
    fn test_hyperlink_has_text() {
        let rule = HyperlinkHasText::new(&HyperlinkHasText::METADATA);
        assert_eq!(rule.info().condition, "Hyperlink / Text");

        let mut tree = ElementTree::new();
        let good = tree.push(ElementNode::new(1, ControlTypeId::HYPERLINK));
        tree.push_child(good, ElementNode::new(2, ControlTypeId::TEXT).with_property(PropertyId::NAME, "Docs"));
        let bad = tree.push(ElementNode::new(3, ControlTypeId::HYPERLINK));
        tree.push_child(bad, ElementNode::new(4, ControlTypeId::TEXT).with_property(PropertyId::NAME, "  "));
        let bare = tree.push(ElementNode::new(5, ControlTypeId::HYPERLINK));

        assert_eq!(evaluate(&rule, &tree, 1), Ok(EvaluationCode::Pass));
        assert_eq!(evaluate(&rule, &tree, 3), Ok(EvaluationCode::Error));
        let condition = rule.condition().unwrap();
        assert!(!condition.matches(tree.get(bare).unwrap()));
    }

    #[test]
    fn test_name_not_empty() {
        let rule = NameNotEmpty::new(&NameNotEmpty::METADATA);
        assert_eq!(rule.info().property_id, PropertyId::NAME);

        let mut tree = ElementTree::new();
        tree.push(ElementNode::new(1, ControlTypeId::BUTTON).with_property(PropertyId::NAME, "OK"));
        tree.push(ElementNode::new(2, ControlTypeId::BUTTON));
        tree.push(
            ElementNode::new(3, ControlTypeId::EDIT)
                .with_property(PropertyId::NAME, "")
                .with_property(PropertyId::IS_KEYBOARD_FOCUSABLE, false),
        );
        let text = tree.push(ElementNode::new(4, ControlTypeId::TEXT));

        assert_eq!(evaluate(&rule, &tree, 1), Ok(EvaluationCode::Pass));
        assert_eq!(evaluate(&rule, &tree, 2), Ok(EvaluationCode::Error));
        assert_eq!(evaluate(&rule, &tree, 3), Ok(EvaluationCode::Warning));
        assert!(!rule.condition().unwrap().matches(tree.get(text).unwrap()));
    }

    #[test]
    fn test_bounding_rect_valid() {
        let rule = BoundingRectValid::new(&BoundingRectValid::METADATA);
        assert!(rule.condition().is_none());

        let mut tree = ElementTree::new();
        tree.push(
            ElementNode::new(1, ControlTypeId::PANE)
                .with_property(PropertyId::BOUNDING_RECTANGLE, Rect::new(0.0, 0.0, 10.0, 10.0)),
        );
        tree.push(
            ElementNode::new(2, ControlTypeId::PANE)
                .with_property(PropertyId::BOUNDING_RECTANGLE, Rect::new(5.0, 5.0, 5.0, 20.0)),
        );
        tree.push(
            ElementNode::new(3, ControlTypeId::PANE)
                .with_property(PropertyId::BOUNDING_RECTANGLE, Rect::default())
                .with_property(PropertyId::IS_OFFSCREEN, true),
        );
        tree.push(ElementNode::new(4, ControlTypeId::PANE));
        tree.push(
            ElementNode::new(5, ControlTypeId::PANE).with_property(PropertyId::BOUNDING_RECTANGLE, "wide"),
        );

        assert_eq!(evaluate(&rule, &tree, 1), Ok(EvaluationCode::Pass));
        assert_eq!(evaluate(&rule, &tree, 2), Ok(EvaluationCode::Error));
        assert_eq!(evaluate(&rule, &tree, 3), Ok(EvaluationCode::NotApplicable));
        assert_eq!(evaluate(&rule, &tree, 4), Ok(EvaluationCode::NotApplicable));
        assert!(matches!(evaluate(&rule, &tree, 5), Err(RuleError::Failed(_))));
    }
}
