//! Rule definition and metadata

use crate::condition::Condition;
use crate::element::{ElementRef, PropertyId};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Stable rule identifier (e.g., "hyperlink-has-text")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub &'static str);

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Verdict of one rule against one element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationCode {
    NotApplicable,
    Pass,
    Error,
    Open,
    Note,
    Warning,
    RuleExecutionError,
}

impl fmt::Display for EvaluationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationCode::NotApplicable => write!(f, "not-applicable"),
            EvaluationCode::Pass => write!(f, "pass"),
            EvaluationCode::Error => write!(f, "error"),
            EvaluationCode::Open => write!(f, "open"),
            EvaluationCode::Note => write!(f, "note"),
            EvaluationCode::Warning => write!(f, "warning"),
            EvaluationCode::RuleExecutionError => write!(f, "rule-execution-error"),
        }
    }
}

/// Error raised while evaluating a rule
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("Element {element} has no {property} property")]
    MissingProperty { element: i32, property: PropertyId },

    #[error("{0}")]
    Failed(String),
}

/// Static description supplied with a rule's registration entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMetadata {
    pub id: RuleId,
    pub description: &'static str,
    pub how_to_fix: &'static str,
    /// Citation into the accessibility standards taxonomy (e.g., "WCAG 4.1.2")
    pub standard: &'static str,
    /// Property the rule is keyed to, [`PropertyId::NONE`] if none
    pub property_id: PropertyId,
}

impl RuleMetadata {
    pub const fn new(
        id: &'static str,
        description: &'static str,
        how_to_fix: &'static str,
        standard: &'static str,
    ) -> Self {
        Self {
            id: RuleId(id),
            description,
            how_to_fix,
            standard,
            property_id: PropertyId::NONE,
        }
    }

    pub const fn with_property(self, property_id: PropertyId) -> Self {
        Self {
            property_id,
            ..self
        }
    }

    /// Names of required fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.0.trim().is_empty() {
            missing.push("id");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.how_to_fix.trim().is_empty() {
            missing.push("how_to_fix");
        }
        if self.standard.trim().is_empty() {
            missing.push("standard");
        }
        missing
    }
}

/// Immutable rule information, finalized after the rule's condition exists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleInfo {
    pub id: RuleId,
    pub description: String,
    pub how_to_fix: String,
    pub standard: String,
    pub property_id: PropertyId,
    /// Rendering of the rule's condition (empty when the rule always applies)
    pub condition: String,
}

/// A unit of evaluation
pub trait Rule: Send + Sync {
    fn info(&self) -> &RuleInfo;

    /// Applicability condition; `None` means the rule applies to every element
    fn condition(&self) -> Option<&Condition>;

    /// Evaluate an element the condition already matched
    fn evaluate(&self, element: ElementRef<'_>) -> Result<EvaluationCode, RuleError>;

    fn id(&self) -> RuleId {
        self.info().id
    }
}

/// Condition and info shared by every rule implementation
#[derive(Debug, Clone)]
pub struct RuleCore {
    info: RuleInfo,
    condition: Option<Condition>,
}

impl RuleCore {
    /// Build the condition, then derive the info from it
    pub fn new(metadata: &RuleMetadata, build_condition: impl FnOnce() -> Option<Condition>) -> Self {
        let condition = build_condition();
        let info = RuleInfo {
            id: metadata.id,
            description: metadata.description.to_string(),
            how_to_fix: metadata.how_to_fix.to_string(),
            standard: metadata.standard.to_string(),
            property_id: metadata.property_id,
            condition: condition
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        };
        Self { info, condition }
    }

    pub fn info(&self) -> &RuleInfo {
        &self.info
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }
}

type EvaluateFn = dyn Fn(ElementRef<'_>) -> Result<EvaluationCode, RuleError> + Send + Sync;

/// Rule backed by a closure, for hosts that register rules without a dedicated type
pub struct FnRule {
    core: RuleCore,
    evaluate: Box<EvaluateFn>,
}

impl FnRule {
    pub fn new<F>(metadata: &RuleMetadata, condition: Option<Condition>, evaluate: F) -> Self
    where
        F: Fn(ElementRef<'_>) -> Result<EvaluationCode, RuleError> + Send + Sync + 'static,
    {
        Self {
            core: RuleCore::new(metadata, || condition),
            evaluate: Box::new(evaluate),
        }
    }
}

impl Rule for FnRule {
    fn info(&self) -> &RuleInfo {
        self.core.info()
    }

    fn condition(&self) -> Option<&Condition> {
        self.core.condition()
    }

    fn evaluate(&self, element: ElementRef<'_>) -> Result<EvaluationCode, RuleError> {
        (self.evaluate)(element)
    }
}

impl fmt::Debug for FnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").field("info", self.info()).finish()
    }
}
