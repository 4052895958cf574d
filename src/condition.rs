//! Condition algebra for deciding which elements a rule applies to
//!
//! Conditions are immutable expression trees over an element. They are built
//! once, shared between rules through `Arc`, and evaluated concurrently from
//! the rayon pool without any synchronization.
//!
//! ```text
//! Hyperlink / Text               hyperlink with at least one Text child
//! Button | Hyperlink             either control type
//! Button & !PatternIs(Invoke)    button that does not support Invoke
//! ```

use crate::element::{ControlTypeId, ElementRef, PatternId};
use std::fmt;
use std::ops::{BitAnd, BitOr, Div, Not};
use std::sync::Arc;
use thiserror::Error;

/// Error evaluating a condition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("Condition '{0}' requires an element")]
    MissingElement(String),
}

/// A composable predicate over an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    True,
    False,
    ControlTypeIs(ControlTypeId),
    PatternIs(PatternId),
    And(Arc<Condition>, Arc<Condition>),
    Or(Arc<Condition>, Arc<Condition>),
    Not(Arc<Condition>),
    /// Parent condition holds and at least one direct child satisfies the child condition
    TreeDescendant(Arc<Condition>, Arc<Condition>),
}

impl Condition {
    pub fn control_type(id: ControlTypeId) -> Self {
        Condition::ControlTypeIs(id)
    }

    pub fn pattern(id: PatternId) -> Self {
        Condition::PatternIs(id)
    }

    /// Match if any of the given control types matches
    pub fn any_control_type(ids: &[ControlTypeId]) -> Self {
        ids.iter()
            .map(|id| Condition::ControlTypeIs(*id))
            .reduce(|acc, c| acc | c)
            .unwrap_or(Condition::False)
    }

    /// Value of the condition when it does not depend on any element
    pub fn constant_value(&self) -> Option<bool> {
        match self {
            Condition::True => Some(true),
            Condition::False => Some(false),
            Condition::ControlTypeIs(_) | Condition::PatternIs(_) => None,
            Condition::Not(inner) => inner.constant_value().map(|v| !v),
            Condition::And(l, r) | Condition::TreeDescendant(l, r) => {
                Some(l.constant_value()? && r.constant_value()?)
            }
            Condition::Or(l, r) => Some(l.constant_value()? || r.constant_value()?),
        }
    }

    /// Evaluate against an optional element
    ///
    /// Constant sub-expressions evaluate without an element. Predicates that
    /// inspect the element fail with [`ConditionError::MissingElement`] when
    /// none is given.
    pub fn evaluate(&self, element: Option<ElementRef<'_>>) -> Result<bool, ConditionError> {
        match self {
            Condition::True => Ok(true),
            Condition::False => Ok(false),
            Condition::ControlTypeIs(id) => {
                Ok(self.require(element)?.control_type() == *id)
            }
            Condition::PatternIs(id) => Ok(self.require(element)?.has_pattern(*id)),
            Condition::And(l, r) => Ok(l.evaluate(element)? && r.evaluate(element)?),
            Condition::Or(l, r) => Ok(l.evaluate(element)? || r.evaluate(element)?),
            Condition::Not(inner) => Ok(!inner.evaluate(element)?),
            Condition::TreeDescendant(parent, child) => {
                if let (Some(p), Some(c)) = (parent.constant_value(), child.constant_value()) {
                    return Ok(p && c);
                }
                if !parent.evaluate(element)? {
                    return Ok(false);
                }
                let element = self.require(element)?;
                for c in element.children() {
                    if child.evaluate(Some(c))? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Evaluate against a present element
    pub fn matches(&self, element: ElementRef<'_>) -> bool {
        // Only evaluation without an element can fail.
        self.evaluate(Some(element)).unwrap_or(false)
    }

    fn require<'a>(&self, element: Option<ElementRef<'a>>) -> Result<ElementRef<'a>, ConditionError> {
        element.ok_or_else(|| ConditionError::MissingElement(self.to_string()))
    }

    fn precedence(&self) -> u8 {
        match self {
            Condition::Or(..) => 1,
            Condition::And(..) => 2,
            Condition::TreeDescendant(..) => 3,
            _ => 4,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, outer: u8) -> fmt::Result {
        if self.precedence() < outer {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::True => write!(f, "True"),
            Condition::False => write!(f, "False"),
            Condition::ControlTypeIs(id) => write!(f, "{}", id),
            Condition::PatternIs(id) => write!(f, "PatternIs({})", id),
            Condition::And(l, r) => {
                l.fmt_operand(f, 2)?;
                write!(f, " & ")?;
                r.fmt_operand(f, 3)
            }
            Condition::Or(l, r) => {
                l.fmt_operand(f, 1)?;
                write!(f, " | ")?;
                r.fmt_operand(f, 2)
            }
            Condition::Not(inner) => {
                write!(f, "!")?;
                inner.fmt_operand(f, 4)
            }
            Condition::TreeDescendant(parent, child) => {
                parent.fmt_operand(f, 3)?;
                write!(f, " / ")?;
                child.fmt_operand(f, 4)
            }
        }
    }
}

impl From<ControlTypeId> for Condition {
    fn from(id: ControlTypeId) -> Self {
        Condition::ControlTypeIs(id)
    }
}

impl From<PatternId> for Condition {
    fn from(id: PatternId) -> Self {
        Condition::PatternIs(id)
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        Condition::And(Arc::new(self), Arc::new(rhs))
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        Condition::Or(Arc::new(self), Arc::new(rhs))
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Arc::new(self))
    }
}

impl Div for Condition {
    type Output = Condition;

    fn div(self, rhs: Condition) -> Condition {
        Condition::TreeDescendant(Arc::new(self), Arc::new(rhs))
    }
}

impl BitAnd for &Condition {
    type Output = Condition;

    fn bitand(self, rhs: &Condition) -> Condition {
        self.clone() & rhs.clone()
    }
}

impl BitOr for &Condition {
    type Output = Condition;

    fn bitor(self, rhs: &Condition) -> Condition {
        self.clone() | rhs.clone()
    }
}

impl Not for &Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        !self.clone()
    }
}

impl Div for &Condition {
    type Output = Condition;

    fn div(self, rhs: &Condition) -> Condition {
        self.clone() / rhs.clone()
    }
}
