//! Built-in accessibility rules

mod builtin;

pub use builtin::{BoundingRectValid, HyperlinkHasText, NameNotEmpty};

use crate::registry::RuleRegistration;
use crate::rule::Rule;
use std::sync::Arc;

/// Registration table for every built-in rule, in report order
pub fn builtin_registrations() -> Vec<RuleRegistration> {
    vec![
        RuleRegistration::new(HyperlinkHasText::METADATA, |m| -> Arc<dyn Rule> {
            Arc::new(HyperlinkHasText::new(m))
        }),
        RuleRegistration::new(NameNotEmpty::METADATA, |m| -> Arc<dyn Rule> {
            Arc::new(NameNotEmpty::new(m))
        }),
        RuleRegistration::new(BoundingRectValid::METADATA, |m| -> Arc<dyn Rule> {
            Arc::new(BoundingRectValid::new(m))
        }),
    ]
}
