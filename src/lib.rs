//! a11y-scan - Accessibility Conformance Rule Engine
//!
//! Walks a UI element hierarchy exposed by an accessibility platform, builds a
//! bounded in-memory tree around a selected element and evaluates a registry of
//! accessibility rules against every element.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> ScanContext -> TreeWalker -> AccessibilityTree
//!                        -> RuleRunner -> RuleProvider -> Rule
//! ```
//!
//! The walker resolves the ancestry of the selected element, enumerates its
//! subtree (plus one level of siblings) under an element cap, populates
//! properties in parallel and, in test mode, runs every applicable rule.
//! Results aggregate to the most severe [`ScanStatus`].
//!
//! # Writing Rules
//!
//! ```
//! use a11y_scan::{Condition, ControlTypeId, EvaluationCode, FnRule, Rule, RuleMetadata, RuleRegistration};
//! use std::sync::Arc;
//!
//! let registration = RuleRegistration::new(
//!     RuleMetadata::new("image-has-name", "Images need a name", "Set Name", "WCAG 1.1.1"),
//!     |m| -> Arc<dyn Rule> {
//!         Arc::new(FnRule::new(m, Some(Condition::control_type(ControlTypeId::IMAGE)), |e| {
//!             Ok(if e.name().is_some() { EvaluationCode::Pass } else { EvaluationCode::Error })
//!         }))
//!     },
//! );
//! assert_eq!(registration.id().as_str(), "image-has-name");
//! ```

pub mod condition;
pub mod config;
pub mod context;
pub mod counter;
pub mod element;
pub mod output;
pub mod platform;
pub mod registry;
pub mod results;
pub mod rule;
pub mod rules;
pub mod runner;
pub mod walker;

// Re-export main types
pub use condition::{Condition, ConditionError};
pub use config::{ColorMode, Config, ConfigError, OutputFormat};
pub use context::ScanContext;
pub use counter::{BoundedCounter, CounterError};
pub use element::{
    ControlTypeId, ElementNode, ElementRef, ElementTree, NodeIndex, PatternId, PropertyBag,
    PropertyId, PropertyValue, Rect,
};
pub use output::{Finding, JsonFormatter, OutputFormatter, SarifFormatter, ScanReport, TextFormatter};
pub use platform::{AccessibilityTree, PlatformError, PropertySnapshot, SnapshotError, SnapshotHandle, SnapshotTree};
pub use registry::{RegistryError, RuleFactory, RuleProvider, RuleRegistration};
pub use results::{ReportLevel, RuleResult, ScanMetaInfo, ScanResult, ScanResults, ScanStatus, StatusError};
pub use rule::{EvaluationCode, FnRule, Rule, RuleCore, RuleError, RuleId, RuleInfo, RuleMetadata};
pub use rules::builtin_registrations;
pub use runner::{ExceptionReporter, LogReporter, RuleFailure, RuleRunner, RunResult};
pub use walker::{ScanTree, TreeWalker, WalkError, WalkMode, WalkOptions, WalkState};
