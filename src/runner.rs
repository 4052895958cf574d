//! Rule orchestration: applicability filtering and per-rule failure isolation

use crate::element::ElementRef;
use crate::registry::RuleProvider;
use crate::rule::{EvaluationCode, Rule, RuleId, RuleInfo};
use log::error;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Outcome of running one rule against one element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub rule_id: RuleId,
    /// Absent when the rule id is not registered
    pub rule_info: Option<RuleInfo>,
    pub element_id: i32,
    pub evaluation_code: EvaluationCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RunResult {
    fn new(rule: &dyn Rule, element: ElementRef<'_>, code: EvaluationCode) -> Self {
        Self {
            rule_id: rule.id(),
            rule_info: Some(rule.info().clone()),
            element_id: element.unique_id(),
            evaluation_code: code,
            error_message: None,
        }
    }

    fn execution_error(mut self, message: String) -> Self {
        self.evaluation_code = EvaluationCode::RuleExecutionError;
        self.error_message = Some(message);
        self
    }
}

/// A rule that failed while evaluating an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule_id: RuleId,
    pub element_id: i32,
    pub message: String,
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rule '{}' failed on element {}: {}",
            self.rule_id, self.element_id, self.message
        )
    }
}

/// Sink for rule failures
pub trait ExceptionReporter: Send + Sync {
    fn report_exception(&self, failure: &RuleFailure);
}

/// Reports rule failures through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ExceptionReporter for LogReporter {
    fn report_exception(&self, failure: &RuleFailure) {
        error!("{}", failure);
    }
}

/// Runs registered rules against elements
#[derive(Clone)]
pub struct RuleRunner {
    provider: Arc<RuleProvider>,
    reporter: Arc<dyn ExceptionReporter>,
}

impl RuleRunner {
    pub fn new(provider: Arc<RuleProvider>) -> Self {
        Self {
            provider,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ExceptionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn provider(&self) -> &RuleProvider {
        &self.provider
    }

    /// Run a single rule by id
    pub fn run_rule(&self, id: RuleId, element: ElementRef<'_>) -> RunResult {
        match self.provider.get_rule(id) {
            Some(rule) => self.run(rule.as_ref(), element),
            None => RunResult {
                rule_id: id,
                rule_info: None,
                element_id: element.unique_id(),
                evaluation_code: EvaluationCode::RuleExecutionError,
                error_message: Some(format!("Rule '{}' is not registered", id)),
            },
        }
    }

    /// Run every registered rule, one result per rule
    pub fn run_all(&self, element: ElementRef<'_>) -> Vec<RunResult> {
        self.provider
            .all_rules()
            .iter()
            .map(|rule| self.run(rule.as_ref(), element))
            .collect()
    }

    fn run(&self, rule: &dyn Rule, element: ElementRef<'_>) -> RunResult {
        let applies = rule.condition().is_none_or(|c| c.matches(element));
        if !applies {
            return RunResult::new(rule, element, EvaluationCode::NotApplicable);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(element)));
        let message = match outcome {
            Ok(Ok(code)) => return RunResult::new(rule, element, code),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        self.reporter.report_exception(&RuleFailure {
            rule_id: rule.id(),
            element_id: element.unique_id(),
            message: message.clone(),
        });
        RunResult::new(rule, element, EvaluationCode::Pass).execution_error(message)
    }
}

impl fmt::Debug for RuleRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRunner")
            .field("provider", &self.provider)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("Rule panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("Rule panicked: {}", s)
    } else {
        "Rule panicked".to_string()
    }
}
