//! Scan status model and result aggregation
//!
//! Statuses are totally ordered by severity. Every aggregate (rule, scan,
//! element, whole walk) reports the most severe status it contains, so the
//! outcome does not depend on the order in which parallel workers append.

use crate::element::{ControlTypeId, ElementRef, PropertyId};
use crate::rule::{EvaluationCode, RuleInfo};
use crate::runner::RunResult;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Error converting a raw ordinal into a [`ScanStatus`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Unmapped scan status ordinal {0}: expected 0 (NoResult) through 4 (ScanNotSupported)")]
    Unmapped(i32),
}

/// Aggregated severity, ascending
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
)]
pub enum ScanStatus {
    #[default]
    NoResult = 0,
    Pass = 1,
    Uncertain = 2,
    Fail = 3,
    ScanNotSupported = 4,
}

impl ScanStatus {
    pub fn ordinal(&self) -> i32 {
        *self as i32
    }

    /// User-facing label
    pub fn label(&self) -> &'static str {
        match self {
            ScanStatus::NoResult => "No result",
            ScanStatus::Pass => "Pass",
            ScanStatus::Uncertain => "Needs review",
            ScanStatus::Fail => "Failed",
            ScanStatus::ScanNotSupported => "Not supported",
        }
    }

    /// Most severe status of `statuses`, or `NoResult` when empty
    pub fn aggregate(statuses: impl IntoIterator<Item = ScanStatus>) -> ScanStatus {
        statuses.into_iter().max().unwrap_or(ScanStatus::NoResult)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl TryFrom<i32> for ScanStatus {
    type Error = StatusError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ScanStatus::NoResult),
            1 => Ok(ScanStatus::Pass),
            2 => Ok(ScanStatus::Uncertain),
            3 => Ok(ScanStatus::Fail),
            4 => Ok(ScanStatus::ScanNotSupported),
            other => Err(StatusError::Unmapped(other)),
        }
    }
}

impl From<EvaluationCode> for ScanStatus {
    fn from(code: EvaluationCode) -> Self {
        match code {
            EvaluationCode::NotApplicable => ScanStatus::NoResult,
            EvaluationCode::Pass => ScanStatus::Pass,
            EvaluationCode::Open | EvaluationCode::Warning | EvaluationCode::Note => {
                ScanStatus::Uncertain
            }
            EvaluationCode::Error => ScanStatus::Fail,
            EvaluationCode::RuleExecutionError => ScanStatus::ScanNotSupported,
        }
    }
}

/// Level used by external reports (SARIF-style)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportLevel {
    None,
    Note,
    Warning,
    Error,
}

impl ReportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportLevel::None => "none",
            ReportLevel::Note => "note",
            ReportLevel::Warning => "warning",
            ReportLevel::Error => "error",
        }
    }
}

impl From<ScanStatus> for ReportLevel {
    fn from(status: ScanStatus) -> Self {
        match status {
            ScanStatus::NoResult | ScanStatus::Pass => ReportLevel::None,
            ScanStatus::Uncertain => ReportLevel::Warning,
            ScanStatus::Fail => ReportLevel::Error,
            ScanStatus::ScanNotSupported => ReportLevel::Note,
        }
    }
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one rule, with its diagnostic messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub description: String,
    pub how_to_fix: String,
    pub standard: String,
    status: ScanStatus,
    messages: Vec<String>,
}

impl RuleResult {
    pub fn new(rule_id: &str, description: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            description: description.to_string(),
            how_to_fix: String::new(),
            standard: String::new(),
            status: ScanStatus::Pass,
            messages: Vec::new(),
        }
    }

    pub fn from_info(info: &RuleInfo) -> Self {
        Self {
            how_to_fix: info.how_to_fix.clone(),
            standard: info.standard.clone(),
            ..Self::new(info.id.as_str(), &info.description)
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Raise the status if `status` is more severe; always keep a non-empty message
    pub fn set_status(&mut self, status: ScanStatus, message: &str) {
        if status > self.status {
            self.status = status;
        }
        if !message.is_empty() {
            self.messages.push(message.to_string());
        }
    }
}

/// What a scan result is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanMetaInfo {
    pub element_id: i32,
    pub control_type: ControlTypeId,
    pub property_id: PropertyId,
}

/// Rule results for one rule/element pairing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub description: String,
    pub meta: ScanMetaInfo,
    items: Vec<RuleResult>,
}

impl ScanResult {
    pub fn new(description: &str, meta: ScanMetaInfo) -> Self {
        Self {
            description: description.to_string(),
            meta,
            items: Vec::new(),
        }
    }

    /// Adapt one rule run into a scan result
    ///
    /// A `NotApplicable` run adapts to [`ScanStatus::NoResult`].
    pub fn from_run_result(run: &RunResult, element: ElementRef<'_>) -> Self {
        let (mut rule_result, property_id) = match &run.rule_info {
            Some(info) => (RuleResult::from_info(info), info.property_id),
            None => (RuleResult::new(run.rule_id.as_str(), ""), PropertyId::NONE),
        };
        let status = ScanStatus::from(run.evaluation_code);
        if status == ScanStatus::NoResult {
            rule_result.status = ScanStatus::NoResult;
        }
        let message = run.error_message.as_deref().unwrap_or_default();
        rule_result.set_status(status, message);

        let mut scan = ScanResult::new(
            &rule_result.description,
            ScanMetaInfo {
                element_id: element.unique_id(),
                control_type: element.control_type(),
                property_id,
            },
        );
        scan.add_rule_result(rule_result);
        scan
    }

    pub fn add_rule_result(&mut self, result: RuleResult) {
        self.items.push(result);
    }

    pub fn items(&self) -> &[RuleResult] {
        &self.items
    }

    pub fn status(&self) -> ScanStatus {
        ScanStatus::aggregate(self.items.iter().map(RuleResult::status))
    }
}

/// Thread-safe, append-only collection of scan results
#[derive(Debug, Default)]
pub struct ScanResults {
    items: Mutex<Vec<ScanResult>>,
}

impl ScanResults {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScanResult>> {
        // A poisoned lock still holds a consistent Vec.
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_scan_result(&self, result: ScanResult) {
        self.lock().push(result);
    }

    /// Drop results of a previous scan
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current results
    pub fn snapshot(&self) -> Vec<ScanResult> {
        self.lock().clone()
    }

    pub fn status(&self) -> ScanStatus {
        ScanStatus::aggregate(self.lock().iter().map(ScanResult::status))
    }
}

impl Serialize for ScanResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementNode, ElementTree};
    use crate::rule::RuleId;
    use std::sync::Arc;
    use std::thread;

    fn scan_with(statuses: &[ScanStatus]) -> ScanResult {
        let mut scan = ScanResult::new("scan", ScanMetaInfo::default());
        for (i, status) in statuses.iter().enumerate() {
            let mut r = RuleResult::new(&format!("rule-{}", i), "");
            r.set_status(*status, "");
            scan.add_rule_result(r);
        }
        scan
    }

    #[test]
    fn test_status_order() {
        assert!(ScanStatus::NoResult < ScanStatus::Pass);
        assert!(ScanStatus::Pass < ScanStatus::Uncertain);
        assert!(ScanStatus::Uncertain < ScanStatus::Fail);
        assert!(ScanStatus::Fail < ScanStatus::ScanNotSupported);
        assert_eq!(ScanStatus::ScanNotSupported.ordinal(), 4);
    }

    #[test]
    fn test_try_from_ordinal() {
        assert_eq!(ScanStatus::try_from(3), Ok(ScanStatus::Fail));
        let err = ScanStatus::try_from(9).unwrap_err();
        assert_eq!(err, StatusError::Unmapped(9));
        assert!(err.to_string().contains("Unmapped scan status ordinal 9"));
    }

    #[test]
    fn test_every_status_has_report_level() {
        for ordinal in 0..=4 {
            let status = ScanStatus::try_from(ordinal).unwrap();
            let level = ReportLevel::from(status);
            assert!(!level.as_str().is_empty());
            assert!(!status.label().is_empty());
        }
        assert_eq!(ReportLevel::from(ScanStatus::Fail), ReportLevel::Error);
        assert_eq!(ReportLevel::from(ScanStatus::Uncertain).as_str(), "warning");
    }

    #[test]
    fn test_evaluation_code_mapping() {
        assert_eq!(ScanStatus::from(EvaluationCode::Error), ScanStatus::Fail);
        assert_eq!(ScanStatus::from(EvaluationCode::Pass), ScanStatus::Pass);
        assert_eq!(ScanStatus::from(EvaluationCode::Warning), ScanStatus::Uncertain);
        assert_eq!(
            ScanStatus::from(EvaluationCode::RuleExecutionError),
            ScanStatus::ScanNotSupported
        );
        assert_eq!(ScanStatus::from(EvaluationCode::NotApplicable), ScanStatus::NoResult);
    }

    #[test]
    fn test_set_status_never_lowers() {
        let mut r = RuleResult::new("rule", "desc");
        assert_eq!(r.status(), ScanStatus::Pass);

        r.set_status(ScanStatus::Fail, "");
        r.set_status(ScanStatus::Pass, "msg");
        assert_eq!(r.status(), ScanStatus::Fail);
        assert_eq!(r.messages(), &["msg".to_string()]);

        r.set_status(ScanStatus::ScanNotSupported, "boom");
        assert_eq!(r.status(), ScanStatus::ScanNotSupported);
        assert_eq!(r.messages().len(), 2);
    }

    fn run(code: EvaluationCode, error_message: Option<&str>) -> RunResult {
        RunResult {
            rule_id: RuleId("button-only"),
            rule_info: None,
            element_id: 0,
            evaluation_code: code,
            error_message: error_message.map(str::to_string),
        }
    }

    #[test]
    fn test_from_run_result_maps_code() {
        let mut tree = ElementTree::new();
        let text = tree.push(ElementNode::new(0, ControlTypeId::TEXT));
        let element = tree.get(text).unwrap();

        let skipped = ScanResult::from_run_result(&run(EvaluationCode::NotApplicable, None), element);
        assert_eq!(skipped.status(), ScanStatus::NoResult);
        assert_eq!(skipped.meta.control_type, ControlTypeId::TEXT);

        let failed = ScanResult::from_run_result(&run(EvaluationCode::Error, None), element);
        assert_eq!(failed.status(), ScanStatus::Fail);

        let crashed = ScanResult::from_run_result(
            &run(EvaluationCode::RuleExecutionError, Some("boom")),
            element,
        );
        assert_eq!(crashed.status(), ScanStatus::ScanNotSupported);
        assert_eq!(crashed.items()[0].messages(), &["boom".to_string()]);
    }

    #[test]
    fn test_scan_result_status_is_max() {
        assert_eq!(scan_with(&[]).status(), ScanStatus::NoResult);
        assert_eq!(
            scan_with(&[ScanStatus::Pass, ScanStatus::Fail, ScanStatus::Uncertain]).status(),
            ScanStatus::Fail
        );
        assert_eq!(
            scan_with(&[ScanStatus::Fail, ScanStatus::ScanNotSupported]).status(),
            ScanStatus::ScanNotSupported
        );
    }

    #[test]
    fn test_scan_results_status_is_max() {
        let results = ScanResults::new();
        assert_eq!(results.status(), ScanStatus::NoResult);
        assert!(results.is_empty());

        results.add_scan_result(scan_with(&[ScanStatus::Pass]));
        results.add_scan_result(scan_with(&[ScanStatus::Uncertain]));
        assert_eq!(results.status(), ScanStatus::Uncertain);
        assert_eq!(results.len(), 2);

        results.clear();
        assert_eq!(results.status(), ScanStatus::NoResult);
    }

    #[test]
    fn test_concurrent_appends() {
        let results = Arc::new(ScanResults::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let results = Arc::clone(&results);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let status = if i == 3 { ScanStatus::Fail } else { ScanStatus::Pass };
                        results.add_scan_result(scan_with(&[status]));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(results.len(), 400);
        assert_eq!(results.status(), ScanStatus::Fail);
    }
}
