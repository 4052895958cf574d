//! Scan reports and their output formatters

mod json;
mod sarif;
mod text;

pub use json::JsonFormatter;
pub use sarif::SarifFormatter;
pub use text::TextFormatter;

use crate::config::Config;
use crate::element::{ControlTypeId, PropertyId};
use crate::results::ScanStatus;
use crate::walker::{ScanTree, WalkMode};
use serde::Serialize;
use std::time::Duration;

/// One rule outcome on one element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub rule_id: String,
    pub status: ScanStatus,
    pub description: String,
    pub how_to_fix: String,
    pub standard: String,
    pub messages: Vec<String>,
    pub element_id: i32,
    pub control_type: ControlTypeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_name: Option<String>,
    pub property_id: PropertyId,
}

impl Finding {
    /// Short element label, e.g. `#3 Button "OK"`
    pub fn element_label(&self) -> String {
        match &self.element_name {
            Some(name) => format!("#{} {} \"{}\"", self.element_id, self.control_type, name),
            None => format!("#{} {}", self.element_id, self.control_type),
        }
    }
}

/// Everything a formatter needs from one walk
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Where the scanned tree came from (e.g. snapshot path)
    pub source: String,
    pub mode: WalkMode,
    pub elements: usize,
    pub truncated: bool,
    pub unpopulated: usize,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub status: ScanStatus,
    /// Ordered by element id, then rule order
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// Collect the results of `scan`, leaving out rules disabled in `config`
    pub fn from_scan(source: &str, scan: &ScanTree, config: &Config) -> Self {
        let mut findings = Vec::new();
        for element in scan.tree().iter() {
            for result in element.scan_results().snapshot() {
                for item in result.items() {
                    if item.status() == ScanStatus::NoResult || !config.is_rule_enabled(&item.rule_id) {
                        continue;
                    }
                    findings.push(Finding {
                        rule_id: item.rule_id.clone(),
                        status: item.status(),
                        description: item.description.clone(),
                        how_to_fix: item.how_to_fix.clone(),
                        standard: item.standard.clone(),
                        messages: item.messages().to_vec(),
                        element_id: result.meta.element_id,
                        control_type: result.meta.control_type,
                        element_name: element.name().map(str::to_string),
                        property_id: result.meta.property_id,
                    });
                }
            }
        }
        findings.sort_by_key(|f| f.element_id);

        Self {
            source: source.to_string(),
            mode: scan.mode(),
            elements: scan.tree().len(),
            truncated: scan.truncated(),
            unpopulated: scan.unpopulated(),
            duration: scan.elapsed(),
            status: ScanStatus::aggregate(findings.iter().map(|f| f.status)),
            findings,
        }
    }

    /// Findings worse than a pass
    pub fn issues(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.status > ScanStatus::Pass)
    }

    pub fn count(&self, status: ScanStatus) -> usize {
        self.findings.iter().filter(|f| f.status == status).count()
    }

    /// Process exit code for this report
    pub fn exit_code(&self) -> i32 {
        match self.status {
            ScanStatus::Fail | ScanStatus::ScanNotSupported => 2,
            ScanStatus::Uncertain => 1,
            ScanStatus::NoResult | ScanStatus::Pass => 0,
        }
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire report
    fn format(&self, report: &ScanReport) -> String;

    /// Format a single finding
    fn format_finding(&self, finding: &Finding) -> String;
}


#[cfg(test)]
mod tests {
    use super::fixtures::{finding, report};
    use super::*;
    use crate::platform::SnapshotTree;
    use crate::rules::builtin_registrations;
    use crate::ScanContext;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exit_codes() {
        assert_eq!(report(vec![]).exit_code(), 0);
        assert_eq!(report(vec![finding("a", ScanStatus::Pass, 1)]).exit_code(), 0);
        assert_eq!(report(vec![finding("a", ScanStatus::Uncertain, 1)]).exit_code(), 1);
        assert_eq!(
            report(vec![
                finding("a", ScanStatus::Uncertain, 1),
                finding("b", ScanStatus::Fail, 2)
            ])
            .exit_code(),
            2
        );
        assert_eq!(
            report(vec![finding("a", ScanStatus::ScanNotSupported, 1)]).exit_code(),
            2
        );
    }

    #[test]
    fn test_element_label() {
        let mut f = finding("a", ScanStatus::Fail, 3);
        assert_eq!(f.element_label(), "#3 Button \"OK\"");
        f.element_name = None;
        assert_eq!(f.element_label(), "#3 Button");
    }

    #[test]
    fn test_from_scan_respects_disabled_rules() {
        let platform = SnapshotTree::from_yaml_str(
            r#"
control_type: Window
children:
  - control_type: Button
  - control_type: Button
    properties: { Name: OK }
"#,
        )
        .unwrap();

        let mut config = Config::new();
        config.engine.parallel = false;
        let context = ScanContext::new(config.clone(), builtin_registrations()).unwrap();
        let scan = context.walker(&platform).unwrap().walk(&platform.root()).unwrap();

        let report = ScanReport::from_scan("inline", &scan, &config);
        let outcomes: Vec<(&str, i32, ScanStatus)> = report
            .findings
            .iter()
            .map(|f| (f.rule_id.as_str(), f.element_id, f.status))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("name-not-empty", 1, ScanStatus::Fail),
                ("name-not-empty", 2, ScanStatus::Pass),
            ]
        );
        assert_eq!(report.status, ScanStatus::Fail);
        assert_eq!(report.elements, 3);

        config.rules.disabled.push("name-not-empty".to_string());
        let report = ScanReport::from_scan("inline", &scan, &config);
        assert!(report.findings.is_empty());
        assert_eq!(report.exit_code(), 0);
    }
}
