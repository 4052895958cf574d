//! SARIF (Static Analysis Results Interchange Format) output formatter
//!
//! Elements have no file position, so results carry logical locations
//! naming the scanned element.

use super::{Finding, OutputFormatter, ScanReport};
use crate::results::ReportLevel;
use serde::Serialize;
use std::collections::BTreeMap;

/// SARIF formatter for CI/CD integration
#[derive(Default)]
pub struct SarifFormatter {
    pub tool_name: String,

    pub tool_version: String,
}

impl SarifFormatter {
    pub fn new(tool_name: &str, tool_version: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            tool_version: tool_version.to_string(),
        }
    }
}

#[derive(Serialize)]
struct SarifReport {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: String,
    version: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
struct SarifRule {
    id: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    help: SarifMessage,
    properties: SarifRuleProperties,
}

#[derive(Serialize)]
struct SarifRuleProperties {
    tags: Vec<String>,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: &'static str,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "logicalLocations")]
    logical_locations: Vec<SarifLogicalLocation>,
}

#[derive(Serialize)]
struct SarifLogicalLocation {
    name: String,
    #[serde(rename = "fullyQualifiedName")]
    fully_qualified_name: String,
    kind: &'static str,
}

fn level(finding: &Finding) -> &'static str {
    ReportLevel::from(finding.status).as_str()
}

fn result_for(source: &str, finding: &Finding) -> SarifResult {
    let mut text = finding.description.clone();
    for message in &finding.messages {
        text.push_str(": ");
        text.push_str(message);
    }
    SarifResult {
        rule_id: finding.rule_id.clone(),
        level: level(finding),
        message: SarifMessage { text },
        locations: vec![SarifLocation {
            logical_locations: vec![SarifLogicalLocation {
                name: finding.element_label(),
                fully_qualified_name: format!("{}#{}", source, finding.element_id),
                kind: "element",
            }],
        }],
    }
}

impl OutputFormatter for SarifFormatter {
    fn format(&self, report: &ScanReport) -> String {
        let mut rules_map = BTreeMap::new();
        for finding in report.issues() {
            rules_map
                .entry(finding.rule_id.clone())
                .or_insert_with(|| SarifRule {
                    id: finding.rule_id.clone(),
                    short_description: SarifMessage {
                        text: finding.description.clone(),
                    },
                    help: SarifMessage {
                        text: finding.how_to_fix.clone(),
                    },
                    properties: SarifRuleProperties {
                        tags: vec![finding.standard.clone()],
                    },
                });
        }

        let results: Vec<SarifResult> = report
            .issues()
            .map(|f| result_for(&report.source, f))
            .collect();

        let sarif = SarifReport {
            schema: "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
            version: "2.1.0",
            runs: vec![SarifRun {
                tool: SarifTool {
                    driver: SarifDriver {
                        name: self.tool_name.clone(),
                        version: self.tool_version.clone(),
                        rules: rules_map.into_values().collect(),
                    },
                },
                results,
            }],
        };

        serde_json::to_string_pretty(&sarif).unwrap_or_default()
    }

    fn format_finding(&self, finding: &Finding) -> String {
        serde_json::to_string_pretty(&result_for("", finding)).unwrap_or_default()
    }
}
