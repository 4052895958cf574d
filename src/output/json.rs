//! JSON output formatter

use super::{Finding, OutputFormatter, ScanReport};

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_default()
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &ScanReport) -> String {
        self.render(report)
    }

    fn format_finding(&self, finding: &Finding) -> String {
        self.render(finding)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{finding, report};
    use super::*;
    use crate::results::ScanStatus;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    #[test]
    fn test_json_format() {
        let formatter = JsonFormatter::new();
        let output = formatter.format(&report(vec![finding("name-not-empty", ScanStatus::Fail, 2)]));
        let value: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["source"], "window.yaml");
        assert_eq!(value["mode"], "test");
        assert_eq!(value["status"], "Fail");
        assert_eq!(value["duration_ms"], 0);
        assert_eq!(value["findings"][0]["rule_id"], "name-not-empty");
        assert_eq!(value["findings"][0]["control_type"], 50000);
        assert_eq!(value["findings"][0]["property_id"], 30005);
    }

    #[test]
    fn test_json_finding_pretty() {
        let formatter = JsonFormatter::new().pretty();
        let mut f = finding("a", ScanStatus::Pass, 1);
        f.element_name = None;
        let output = formatter.format_finding(&f);
        assert!(output.contains("\n  \"rule_id\": \"a\""));
        assert!(!output.contains("element_name"));
    }
}
