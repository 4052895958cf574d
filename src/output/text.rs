//! Human-readable text output formatter

use super::{Finding, OutputFormatter, ScanReport};
use crate::results::ScanStatus;
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// List passing findings as well as issues
    pub show_passes: bool,

    /// Show how-to-fix text under each finding
    pub show_help: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_passes: false,
            show_help: true,
        }
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    pub fn with_passes(mut self) -> Self {
        self.show_passes = true;
        self
    }

    fn status_str(&self, status: ScanStatus) -> ColoredString {
        let s = status.label().to_string();
        if !self.colored {
            return s.normal();
        }
        match status {
            ScanStatus::Fail => s.red().bold(),
            ScanStatus::Uncertain => s.yellow().bold(),
            ScanStatus::ScanNotSupported => s.magenta(),
            ScanStatus::Pass => s.green(),
            ScanStatus::NoResult => s.dimmed(),
        }
    }

    fn paint(&self, s: String, f: fn(String) -> ColoredString) -> String {
        if self.colored {
            f(s).to_string()
        } else {
            s
        }
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &ScanReport) -> String {
        let mut output = String::new();

        let header = if self.colored {
            report.source.underline().to_string()
        } else {
            report.source.clone()
        };
        output.push_str(&format!("{} ({} mode)\n", header, report.mode));

        for finding in &report.findings {
            if finding.status > ScanStatus::Pass || self.show_passes {
                output.push_str(&self.format_finding(finding));
            }
        }

        output.push_str(&format!(
            "\n{} scanned",
            plural(report.elements, "element", "elements")
        ));
        let tallies: [(ScanStatus, &str, &str, fn(String) -> ColoredString); 4] = [
            (ScanStatus::Fail, "failure", "failures", |s| s.red()),
            (ScanStatus::Uncertain, "needs review", "need review", |s| s.yellow()),
            (ScanStatus::ScanNotSupported, "not supported", "not supported", |s| s.magenta()),
            (ScanStatus::Pass, "pass", "passes", |s| s.green()),
        ];
        let mut counts = Vec::new();
        for (status, one, many, color) in tallies {
            let n = report.count(status);
            if n > 0 {
                counts.push(self.paint(plural(n, one, many), color));
            }
        }
        if !counts.is_empty() {
            output.push_str(&format!(": {}", counts.join(", ")));
        }
        output.push('\n');

        if report.truncated {
            output.push_str(&self.paint(
                "Element limit reached; the tree was truncated\n".to_string(),
                |s| s.yellow(),
            ));
        }
        if report.unpopulated > 0 {
            output.push_str(&format!(
                "Properties unavailable for {}\n",
                plural(report.unpopulated, "element", "elements")
            ));
        }

        output.push_str(&format!(
            "Status: {}\nFinished in {:.2}s\n",
            self.status_str(report.status),
            report.duration.as_secs_f64()
        ));

        output
    }

    fn format_finding(&self, finding: &Finding) -> String {
        let mut output = format!(
            "  {} [{}] {}: {}\n",
            self.status_str(finding.status),
            self.paint(finding.rule_id.clone(), |s| s.cyan()),
            finding.element_label(),
            finding.description
        );
        for message in &finding.messages {
            output.push_str(&format!("      {}\n", message));
        }
        if self.show_help && finding.status > ScanStatus::Pass {
            output.push_str(&format!(
                "      {} {} ({})\n",
                self.paint("help:".to_string(), |s| s.blue()),
                finding.how_to_fix,
                finding.standard
            ));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{finding, report};
    use super::*;

    #[test]
    fn test_text_format_plain() {
        let formatter = TextFormatter::new().without_color();
        let mut failed = finding("name-not-empty", ScanStatus::Fail, 2);
        failed.messages.push("Rule panicked: boom".to_string());
        let output = formatter.format(&report(vec![
            finding("name-not-empty", ScanStatus::Pass, 1),
            failed,
        ]));

        assert!(output.starts_with("window.yaml (test mode)\n"));
        assert!(output.contains("  Failed [name-not-empty] #2 Button \"OK\": name-not-empty description\n"));
        assert!(output.contains("      Rule panicked: boom\n"));
        assert!(output.contains("      help: Fix it (WCAG 4.1.2)\n"));
        assert!(!output.contains("#1 Button"));
        assert!(output.contains("4 elements scanned: 1 failure, 1 pass\n"));
        assert!(output.contains("Status: Failed\n"));
    }

    #[test]
    fn test_text_format_with_passes() {
        let formatter = TextFormatter::new().without_color().with_passes();
        let output = formatter.format(&report(vec![finding("a", ScanStatus::Pass, 1)]));
        assert!(output.contains("  Pass [a] #1 Button \"OK\""));
        assert!(!output.contains("help:"));
    }

    #[test]
    fn test_truncation_notice() {
        let formatter = TextFormatter::new().without_color();
        let mut r = report(vec![]);
        r.truncated = true;
        r.unpopulated = 1;
        let output = formatter.format(&r);
        assert!(output.contains("the tree was truncated"));
        assert!(output.contains("Properties unavailable for 1 element\n"));
        assert!(output.contains("Status: No result\n"));
    }
}
