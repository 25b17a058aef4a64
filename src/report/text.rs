use std::fmt::Write;

use crate::core::test::TestResult;
use crate::report::{ReportGenerator, NOT_AVAILABLE};

const WIDTH: usize = 80;

fn heavy_rule(out: &mut String) {
    out.push_str(&"=".repeat(WIDTH));
    out.push('\n');
}

fn section_header(out: &mut String, title: &str) {
    let rule = "-".repeat(WIDTH);
    let _ = writeln!(out, "{}\n{}\n{}", rule, title, rule);
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(NOT_AVAILABLE)
}

/// Plain-text block for one result.
pub fn render_result(result: &TestResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{}] {}", result.status.as_str(), result.title);
    let _ = writeln!(out, "  {}", result.message);
    let _ = writeln!(out, "  Time: {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "  Duration: {} ms", result.duration.as_millis());

    if let serde_json::Value::Object(details) = &result.details {
        for (key, value) in details {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => NOT_AVAILABLE.to_string(),
                other => other.to_string(),
            };
            let _ = writeln!(out, "  {}: {}", key, value);
        }
    }

    for issue in &result.issues {
        let severity = format!("{:?}", issue.severity).to_uppercase();
        let _ = writeln!(out, "  Issue [{}]: {}", severity, issue.message);
        if let Some(action) = &issue.action {
            let _ = writeln!(out, "    Action: {}", action);
        }
    }

    out
}

pub fn render(report: &ReportGenerator) -> String {
    let mut out = String::new();

    heavy_rule(&mut out);
    out.push_str("HARDWARE DIAGNOSTIC REPORT\n");
    heavy_rule(&mut out);
    out.push('\n');

    section_header(&mut out, "IDENTIFICATION");
    let id = &report.identification;
    let _ = writeln!(out, "Date and time: {}", id.date.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Technician: {}", or_na(id.technician.as_deref()));
    let _ = writeln!(out, "Workbench ID: {}", or_na(id.workbench_id.as_deref()));
    out.push('\n');

    section_header(&mut out, "HARDWARE");
    let sections = report.hardware_sections();
    if sections.is_empty() {
        out.push_str("Hardware information not available\n\n");
    }
    for section in sections {
        let _ = writeln!(out, "{}:", section.title);
        for (label, value) in &section.rows {
            let _ = writeln!(out, "  {}: {}", label, value);
        }
        out.push('\n');
    }

    section_header(&mut out, "TEST RESULTS");
    if report.results.is_empty() {
        out.push_str("No tests were run\n\n");
    }
    for result in &report.results {
        out.push_str(&render_result(result));
        out.push('\n');
    }

    section_header(&mut out, "SUMMARY");
    let summary = &report.summary;
    if summary.total == 0 {
        out.push_str("No tests were run\n");
    } else {
        let _ = writeln!(out, "Total tests: {}", summary.total);
        let _ = writeln!(out, "Passed: {}", summary.passed);
        let _ = writeln!(out, "Failed: {}", summary.failed);
        let _ = writeln!(out, "Partial: {}", summary.partial);
        let _ = writeln!(out, "Skipped: {}", summary.skipped);
        let _ = writeln!(out, "Success rate: {:.2}%", summary.success_rate);
    }
    out.push('\n');

    heavy_rule(&mut out);
    out.push_str("END OF REPORT\n");
    heavy_rule(&mut out);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::*;

    #[test]
    fn test_text_layout() {
        let hw = hardware();
        let results = results();
        let report = ReportGenerator::new(identification(), Some(&hw), results.iter().collect());
        let text = render(&report);

        let order = ["IDENTIFICATION", "HARDWARE", "TEST RESULTS", "SUMMARY", "END OF REPORT"];
        let positions: Vec<usize> = order
            .iter()
            .map(|h| text.find(&format!("\n{}\n", h)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.starts_with(&"=".repeat(WIDTH)));

        assert!(text.contains("Technician: Ana <QA>"));
        assert!(text.contains("Serial number: Not available"));
        assert!(text.contains("[FAIL] Wi-Fi"));
        assert!(text.contains("    Action: Install the Wi-Fi driver"));
        assert!(text.contains("Success rate: 50.00%"));
    }

    #[test]
    fn test_empty_report() {
        let mut id = identification();
        id.technician = None;
        let report = ReportGenerator::new(id, None, Vec::new());
        let text = render(&report);

        assert!(text.contains("Technician: Not available"));
        assert!(text.contains("Hardware information not available"));
        assert!(text.contains("No tests were run"));
    }
}
