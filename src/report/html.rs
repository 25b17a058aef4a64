use std::fmt::Write;

use indoc::indoc;

use crate::core::test::TestStatus;
use crate::report::{ReportGenerator, NOT_AVAILABLE};

const STYLE: &str = indoc! {"
    body { font-family: Segoe UI, Arial, sans-serif; margin: 2em; color: #222; }
    h1 { border-bottom: 3px solid #333; padding-bottom: .3em; }
    h2 { margin-top: 1.6em; border-bottom: 1px solid #aaa; }
    table { border-collapse: collapse; margin: .5em 0 1em; }
    th, td { text-align: left; padding: 4px 12px; border-bottom: 1px solid #ddd; vertical-align: top; }
    th { background: #f2f2f2; }
    .pass { color: #1a7f37; font-weight: bold; }
    .fail { color: #cf222e; font-weight: bold; }
    .partial { color: #9a6700; font-weight: bold; }
    .skipped { color: #57606a; font-weight: bold; }
    .issue { font-size: .9em; color: #555; }
"};

/// Escapes text for use in element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn status_class(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "pass",
        TestStatus::Failed => "fail",
        TestStatus::Partial => "partial",
        TestStatus::Skipped => "skipped",
    }
}

fn or_na(value: Option<&str>) -> String {
    escape_html(value.filter(|v| !v.trim().is_empty()).unwrap_or(NOT_AVAILABLE))
}

pub fn render(report: &ReportGenerator) -> String {
    let mut out = String::new();
    let id = &report.identification;

    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Hardware Diagnostic Report</title>\n<style>\n{}</style>\n</head>\n<body>\n",
        STYLE
    );
    out.push_str("<h1>Hardware Diagnostic Report</h1>\n");

    out.push_str("<h2>Identification</h2>\n<table>\n");
    let _ = writeln!(
        out,
        "<tr><th>Date and time</th><td>{}</td></tr>",
        id.date.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "<tr><th>Technician</th><td>{}</td></tr>", or_na(id.technician.as_deref()));
    let _ = writeln!(out, "<tr><th>Workbench ID</th><td>{}</td></tr>", or_na(id.workbench_id.as_deref()));
    out.push_str("</table>\n");

    out.push_str("<h2>Hardware</h2>\n");
    let sections = report.hardware_sections();
    if sections.is_empty() {
        out.push_str("<p>Hardware information not available</p>\n");
    }
    for section in sections {
        let _ = writeln!(out, "<h3>{}</h3>\n<table>", escape_html(section.title));
        for (label, value) in &section.rows {
            let _ = writeln!(
                out,
                "<tr><th>{}</th><td>{}</td></tr>",
                escape_html(label),
                escape_html(value)
            );
        }
        out.push_str("</table>\n");
    }

    out.push_str("<h2>Test Results</h2>\n");
    if report.results.is_empty() {
        out.push_str("<p>No tests were run</p>\n");
    } else {
        out.push_str("<table>\n<tr><th>Test</th><th>Status</th><th>Result</th><th>Duration</th><th>Time</th></tr>\n");
        for result in &report.results {
            let _ = write!(
                out,
                "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}",
                escape_html(&result.title),
                status_class(result.status),
                result.status.as_str(),
                escape_html(&result.message)
            );
            for issue in &result.issues {
                let _ = write!(
                    out,
                    "<div class=\"issue\">[{:?}] {}",
                    issue.severity,
                    escape_html(&issue.message)
                );
                if let Some(action) = &issue.action {
                    let _ = write!(out, " &rarr; {}", escape_html(action));
                }
                out.push_str("</div>");
            }
            let _ = writeln!(
                out,
                "</td><td>{} ms</td><td>{}</td></tr>",
                result.duration.as_millis(),
                result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        out.push_str("</table>\n");
    }

    let summary = &report.summary;
    out.push_str("<h2>Summary</h2>\n<table>\n");
    let _ = writeln!(out, "<tr><th>Total tests</th><td>{}</td></tr>", summary.total);
    let _ = writeln!(out, "<tr><th>Passed</th><td class=\"pass\">{}</td></tr>", summary.passed);
    let _ = writeln!(out, "<tr><th>Failed</th><td class=\"fail\">{}</td></tr>", summary.failed);
    let _ = writeln!(out, "<tr><th>Partial</th><td class=\"partial\">{}</td></tr>", summary.partial);
    let _ = writeln!(out, "<tr><th>Skipped</th><td class=\"skipped\">{}</td></tr>", summary.skipped);
    let _ = writeln!(out, "<tr><th>Success rate</th><td>{:.2}%</td></tr>", summary.success_rate);
    out.push_str("</table>\n</body>\n</html>\n");

    out
}
