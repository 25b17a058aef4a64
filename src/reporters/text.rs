use std::io::{self, Write};
use colored::*;
use chrono::Local;

use crate::core::test::{TestResult, TestStatus, IssueSeverity};
use crate::core::config::TestConfig;
use crate::core::runner::Summary;
use crate::reporters::Reporter;

/// Text reporter for console output
pub struct TextReporter {
    verbose: bool,
    quiet: bool,
}

impl TextReporter {
    /// Create a new text reporter
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Format a test status with color
    pub fn format_status(status: TestStatus) -> ColoredString {
        match status {
            TestStatus::Passed => "✓ PASS".green().bold(),
            TestStatus::Failed => "✗ FAIL".red().bold(),
            TestStatus::Partial => "⚠ PARTIAL".yellow().bold(),
            TestStatus::Skipped => "⏸ SKIPPED".blue().bold(),
        }
    }

    fn format_severity(severity: IssueSeverity) -> ColoredString {
        match severity {
            IssueSeverity::Critical => "CRITICAL".red().bold(),
            IssueSeverity::High => "HIGH".red(),
            IssueSeverity::Medium => "MEDIUM".yellow(),
            IssueSeverity::Low => "LOW".blue(),
        }
    }

    fn flush() {
        let _ = io::stdout().flush();
    }
}

impl Reporter for TextReporter {
    fn report_start(&self, config: &TestConfig) {
        if self.quiet {
            return;
        }

        println!("{}", "HARDWARE DIAGNOSTICS".bold());
        println!("====================");

        let now = Local::now();
        println!("Started: {}", now.format("%Y-%m-%d %H:%M:%S %Z"));

        if let Some(technician) = &config.technician {
            println!("Technician: {}", technician);
        }
        if let Some(workbench) = &config.workbench_id {
            println!("Workbench: {}", workbench);
        }

        if self.verbose {
            println!("\nTest Configuration:");
            println!("  Tests: {}", config.enabled_tests.join(", "));
            println!("  Interactive: {}", if config.interactive { "yes".green() } else { "no".red() });
            println!("  Command timeout: {}", humantime::format_duration(config.command_timeout));
            println!("  Keyboard layout: {:?}", config.keyboard_layout);
            println!("  USB payload: {}", bytesize::ByteSize(config.usb_test_size));
        }

        println!("\nRunning tests...\n");
        Self::flush();
    }

    fn report_test_start(&self, test_name: &str, title: &str) {
        if self.quiet {
            return;
        }

        if self.verbose {
            println!("Starting test: {} ({})", title.cyan(), test_name);
        } else {
            println!("Testing {}...", title.cyan());
        }
        Self::flush();
    }

    fn report_test_result(&self, result: &TestResult) {
        if self.quiet {
            return;
        }

        println!("{} {}", Self::format_status(result.status), result.message);

        if self.verbose {
            println!("  Duration: {}", humantime::format_duration(round_millis(result.duration)));

            if let serde_json::Value::Object(details) = &result.details {
                if !details.is_empty() {
                    println!("  Details:");
                    for (key, value) in details {
                        println!("    {}: {}", key, value);
                    }
                }
            }
        }

        for issue in &result.issues {
            println!("  [{}] {}", Self::format_severity(issue.severity), issue.message);
            if self.verbose {
                if let Some(action) = &issue.action {
                    println!("    Action: {}", action);
                }
            }
        }

        println!();
        Self::flush();
    }

    fn report_summary(&self, summary: &Summary, results: &[&TestResult]) {
        if self.quiet {
            // In quiet mode, just print the counts
            println!(
                "{} passed, {} failed, {} partial, {} skipped",
                summary.passed, summary.failed, summary.partial, summary.skipped
            );
            return;
        }

        println!("{}", "TEST RESULTS".bold());
        println!("============");

        let max_name_len = results.iter().map(|r| r.title.len()).max().unwrap_or(10);

        for result in results {
            println!(
                "{}: {}{}",
                result.title.cyan().bold(),
                " ".repeat(max_name_len - result.title.len() + 2),
                Self::format_status(result.status)
            );
        }

        println!(
            "\n{}: {} tests, {} passed, {} failed, {} partial, {} skipped ({:.1}% success)",
            "SUMMARY".bold(),
            summary.total,
            summary.passed.to_string().green(),
            summary.failed.to_string().red(),
            summary.partial.to_string().yellow(),
            summary.skipped,
            summary.success_rate
        );

        // Recommendations, most severe first
        let mut issues: Vec<_> = results.iter().flat_map(|r| r.issues.iter()).collect();
        if !issues.is_empty() {
            issues.sort_by(|a, b| b.severity.cmp(&a.severity));
            issues.truncate(5);

            println!("\nRecommendations:");
            for issue in issues {
                println!("- {} - {}", Self::format_severity(issue.severity), issue.message);
                if let Some(action) = &issue.action {
                    println!("  → {}", action);
                }
            }
        }
        Self::flush();
    }

    fn report_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        eprintln!("{}: {}", "WARNING".yellow().bold(), message);
    }

    fn report_info(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.verbose {
            println!("{}: {}", "INFO".blue().bold(), message);
        }
    }
}

fn round_millis(duration: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(duration.as_millis() as u64)
}
