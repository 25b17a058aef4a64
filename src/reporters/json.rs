use serde_json::{json, Value};

use crate::core::config::TestConfig;
use crate::core::runner::Summary;
use crate::core::test::TestResult;
use crate::reporters::Reporter;

/// JSON-lines reporter for machine-readable output
pub struct JsonReporter {
    verbose: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Build a single event line
    pub fn event(kind: &str, body: Value) -> Value {
        let mut event = json!({
            "event": kind,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let (Value::Object(event), Value::Object(body)) = (&mut event, body) {
            event.extend(body);
        }
        event
    }

    fn emit(&self, event: Value) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Error writing JSON output: {}", e),
        }
    }

    fn result_json(result: &TestResult) -> Value {
        json!({
            "name": result.name,
            "title": result.title,
            "status": result.status.as_str(),
            "message": result.message,
            "duration_ms": result.duration.as_millis() as u64,
            "details": result.details,
            "issues": result.issues.iter().map(|issue| {
                json!({
                    "component": issue.component,
                    "severity": format!("{:?}", issue.severity).to_lowercase(),
                    "message": issue.message,
                    "action": issue.action,
                })
            }).collect::<Vec<Value>>(),
            "timestamp": result.timestamp.to_rfc3339(),
        })
    }
}

impl Reporter for JsonReporter {
    fn report_start(&self, config: &TestConfig) {
        self.emit(Self::event(
            "run_start",
            json!({
                "tests": config.enabled_tests,
                "technician": config.technician,
                "workbench": config.workbench_id,
                "interactive": config.interactive,
            }),
        ));
    }

    fn report_test_start(&self, test_name: &str, title: &str) {
        if self.verbose {
            self.emit(Self::event(
                "test_start",
                json!({ "test_name": test_name, "title": title }),
            ));
        }
    }

    fn report_test_result(&self, result: &TestResult) {
        self.emit(Self::event("test_result", Self::result_json(result)));
    }

    fn report_summary(&self, summary: &Summary, results: &[&TestResult]) {
        self.emit(Self::event(
            "summary",
            json!({
                "summary": summary,
                "results": results.iter().map(|r| {
                    json!({ "name": r.name, "status": r.status.as_str() })
                }).collect::<Vec<Value>>(),
            }),
        ));
    }

    fn report_warning(&self, message: &str) {
        self.emit(Self::event("warning", json!({ "message": message })));
    }

    fn report_info(&self, message: &str) {
        if self.verbose {
            self.emit(Self::event("info", json!({ "message": message })));
        }
    }
}
