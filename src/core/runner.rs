use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serde::Serialize;

use crate::core::config::{OutputFormat, TestConfig};
use crate::core::error::{DiagError, Result};
use crate::core::hardware::HardwareInfo;
use crate::core::operator::Operator;
use crate::core::platform::Shell;
use crate::core::test::{DeviceTest, IssueSeverity, TestContext, TestIssue, TestResult, TestStatus};
use crate::reporters::Reporter;

/// Counts over the latest result of each test.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub partial: usize,
    pub skipped: usize,
    pub success_rate: f64,
}

impl Summary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> Self {
        let mut summary = Summary::default();
        for result in results {
            summary.total += 1;
            match result.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Partial => summary.partial += 1,
                TestStatus::Skipped => summary.skipped += 1,
            }
        }
        if summary.total > 0 {
            summary.success_rate = summary.passed as f64 / summary.total as f64 * 100.0;
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Name, title and interactivity of a registered test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEntry {
    pub name: &'static str,
    pub title: &'static str,
    pub interactive: bool,
}

/// One diagnostics session: a hardware snapshot and the results gathered so far.
pub struct Session {
    tests: Vec<Box<dyn DeviceTest + Send + Sync>>,
    config: TestConfig,
    shell: Box<dyn Shell>,
    operator: Box<dyn Operator>,
    reporter: Box<dyn Reporter + Send + Sync>,
    hardware: Option<HardwareInfo>,
    results: Vec<TestResult>,
    interrupted: Arc<AtomicBool>,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        tests: Vec<Box<dyn DeviceTest + Send + Sync>>,
        config: TestConfig,
        shell: Box<dyn Shell>,
        operator: Box<dyn Operator>,
        reporter: Box<dyn Reporter + Send + Sync>,
    ) -> Self {
        Self {
            tests,
            config,
            shell,
            operator,
            reporter,
            hardware: None,
            results: Vec::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
            started_at: Utc::now(),
        }
    }

    /// Installs the Ctrl-C handler. A first press stops after the current test, a second exits.
    pub fn setup_interrupt_handler(&self) -> Result<()> {
        let interrupted = self.interrupted.clone();

        ctrlc::set_handler(move || {
            if interrupted.swap(true, Ordering::SeqCst) {
                eprintln!("\nInterrupted again, exiting.");
                std::process::exit(130);
            }
            eprintln!("\nReceived interrupt signal...");
            eprintln!("Stopping after the current test. Press Ctrl-C again to exit now.");
        })
        .map_err(|e| DiagError::ConfigError(format!("Failed to set Ctrl-C handler: {}", e)))?;

        Ok(())
    }

    /// Handle the interrupt flag so embedders can stop a run themselves.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TestConfig {
        &mut self.config
    }

    pub fn operator(&self) -> &dyn Operator {
        self.operator.as_ref()
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn tests(&self) -> Vec<TestEntry> {
        self.tests
            .iter()
            .map(|t| TestEntry {
                name: t.name(),
                title: t.title(),
                interactive: t.interactive(),
            })
            .collect()
    }

    /// The hardware snapshot, collected on first use.
    pub fn hardware(&mut self) -> &HardwareInfo {
        let (shell, config) = (self.shell.as_ref(), &self.config);
        self.hardware.get_or_insert_with(|| {
            let spinner = spinner(config, "Collecting hardware information...");
            let started = Instant::now();
            let info = HardwareInfo::collect(shell);
            spinner.finish_and_clear();
            info!("Hardware inventory collected in {:?}", started.elapsed());
            info
        })
    }

    /// The snapshot if one was already taken.
    pub fn cached_hardware(&self) -> Option<&HardwareInfo> {
        self.hardware.as_ref()
    }

    /// Runs one test by name and records its result.
    pub fn run_test(&mut self, name: &str) -> Result<&TestResult> {
        let test = self
            .tests
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| DiagError::TestExecutionError(format!("unknown test: {}", name)))?;

        let (name, title) = (test.name(), test.title());
        self.reporter.report_test_start(name, title);

        let ctx = TestContext {
            config: &self.config,
            shell: self.shell.as_ref(),
            operator: self.operator.as_ref(),
        };

        let start_time = Instant::now();
        let mut result = match test.initialize(&ctx) {
            Err(DiagError::Unsupported(reason)) => {
                debug!("Skipping {}: {}", name, reason);
                TestResult::new(name, title, TestStatus::Skipped, capitalize(&reason))
            }
            Err(e) => TestResult::new(name, title, TestStatus::Failed, capitalize(&e.to_string())).with_issue(
                TestIssue::new(name, IssueSeverity::High, format!("Test could not start: {}", e))
                    .with_action(match e {
                        DiagError::PermissionDenied(_) => "Run hwdiag from an elevated prompt",
                        _ => "Check system logs for details",
                    }),
            ),
            Ok(()) => match test.execute(&ctx) {
                Ok(result) => result,
                Err(e) => TestResult::new(name, title, TestStatus::Failed, capitalize(&e.to_string())).with_issue(
                    TestIssue::new(name, IssueSeverity::Critical, format!("Test failed: {}", e))
                        .with_action("Check system logs for details"),
                ),
            },
        };
        result.duration = start_time.elapsed();

        if let Err(e) = test.cleanup() {
            self.reporter
                .report_warning(&format!("Failed to clean up after test {}: {}", name, e));
        }

        self.reporter.report_test_result(&result);
        self.results.push(result);

        let last = self.results.len() - 1;
        Ok(&self.results[last])
    }

    /// Runs the named tests one at a time, in registry order.
    pub fn run_selected(&mut self, names: &[String]) -> Result<Summary> {
        for name in names {
            if !self.tests.iter().any(|t| t.name() == name) {
                return Err(DiagError::TestExecutionError(format!("unknown test: {}", name)));
            }
        }

        self.interrupted.store(false, Ordering::SeqCst);
        self.reporter.report_start(&self.config);

        let queue: Vec<&'static str> = self
            .tests
            .iter()
            .map(|t| t.name())
            .filter(|n| names.iter().any(|name| name == n))
            .collect();

        for name in queue {
            if self.is_interrupted() {
                self.reporter.report_warning("Interrupted; remaining tests were not run");
                break;
            }
            self.run_test(name)?;
        }

        let summary = self.summary();
        let latest: Vec<&TestResult> = self.latest_results();
        self.reporter.report_summary(&summary, &latest);
        Ok(summary)
    }

    pub fn run_all(&mut self) -> Result<Summary> {
        let names: Vec<String> = self.tests.iter().map(|t| t.name().to_string()).collect();
        self.run_selected(&names)
    }

    /// Every result recorded in this session, oldest first.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// The last result of each test, ordered by each test's first run.
    pub fn latest_results(&self) -> Vec<&TestResult> {
        let mut order: Vec<&str> = Vec::new();
        for result in &self.results {
            if !order.contains(&result.name.as_str()) {
                order.push(&result.name);
            }
        }

        order
            .into_iter()
            .filter_map(|name| self.results.iter().rev().find(|r| r.name == name))
            .collect()
    }

    pub fn last_status(&self, name: &str) -> Option<TestStatus> {
        self.results.iter().rev().find(|r| r.name == name).map(|r| r.status)
    }

    pub fn summary(&self) -> Summary {
        Summary::from_results(self.latest_results())
    }
}

fn spinner(config: &TestConfig, message: &str) -> ProgressBar {
    if config.quiet || config.output_format != OutputFormat::Text {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["-", "\\", "|", "/", "-"])
        .template("{spinner} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operator::UnattendedOperator;
    use crate::core::platform::ScriptedShell;
    use crate::reporters::json::JsonReporter;
    use std::sync::{Mutex, OnceLock};

    struct FixedTest {
        name: &'static str,
        status: TestStatus,
    }

    impl DeviceTest for FixedTest {
        fn name(&self) -> &'static str {
            self.name
        }

        fn title(&self) -> &'static str {
            "Fixed"
        }

        fn initialize(&self, _ctx: &TestContext) -> Result<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &TestContext) -> Result<TestResult> {
            Ok(TestResult::new(self.name, "Fixed", self.status, "fixed"))
        }
    }

    struct BrokenTest;

    impl DeviceTest for BrokenTest {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn title(&self) -> &'static str {
            "Broken"
        }

        fn initialize(&self, _ctx: &TestContext) -> Result<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &TestContext) -> Result<TestResult> {
            Err(DiagError::DeviceNotFound("nothing attached".to_string()))
        }
    }

    /// Trips the session's interrupt flag while it runs, like a Ctrl-C mid-test.
    struct InterruptingTest {
        flag: Arc<OnceLock<Arc<AtomicBool>>>,
    }

    impl DeviceTest for InterruptingTest {
        fn name(&self) -> &'static str {
            "stopper"
        }

        fn title(&self) -> &'static str {
            "Stopper"
        }

        fn initialize(&self, _ctx: &TestContext) -> Result<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &TestContext) -> Result<TestResult> {
            if let Some(flag) = self.flag.get() {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(TestResult::new("stopper", "Stopper", TestStatus::Passed, "interrupted"))
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        warnings: Arc<Mutex<Vec<String>>>,
    }

    impl Reporter for RecordingReporter {
        fn report_start(&self, _config: &TestConfig) {}
        fn report_test_start(&self, _test_name: &str, _title: &str) {}
        fn report_test_result(&self, _result: &TestResult) {}
        fn report_summary(&self, _summary: &Summary, _results: &[&TestResult]) {}
        fn report_info(&self, _message: &str) {}

        fn report_warning(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }
    }

    fn session(tests: Vec<Box<dyn DeviceTest + Send + Sync>>) -> Session {
        let mut config = TestConfig::default();
        config.quiet = true;
        Session::new(
            tests,
            config,
            Box::new(ScriptedShell::other()),
            Box::new(UnattendedOperator),
            Box::new(JsonReporter::new(false)),
        )
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            TestResult::new("a", "A", TestStatus::Passed, ""),
            TestResult::new("b", "B", TestStatus::Failed, ""),
            TestResult::new("c", "C", TestStatus::Partial, ""),
            TestResult::new("d", "D", TestStatus::Passed, ""),
        ];
        let summary = Summary::from_results(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.success_rate, 50.0);
        assert!(summary.has_failures());
        assert_eq!(Summary::from_results(std::iter::empty()).success_rate, 0.0);
    }

    #[test]
    fn test_execute_error_becomes_failed_result() {
        let mut session = session(vec![Box::new(BrokenTest)]);
        let result = session.run_test("broken").unwrap();

        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.issues[0].severity, IssueSeverity::Critical);
        assert!(result.message.contains("nothing attached"));
    }

    #[test]
    fn test_unsupported_host_is_skipped() {
        let mut session = session(crate::tests::all());
        let result = session.run_test("tpm").unwrap();

        assert_eq!(result.status, TestStatus::Skipped);
        assert_eq!(result.message, "This test is only available on Windows");
    }

    #[test]
    fn test_unknown_test_is_an_error() {
        let mut session = session(Vec::new());
        assert!(matches!(session.run_test("floppy"), Err(DiagError::TestExecutionError(_))));
        assert!(session.run_selected(&["floppy".to_string()]).is_err());
    }

    #[test]
    fn test_latest_results_keep_first_run_order() {
        let mut session = session(vec![
            Box::new(FixedTest { name: "one", status: TestStatus::Failed }),
            Box::new(FixedTest { name: "two", status: TestStatus::Passed }),
        ]);

        session.run_test("two").unwrap();
        session.run_test("one").unwrap();
        session.run_test("two").unwrap();

        assert_eq!(session.results().len(), 3);
        let latest: Vec<_> = session.latest_results().iter().map(|r| r.name.clone()).collect();
        assert_eq!(latest, vec!["two", "one"]);
        assert_eq!(session.last_status("one"), Some(TestStatus::Failed));
        assert_eq!(session.last_status("three"), None);
    }

    #[test]
    fn test_run_selected_uses_registry_order() {
        let mut session = session(vec![
            Box::new(FixedTest { name: "one", status: TestStatus::Passed }),
            Box::new(FixedTest { name: "two", status: TestStatus::Partial }),
        ]);

        let summary = session
            .run_selected(&["two".to_string(), "one".to_string()])
            .unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.partial, 1);
        assert_eq!(session.results()[0].name, "one");
    }

    #[test]
    fn test_interrupt_stops_between_tests() {
        let slot = Arc::new(OnceLock::new());
        let reporter = RecordingReporter::default();
        let warnings = reporter.warnings.clone();

        let mut config = TestConfig::default();
        config.quiet = true;
        let mut session = Session::new(
            vec![
                Box::new(InterruptingTest { flag: slot.clone() }),
                Box::new(FixedTest { name: "one", status: TestStatus::Passed }),
                Box::new(FixedTest { name: "two", status: TestStatus::Failed }),
            ],
            config,
            Box::new(ScriptedShell::other()),
            Box::new(UnattendedOperator),
            Box::new(reporter),
        );
        slot.set(session.interrupt_flag()).unwrap();

        let summary = session.run_all().unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(session.results().len(), 1);
        assert_eq!(session.last_status("stopper"), Some(TestStatus::Passed));
        assert_eq!(session.last_status("one"), None);
        assert_eq!(session.last_status("two"), None);
        assert_eq!(
            warnings.lock().unwrap().as_slice(),
            ["Interrupted; remaining tests were not run".to_string()]
        );
    }

    #[test]
    fn test_new_run_clears_interrupt() {
        let mut session = session(vec![
            Box::new(FixedTest { name: "one", status: TestStatus::Passed }),
        ]);
        let flag = session.interrupt_flag();

        flag.store(true, Ordering::SeqCst);
        assert_eq!(session.run_all().unwrap().total, 1);
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_hardware_is_cached() {
        let mut session = session(Vec::new());
        assert!(session.cached_hardware().is_none());
        let first = session.hardware().collected_at;
        assert_eq!(session.hardware().collected_at, first);
    }
}
