pub mod text;
pub mod json;

use crate::core::config::TestConfig;
use crate::core::runner::Summary;
use crate::core::test::TestResult;

/// Reporter trait for console progress of a run
pub trait Reporter {
    /// Report the start of a run
    fn report_start(&self, config: &TestConfig);

    /// Report the start of a specific test
    fn report_test_start(&self, test_name: &str, title: &str);

    /// Report the result of a specific test
    fn report_test_result(&self, result: &TestResult);

    /// Report the summary over the latest result of each test
    fn report_summary(&self, summary: &Summary, results: &[&TestResult]);

    /// Report a warning message
    fn report_warning(&self, message: &str);

    /// Report an informational message
    fn report_info(&self, message: &str);
}
