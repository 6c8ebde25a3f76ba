//! Reporter interface
//!
//! The walker pushes lifecycle events to a [`Reporter`] as they happen.
//! Rendering (colours, dots, diff output) belongs to the host; the engine
//! ships a collecting reporter and one that forwards events to `tracing`.

use crate::errors::UsageError;
use crate::result::{RunSummary, TestResult, TestStatus};

/// Receives run events in traversal order. Every method defaults to a no-op.
pub trait Reporter {
    fn on_run_start(&mut self) {}

    fn on_module_start(&mut self, _name: &str) {}

    /// Registration of a module failed; none of its tests ran
    fn on_module_error(&mut self, _name: &str, _error: &UsageError) {}

    fn on_test_start(&mut self, _full_name: &str) {}

    fn on_test_end(&mut self, _result: &TestResult) {}

    fn on_run_end(&mut self, _summary: &RunSummary) {}
}

/// Reporter that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// Collects every result and module error for later inspection
#[derive(Debug, Default, Clone)]
pub struct SummaryReporter {
    started: Vec<String>,
    results: Vec<TestResult>,
    module_errors: Vec<(String, UsageError)>,
    summary: Option<RunSummary>,
}

impl SummaryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full names of tests that were started, in order
    pub fn started(&self) -> &[String] {
        &self.started
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn module_errors(&self) -> &[(String, UsageError)] {
        &self.module_errors
    }

    /// Final summary, once the run has ended
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

impl Reporter for SummaryReporter {
    fn on_run_start(&mut self) {
        self.started.clear();
        self.results.clear();
        self.module_errors.clear();
        self.summary = None;
    }

    fn on_module_error(&mut self, name: &str, error: &UsageError) {
        self.module_errors.push((name.to_string(), error.clone()));
    }

    fn on_test_start(&mut self, full_name: &str) {
        self.started.push(full_name.to_string());
    }

    fn on_test_end(&mut self, result: &TestResult) {
        self.results.push(result.clone());
    }

    fn on_run_end(&mut self, summary: &RunSummary) {
        self.summary = Some(summary.clone());
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn on_module_start(&mut self, name: &str) {
        tracing::info!(module = name, "loading module");
    }

    fn on_module_error(&mut self, name: &str, error: &UsageError) {
        tracing::error!(module = name, "module failed to register: {error}");
    }

    fn on_test_end(&mut self, result: &TestResult) {
        match &result.error {
            Some(error) => tracing::info!(
                test = %result.full_name,
                status = %result.status,
                duration_ms = result.duration_ms(),
                "{error}"
            ),
            None => tracing::info!(
                test = %result.full_name,
                status = %result.status,
                duration_ms = result.duration_ms()
            ),
        }
    }

    fn on_run_end(&mut self, summary: &RunSummary) {
        tracing::info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            todo = summary.todo,
            module_errors = summary.module_errors,
            "run finished in {:.2?}",
            summary.duration
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TestError;

    #[test]
    fn test_summary_reporter_collects() {
        let mut reporter = SummaryReporter::new();
        reporter.on_run_start();
        reporter.on_test_start("s > a");
        reporter.on_test_end(&TestResult::failed("a", "s > a", TestError::msg("bad")));
        reporter.on_test_end(&TestResult::skipped("b", "s > b"));
        reporter.on_module_error("broken", &UsageError::NoActiveSuite { call: "test" });

        assert_eq!(reporter.started(), ["s > a".to_string()]);
        assert_eq!(reporter.count(TestStatus::Failed), 1);
        assert_eq!(reporter.count(TestStatus::Skipped), 1);
        assert_eq!(reporter.module_errors()[0].0, "broken");
        assert!(reporter.summary().is_none());

        reporter.on_run_end(&RunSummary::new());
        assert!(reporter.summary().is_some());
    }

    #[test]
    fn test_run_start_resets() {
        let mut reporter = SummaryReporter::new();
        reporter.on_test_end(&TestResult::todo("a", "a"));
        reporter.on_run_start();
        assert!(reporter.results().is_empty());
    }
}
