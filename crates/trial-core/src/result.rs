//! Test results and run summaries

use crate::errors::TestError;
use std::fmt;
use std::time::Duration;

/// Final status of a single test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Todo,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::Todo => "todo",
        };
        f.write_str(label)
    }
}

/// Result of one declared test. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// Test name as declared
    pub name: String,
    /// Suite-path-qualified name
    pub full_name: String,
    pub status: TestStatus,
    pub error: Option<TestError>,
    /// Wall time across every attempt
    pub duration: Duration,
    /// Extra attempts consumed before the recorded one
    pub retries: u32,
}

impl TestResult {
    pub fn new(
        name: impl Into<String>,
        full_name: impl Into<String>,
        status: TestStatus,
        error: Option<TestError>,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            status,
            error,
            duration,
            retries: 0,
        }
    }

    /// Result for a test that never ran
    pub fn skipped(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self::new(name, full_name, TestStatus::Skipped, None, Duration::ZERO)
    }

    pub fn todo(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self::new(name, full_name, TestStatus::Todo, None, Duration::ZERO)
    }

    /// Failure recorded without running the test (suite setup failed)
    pub fn failed(
        name: impl Into<String>,
        full_name: impl Into<String>,
        error: TestError,
    ) -> Self {
        Self::new(
            name,
            full_name,
            TestStatus::Failed,
            Some(error),
            Duration::ZERO,
        )
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == TestStatus::Passed
    }

    pub fn is_fail(&self) -> bool {
        self.status == TestStatus::Failed
    }

    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Error message, if the test failed
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Exit code when every test passed
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code when a test failed or a module could not be loaded
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when the run aborted on an internal error
pub const EXIT_INTERNAL: i32 = 2;

/// Counters for a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
    /// Modules whose registration raised a usage error
    pub module_errors: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: &TestResult) {
        match result.status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Todo => self.todo += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.todo
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.module_errors > 0
    }

    /// Process exit status for this run
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Everything a run produced, in traversal order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<TestResult>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Results for one status, in order
    pub fn with_status(&self, status: TestStatus) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(move |r| r.status == status)
    }

    /// Look up a result by its full name
    pub fn find(&self, full_name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.full_name == full_name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.full_name.as_str()).collect()
    }
}
