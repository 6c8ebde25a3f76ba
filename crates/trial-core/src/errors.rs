//! Error taxonomy
//!
//! - [`UsageError`]: API misuse while declaring or running tests. Returned
//!   synchronously to the caller.
//! - [`TestError`]: everything that turns a test into a `failed` result.
//!   Captured by the executor, never propagated out of the walker.
//! - [`RunError`]: internal failures that abort the whole run.

use crate::hooks::HookKind;
use crate::result::EXIT_INTERNAL;
use std::time::Duration;
use thiserror::Error;

/// Misuse of the registration API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("{call}() must be called inside a describe block")]
    NoActiveSuite { call: &'static str },

    #[error("{call}() must be called during test execution")]
    NoActiveTest { call: &'static str },
}

/// Reason a test (or one of its hooks) failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    #[error("{message}")]
    Assertion {
        message: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("{0}")]
    Failed(String),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("Test timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A hook or callback ran past the hook timeout
    #[error("timed out after {}ms", .0.as_millis())]
    HookTimeout(Duration),

    #[error("{kind} hook failed: {message}")]
    Hook { kind: HookKind, message: String },

    /// A `before_all` hook failed; fatal to the whole suite subtree
    #[error("beforeAll hook failed: {message}")]
    SuiteSetup { suite: String, message: String },

    #[error("Test was expected to fail but passed")]
    UnexpectedPass,

    #[error(transparent)]
    Usage(#[from] UsageError),
}

impl TestError {
    /// Plain failure with a message
    pub fn msg(message: impl Into<String>) -> Self {
        TestError::Failed(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TestError::Timeout(_) | TestError::HookTimeout(_))
    }

    /// Reword a test deadline as a hook deadline
    pub(crate) fn into_hook_timeout(self) -> Self {
        match self {
            TestError::Timeout(limit) => TestError::HookTimeout(limit),
            other => other,
        }
    }

    /// Wrap a hook failure with the kind-specific prefix
    pub(crate) fn hook(kind: HookKind, cause: &TestError) -> Self {
        TestError::Hook {
            kind,
            message: cause.to_string(),
        }
    }
}

/// Outcome of one unit of work (hook, body, or a whole attempt)
pub type TestOutcome = Result<(), TestError>;

/// Internal failure escaping the walker
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl RunError {
    /// Process exit code for a run aborted by this error
    pub fn exit_code(&self) -> i32 {
        EXIT_INTERNAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = TestError::Timeout(Duration::from_millis(50));
        assert_eq!(err.to_string(), "Test timed out after 50ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_hook_timeout_message() {
        let err = TestError::Timeout(Duration::from_millis(20)).into_hook_timeout();
        assert_eq!(err, TestError::HookTimeout(Duration::from_millis(20)));
        assert_eq!(err.to_string(), "timed out after 20ms");
        assert!(err.is_timeout());

        let other = TestError::msg("x").into_hook_timeout();
        assert_eq!(other, TestError::msg("x"));
    }

    #[test]
    fn test_run_error_exit_code() {
        let err = RunError::from(std::io::Error::new(std::io::ErrorKind::Other, "no reactor"));
        assert_eq!(err.exit_code(), EXIT_INTERNAL);
        assert_eq!(err.to_string(), "failed to start async runtime: no reactor");
    }

    #[test]
    fn test_hook_messages() {
        let cause = TestError::msg("db down");
        assert_eq!(
            TestError::hook(HookKind::SetupEach, &cause).to_string(),
            "beforeEach hook failed: db down"
        );
        assert_eq!(
            TestError::hook(HookKind::TeardownEach, &cause).to_string(),
            "afterEach hook failed: db down"
        );
    }

    #[test]
    fn test_usage_messages() {
        let err = UsageError::NoActiveTest { call: "on_finished" };
        assert_eq!(
            err.to_string(),
            "on_finished() must be called during test execution"
        );
        let wrapped: TestError = err.into();
        assert!(wrapped.to_string().contains("during test execution"));
    }
}
