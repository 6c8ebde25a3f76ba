//! Trial Core - test execution engine
//!
//! This library provides:
//! - Declarative suite/test trees with `only`/`skip`/`todo`/`fails` selection
//! - Lifecycle hooks composed across nested suites
//! - Per-test timeout and retry execution
//! - Test-scoped finish/failure callbacks
//!
//! # Example
//!
//! ```
//! use trial_core::{expect::expect_eq, Runner, SummaryReporter, TestModule};
//!
//! let module = TestModule::new("math", |b| {
//!     b.describe("addition", |b| {
//!         b.test("adds", |_ctx| async { expect_eq(1 + 2, 3) })
//!     })
//! });
//!
//! let mut reporter = SummaryReporter::new();
//! let report = Runner::default().run_modules(vec![module], &mut reporter).unwrap();
//! assert_eq!(report.summary.passed, 1);
//! assert_eq!(report.summary.exit_code(), 0);
//! ```

/// Trial core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod executor;
pub mod expect;
pub mod format;
pub mod hooks;
pub mod logging;
pub mod reporter;
pub mod result;
pub mod runner;
pub mod runtime;
pub mod side_channel;
pub mod tree;

pub use errors::{RunError, TestError, TestOutcome, UsageError};
pub use executor::{run_with_timeout, Executor, TestPlan};
pub use hooks::{Hook, HookKind, HookSet, InheritedHooks};
pub use reporter::{NullReporter, Reporter, SummaryReporter, TracingReporter};
pub use result::{
    RunReport, RunSummary, TestResult, TestStatus, EXIT_FAILURE, EXIT_INTERNAL, EXIT_SUCCESS,
};
pub use runner::{RunOptions, Runner, TestModule};
pub use side_channel::{ExecutionToken, SideChannelRegistry, TestContext};
pub use tree::{Builder, Declare, Modifier, Suite, SuiteTree, Test, TestOptions};
