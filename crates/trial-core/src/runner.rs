//! Suite walker
//!
//! Walks a [`SuiteTree`] depth-first in declaration order, resolving
//! selection (`only`, `skip`, `todo`, name filter, bail), running
//! `before_all`/`after_all` around each suite and handing every selected test
//! to the [`Executor`]. Results are emitted to the [`Reporter`] as they are
//! produced and collected into a [`RunReport`].

use crate::errors::{RunError, TestError, TestOutcome, UsageError};
use crate::executor::{run_hook_with_timeout, Executor, TestPlan};
use crate::hooks::{HookKind, InheritedHooks};
use crate::reporter::Reporter;
use crate::result::{RunReport, RunSummary, TestResult};
use crate::runtime::block_on;
use crate::tree::{Builder, Suite, SuiteTree, Test};
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::time::{Duration, Instant};
use trial_config::RunnerConfig;

/// Separator between suite and test names in a full name
pub const NAME_SEPARATOR: &str = " > ";

/// Run-wide execution settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Default per-test deadline; zero disables it
    pub test_timeout: Duration,
    /// Deadline for each `before_all`/`after_all` hook
    pub hook_timeout: Duration,
    /// Default extra attempts after a failure
    pub retry: u32,
    /// Stop executing tests after this many failures; zero disables
    pub bail: usize,
    /// Only run tests whose full name contains this substring
    pub filter: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&RunnerConfig::default())
    }
}

impl From<&RunnerConfig> for RunOptions {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            test_timeout: config.test_timeout(),
            hook_timeout: config.hook_timeout(),
            retry: config.retry,
            bail: config.bail,
            filter: config.filter.clone(),
        }
    }
}

impl RunOptions {
    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_bail(mut self, bail: usize) -> Self {
        self.bail = bail;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn matches(&self, full_name: &str) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |filter| full_name.contains(filter))
    }
}

type RegisterFn = Box<dyn FnOnce(&mut Builder) -> Result<(), UsageError>>;

/// A named unit of test declarations
pub struct TestModule {
    name: String,
    register: RegisterFn,
}

impl TestModule {
    pub fn new<F>(name: impl Into<String>, register: F) -> Self
    where
        F: FnOnce(&mut Builder) -> Result<(), UsageError> + 'static,
    {
        Self {
            name: name.into(),
            register: Box::new(register),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the registration function against a fresh builder
    pub fn load(self) -> Result<SuiteTree, UsageError> {
        let mut builder = Builder::new();
        (self.register)(&mut builder)?;
        Ok(builder.finish())
    }
}

impl fmt::Debug for TestModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Drives module loading and tree walking
#[derive(Debug, Clone, Default)]
pub struct Runner {
    options: RunOptions,
}

impl Runner {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(RunOptions::from(config))
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Load and run every module on a fresh single-threaded runtime
    pub fn run_modules(
        &self,
        modules: Vec<TestModule>,
        reporter: &mut dyn Reporter,
    ) -> Result<RunReport, RunError> {
        block_on(self.run_modules_async(modules, reporter))
    }

    /// Like [`Runner::run_modules`], for callers already inside a `LocalSet`
    pub async fn run_modules_async(
        &self,
        modules: Vec<TestModule>,
        reporter: &mut dyn Reporter,
    ) -> RunReport {
        let started = Instant::now();
        reporter.on_run_start();
        let mut walk = Walk::new(&self.options, reporter);

        for module in modules {
            let name = module.name.clone();
            walk.reporter.on_module_start(&name);
            match module.load() {
                Ok(tree) => {
                    tracing::debug!(module = %name, tests = tree.test_count(), "module loaded");
                    walk.tree(&tree).await;
                }
                Err(e) => {
                    tracing::warn!(module = %name, "module failed to register: {e}");
                    walk.module_errors += 1;
                    walk.reporter.on_module_error(&name, &e);
                }
            }
        }

        walk.finish(started)
    }

    /// Walk an already built tree on a fresh single-threaded runtime
    pub fn run_tree(
        &self,
        tree: &SuiteTree,
        reporter: &mut dyn Reporter,
    ) -> Result<RunReport, RunError> {
        block_on(self.run_tree_async(tree, reporter))
    }

    /// Like [`Runner::run_tree`], for callers already inside a `LocalSet`.
    ///
    /// Tests are spawned with `spawn_local`, so calling this outside a
    /// `LocalSet` panics.
    pub async fn run_tree_async(&self, tree: &SuiteTree, reporter: &mut dyn Reporter) -> RunReport {
        let started = Instant::now();
        reporter.on_run_start();
        let mut walk = Walk::new(&self.options, reporter);
        walk.tree(tree).await;
        walk.finish(started)
    }
}

/// Settings inherited down the tree
#[derive(Debug, Clone, Copy)]
struct Scope {
    /// This suite or an ancestor is marked `only`
    only: bool,
    timeout: Duration,
    retry: u32,
}

impl Scope {
    fn enter(self, suite: &Suite) -> Scope {
        Scope {
            only: self.only || suite.only,
            timeout: suite.options.timeout.unwrap_or(self.timeout),
            retry: suite.options.retry.unwrap_or(self.retry),
        }
    }
}

fn join_name(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{NAME_SEPARATOR}{name}")
    }
}

/// State of one run across all of its modules
struct Walk<'r> {
    options: &'r RunOptions,
    reporter: &'r mut dyn Reporter,
    executor: Executor,
    has_only: bool,
    results: Vec<TestResult>,
    failures: usize,
    module_errors: usize,
}

impl<'r> Walk<'r> {
    fn new(options: &'r RunOptions, reporter: &'r mut dyn Reporter) -> Self {
        Self {
            options,
            reporter,
            executor: Executor::new().with_hook_timeout(options.hook_timeout),
            has_only: false,
            results: Vec::new(),
            failures: 0,
            module_errors: 0,
        }
    }

    fn root_scope(&self) -> Scope {
        Scope {
            only: false,
            timeout: self.options.test_timeout,
            retry: self.options.retry,
        }
    }

    async fn tree(&mut self, tree: &SuiteTree) {
        // `only` is scoped to the module that declared it.
        self.has_only = tree.has_only;
        let scope = self.root_scope();
        let inherited = InheritedHooks::default();
        for suite in &tree.suites {
            self.suite(suite, "", scope, &inherited).await;
        }
    }

    fn bailed(&self) -> bool {
        self.options.bail > 0 && self.failures >= self.options.bail
    }

    /// Whether the test is part of this run at all
    fn selected(&self, test: &Test, scope: Scope, full_name: &str) -> bool {
        if self.has_only && !(scope.only || test.only) {
            return false;
        }
        self.options.matches(full_name)
    }

    fn record(&mut self, result: TestResult) {
        if result.is_fail() {
            self.failures += 1;
        }
        self.reporter.on_test_end(&result);
        self.results.push(result);
    }

    fn suite<'a>(
        &'a mut self,
        suite: &'a Suite,
        parent: &'a str,
        scope: Scope,
        inherited: &'a InheritedHooks,
    ) -> LocalBoxFuture<'a, ()> {
        async move {
            let name = join_name(parent, &suite.name);
            let scope = scope.enter(suite);

            if suite.skip || self.bailed() {
                tracing::debug!(suite = %name, "suite skipped");
                self.settle_subtree(suite, &name, scope, &|test, full_name| {
                    TestResult::skipped(&test.name, full_name)
                });
                return;
            }

            let should_run = !self.has_only || scope.only || suite.contains_only();
            if !should_run {
                return;
            }

            if let Err(e) = self.setup_once(suite).await {
                tracing::warn!(suite = %name, "beforeAll hook failed: {e}");
                let error = TestError::SuiteSetup {
                    suite: name.clone(),
                    message: e.to_string(),
                };
                self.settle_subtree(suite, &name, scope, &|test, full_name| {
                    TestResult::failed(&test.name, full_name, error.clone())
                });
                self.teardown_once(suite, &name).await;
                return;
            }

            let inherited = inherited.extend_with(&suite.hooks);

            for test in &suite.tests {
                self.test(test, &name, scope, &inherited).await;
            }

            for child in &suite.children {
                self.suite(child, &name, scope, &inherited).await;
            }

            self.teardown_once(suite, &name).await;
        }
        .boxed_local()
    }

    async fn test(&mut self, test: &Test, suite_name: &str, scope: Scope, hooks: &InheritedHooks) {
        let full_name = join_name(suite_name, &test.name);
        if !self.selected(test, scope, &full_name) {
            return;
        }

        let result = if test.todo || test.body.is_none() {
            TestResult::todo(&test.name, &full_name)
        } else if test.skip || self.bailed() {
            TestResult::skipped(&test.name, &full_name)
        } else {
            self.reporter.on_test_start(&full_name);
            let plan = TestPlan {
                test,
                full_name: &full_name,
                hooks,
                timeout: test.options.timeout.unwrap_or(scope.timeout),
                retry: test.options.retry.unwrap_or(scope.retry),
            };
            self.executor.execute(plan).await
        };

        tracing::debug!(test = %full_name, status = %result.status, "test finished");
        self.record(result);
    }

    /// Record a result for every selected test below `suite` without running
    /// anything
    fn settle_subtree(
        &mut self,
        suite: &Suite,
        name: &str,
        scope: Scope,
        make: &dyn Fn(&Test, &str) -> TestResult,
    ) {
        for test in &suite.tests {
            let full_name = join_name(name, &test.name);
            if self.selected(test, scope, &full_name) {
                self.record(make(test, &full_name));
            }
        }
        for child in &suite.children {
            let child_name = join_name(name, &child.name);
            self.settle_subtree(child, &child_name, scope.enter(child), make);
        }
    }

    async fn setup_once(&self, suite: &Suite) -> TestOutcome {
        for hook in suite.hooks.get(HookKind::SetupOnce) {
            run_hook_with_timeout(hook(), self.options.hook_timeout).await?;
        }
        Ok(())
    }

    async fn teardown_once(&self, suite: &Suite, name: &str) {
        for hook in suite.hooks.get(HookKind::TeardownOnce).iter().rev() {
            if let Err(e) = run_hook_with_timeout(hook(), self.options.hook_timeout).await {
                tracing::warn!(suite = %name, "afterAll hook failed: {e}");
            }
        }
    }

    fn finish(self, started: Instant) -> RunReport {
        let mut summary = RunSummary::new();
        for result in &self.results {
            summary.add(result);
        }
        summary.module_errors = self.module_errors;
        summary.duration = started.elapsed();

        tracing::debug!(
            total = summary.total(),
            failed = summary.failed,
            "run complete"
        );
        self.reporter.on_run_end(&summary);

        RunReport {
            results: self.results,
            summary,
        }
    }
}
