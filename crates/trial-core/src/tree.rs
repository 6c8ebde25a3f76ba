//! Suite/test tree construction
//!
//! A [`Builder`] is created per module load. `describe` pushes a new suite on
//! the builder's stack, runs the build closure against it and pops it again,
//! attaching it to the enclosing suite or to the root list. Tests and hooks
//! always attach to the suite on top of the stack.
//!
//! Selection modifiers are picked through explicit entry points
//! ([`Builder::only`], [`Builder::skip`], ...) that return a [`Declare`]
//! carrying a [`Modifier`].

use crate::errors::{TestOutcome, UsageError};
use crate::format::{case_args, case_name};
use crate::hooks::{hook, HookKind, HookSet};
use crate::side_channel::TestContext;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// Boxed test body
pub type TestBody = Rc<dyn Fn(TestContext) -> LocalBoxFuture<'static, TestOutcome>>;

/// Selection modifier applied to a suite or test declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    Normal,
    /// Run only this (and other `only`) declarations in the module
    Only,
    /// Declare but never run
    Skip,
    /// Placeholder for a test still to be written
    Todo,
    /// Expected to fail; the outcome is inverted
    Fails,
    /// Accepted for compatibility; runs sequentially like any other test
    Concurrent,
}

/// Per-declaration options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestOptions {
    /// Per-test deadline; inherited by everything below a suite
    pub timeout: Option<Duration>,
    /// Extra attempts after a failure
    pub retry: Option<u32>,
}

impl TestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_ms(self, ms: u64) -> Self {
        self.timeout(Duration::from_millis(ms))
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// A single declared test
#[derive(Clone)]
pub struct Test {
    pub name: String,
    /// `None` for bodiless `todo` declarations
    pub body: Option<TestBody>,
    pub only: bool,
    pub skip: bool,
    pub todo: bool,
    pub fails: bool,
    pub concurrent: bool,
    pub options: TestOptions,
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("has_body", &self.body.is_some())
            .field("only", &self.only)
            .field("skip", &self.skip)
            .field("todo", &self.todo)
            .field("fails", &self.fails)
            .field("concurrent", &self.concurrent)
            .field("options", &self.options)
            .finish()
    }
}

/// A named group of tests and child suites
#[derive(Debug, Clone, Default)]
pub struct Suite {
    pub name: String,
    pub tests: Vec<Test>,
    pub children: Vec<Suite>,
    pub only: bool,
    pub skip: bool,
    pub hooks: HookSet,
    pub options: TestOptions,
}

impl Suite {
    fn new(name: String, modifier: Modifier, options: TestOptions) -> Self {
        Self {
            name,
            only: modifier == Modifier::Only,
            skip: matches!(modifier, Modifier::Skip | Modifier::Todo),
            options,
            ..Default::default()
        }
    }

    /// Whether any test or suite below this one (not counting this suite
    /// itself) is marked `only`. Recomputed on every call.
    pub fn contains_only(&self) -> bool {
        self.tests.iter().any(|t| t.only)
            || self
                .children
                .iter()
                .any(|child| child.only || child.contains_only())
    }

    /// Number of tests declared in this suite and all descendants
    pub fn test_count(&self) -> usize {
        self.tests.len() + self.children.iter().map(Suite::test_count).sum::<usize>()
    }
}

/// The finished tree for one module load
#[derive(Debug, Clone, Default)]
pub struct SuiteTree {
    pub suites: Vec<Suite>,
    /// Whether any declaration used `only`
    pub has_only: bool,
}

impl SuiteTree {
    pub fn test_count(&self) -> usize {
        self.suites.iter().map(Suite::test_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.test_count() == 0
    }
}

/// Suite under construction plus modifiers it hands down to its tests
struct Frame {
    suite: Suite,
    fails: bool,
    concurrent: bool,
}

/// Collects declarations for one module load
#[derive(Default)]
pub struct Builder {
    stack: Vec<Frame>,
    roots: Vec<Suite>,
    has_only: bool,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a suite
    pub fn describe<F>(&mut self, name: impl Into<String>, build: F) -> Result<(), UsageError>
    where
        F: FnOnce(&mut Builder) -> Result<(), UsageError>,
    {
        self.add_suite(name.into(), Modifier::Normal, TestOptions::default(), build)
    }

    /// Declare a suite whose options apply to every test below it
    pub fn describe_with<F>(
        &mut self,
        name: impl Into<String>,
        options: TestOptions,
        build: F,
    ) -> Result<(), UsageError>
    where
        F: FnOnce(&mut Builder) -> Result<(), UsageError>,
    {
        self.add_suite(name.into(), Modifier::Normal, options, build)
    }

    /// Declare a test in the current suite
    pub fn test<F, Fut>(&mut self, name: impl Into<String>, body: F) -> Result<(), UsageError>
    where
        F: Fn(TestContext) -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.add_test(
            name.into(),
            Modifier::Normal,
            TestOptions::default(),
            Some(boxed_body(body)),
        )
    }

    /// Declare a test with timeout/retry options
    pub fn test_with<F, Fut>(
        &mut self,
        name: impl Into<String>,
        options: TestOptions,
        body: F,
    ) -> Result<(), UsageError>
    where
        F: Fn(TestContext) -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.add_test(name.into(), Modifier::Normal, options, Some(boxed_body(body)))
    }

    pub fn before_all<F, Fut>(&mut self, f: F) -> Result<(), UsageError>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.add_hook(HookKind::SetupOnce, f)
    }

    pub fn before_each<F, Fut>(&mut self, f: F) -> Result<(), UsageError>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.add_hook(HookKind::SetupEach, f)
    }

    pub fn after_each<F, Fut>(&mut self, f: F) -> Result<(), UsageError>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.add_hook(HookKind::TeardownEach, f)
    }

    pub fn after_all<F, Fut>(&mut self, f: F) -> Result<(), UsageError>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.add_hook(HookKind::TeardownOnce, f)
    }

    pub fn only(&mut self) -> Declare<'_> {
        self.declare(Modifier::Only)
    }

    pub fn skip(&mut self) -> Declare<'_> {
        self.declare(Modifier::Skip)
    }

    pub fn todo(&mut self) -> Declare<'_> {
        self.declare(Modifier::Todo)
    }

    pub fn fails(&mut self) -> Declare<'_> {
        self.declare(Modifier::Fails)
    }

    pub fn concurrent(&mut self) -> Declare<'_> {
        self.declare(Modifier::Concurrent)
    }

    /// Skip the next declaration when `condition` holds
    pub fn skip_if(&mut self, condition: bool) -> Declare<'_> {
        self.declare(if condition {
            Modifier::Skip
        } else {
            Modifier::Normal
        })
    }

    /// Skip the next declaration unless `condition` holds
    pub fn run_if(&mut self, condition: bool) -> Declare<'_> {
        self.skip_if(!condition)
    }

    /// Declare with an explicit modifier
    pub fn declare(&mut self, modifier: Modifier) -> Declare<'_> {
        Declare {
            builder: self,
            modifier,
        }
    }

    /// Parameterised declarations; array cases are spread into arguments
    pub fn each<I>(&mut self, cases: I) -> Each<'_>
    where
        I: IntoIterator<Item = Value>,
    {
        self.declare(Modifier::Normal).each(cases)
    }

    /// Parameterised declarations; each case is passed whole
    pub fn for_cases<I>(&mut self, cases: I) -> ForCases<'_>
    where
        I: IntoIterator<Item = Value>,
    {
        self.declare(Modifier::Normal).for_cases(cases)
    }

    /// Whether any declaration so far used `only`
    pub fn has_only(&self) -> bool {
        self.has_only
    }

    /// Current suite nesting depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Finish the load and hand over the tree
    pub fn finish(self) -> SuiteTree {
        SuiteTree {
            suites: self.roots,
            has_only: self.has_only,
        }
    }

    fn add_suite<F>(
        &mut self,
        name: String,
        modifier: Modifier,
        options: TestOptions,
        build: F,
    ) -> Result<(), UsageError>
    where
        F: FnOnce(&mut Builder) -> Result<(), UsageError>,
    {
        if modifier == Modifier::Only {
            self.has_only = true;
        }
        let (inherited_fails, inherited_concurrent) = self
            .stack
            .last()
            .map(|frame| (frame.fails, frame.concurrent))
            .unwrap_or_default();

        self.stack.push(Frame {
            suite: Suite::new(name, modifier, options),
            fails: inherited_fails || modifier == Modifier::Fails,
            concurrent: inherited_concurrent || modifier == Modifier::Concurrent,
        });
        let built = build(self);
        // Pop even when the closure failed so the stack stays balanced.
        let Some(frame) = self.stack.pop() else {
            return built;
        };
        built?;

        match self.stack.last_mut() {
            Some(parent) => parent.suite.children.push(frame.suite),
            None => self.roots.push(frame.suite),
        }
        Ok(())
    }

    fn add_test(
        &mut self,
        name: String,
        modifier: Modifier,
        options: TestOptions,
        body: Option<TestBody>,
    ) -> Result<(), UsageError> {
        let frame = self
            .stack
            .last_mut()
            .ok_or(UsageError::NoActiveSuite { call: "test" })?;

        let test = Test {
            name,
            only: modifier == Modifier::Only,
            skip: modifier == Modifier::Skip,
            todo: modifier == Modifier::Todo || body.is_none(),
            fails: frame.fails || modifier == Modifier::Fails,
            concurrent: frame.concurrent || modifier == Modifier::Concurrent,
            body,
            options,
        };
        frame.suite.tests.push(test);

        if modifier == Modifier::Only {
            self.has_only = true;
        }
        Ok(())
    }

    fn add_hook<F, Fut>(&mut self, kind: HookKind, f: F) -> Result<(), UsageError>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        let frame = self.stack.last_mut().ok_or(UsageError::NoActiveSuite {
            call: kind.call_name(),
        })?;
        frame.suite.hooks.push(kind, hook(f));
        Ok(())
    }
}

fn boxed_body<F, Fut>(body: F) -> TestBody
where
    F: Fn(TestContext) -> Fut + 'static,
    Fut: Future<Output = TestOutcome> + 'static,
{
    Rc::new(move |ctx| body(ctx).boxed_local())
}

/// A declaration with a modifier attached
pub struct Declare<'a> {
    builder: &'a mut Builder,
    modifier: Modifier,
}

impl<'a> Declare<'a> {
    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    pub fn describe<F>(self, name: impl Into<String>, build: F) -> Result<(), UsageError>
    where
        F: FnOnce(&mut Builder) -> Result<(), UsageError>,
    {
        self.builder
            .add_suite(name.into(), self.modifier, TestOptions::default(), build)
    }

    pub fn describe_with<F>(
        self,
        name: impl Into<String>,
        options: TestOptions,
        build: F,
    ) -> Result<(), UsageError>
    where
        F: FnOnce(&mut Builder) -> Result<(), UsageError>,
    {
        self.builder
            .add_suite(name.into(), self.modifier, options, build)
    }

    pub fn test<F, Fut>(self, name: impl Into<String>, body: F) -> Result<(), UsageError>
    where
        F: Fn(TestContext) -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.test_with(name, TestOptions::default(), body)
    }

    pub fn test_with<F, Fut>(
        self,
        name: impl Into<String>,
        options: TestOptions,
        body: F,
    ) -> Result<(), UsageError>
    where
        F: Fn(TestContext) -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.builder
            .add_test(name.into(), self.modifier, options, Some(boxed_body(body)))
    }

    /// Declare a test without a body; always recorded as `todo`
    pub fn pending(self, name: impl Into<String>) -> Result<(), UsageError> {
        self.builder
            .add_test(name.into(), self.modifier, TestOptions::default(), None)
    }

    pub fn each<I>(self, cases: I) -> Each<'a>
    where
        I: IntoIterator<Item = Value>,
    {
        Each {
            builder: self.builder,
            modifier: self.modifier,
            cases: cases.into_iter().collect(),
        }
    }

    pub fn for_cases<I>(self, cases: I) -> ForCases<'a>
    where
        I: IntoIterator<Item = Value>,
    {
        ForCases {
            builder: self.builder,
            modifier: self.modifier,
            cases: cases.into_iter().collect(),
        }
    }
}

/// Expands one declaration per case, spreading array cases into arguments
pub struct Each<'a> {
    builder: &'a mut Builder,
    modifier: Modifier,
    cases: Vec<Value>,
}

impl Each<'_> {
    pub fn test<F, Fut>(self, template: &str, body: F) -> Result<(), UsageError>
    where
        F: Fn(TestContext, Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.test_with(template, TestOptions::default(), body)
    }

    pub fn test_with<F, Fut>(
        self,
        template: &str,
        options: TestOptions,
        body: F,
    ) -> Result<(), UsageError>
    where
        F: Fn(TestContext, Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        let body = Rc::new(body);
        for (index, case) in self.cases.iter().enumerate() {
            let name = case_name(template, case, index);
            let args = case_args(case);
            let body = Rc::clone(&body);
            self.builder.add_test(
                name,
                self.modifier,
                options,
                Some(boxed_body(move |ctx| body(ctx, args.clone()))),
            )?;
        }
        Ok(())
    }

    pub fn describe<F>(self, template: &str, build: F) -> Result<(), UsageError>
    where
        F: Fn(&mut Builder, Vec<Value>) -> Result<(), UsageError>,
    {
        for (index, case) in self.cases.iter().enumerate() {
            let args = case_args(case);
            self.builder.add_suite(
                case_name(template, case, index),
                self.modifier,
                TestOptions::default(),
                |b| build(b, args),
            )?;
        }
        Ok(())
    }
}

/// Expands one declaration per case, passing each case as one argument
pub struct ForCases<'a> {
    builder: &'a mut Builder,
    modifier: Modifier,
    cases: Vec<Value>,
}

impl ForCases<'_> {
    pub fn test<F, Fut>(self, template: &str, body: F) -> Result<(), UsageError>
    where
        F: Fn(TestContext, Value) -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.test_with(template, TestOptions::default(), body)
    }

    pub fn test_with<F, Fut>(
        self,
        template: &str,
        options: TestOptions,
        body: F,
    ) -> Result<(), UsageError>
    where
        F: Fn(TestContext, Value) -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        let body = Rc::new(body);
        for (index, case) in self.cases.into_iter().enumerate() {
            let name = case_name(template, &case, index);
            let body = Rc::clone(&body);
            self.builder.add_test(
                name,
                self.modifier,
                options,
                Some(boxed_body(move |ctx| body(ctx, case.clone()))),
            )?;
        }
        Ok(())
    }

    pub fn describe<F>(self, template: &str, build: F) -> Result<(), UsageError>
    where
        F: Fn(&mut Builder, Value) -> Result<(), UsageError>,
    {
        for (index, case) in self.cases.into_iter().enumerate() {
            let name = case_name(template, &case, index);
            self.builder
                .add_suite(name, self.modifier, TestOptions::default(), |b| {
                    build(b, case)
                })?;
        }
        Ok(())
    }
}
