//! Timeout/retry execution of a single test
//!
//! One attempt is: inherited `before_each` hooks, the body, inherited
//! `after_each` hooks. The attempt is spawned on the local task set and raced
//! against a timer. A timed-out attempt is abandoned, not aborted: the task
//! keeps running detached and whatever it eventually returns is discarded.

use crate::errors::{TestError, TestOutcome};
use crate::hooks::InheritedHooks;
use crate::result::{TestResult, TestStatus};
use crate::side_channel::{SideChannelRegistry, TestContext};
use crate::tree::{Test, TestBody};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;

/// Await `future`, turning a panic into [`TestError::Panicked`]
pub(crate) async fn guard<F>(future: F) -> TestOutcome
where
    F: Future<Output = TestOutcome>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(TestError::Panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn joined(result: Result<TestOutcome, JoinError>) -> TestOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            Err(TestError::Panicked(panic_message(&*payload)))
        }
        Err(e) => Err(TestError::msg(format!("test task ended unexpectedly: {e}"))),
    }
}

/// Race `unit` against `timeout`.
///
/// Must be called from inside a `LocalSet`. A zero timeout waits forever.
pub async fn run_with_timeout<F>(unit: F, timeout: Duration) -> TestOutcome
where
    F: Future<Output = TestOutcome> + 'static,
{
    let handle = tokio::task::spawn_local(guard(unit));

    if timeout.is_zero() {
        return joined(handle.await);
    }

    // Dropping the handle on expiry detaches the task; it is not cancelled.
    match tokio::time::timeout(timeout, handle).await {
        Ok(result) => joined(result),
        Err(_) => Err(TestError::Timeout(timeout)),
    }
}

/// [`run_with_timeout`] for hooks and callbacks bounded by the hook timeout
pub(crate) async fn run_hook_with_timeout<F>(hook: F, timeout: Duration) -> TestOutcome
where
    F: Future<Output = TestOutcome> + 'static,
{
    run_with_timeout(hook, timeout)
        .await
        .map_err(TestError::into_hook_timeout)
}

/// Everything the executor needs to run one test
pub struct TestPlan<'a> {
    pub test: &'a Test,
    pub full_name: &'a str,
    pub hooks: &'a InheritedHooks,
    pub timeout: Duration,
    pub retry: u32,
}

/// Runs tests attempt by attempt and owns the side-channel registry
#[derive(Clone, Default)]
pub struct Executor {
    registry: SideChannelRegistry,
    hook_timeout: Duration,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline for each finish/failure callback; zero waits forever
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SideChannelRegistry {
        &self.registry
    }

    /// Run a test with up to `retry + 1` attempts and record the last one
    pub async fn execute(&self, plan: TestPlan<'_>) -> TestResult {
        let test = plan.test;
        let Some(body) = test.body.clone() else {
            return TestResult::todo(&test.name, plan.full_name);
        };

        let started = Instant::now();
        let full_name: Rc<str> = Rc::from(plan.full_name);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let token = self.registry.open();
            let ctx = TestContext::new(
                token,
                self.registry.clone(),
                Rc::clone(&full_name),
                attempt,
            );

            let unit = attempt_unit(Rc::clone(&body), plan.hooks.clone(), ctx);
            let outcome = run_with_timeout(unit, plan.timeout).await;

            let last = outcome.is_ok() || attempt > plan.retry;
            let (status, error) = if last {
                settle(test.fails, outcome)
            } else {
                (TestStatus::Failed, outcome.err())
            };

            if !last {
                if let Some(error) = &error {
                    tracing::debug!(
                        test = %full_name,
                        attempt,
                        "attempt failed, retrying: {error}"
                    );
                    // A timed-out body may still be running; leave its teardown alone.
                    if !error.is_timeout() {
                        self.cleanup(plan.hooks, plan.timeout, &full_name).await;
                    }
                }
            }

            self.registry
                .conclude(token, status, self.hook_timeout)
                .await;

            if last {
                let duration = started.elapsed();
                return TestResult::new(&test.name, plan.full_name, status, error, duration)
                    .with_retries(attempt - 1);
            }
        }
    }

    /// Best-effort `after_each` pass between attempts
    async fn cleanup(&self, hooks: &InheritedHooks, timeout: Duration, full_name: &str) {
        let hooks = hooks.clone();
        let outcome =
            run_hook_with_timeout(async move { hooks.run_teardown().await }, timeout).await;
        if let Err(e) = outcome {
            tracing::warn!(test = %full_name, "cleanup between attempts failed: {e}");
        }
    }
}

fn attempt_unit(
    body: TestBody,
    hooks: InheritedHooks,
    ctx: TestContext,
) -> impl Future<Output = TestOutcome> + 'static {
    async move {
        hooks.run_setup().await?;
        guard(body(ctx)).await?;
        hooks.run_teardown().await
    }
}

/// Apply the `fails` inversion to the final attempt
fn settle(fails: bool, outcome: TestOutcome) -> (TestStatus, Option<TestError>) {
    match (fails, outcome) {
        (false, Ok(())) => (TestStatus::Passed, None),
        (false, Err(e)) => (TestStatus::Failed, Some(e)),
        (true, Ok(())) => (TestStatus::Failed, Some(TestError::UnexpectedPass)),
        (true, Err(_)) => (TestStatus::Passed, None),
    }
}
