//! Test-scoped finish/failure hooks
//!
//! A test body registers callbacks through its [`TestContext`]. Each
//! execution attempt gets its own [`ExecutionToken`]; registrations are only
//! accepted while that token is open. When the attempt concludes the token is
//! closed, its hooks run most-recent-first and the entry is dropped.

use crate::errors::{TestOutcome, UsageError};
use crate::executor::run_hook_with_timeout;
use crate::hooks::HookFuture;
use crate::result::TestStatus;
use futures_util::FutureExt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// Opaque identifier of one execution attempt of one test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionToken(u64);

impl fmt::Display for ExecutionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec#{}", self.0)
    }
}

/// One-shot callback registered from inside a test
pub type SideHook = Box<dyn FnOnce() -> HookFuture>;

#[derive(Default)]
struct Registration {
    finished: Vec<SideHook>,
    failed: Vec<SideHook>,
}

#[derive(Default)]
struct RegistryState {
    next_token: u64,
    open: HashMap<ExecutionToken, Registration>,
}

/// Side-channel hooks keyed by execution token
#[derive(Clone, Default)]
pub struct SideChannelRegistry {
    state: Rc<RefCell<RegistryState>>,
}

impl SideChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh token for a new attempt
    pub fn open(&self) -> ExecutionToken {
        let mut state = self.state.borrow_mut();
        state.next_token += 1;
        let token = ExecutionToken(state.next_token);
        state.open.insert(token, Registration::default());
        token
    }

    pub fn is_open(&self, token: ExecutionToken) -> bool {
        self.state.borrow().open.contains_key(&token)
    }

    /// Number of attempts whose hooks have not run yet
    pub fn open_count(&self) -> usize {
        self.state.borrow().open.len()
    }

    pub fn register_finished(
        &self,
        token: ExecutionToken,
        hook: SideHook,
    ) -> Result<(), UsageError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .open
            .get_mut(&token)
            .ok_or(UsageError::NoActiveTest {
                call: "on_finished",
            })?;
        entry.finished.push(hook);
        Ok(())
    }

    pub fn register_failed(&self, token: ExecutionToken, hook: SideHook) -> Result<(), UsageError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .open
            .get_mut(&token)
            .ok_or(UsageError::NoActiveTest { call: "on_failed" })?;
        entry.failed.push(hook);
        Ok(())
    }

    /// Close `token` and run its hooks.
    ///
    /// Failure hooks run only when `status` is failed, then finish hooks run
    /// unconditionally; both newest first. Each hook gets `timeout` (zero
    /// waits forever). A hook error or timeout is logged and does not stop
    /// the remaining hooks.
    pub async fn conclude(&self, token: ExecutionToken, status: TestStatus, timeout: Duration) {
        let Some(registration) = self.state.borrow_mut().open.remove(&token) else {
            return;
        };

        if status == TestStatus::Failed {
            run_lifo(token, "on_failed", registration.failed, timeout).await;
        }
        run_lifo(token, "on_finished", registration.finished, timeout).await;
    }
}

async fn run_lifo(token: ExecutionToken, label: &str, hooks: Vec<SideHook>, timeout: Duration) {
    for hook in hooks.into_iter().rev() {
        if let Err(e) = run_hook_with_timeout(hook(), timeout).await {
            tracing::warn!(%token, "{label} hook failed: {e}");
        }
    }
}

/// Handle given to a running test body
#[derive(Clone)]
pub struct TestContext {
    token: ExecutionToken,
    registry: SideChannelRegistry,
    full_name: Rc<str>,
    attempt: u32,
}

impl TestContext {
    pub(crate) fn new(
        token: ExecutionToken,
        registry: SideChannelRegistry,
        full_name: Rc<str>,
        attempt: u32,
    ) -> Self {
        Self {
            token,
            registry,
            full_name,
            attempt,
        }
    }

    pub fn token(&self) -> ExecutionToken {
        self.token
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Run `f` after this attempt concludes, whatever its status
    pub fn on_finished<F, Fut>(&self, f: F) -> Result<(), UsageError>
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.registry
            .register_finished(self.token, Box::new(move || f().boxed_local()))
    }

    /// Run `f` after this attempt concludes, only if it failed
    pub fn on_failed<F, Fut>(&self, f: F) -> Result<(), UsageError>
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = TestOutcome> + 'static,
    {
        self.registry
            .register_failed(self.token, Box::new(move || f().boxed_local()))
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("token", &self.token)
            .field("full_name", &self.full_name)
            .field("attempt", &self.attempt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TestError;
    use crate::runtime::block_on;
    use futures_util::future::{ready, Ready};

    fn context(registry: &SideChannelRegistry) -> TestContext {
        TestContext::new(registry.open(), registry.clone(), Rc::from("suite > t"), 1)
    }

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn push(log: &Log, label: &'static str) -> impl FnOnce() -> Ready<TestOutcome> {
        let log = Rc::clone(log);
        move || {
            log.borrow_mut().push(label);
            ready(Ok(()))
        }
    }

    fn explode() -> TestOutcome {
        panic!("cleanup panicked")
    }

    #[test]
    fn test_tokens_are_unique() {
        let registry = SideChannelRegistry::new();
        let a = registry.open();
        let b = registry.open();
        assert_ne!(a, b);
        assert_eq!(registry.open_count(), 2);
    }

    #[test]
    fn test_finish_hooks_run_lifo() {
        let registry = SideChannelRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let ctx = context(&registry);

        ctx.on_finished(push(&log, "f1")).unwrap();
        ctx.on_finished(push(&log, "f2")).unwrap();

        block_on(registry.conclude(ctx.token(), TestStatus::Passed, Duration::ZERO)).unwrap();

        assert_eq!(*log.borrow(), vec!["f2", "f1"]);
        assert!(!registry.is_open(ctx.token()));
    }

    #[test]
    fn test_failure_hooks_before_finish_hooks() {
        let registry = SideChannelRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let ctx = context(&registry);

        ctx.on_finished(push(&log, "finished")).unwrap();
        ctx.on_failed(push(&log, "failed 1")).unwrap();
        ctx.on_failed(push(&log, "failed 2")).unwrap();

        block_on(registry.conclude(ctx.token(), TestStatus::Failed, Duration::ZERO)).unwrap();

        assert_eq!(*log.borrow(), vec!["failed 2", "failed 1", "finished"]);
    }

    #[test]
    fn test_failure_hooks_skipped_on_pass() {
        let registry = SideChannelRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let ctx = context(&registry);

        ctx.on_failed(push(&log, "failed")).unwrap();

        block_on(registry.conclude(ctx.token(), TestStatus::Passed, Duration::ZERO)).unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_hook_error_does_not_stop_others() {
        let registry = SideChannelRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let ctx = context(&registry);

        ctx.on_finished(push(&log, "first")).unwrap();
        ctx.on_finished(|| async { Err(TestError::msg("cleanup broke")) })
            .unwrap();
        ctx.on_finished(|| async { explode() }).unwrap();

        block_on(registry.conclude(ctx.token(), TestStatus::Passed, Duration::ZERO)).unwrap();

        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn test_stuck_hook_times_out() {
        let registry = SideChannelRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let ctx = context(&registry);

        ctx.on_finished(push(&log, "after stuck")).unwrap();
        ctx.on_finished(std::future::pending::<TestOutcome>).unwrap();

        let limit = Duration::from_millis(20);
        block_on(registry.conclude(ctx.token(), TestStatus::Passed, limit)).unwrap();

        assert_eq!(*log.borrow(), vec!["after stuck"]);
    }

    #[test]
    fn test_registration_after_close_is_usage_error() {
        let registry = SideChannelRegistry::new();
        let ctx = context(&registry);

        block_on(registry.conclude(ctx.token(), TestStatus::Passed, Duration::ZERO)).unwrap();

        let err = ctx.on_finished(|| async { Ok(()) }).unwrap_err();
        assert_eq!(
            err,
            UsageError::NoActiveTest {
                call: "on_finished"
            }
        );
        assert!(err.to_string().contains("must be called during test execution"));
    }
}
