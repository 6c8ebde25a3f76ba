//! Lifecycle hooks
//!
//! Every suite owns one [`HookSet`]. While the walker descends, the
//! per-test kinds are accumulated into [`InheritedHooks`] parent-first, so
//! setup runs outer-to-inner and teardown (walked in reverse) inner-to-outer.

use crate::errors::{TestError, TestOutcome};
use crate::executor::guard;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Boxed future produced by a hook
pub type HookFuture = LocalBoxFuture<'static, TestOutcome>;

/// A zero-argument async callback
pub type Hook = Rc<dyn Fn() -> HookFuture>;

/// Wrap an async closure as a [`Hook`]
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = TestOutcome> + 'static,
{
    Rc::new(move || f().boxed_local())
}

/// The four lifecycle positions a hook can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Once before the first test of a suite
    SetupOnce,
    /// Before every test of a suite and its descendants
    SetupEach,
    /// After every test of a suite and its descendants
    TeardownEach,
    /// Once after the last test of a suite
    TeardownOnce,
}

impl HookKind {
    /// Name of the registration call for this kind
    pub fn call_name(self) -> &'static str {
        match self {
            HookKind::SetupOnce => "before_all",
            HookKind::SetupEach => "before_each",
            HookKind::TeardownEach => "after_each",
            HookKind::TeardownOnce => "after_all",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HookKind::SetupOnce => "beforeAll",
            HookKind::SetupEach => "beforeEach",
            HookKind::TeardownEach => "afterEach",
            HookKind::TeardownOnce => "afterAll",
        };
        f.write_str(label)
    }
}

/// Hooks registered directly on one suite, in registration order
#[derive(Clone, Default)]
pub struct HookSet {
    setup_once: Vec<Hook>,
    setup_each: Vec<Hook>,
    teardown_each: Vec<Hook>,
    teardown_once: Vec<Hook>,
}

impl HookSet {
    pub fn push(&mut self, kind: HookKind, hook: Hook) {
        self.list_mut(kind).push(hook);
    }

    pub fn get(&self, kind: HookKind) -> &[Hook] {
        match kind {
            HookKind::SetupOnce => &self.setup_once,
            HookKind::SetupEach => &self.setup_each,
            HookKind::TeardownEach => &self.teardown_each,
            HookKind::TeardownOnce => &self.teardown_once,
        }
    }

    pub fn len(&self) -> usize {
        self.setup_once.len()
            + self.setup_each.len()
            + self.teardown_each.len()
            + self.teardown_once.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn list_mut(&mut self, kind: HookKind) -> &mut Vec<Hook> {
        match kind {
            HookKind::SetupOnce => &mut self.setup_once,
            HookKind::SetupEach => &mut self.setup_each,
            HookKind::TeardownEach => &mut self.teardown_each,
            HookKind::TeardownOnce => &mut self.teardown_once,
        }
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("setup_once", &self.setup_once.len())
            .field("setup_each", &self.setup_each.len())
            .field("teardown_each", &self.teardown_each.len())
            .field("teardown_once", &self.teardown_once.len())
            .finish()
    }
}

/// Per-test hooks accumulated from the root suite down to the current one
#[derive(Clone, Default)]
pub struct InheritedHooks {
    setup_each: Vec<Hook>,
    teardown_each: Vec<Hook>,
}

impl InheritedHooks {
    /// Parent hooks followed by the child suite's own
    pub fn extend_with(&self, own: &HookSet) -> InheritedHooks {
        let mut setup_each = self.setup_each.clone();
        setup_each.extend(own.get(HookKind::SetupEach).iter().cloned());
        let mut teardown_each = self.teardown_each.clone();
        teardown_each.extend(own.get(HookKind::TeardownEach).iter().cloned());
        InheritedHooks {
            setup_each,
            teardown_each,
        }
    }

    pub fn setup_each(&self) -> &[Hook] {
        &self.setup_each
    }

    pub fn teardown_each(&self) -> &[Hook] {
        &self.teardown_each
    }

    /// Run setup hooks outer-to-inner, stopping at the first failure
    pub async fn run_setup(&self) -> TestOutcome {
        for hook in &self.setup_each {
            guard(hook())
                .await
                .map_err(|e| TestError::hook(HookKind::SetupEach, &e))?;
        }
        Ok(())
    }

    /// Run teardown hooks inner-to-outer, stopping at the first failure
    pub async fn run_teardown(&self) -> TestOutcome {
        for hook in self.teardown_each.iter().rev() {
            guard(hook())
                .await
                .map_err(|e| TestError::hook(HookKind::TeardownEach, &e))?;
        }
        Ok(())
    }
}

impl fmt::Debug for InheritedHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InheritedHooks")
            .field("setup_each", &self.setup_each.len())
            .field("teardown_each", &self.teardown_each.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block_on;
    use std::cell::RefCell;

    fn recording(log: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> Hook {
        let log = Rc::clone(log);
        hook(move || {
            let log = Rc::clone(&log);
            async move {
                log.borrow_mut().push(label);
                Ok(())
            }
        })
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(HookKind::SetupOnce.to_string(), "beforeAll");
        assert_eq!(HookKind::TeardownOnce.to_string(), "afterAll");
        assert_eq!(HookKind::SetupEach.call_name(), "before_each");
    }

    #[test]
    fn test_inherited_order() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut parent = HookSet::default();
        parent.push(HookKind::SetupEach, recording(&log, "parent setup"));
        parent.push(HookKind::TeardownEach, recording(&log, "parent teardown"));
        let mut child = HookSet::default();
        child.push(HookKind::SetupEach, recording(&log, "child setup"));
        child.push(HookKind::TeardownEach, recording(&log, "child teardown"));

        let inherited = InheritedHooks::default()
            .extend_with(&parent)
            .extend_with(&child);

        block_on(async {
            inherited.run_setup().await.unwrap();
            inherited.run_teardown().await.unwrap();
        })
        .unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "parent setup",
                "child setup",
                "child teardown",
                "parent teardown"
            ]
        );
    }

    #[test]
    fn test_teardown_stops_at_first_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut set = HookSet::default();
        set.push(HookKind::TeardownEach, recording(&log, "first registered"));
        set.push(
            HookKind::TeardownEach,
            hook(|| async { Err(TestError::msg("boom")) }),
        );
        let inherited = InheritedHooks::default().extend_with(&set);

        let outcome = block_on(inherited.run_teardown()).unwrap();

        assert_eq!(
            outcome.unwrap_err().to_string(),
            "afterEach hook failed: boom"
        );
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_hook_set_counts() {
        let mut set = HookSet::default();
        assert!(set.is_empty());
        set.push(HookKind::SetupOnce, hook(|| async { Ok(()) }));
        set.push(HookKind::TeardownOnce, hook(|| async { Ok(()) }));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(HookKind::SetupOnce).len(), 1);
        assert!(set.get(HookKind::SetupEach).is_empty());
    }
}
