//! Async runtime bridge
//!
//! Test bodies and hooks are `!Send` (they may hold `Rc`/`RefCell`), so
//! everything runs on a current-thread tokio runtime inside a [`LocalSet`].

use crate::errors::RunError;
use std::future::Future;
use tokio::task::LocalSet;

/// Block on a future until it completes
///
/// Creates a fresh current-thread runtime and `LocalSet` for the call, so
/// `spawn_local` works inside `future`. Anything still spawned when
/// `future` completes (for example a timed-out test body) is dropped.
pub fn block_on<F>(future: F) -> Result<F::Output, RunError>
where
    F: Future,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local_set = LocalSet::new();
    Ok(local_set.block_on(&runtime, future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on() {
        let result = block_on(async { 42 }).unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn test_spawn_local_inside() {
        let result = block_on(async {
            let handle = tokio::task::spawn_local(async { "hello" });
            handle.await.unwrap()
        })
        .unwrap();
        assert_eq!(result, "hello");
    }
}
