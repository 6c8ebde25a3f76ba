//! Minimal assertions for test bodies
//!
//! Each helper returns a [`TestOutcome`] so bodies can use `?`:
//!
//! ```
//! use trial_core::expect::expect_eq;
//! # fn body() -> trial_core::TestOutcome {
//! expect_eq(1 + 2, 3)?;
//! # Ok(())
//! # }
//! ```

use crate::errors::{TestError, TestOutcome};
use std::fmt::Debug;

/// Fail unless `actual == expected`
pub fn expect_eq<T>(actual: T, expected: T) -> TestOutcome
where
    T: PartialEq + Debug,
{
    if actual == expected {
        return Ok(());
    }
    Err(TestError::Assertion {
        message: format!("expected {expected:?}, got {actual:?}"),
        expected: Some(format!("{expected:?}")),
        actual: Some(format!("{actual:?}")),
    })
}

/// Fail if `actual == unexpected`
pub fn expect_ne<T>(actual: T, unexpected: T) -> TestOutcome
where
    T: PartialEq + Debug,
{
    if actual != unexpected {
        return Ok(());
    }
    Err(TestError::Assertion {
        message: format!("expected a value other than {unexpected:?}"),
        expected: None,
        actual: Some(format!("{actual:?}")),
    })
}

pub fn expect_true(condition: bool, message: impl Into<String>) -> TestOutcome {
    if condition {
        Ok(())
    } else {
        Err(TestError::Assertion {
            message: message.into(),
            expected: Some("true".to_string()),
            actual: Some("false".to_string()),
        })
    }
}

/// Unconditional failure
pub fn fail(message: impl Into<String>) -> TestOutcome {
    Err(TestError::msg(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_eq() {
        assert!(expect_eq(2, 2).is_ok());
        let err = expect_eq("a", "b").unwrap_err();
        assert_eq!(err.to_string(), r#"expected "b", got "a""#);
        match err {
            TestError::Assertion {
                expected, actual, ..
            } => {
                assert_eq!(expected.as_deref(), Some(r#""b""#));
                assert_eq!(actual.as_deref(), Some(r#""a""#));
            }
            other => panic!("expected assertion error, got {other:?}"),
        }
    }

    #[test]
    fn test_expect_ne_and_true() {
        assert!(expect_ne(1, 2).is_ok());
        assert!(expect_ne(1, 1).is_err());
        assert_eq!(
            expect_true(false, "list was empty").unwrap_err().to_string(),
            "list was empty"
        );
        assert_eq!(fail("nope"), Err(TestError::msg("nope")));
    }
}
