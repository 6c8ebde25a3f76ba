//! Parameterised declarations

mod common;

use common::*;
use futures_util::future::ready;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use trial_core::expect::expect_eq;
use trial_core::TestStatus;

#[test]
fn test_each_names_and_arguments() {
    let report = run(|b| {
        b.describe("add", |b| {
            b.each([json!([1, 2, 3]), json!([2, 3, 5])])
                .test("%i+%i=%i", |_ctx, args| {
                    let sum = args[0].as_i64().unwrap_or_default()
                        + args[1].as_i64().unwrap_or_default();
                    ready(expect_eq(Some(sum), args[2].as_i64()))
                })
        })
    });

    assert_eq!(
        outcomes(&report),
        vec![
            ("add > 1+2=3".to_string(), TestStatus::Passed),
            ("add > 2+3=5".to_string(), TestStatus::Passed),
        ]
    );
}

#[test]
fn test_each_body_sees_every_element() {
    let seen = log();
    run({
        let seen = seen.clone();
        move |b| {
            b.describe("s", |b| {
                b.each([json!(["a", "b", "c"])]).test("only %s", move |_ctx, args| {
                    seen.borrow_mut().push(format!("{}", args.len()));
                    ready(Ok(()))
                })
            })
        }
    });

    assert_eq!(entries(&seen), vec!["3"]);
}

#[test]
fn test_each_object_cases() {
    let report = run(|b| {
        b.describe("users", |b| {
            b.each([
                json!({"name": "ada", "admin": true}),
                json!({"name": "bob", "admin": false}),
            ])
            .test("$name admin=$admin", |_ctx, args| {
                ready(expect_eq(args.len(), 1))
            })
        })
    });

    assert_eq!(
        report.names(),
        vec!["users > ada admin=true", "users > bob admin=false"]
    );
    assert_eq!(report.summary.passed, 2);
}

#[test]
fn test_for_cases_passes_whole_case() {
    let seen = log();
    let report = run({
        let seen = seen.clone();
        move |b| {
            b.describe("pairs", |b| {
                b.for_cases([json!([1, 2]), json!([3, 4])])
                    .test("case %#", move |_ctx, case: Value| {
                        seen.borrow_mut().push(case.to_string());
                        ready(Ok(()))
                    })
            })
        }
    });

    assert_eq!(report.names(), vec!["pairs > case 0", "pairs > case 1"]);
    assert_eq!(entries(&seen), vec!["[1,2]", "[3,4]"]);
}

#[test]
fn test_each_with_modifier() {
    let report = run(|b| {
        b.describe("s", |b| {
            b.skip()
                .each([json!(1), json!(2)])
                .test("value %d", |_ctx, _args| ready(Ok(())))?;
            b.test("plain", pass)
        })
    });

    assert_eq!(
        outcomes(&report),
        vec![
            ("s > value 1".to_string(), TestStatus::Skipped),
            ("s > value 2".to_string(), TestStatus::Skipped),
            ("s > plain".to_string(), TestStatus::Passed),
        ]
    );
}

#[test]
fn test_each_only_selects_expanded_tests() {
    let report = run(|b| {
        b.describe("s", |b| {
            b.test("ignored", pass)?;
            b.only()
                .for_cases([json!("x"), json!("y")])
                .test("focus %s", |_ctx, _case| ready(Ok(())))
        })
    });

    assert_eq!(report.names(), vec!["s > focus x", "s > focus y"]);
}

#[test]
fn test_each_describe_expands_suites() {
    let report = run(|b| {
        b.each([json!(["json", 2]), json!(["toml", 3])])
            .describe("%s format", |b, args| {
                let expected = args[1].as_i64();
                b.test("fields", move |_ctx| ready(expect_eq(expected.is_some(), true)))
            })
    });

    assert_eq!(
        report.names(),
        vec!["json format > fields", "toml format > fields"]
    );
}
