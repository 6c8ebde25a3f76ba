//! Shared helpers for trial-core integration tests
#![allow(dead_code)]

use futures_util::future::{ready, Ready};
use std::cell::RefCell;
use std::rc::Rc;
use trial_core::{
    Builder, RunOptions, RunReport, Runner, SummaryReporter, TestContext, TestModule, TestOutcome,
    TestStatus, UsageError,
};

/// Shared, ordered event log
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// Hook that appends `label` to `log` each time it runs
pub fn push(log: &Log, label: &str) -> impl Fn() -> Ready<TestOutcome> + 'static {
    let log = Rc::clone(log);
    let label = label.to_string();
    move || {
        log.borrow_mut().push(label.clone());
        ready(Ok(()))
    }
}

/// Test body that appends `label` to `log` and passes
pub fn body(log: &Log, label: &str) -> impl Fn(TestContext) -> Ready<TestOutcome> + 'static {
    let hook = push(log, label);
    move |_ctx| hook()
}

pub fn pass(_ctx: TestContext) -> Ready<TestOutcome> {
    ready(Ok(()))
}

pub fn failing(_ctx: TestContext) -> Ready<TestOutcome> {
    ready(Err(trial_core::TestError::msg("intentional failure")))
}

/// Run a single module with default options
pub fn run<F>(register: F) -> RunReport
where
    F: FnOnce(&mut Builder) -> Result<(), UsageError> + 'static,
{
    run_with(RunOptions::default(), register)
}

pub fn run_with<F>(options: RunOptions, register: F) -> RunReport
where
    F: FnOnce(&mut Builder) -> Result<(), UsageError> + 'static,
{
    let mut reporter = SummaryReporter::new();
    Runner::new(options)
        .run_modules(vec![TestModule::new("module", register)], &mut reporter)
        .expect("runtime should start")
}

/// `(full_name, status)` pairs in result order
pub fn outcomes(report: &RunReport) -> Vec<(String, TestStatus)> {
    report
        .results
        .iter()
        .map(|r| (r.full_name.clone(), r.status))
        .collect()
}

pub fn status_of(report: &RunReport, full_name: &str) -> TestStatus {
    match report.find(full_name) {
        Some(result) => result.status,
        None => panic!("no result for {full_name:?}; have {:?}", report.names()),
    }
}

pub fn error_of(report: &RunReport, full_name: &str) -> String {
    report
        .find(full_name)
        .and_then(|r| r.error_message())
        .unwrap_or_else(|| panic!("no error recorded for {full_name:?}"))
}
