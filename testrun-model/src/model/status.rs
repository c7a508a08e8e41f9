// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test statuses and how they combine.
//!
//! A [`TestStatus`] is observed as one of eight variants, but internally it is the product of two
//! independent axes: *progress* (not run, running, done) and *outcome* (ok, skipped, failure,
//! error). Combining two statuses combines each axis separately, which makes
//! [`combine_status`] commutative and associative by construction.

use std::fmt;

/// The status of a test case or suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum TestStatus {
    /// The test has not started.
    NotRun,
    /// The test is running and has not reported any problems.
    Running,
    /// The test is running and has reported an error.
    RunningError,
    /// The test is running and has reported a failure.
    RunningFailure,
    /// The test finished successfully.
    Ok,
    /// The test was skipped.
    Skipped,
    /// The test finished with an error.
    Error,
    /// The test finished with a failure.
    Failure,
}

/// How far along a test is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Progress {
    NotRun,
    Done,
    Running,
}

/// The worst thing a test has reported. Ordered from best to worst.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Outcome {
    Ok,
    Skipped,
    Failure,
    Error,
}

impl TestStatus {
    /// All statuses, in declaration order.
    pub const ALL: [TestStatus; 8] = [
        TestStatus::NotRun,
        TestStatus::Running,
        TestStatus::RunningError,
        TestStatus::RunningFailure,
        TestStatus::Ok,
        TestStatus::Skipped,
        TestStatus::Error,
        TestStatus::Failure,
    ];

    fn progress(self) -> Progress {
        match self {
            TestStatus::NotRun => Progress::NotRun,
            TestStatus::Running | TestStatus::RunningError | TestStatus::RunningFailure => {
                Progress::Running
            }
            TestStatus::Ok | TestStatus::Skipped | TestStatus::Error | TestStatus::Failure => {
                Progress::Done
            }
        }
    }

    fn outcome(self) -> Outcome {
        match self {
            TestStatus::NotRun | TestStatus::Running | TestStatus::Ok => Outcome::Ok,
            TestStatus::Skipped => Outcome::Skipped,
            TestStatus::RunningFailure | TestStatus::Failure => Outcome::Failure,
            TestStatus::RunningError | TestStatus::Error => Outcome::Error,
        }
    }

    fn from_parts(progress: Progress, outcome: Outcome) -> Self {
        match (progress, outcome) {
            (Progress::NotRun, _) => TestStatus::NotRun,
            (Progress::Running, Outcome::Error) => TestStatus::RunningError,
            (Progress::Running, Outcome::Failure) => TestStatus::RunningFailure,
            (Progress::Running, Outcome::Ok | Outcome::Skipped) => TestStatus::Running,
            (Progress::Done, Outcome::Ok) => TestStatus::Ok,
            (Progress::Done, Outcome::Skipped) => TestStatus::Skipped,
            (Progress::Done, Outcome::Failure) => TestStatus::Failure,
            (Progress::Done, Outcome::Error) => TestStatus::Error,
        }
    }

    /// Returns true for `NotRun`, `Running` and `Ok`.
    pub fn is_ok(self) -> bool {
        matches!(self, TestStatus::NotRun | TestStatus::Running | TestStatus::Ok)
    }

    /// Returns true for `Failure` and `RunningFailure`.
    pub fn is_failure(self) -> bool {
        matches!(self, TestStatus::Failure | TestStatus::RunningFailure)
    }

    /// Returns true for `Error` and `RunningError`.
    pub fn is_error(self) -> bool {
        matches!(self, TestStatus::Error | TestStatus::RunningError)
    }

    /// Returns true for `Skipped`.
    pub fn is_skipped(self) -> bool {
        self == TestStatus::Skipped
    }

    /// Returns true if the test is still running.
    pub fn is_running(self) -> bool {
        self.progress() == Progress::Running
    }

    /// Returns true if the test has finished, successfully or not.
    pub fn is_done(self) -> bool {
        self.progress() == Progress::Done
    }

    /// Returns true if the test has not started.
    pub fn is_not_run(self) -> bool {
        self == TestStatus::NotRun
    }

    /// Returns true for statuses that indicate a problem: errors and failures, running or done.
    pub fn is_error_or_failure(self) -> bool {
        self.is_error() || self.is_failure()
    }

    /// Returns the terminal status a running status settles on once the test completes.
    ///
    /// Statuses that are not running are returned unchanged.
    pub fn finished(self) -> TestStatus {
        match self {
            TestStatus::Running => TestStatus::Ok,
            TestStatus::RunningError => TestStatus::Error,
            TestStatus::RunningFailure => TestStatus::Failure,
            other => other,
        }
    }

    /// Converts this status into the result that is reported for it.
    pub fn to_result(self) -> TestResult {
        match self {
            TestStatus::NotRun | TestStatus::Running => TestResult::Undefined,
            TestStatus::Error | TestStatus::RunningError => TestResult::Error,
            TestStatus::Failure | TestStatus::RunningFailure => TestResult::Failure,
            TestStatus::Skipped => TestResult::Skipped,
            TestStatus::Ok => TestResult::Ok,
        }
    }

    /// Converts this status into a progress state.
    pub fn to_progress_state(self) -> ProgressState {
        match self.progress() {
            Progress::NotRun => ProgressState::NotStarted,
            Progress::Running => ProgressState::Running,
            Progress::Done => ProgressState::Completed,
        }
    }

    /// Returns a short, lowercase label for this status.
    pub fn label(self) -> &'static str {
        match self {
            TestStatus::NotRun => "not run",
            TestStatus::Running => "running",
            TestStatus::RunningError => "running (error)",
            TestStatus::RunningFailure => "running (failure)",
            TestStatus::Ok => "ok",
            TestStatus::Skipped => "skipped",
            TestStatus::Error => "error",
            TestStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Combines two statuses into the status of an element that contains both.
///
/// The result is not run only if both are not run. It is running if either is running, and done
/// otherwise. The outcome is the worse of the two: error over failure over skipped over ok. A
/// running status keeps an error or failure outcome but drops a skipped one.
pub fn combine_status(a: TestStatus, b: TestStatus) -> TestStatus {
    let progress = a.progress().max(b.progress());
    let outcome = a.outcome().max(b.outcome());
    TestStatus::from_parts(progress, outcome)
}

/// The reported result of a test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TestResult {
    /// The test passed.
    Ok,
    /// The test failed.
    Failure,
    /// The test errored.
    Error,
    /// The test was skipped.
    Skipped,
    /// The test has no result yet.
    Undefined,
}

impl TestResult {
    /// Returns a short, lowercase label for this result.
    pub fn label(self) -> &'static str {
        match self {
            TestResult::Ok => "ok",
            TestResult::Failure => "failure",
            TestResult::Error => "error",
            TestResult::Skipped => "skipped",
            TestResult::Undefined => "undefined",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The progress of an element or session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgressState {
    /// Nothing has started yet.
    NotStarted,
    /// Execution is in progress.
    Running,
    /// Execution was stopped before it completed.
    Stopped,
    /// Execution completed.
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test_case(TestStatus::NotRun, TestStatus::NotRun, TestStatus::NotRun ; "both not run")]
    #[test_case(TestStatus::NotRun, TestStatus::Ok, TestStatus::Ok ; "not run and ok")]
    #[test_case(TestStatus::Ok, TestStatus::Failure, TestStatus::Failure ; "ok and failure")]
    #[test_case(TestStatus::Failure, TestStatus::Error, TestStatus::Error ; "error beats failure")]
    #[test_case(TestStatus::Running, TestStatus::Failure, TestStatus::RunningFailure ; "running and failure")]
    #[test_case(TestStatus::Running, TestStatus::Error, TestStatus::RunningError ; "running and error")]
    #[test_case(TestStatus::Running, TestStatus::Skipped, TestStatus::Running ; "running drops skipped")]
    #[test_case(TestStatus::Ok, TestStatus::Skipped, TestStatus::Skipped ; "skipped beats ok")]
    #[test_case(TestStatus::Skipped, TestStatus::Failure, TestStatus::Failure ; "failure beats skipped")]
    #[test_case(TestStatus::NotRun, TestStatus::Running, TestStatus::Running ; "not run and running")]
    #[test_case(TestStatus::NotRun, TestStatus::Error, TestStatus::Error ; "not run and error")]
    #[test_case(TestStatus::RunningFailure, TestStatus::Ok, TestStatus::RunningFailure ; "running failure and ok")]
    fn combine(a: TestStatus, b: TestStatus, expected: TestStatus) {
        assert_eq!(combine_status(a, b), expected);
    }

    #[proptest]
    fn combine_is_commutative(a: TestStatus, b: TestStatus) {
        prop_assert_eq!(combine_status(a, b), combine_status(b, a));
    }

    #[proptest]
    fn combine_is_associative(a: TestStatus, b: TestStatus, c: TestStatus) {
        prop_assert_eq!(
            combine_status(combine_status(a, b), c),
            combine_status(a, combine_status(b, c))
        );
    }

    #[proptest]
    fn not_run_is_identity(a: TestStatus) {
        prop_assert_eq!(combine_status(TestStatus::NotRun, a), a);
    }

    #[test]
    fn predicates() {
        for status in TestStatus::ALL {
            assert_eq!(
                status.is_running(),
                matches!(
                    status,
                    TestStatus::Running | TestStatus::RunningError | TestStatus::RunningFailure
                ),
                "is_running for {status:?}"
            );
            assert_eq!(
                status.is_done(),
                matches!(
                    status,
                    TestStatus::Ok | TestStatus::Skipped | TestStatus::Error | TestStatus::Failure
                ),
                "is_done for {status:?}"
            );
        }
        assert!(TestStatus::NotRun.is_ok());
        assert!(TestStatus::Running.is_ok());
        assert!(!TestStatus::Skipped.is_ok());
        assert!(TestStatus::RunningFailure.is_failure());
        assert!(TestStatus::RunningError.is_error());
    }

    #[test_case(TestStatus::NotRun, TestResult::Undefined, ProgressState::NotStarted ; "not run")]
    #[test_case(TestStatus::Running, TestResult::Undefined, ProgressState::Running ; "running")]
    #[test_case(TestStatus::RunningError, TestResult::Error, ProgressState::Running ; "running error")]
    #[test_case(TestStatus::RunningFailure, TestResult::Failure, ProgressState::Running ; "running failure")]
    #[test_case(TestStatus::Ok, TestResult::Ok, ProgressState::Completed ; "ok")]
    #[test_case(TestStatus::Skipped, TestResult::Skipped, ProgressState::Completed ; "skipped")]
    #[test_case(TestStatus::Error, TestResult::Error, ProgressState::Completed ; "error")]
    #[test_case(TestStatus::Failure, TestResult::Failure, ProgressState::Completed ; "failure")]
    fn conversions(status: TestStatus, result: TestResult, progress: ProgressState) {
        assert_eq!(status.to_result(), result);
        assert_eq!(status.to_progress_state(), progress);
    }
}
