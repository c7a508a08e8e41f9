// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events flowing into and out of a test run session.
//!
//! [`RunnerEvent`]s arrive from the reporting channel of the external test process and are applied
//! with [`TestRunSession::apply_event`]. Each applied event produces one or more [`SessionEvent`]s,
//! which are delivered synchronously to every [`TestSessionListener`] registered on the session.

use crate::{
    model::{ElementId, ElementSpec, TestErrorInfo, TestStatus},
    session::TestRunSession,
};
use std::{sync::Arc, time::Duration};

/// An event reported by the external test process.
///
/// Tests are addressed by the ids the reporting channel assigns to them.
#[derive(Clone, Debug)]
pub enum RunnerEvent {
    /// The test process started executing tests.
    RunStarted,

    /// A suite was discovered.
    SuiteAdded {
        /// The channel's id for the suite.
        test_id: String,
        /// The channel's id for the parent suite, or `None` for a top-level suite.
        parent_id: Option<String>,
        /// The suite's properties.
        spec: ElementSpec,
    },

    /// A test case was discovered.
    CaseAdded {
        /// The channel's id for the case.
        test_id: String,
        /// The channel's id for the parent suite, or `None` for a top-level case.
        parent_id: Option<String>,
        /// The case's properties.
        spec: ElementSpec,
    },

    /// A test started.
    TestStarted {
        /// The channel's id for the test.
        test_id: String,
    },

    /// A test reported an error, failure or skip.
    TestFailed {
        /// The channel's id for the test.
        test_id: String,
        /// The reported problem.
        error: TestErrorInfo,
        /// True if the test was aborted because an assumption did not hold.
        assumption_failure: bool,
    },

    /// A test finished.
    TestEnded {
        /// The channel's id for the test.
        test_id: String,
        /// True if the test was ignored rather than run.
        ignored: bool,
    },

    /// A finished test was run again.
    TestRerun {
        /// The channel's id for the test.
        test_id: String,
        /// The problem reported by the rerun, or `None` if it passed.
        error: Option<TestErrorInfo>,
    },

    /// All tests finished.
    RunEnded {
        /// The time the run took, as measured by the test process.
        elapsed: Duration,
    },

    /// The run was stopped before all tests finished.
    RunStopped {
        /// The time the run took until it was stopped.
        elapsed: Duration,
    },

    /// The test process exited.
    RunTerminated,
}

/// A notification sent to [`TestSessionListener`]s.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The session started receiving events.
    SessionStarted,

    /// The first test is about to run.
    RunningBegins,

    /// An element was added to the tree.
    TestAdded {
        /// The new element.
        id: ElementId,
    },

    /// A test started.
    TestStarted {
        /// The test.
        id: ElementId,
    },

    /// A test finished.
    TestEnded {
        /// The test.
        id: ElementId,
    },

    /// A test reported a problem.
    TestFailed {
        /// The test.
        id: ElementId,
        /// The test's status after the problem was recorded.
        status: TestStatus,
        /// The reported problem.
        error: TestErrorInfo,
    },

    /// A test was rerun.
    TestRerun {
        /// The test.
        id: ElementId,
        /// The test's status after the rerun.
        status: TestStatus,
        /// The problem reported by the rerun, if any.
        error: Option<TestErrorInfo>,
    },

    /// All tests finished.
    SessionEnded {
        /// The time the run took.
        elapsed: Duration,
    },

    /// The run was stopped.
    SessionStopped {
        /// The time the run took until it was stopped.
        elapsed: Duration,
    },

    /// The test process exited.
    SessionTerminated,
}

/// Receives notifications about changes to a single session.
///
/// Listeners are called synchronously on the thread that applied the change, after all of the
/// session's locks have been released. They must not panic.
pub trait TestSessionListener: Send + Sync {
    /// Called for every change to the session.
    fn on_event(&self, session: &TestRunSession, event: &SessionEvent);

    /// Returns false to prevent the session from being written to disk and dropped from memory.
    fn accepts_swap_to_disk(&self) -> bool {
        true
    }
}

/// Receives coarse-grained run notifications from the
/// [`LegacySessionAdapter`](crate::registry::LegacySessionAdapter).
///
/// Only one session is observed at a time.
pub trait TestRunListener: Send + Sync {
    /// A session started.
    fn session_started(&self, _session: &Arc<TestRunSession>) {}

    /// A session ended normally or was stopped.
    fn session_finished(&self, _session: &Arc<TestRunSession>) {}

    /// The process behind a session exited.
    fn session_terminated(&self, _session: &Arc<TestRunSession>) {}
}
