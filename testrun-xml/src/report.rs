// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    DeserializeError, SerializeError, deserialize::deserialize_report, serialize::serialize_report,
};
use std::{io, str::FromStr};

/// The root element of a test run report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestRunReport {
    /// The name of the test run.
    pub name: String,

    /// The project the tests were run against, if known.
    pub project: Option<String>,

    /// The total number of tests in the run.
    pub tests: usize,

    /// The number of tests that started and completed.
    pub started: usize,

    /// The number of failed tests.
    pub failures: usize,

    /// The number of tests that errored.
    pub errors: usize,

    /// The number of ignored tests.
    pub ignored: usize,

    /// Tags that were used to select tests.
    pub include_tags: Option<String>,

    /// Tags that were used to deselect tests.
    pub exclude_tags: Option<String>,

    /// The shape of the document this report was read from.
    ///
    /// Reports are always written as [`ReportFormat::TestRun`].
    pub format: ReportFormat,

    /// The top-level suites and cases.
    pub children: Vec<ReportNode>,
}

impl TestRunReport {
    /// Creates a new, empty `TestRunReport` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the project name.
    pub fn set_project(&mut self, project: impl Into<String>) -> &mut Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the run counters.
    pub fn set_counts(&mut self, counts: ReportCounts) -> &mut Self {
        let ReportCounts {
            tests,
            started,
            failures,
            errors,
            ignored,
        } = counts;
        self.tests = tests;
        self.started = started;
        self.failures = failures;
        self.errors = errors;
        self.ignored = ignored;
        self
    }

    /// Sets the tag filters.
    pub fn set_tags(
        &mut self,
        include_tags: Option<String>,
        exclude_tags: Option<String>,
    ) -> &mut Self {
        self.include_tags = include_tags;
        self.exclude_tags = exclude_tags;
        self
    }

    /// Adds a top-level suite or case.
    pub fn add_child(&mut self, child: ReportNode) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Serialize this report to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_report(self, writer)
    }

    /// Serialize this report to a string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        String::from_utf8(buf).map_err(|utf8_err| {
            SerializeError::from(quick_xml::Error::NonDecodable(Some(utf8_err.utf8_error())))
        })
    }

    /// Reads a report from the given reader.
    ///
    /// `<testrun>`, `<testsuites>` and `<testsuite>` root elements are accepted.
    pub fn deserialize(reader: impl io::BufRead) -> Result<Self, DeserializeError> {
        deserialize_report(reader)
    }
}

impl FromStr for TestRunReport {
    type Err = DeserializeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::deserialize(s.as_bytes())
    }
}

/// Run-level counters, as written on the `<testrun>` element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportCounts {
    /// The total number of tests.
    pub tests: usize,
    /// The number of tests that started and completed.
    pub started: usize,
    /// The number of failed tests.
    pub failures: usize,
    /// The number of tests that errored.
    pub errors: usize,
    /// The number of ignored tests.
    pub ignored: usize,
}

/// The root element a report was read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// A `<testrun>` document.
    #[default]
    TestRun,

    /// A JUnit `<testsuites>` document.
    TestSuites,

    /// A single JUnit `<testsuite>` at the top level.
    ///
    /// The report is named after the suite, which becomes its only child.
    TestSuite,
}

/// A child of a run or a suite.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportNode {
    /// A nested suite.
    Suite(ReportSuite),

    /// A test case.
    Case(ReportCase),
}

impl ReportNode {
    /// Returns the name of this node.
    pub fn name(&self) -> &str {
        match self {
            ReportNode::Suite(suite) => &suite.name,
            ReportNode::Case(case) => &case.name,
        }
    }
}

/// A `<testsuite>` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportSuite {
    /// The name of the suite.
    pub name: String,

    /// The elapsed time of the suite, in seconds.
    pub time: Option<f64>,

    /// True if the suite did not finish.
    pub incomplete: bool,

    /// The name shown to users, if it differs from `name`.
    pub display_name: Option<String>,

    /// Parameter types of a parameterized suite.
    pub parameter_types: Option<Vec<String>>,

    /// An identifier assigned by the test engine.
    pub unique_id: Option<String>,

    /// The execution context (client/server) the suite ran in.
    pub context: Option<String>,

    /// Errors, failures or skips recorded on the suite itself.
    pub outcomes: Vec<ReportOutcome>,

    /// Nested suites and cases, in execution order.
    pub children: Vec<ReportNode>,
}

impl ReportSuite {
    /// Creates a new suite with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the elapsed time.
    pub fn set_time(&mut self, time: f64) -> &mut Self {
        self.time = Some(time);
        self
    }

    /// Adds a nested suite or case.
    pub fn add_child(&mut self, child: ReportNode) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Adds an outcome recorded on the suite itself.
    pub fn add_outcome(&mut self, outcome: ReportOutcome) -> &mut Self {
        self.outcomes.push(outcome);
        self
    }
}

/// A `<testcase>` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportCase {
    /// The name of the test.
    pub name: String,

    /// The class (module) that the test belongs to.
    pub class_name: Option<String>,

    /// The elapsed time of the test, in seconds.
    pub time: Option<f64>,

    /// True if the test did not finish.
    pub incomplete: bool,

    /// True if the test was ignored.
    pub ignored: bool,

    /// True if the test was generated at run time.
    pub dynamic_test: bool,

    /// The name shown to users, if it differs from `name`.
    pub display_name: Option<String>,

    /// Parameter types of a parameterized test.
    pub parameter_types: Option<Vec<String>>,

    /// An identifier assigned by the test engine.
    pub unique_id: Option<String>,

    /// The execution context (client/server) the test ran in.
    pub context: Option<String>,

    /// Errors, failures or skips recorded for the test.
    pub outcomes: Vec<ReportOutcome>,
}

impl ReportCase {
    /// Creates a new case with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the class name.
    pub fn set_class_name(&mut self, class_name: impl Into<String>) -> &mut Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Sets the elapsed time.
    pub fn set_time(&mut self, time: f64) -> &mut Self {
        self.time = Some(time);
        self
    }

    /// Adds an outcome.
    pub fn add_outcome(&mut self, outcome: ReportOutcome) -> &mut Self {
        self.outcomes.push(outcome);
        self
    }
}

/// The kind of a recorded outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    /// An `<error>` element: an unexpected problem.
    Error,

    /// A `<failure>` element: an assertion failed.
    Failure,

    /// A `<skipped>` element.
    Skipped,
}

impl OutcomeKind {
    pub(crate) fn tag_name(self) -> &'static str {
        match self {
            OutcomeKind::Error => "error",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Skipped => "skipped",
        }
    }
}

/// An `<error>`, `<failure>` or `<skipped>` element.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportOutcome {
    /// The kind of outcome.
    pub kind: OutcomeKind,

    /// The message attribute.
    pub message: Option<String>,

    /// The type attribute.
    pub ty: Option<String>,

    /// The expected value of a failed comparison.
    pub expected: Option<String>,

    /// The actual value of a failed comparison.
    pub actual: Option<String>,

    /// The stack trace or other description.
    pub trace: Option<String>,
}

impl ReportOutcome {
    /// Creates a new outcome of the given kind with no details.
    pub fn new(kind: OutcomeKind) -> Self {
        Self {
            kind,
            message: None,
            ty: None,
            expected: None,
            actual: None,
            trace: None,
        }
    }

    /// Sets the message.
    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the trace.
    pub fn set_trace(&mut self, trace: impl Into<String>) -> &mut Self {
        self.trace = Some(trace.into());
        self
    }

    /// Sets the expected and actual values of a failed comparison.
    pub fn set_comparison(
        &mut self,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> &mut Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Returns true if this outcome carries no message, trace, or comparison.
    pub fn is_bare(&self) -> bool {
        self.message.is_none()
            && self.ty.is_none()
            && self.expected.is_none()
            && self.actual.is_none()
            && self.trace.is_none()
    }
}
