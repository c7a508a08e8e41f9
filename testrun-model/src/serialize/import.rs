// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ImportError, TreeError},
    model::{ElementId, ElementSpec, TestErrorInfo, TestStatus, TestTree},
    session::{Counters, SessionCounters, TestRunSession},
};
use camino::Utf8Path;
use std::{fs::File, io};
use testrun_xml::{OutcomeKind, ReportCase, ReportNode, ReportOutcome, ReportSuite, TestRunReport};
use tracing::debug;

/// Imports a report file as a new session.
///
/// The session is named after the report, or after the file stem if the report has no name.
pub fn import_session(path: &Utf8Path) -> Result<TestRunSession, ImportError> {
    let report = read_report(path)?;
    let default_name = path.file_stem().unwrap_or("test run");
    session_from_report(&report, default_name)
}

/// Imports a report from a reader as a new session, named `default_name` if the report has no
/// name.
pub fn import_session_from_reader(
    reader: impl io::BufRead,
    default_name: &str,
) -> Result<TestRunSession, ImportError> {
    let report = TestRunReport::deserialize(reader)
        .map_err(|error| ImportError::Parse { path: None, error })?;
    session_from_report(&report, default_name)
}

/// Imports a report held in a string.
pub fn import_session_from_str(xml: &str, default_name: &str) -> Result<TestRunSession, ImportError> {
    import_session_from_reader(xml.as_bytes(), default_name)
}

/// Replaces the contents of an existing session with a report file.
///
/// The session is left untouched if the report cannot be read.
pub fn import_into_session(session: &TestRunSession, path: &Utf8Path) -> Result<(), ImportError> {
    let (tree, counters) = read_tree(path, session.name())?;
    session.reset();
    session.install(tree, counters);
    Ok(())
}

pub(crate) fn read_tree(
    path: &Utf8Path,
    default_name: &str,
) -> Result<(TestTree, SessionCounters), ImportError> {
    let report = read_report(path)?;
    Ok(build_tree(&report, report_name(&report, default_name))?)
}

fn read_report(path: &Utf8Path) -> Result<TestRunReport, ImportError> {
    debug!("importing report from {path}");
    let file = File::open(path).map_err(|error| ImportError::Open {
        path: path.to_owned(),
        error,
    })?;
    TestRunReport::deserialize(io::BufReader::new(file)).map_err(|error| ImportError::Parse {
        path: Some(path.to_owned()),
        error,
    })
}

fn report_name<'a>(report: &'a TestRunReport, default_name: &'a str) -> &'a str {
    if report.name.is_empty() {
        default_name
    } else {
        &report.name
    }
}

fn session_from_report(
    report: &TestRunReport,
    default_name: &str,
) -> Result<TestRunSession, ImportError> {
    let name = report_name(report, default_name);
    let (tree, counters) = build_tree(report, name)?;

    let mut session = TestRunSession::new(name).with_tags(
        report.include_tags.clone(),
        report.exclude_tags.clone(),
    );
    if let Some(project) = &report.project {
        session = session.with_project(project.clone());
    }
    session.install(tree, counters);
    Ok(session)
}

/// Builds a tree from a parsed report.
///
/// Counters are recomputed from the elements rather than taken from the report's attributes.
fn build_tree(
    report: &TestRunReport,
    root_name: &str,
) -> Result<(TestTree, SessionCounters), TreeError> {
    let mut builder = TreeBuilder {
        tree: TestTree::new(root_name),
        counters: Counters::default(),
    };
    let root = builder.tree.root();
    for child in &report.children {
        builder.add_node(root, child)?;
    }
    let TreeBuilder { tree, counters } = builder;
    Ok((tree, counters.snapshot()))
}

struct TreeBuilder {
    tree: TestTree,
    counters: Counters,
}

impl TreeBuilder {
    fn add_node(&mut self, parent: ElementId, node: &ReportNode) -> Result<(), TreeError> {
        match node {
            ReportNode::Suite(suite) => self.add_suite(parent, suite),
            ReportNode::Case(case) => self.add_case(parent, case),
        }
    }

    fn add_suite(&mut self, parent: ElementId, suite: &ReportSuite) -> Result<(), TreeError> {
        let spec = ElementSpec {
            name: suite.name.clone(),
            display_name: suite.display_name.clone(),
            parameter_types: suite.parameter_types.clone(),
            unique_id: suite.unique_id.clone(),
            context: suite.context.clone(),
            ..Default::default()
        };
        let id = self.tree.add_suite(parent, spec)?;

        for outcome in &suite.outcomes {
            if outcome.kind == OutcomeKind::Skipped && outcome.is_bare() {
                self.tree.set_assumption_failure(id, true)?;
            } else {
                self.apply_outcome(id, outcome)?;
            }
        }
        for child in &suite.children {
            self.add_node(id, child)?;
        }

        if let Some(time) = suite.time {
            self.tree.set_elapsed_time(id, time)?;
        }
        self.counters
            .register_test_ended(&mut self.tree, id, !suite.incomplete)
    }

    fn add_case(&mut self, parent: ElementId, case: &ReportCase) -> Result<(), TreeError> {
        let spec = ElementSpec {
            name: case.name.clone(),
            display_name: case.display_name.clone(),
            parameter_types: case.parameter_types.clone(),
            unique_id: case.unique_id.clone(),
            context: case.context.clone(),
            class_name: case.class_name.clone(),
            dynamic_test: case.dynamic_test,
        };
        let id = self.tree.add_case(parent, spec)?;
        if case.ignored {
            self.tree.set_ignored(id, true)?;
        }

        // An unfinished case that already failed was cut off while running.
        let failing = case
            .outcomes
            .iter()
            .any(|outcome| outcome.kind != OutcomeKind::Skipped);
        if case.incomplete && failing {
            self.tree.set_status(id, TestStatus::Running)?;
        }

        for outcome in &case.outcomes {
            if outcome.kind == OutcomeKind::Skipped && outcome.is_bare() {
                self.tree.set_ignored(id, true)?;
            } else {
                self.apply_outcome(id, outcome)?;
            }
        }

        self.counters
            .register_test_ended(&mut self.tree, id, !case.incomplete)?;
        if let Some(time) = case.time {
            self.tree.set_elapsed_time(id, time)?;
        }
        Ok(())
    }

    fn apply_outcome(&mut self, id: ElementId, outcome: &ReportOutcome) -> Result<(), TreeError> {
        let status = match outcome.kind {
            OutcomeKind::Error => TestStatus::Error,
            OutcomeKind::Failure => TestStatus::Failure,
            OutcomeKind::Skipped => {
                self.tree.set_assumption_failure(id, true)?;
                TestStatus::Skipped
            }
        };
        let info = TestErrorInfo {
            status,
            message: outcome.message.clone(),
            error_type: outcome.ty.clone(),
            trace: outcome.trace.clone(),
            expected: outcome.expected.clone(),
            actual: outcome.actual.clone(),
        };
        self.tree.push_error(id, info)?;
        self.counters
            .register_test_failure_status(&mut self.tree, id)
    }
}
