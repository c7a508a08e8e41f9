// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::ExportError,
    model::{ElementId, ElementKind, ProgressState, TestElement, TestResult, TestTree},
    session::TestRunSession,
};
use camino::Utf8Path;
use itertools::Itertools;
use std::{fs::File, io};
use testrun_xml::{
    OutcomeKind, ReportCase, ReportCounts, ReportNode, ReportOutcome, ReportSuite, TestRunReport,
};
use tracing::debug;

/// Converts a session into a report, swapping the tree in if necessary.
pub fn session_to_report(session: &TestRunSession) -> TestRunReport {
    session.with_tree(|tree| report_from_tree(session, tree))
}

/// Writes a session as a `<testrun>` document.
pub fn export_session(session: &TestRunSession, writer: impl io::Write) -> Result<(), ExportError> {
    session_to_report(session).serialize(writer)?;
    Ok(())
}

/// Writes a session as a `<testrun>` document to a file, replacing it if it exists.
pub fn export_session_to_path(session: &TestRunSession, path: &Utf8Path) -> Result<(), ExportError> {
    let report = session_to_report(session);
    write_report(&report, path)
}

// Used while the caller holds the session's tree lock.
pub(crate) fn write_tree_to_path(
    session: &TestRunSession,
    tree: &TestTree,
    path: &Utf8Path,
) -> Result<(), ExportError> {
    write_report(&report_from_tree(session, tree), path)
}

fn write_report(report: &TestRunReport, path: &Utf8Path) -> Result<(), ExportError> {
    debug!("exporting `{}` to {path}", report.name);
    let file = File::create(path).map_err(|error| ExportError::Create {
        path: path.to_owned(),
        error,
    })?;
    report.serialize(io::BufWriter::new(file))?;
    Ok(())
}

pub(crate) fn report_from_tree(session: &TestRunSession, tree: &TestTree) -> TestRunReport {
    let mut report = TestRunReport::new(session.name());
    if let Some(project) = session.project() {
        report.set_project(project);
    }
    let counters = session.counters();
    report
        .set_counts(ReportCounts {
            tests: counters.total,
            started: counters.started,
            failures: counters.failures,
            errors: counters.errors,
            ignored: counters.ignored,
        })
        .set_tags(
            non_blank(session.include_tags()),
            non_blank(session.exclude_tags()),
        );

    for &child in tree[tree.root()].children() {
        report.add_child(element_to_node(tree, child));
    }
    report
}

fn non_blank(tags: Option<&str>) -> Option<String> {
    tags.filter(|tags| !tags.trim().is_empty())
        .map(ToOwned::to_owned)
}

fn element_to_node(tree: &TestTree, id: ElementId) -> ReportNode {
    let element = &tree[id];
    let elapsed = tree.elapsed_time_in_seconds(id);
    let time = (!elapsed.is_nan()).then_some(elapsed);
    let outcomes: Vec<_> = element_outcome(element).into_iter().collect();
    let completed = tree.progress_state(id) == ProgressState::Completed;

    match element.kind() {
        ElementKind::Suite(_) => ReportNode::Suite(ReportSuite {
            name: element.test_name().to_owned(),
            time,
            incomplete: !completed || element.own_result() != TestResult::Undefined,
            display_name: element.explicit_display_name().map(ToOwned::to_owned),
            parameter_types: element.parameter_types().map(<[String]>::to_vec),
            unique_id: element.unique_id().map(ToOwned::to_owned),
            context: element.context().map(ToOwned::to_owned),
            outcomes,
            children: element
                .children()
                .iter()
                .map(|&child| element_to_node(tree, child))
                .collect(),
        }),
        ElementKind::Case(_) => ReportNode::Case(ReportCase {
            name: element.test_name().to_owned(),
            class_name: Some(element.class_name()),
            time,
            incomplete: !completed,
            ignored: element.is_ignored(),
            dynamic_test: element.is_dynamic_test(),
            display_name: element.explicit_display_name().map(ToOwned::to_owned),
            parameter_types: element.parameter_types().map(<[String]>::to_vec),
            unique_id: element.unique_id().map(ToOwned::to_owned),
            context: element.context().map(ToOwned::to_owned),
            outcomes,
        }),
    }
}

/// Folds all of an element's errors into the single outcome written for it.
///
/// The kind follows the element's own result. Ignored cases that reported nothing are marked by
/// their `ignored` attribute alone.
fn element_outcome(element: &TestElement) -> Option<ReportOutcome> {
    let errors = element.errors();
    let kind = match element.own_result() {
        TestResult::Error => OutcomeKind::Error,
        TestResult::Failure => OutcomeKind::Failure,
        TestResult::Skipped if element.is_ignored() && errors.is_empty() => return None,
        TestResult::Skipped => OutcomeKind::Skipped,
        TestResult::Ok | TestResult::Undefined => return None,
    };

    let joined = |part: fn(&crate::model::TestErrorInfo) -> Option<&str>| {
        let joined = errors.iter().filter_map(part).join("\n");
        (!joined.is_empty()).then_some(joined)
    };

    let mut outcome = ReportOutcome::new(kind);
    outcome.message = joined(|error| error.message.as_deref());
    outcome.ty = errors.iter().find_map(|error| error.error_type.clone());
    outcome.trace = joined(|error| error.trace.as_deref());
    if kind != OutcomeKind::Skipped {
        outcome.expected = joined(|error| error.expected.as_deref());
        outcome.actual = joined(|error| error.actual.as_deref());
    }
    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementSpec, TestErrorInfo, TestStatus};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn export_small_session() {
        let session = TestRunSession::new("Run")
            .with_project("Project")
            .with_tags(Some("smoke".to_owned()), Some("  ".to_owned()));
        session.update_tree(|tree| {
            let suite = tree
                .add_suite(tree.root(), ElementSpec::new("Tests"))
                .expect("root is a suite");
            let ok = tree
                .add_case(suite, ElementSpec::new("Tests.Ok"))
                .expect("suite is a suite");
            let failed = tree
                .add_case(suite, ElementSpec::new("Tests.Failed"))
                .expect("suite is a suite");
            tree.set_status(ok, TestStatus::Ok).expect("valid id");
            tree.set_elapsed_time(ok, 0.25).expect("valid id");
            tree.push_error(
                failed,
                TestErrorInfo::new(TestStatus::Failure)
                    .with_message("values differ")
                    .with_error_type("Assertion")
                    .with_comparison("1", "2"),
            )
            .expect("valid id");
        });

        let mut buf = Vec::new();
        export_session(&session, &mut buf).expect("export succeeds");
        let xml = String::from_utf8(buf).expect("valid UTF-8");
        assert_eq!(
            xml,
            indoc! {r#"
                <?xml version="1.0" encoding="UTF-8"?>
                <testrun name="Run" project="Project" tests="0" started="0" failures="0" errors="0" ignored="0" include_tags="smoke">
                    <testsuite name="Tests">
                        <testcase name="Tests.Ok" classname="Tests.Ok" time="0.25"/>
                        <testcase name="Tests.Failed" classname="Tests.Failed">
                            <failure message="values differ" type="Assertion">
                                <expected>1</expected>
                                <actual>2</actual>
                            </failure>
                        </testcase>
                    </testsuite>
                </testrun>
            "#}
        );
    }

    #[test]
    fn assumption_failure_is_skipped() {
        let mut tree = TestTree::new("root");
        let case = tree
            .add_case(tree.root(), ElementSpec::new("Case"))
            .expect("root is a suite");
        tree.set_assumption_failure(case, true).expect("valid id");
        tree.push_error(
            case,
            TestErrorInfo::new(TestStatus::Failure)
                .with_message("precondition")
                .with_comparison("a", "b"),
        )
        .expect("valid id");

        let outcome = element_outcome(&tree[case]).expect("skipped outcome");
        assert_eq!(outcome.kind, OutcomeKind::Skipped);
        assert_eq!(outcome.message.as_deref(), Some("precondition"));
        assert_eq!(outcome.expected, None);
    }

    #[test]
    fn multiple_errors_are_joined() {
        let mut tree = TestTree::new("root");
        let suite = tree
            .add_suite(tree.root(), ElementSpec::new("Suite"))
            .expect("root is a suite");
        tree.push_error(
            suite,
            TestErrorInfo::new(TestStatus::Failure)
                .with_message("first")
                .with_trace("{M(1)}: first"),
        )
        .expect("valid id");
        tree.push_error(
            suite,
            TestErrorInfo::new(TestStatus::Error)
                .with_message("second")
                .with_error_type("Setup"),
        )
        .expect("valid id");

        let outcome = element_outcome(&tree[suite]).expect("error outcome");
        assert_eq!(outcome.kind, OutcomeKind::Error);
        assert_eq!(outcome.message.as_deref(), Some("first\nsecond"));
        assert_eq!(outcome.ty.as_deref(), Some("Setup"));
        assert_eq!(outcome.trace.as_deref(), Some("{M(1)}: first"));
    }
}
