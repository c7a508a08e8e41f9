// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text renderings of a session.

use crate::output::ReportStyles;
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};
use testrun_model::{
    model::{ElementId, TestStatus, TestTree},
    session::TestRunSession,
    trace::{FailureTraceBuilder, TraceItem},
};

/// Options for [`write_tree`].
#[derive(Clone, Debug)]
pub(crate) struct TreeOptions {
    /// Only show elements that failed or errored, plus their ancestors.
    pub(crate) failures_only: bool,
    /// Show the failure trace below each failed case.
    pub(crate) traces: Option<FailureTraceBuilder>,
}

/// Writes the test tree, one element per line, indented by depth.
pub(crate) fn write_tree(
    session: &TestRunSession,
    options: &TreeOptions,
    styles: &ReportStyles,
    writer: &mut dyn Write,
) -> io::Result<()> {
    let resolver = session.test_kind().resolver();
    session.with_tree(|tree| -> io::Result<()> {
        for element in tree.iter() {
            let id = element.id();
            let status = tree.status(id);
            if options.failures_only && !status.is_error_or_failure() {
                continue;
            }

            // Ignored cases end as `ok`; only their own result says they were skipped.
            let (label, label_style) = if element.is_ignored() && !status.is_error_or_failure() {
                ("ignored", styles.skip)
            } else {
                (status.label(), status_style(status, styles))
            };
            let depth = tree.depth(id);
            write!(
                writer,
                "{:indent$}{}  {}",
                "",
                element.display_name().style(styles.name),
                label.style(label_style),
                indent = depth * 2,
            )?;
            write_elapsed(tree, id, styles, writer)?;
            writeln!(writer)?;

            if let Some(builder) = &options.traces
                && element.is_case()
                && status.is_error_or_failure()
            {
                for item in builder.build(element, resolver) {
                    write_trace_item(&item, depth + 1, styles, writer)?;
                }
            }
        }
        Ok(())
    })
}

fn write_elapsed(
    tree: &TestTree,
    id: ElementId,
    styles: &ReportStyles,
    writer: &mut dyn Write,
) -> io::Result<()> {
    let elapsed = tree.elapsed_time_in_seconds(id);
    if elapsed.is_finite() {
        write!(writer, " {}", format!("({elapsed:.3}s)").style(styles.time))?;
    }
    Ok(())
}

fn write_trace_item(
    item: &TraceItem,
    depth: usize,
    styles: &ReportStyles,
    writer: &mut dyn Write,
) -> io::Result<()> {
    for line in item.text.lines() {
        writeln!(
            writer,
            "{:indent$}{}",
            "",
            line.style(styles.time),
            indent = depth * 2,
        )?;
    }
    for child in &item.children {
        write_trace_item(child, depth + 1, styles, writer)?;
    }
    Ok(())
}

/// Writes the names of failed cases, one per line.
pub(crate) fn write_failed(session: &TestRunSession, writer: &mut dyn Write) -> io::Result<()> {
    for name in session.failed_test_names() {
        writeln!(writer, "{name}")?;
    }
    Ok(())
}

/// Writes a one-line summary of the counters.
pub(crate) fn write_summary(
    session: &TestRunSession,
    styles: &ReportStyles,
    writer: &mut dyn Write,
) -> io::Result<()> {
    let counters = session.counters();
    let status = session.status();
    write!(
        writer,
        "{}: {} {} run: {} completed, {} failed, {} errored, {} ignored, {} skipped",
        status.label().style(status_style(status, styles)),
        counters.total.style(styles.name),
        if counters.total == 1 { "test" } else { "tests" },
        counters.started,
        counters.failures,
        counters.errors,
        counters.ignored,
        counters.assumption_failures,
    )?;
    let elapsed = session.elapsed_time_in_seconds();
    if elapsed.is_finite() {
        write!(writer, " {}", format!("({elapsed:.3}s)").style(styles.time))?;
    }
    writeln!(writer)
}

fn status_style(status: TestStatus, styles: &ReportStyles) -> Style {
    match status {
        TestStatus::Ok => styles.pass,
        TestStatus::Error
        | TestStatus::Failure
        | TestStatus::RunningError
        | TestStatus::RunningFailure => styles.fail,
        TestStatus::Skipped => styles.skip,
        TestStatus::Running => styles.running,
        TestStatus::NotRun => Style::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use testrun_model::{config::TraceConfig, serialize::import_session_from_str};

    const REPORT: &str = indoc! {r#"
        <testrun name="nightly">
          <testsuite name="Math" time="0.5">
            <testcase name="Math.Add" time="0.25"/>
            <testcase name="Math.Sub" time="0.25">
              <failure message="Expected: 1" type="AssertionError">{ОбщийМодуль.Math.Модуль(7)}: Sub</failure>
            </testcase>
          </testsuite>
        </testrun>
    "#};

    fn render(options: &TreeOptions) -> String {
        let session = import_session_from_str(REPORT, "report").expect("report imports");
        let mut out = Vec::new();
        write_tree(&session, options, &ReportStyles::default(), &mut out).expect("written");
        String::from_utf8(out).expect("utf-8")
    }

    #[test]
    fn tree_lists_every_element() {
        let options = TreeOptions {
            failures_only: false,
            traces: None,
        };
        assert_eq!(
            render(&options),
            indoc! {"
                nightly  failure
                  Math  failure (0.500s)
                    Math.Add  ok (0.250s)
                    Math.Sub  failure (0.250s)
            "}
        );
    }

    #[test]
    fn failures_only_with_traces() {
        let options = TreeOptions {
            failures_only: true,
            traces: Some(FailureTraceBuilder::new(&TraceConfig {
                side_module_prefixes: Vec::new(),
            })),
        };
        assert_eq!(
            render(&options),
            indoc! {"
                nightly  failure
                  Math  failure (0.500s)
                    Math.Sub  failure (0.250s)
                      Expected
                       1
                        Sub
            "}
        );
    }

    #[test]
    fn failed_and_summary() {
        let session = import_session_from_str(REPORT, "report").expect("report imports");

        let mut out = Vec::new();
        write_failed(&session, &mut out).expect("written");
        assert_eq!(String::from_utf8(out).expect("utf-8"), "Math.Sub\n");

        let mut out = Vec::new();
        write_summary(&session, &ReportStyles::default(), &mut out).expect("written");
        assert_eq!(
            String::from_utf8(out).expect("utf-8"),
            "failure: 2 tests run: 2 completed, 1 failed, 0 errored, 0 ignored, 0 skipped (0.500s)\n"
        );
    }
}
