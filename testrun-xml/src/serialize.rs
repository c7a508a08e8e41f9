// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `TestRunReport`.

use crate::{ReportCase, ReportNode, ReportOutcome, ReportSuite, SerializeError, TestRunReport};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::{borrow::Cow, io};

pub(crate) static TESTRUN_TAG: &str = "testrun";
pub(crate) static TESTSUITES_TAG: &str = "testsuites";
pub(crate) static TESTSUITE_TAG: &str = "testsuite";
pub(crate) static TESTCASE_TAG: &str = "testcase";
pub(crate) static EXPECTED_TAG: &str = "expected";
pub(crate) static ACTUAL_TAG: &str = "actual";

pub(crate) fn serialize_report(
    report: &TestRunReport,
    writer: impl io::Write,
) -> Result<(), SerializeError> {
    let mut writer = Writer::new_with_indent(writer, b' ', 4);

    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(Event::Decl(decl))?;

    serialize_report_impl(report, &mut writer)?;

    // Add a trailing newline.
    writer.write_indent()?;
    Ok(())
}

fn serialize_report_impl(
    report: &TestRunReport,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    // Use the destructuring syntax to ensure that all fields are handled.
    let TestRunReport {
        name,
        project,
        tests,
        started,
        failures,
        errors,
        ignored,
        include_tags,
        exclude_tags,
        format: _,
        children,
    } = report;

    let mut testrun_tag = BytesStart::new(TESTRUN_TAG);
    push_escaped_attribute(&mut testrun_tag, "name", name);
    if let Some(project) = project {
        push_escaped_attribute(&mut testrun_tag, "project", project);
    }
    testrun_tag.extend_attributes([
        ("tests", tests.to_string().as_str()),
        ("started", started.to_string().as_str()),
        ("failures", failures.to_string().as_str()),
        ("errors", errors.to_string().as_str()),
        ("ignored", ignored.to_string().as_str()),
    ]);
    if let Some(include_tags) = include_tags {
        push_escaped_attribute(&mut testrun_tag, "include_tags", include_tags);
    }
    if let Some(exclude_tags) = exclude_tags {
        push_escaped_attribute(&mut testrun_tag, "exclude_tags", exclude_tags);
    }

    if children.is_empty() {
        return writer.write_event(Event::Empty(testrun_tag));
    }

    writer.write_event(Event::Start(testrun_tag))?;
    for child in children {
        serialize_node(child, writer)?;
    }
    serialize_end_tag(TESTRUN_TAG, writer)
}

fn serialize_node(node: &ReportNode, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
    match node {
        ReportNode::Suite(suite) => serialize_testsuite(suite, writer),
        ReportNode::Case(case) => serialize_testcase(case, writer),
    }
}

fn serialize_testsuite(
    testsuite: &ReportSuite,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let ReportSuite {
        name,
        time,
        incomplete,
        display_name,
        parameter_types,
        unique_id,
        context,
        outcomes,
        children,
    } = testsuite;

    let mut testsuite_tag = BytesStart::new(TESTSUITE_TAG);
    push_escaped_attribute(&mut testsuite_tag, "name", name);
    if let Some(time) = time {
        testsuite_tag.push_attribute(("time", format_time(*time).as_str()));
    }
    if *incomplete {
        testsuite_tag.push_attribute(("incomplete", "true"));
    }
    push_common_attributes(
        &mut testsuite_tag,
        display_name.as_deref(),
        parameter_types.as_deref(),
        unique_id.as_deref(),
        context.as_deref(),
    );

    if outcomes.is_empty() && children.is_empty() {
        return writer.write_event(Event::Empty(testsuite_tag));
    }

    writer.write_event(Event::Start(testsuite_tag))?;
    for outcome in outcomes {
        serialize_outcome(outcome, writer)?;
    }
    for child in children {
        serialize_node(child, writer)?;
    }
    serialize_end_tag(TESTSUITE_TAG, writer)
}

fn serialize_testcase(
    testcase: &ReportCase,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let ReportCase {
        name,
        class_name,
        time,
        incomplete,
        ignored,
        dynamic_test,
        display_name,
        parameter_types,
        unique_id,
        context,
        outcomes,
    } = testcase;

    let mut testcase_tag = BytesStart::new(TESTCASE_TAG);
    push_escaped_attribute(&mut testcase_tag, "name", name);
    if let Some(class_name) = class_name {
        push_escaped_attribute(&mut testcase_tag, "classname", class_name);
    }
    if let Some(time) = time {
        testcase_tag.push_attribute(("time", format_time(*time).as_str()));
    }
    if *incomplete {
        testcase_tag.push_attribute(("incomplete", "true"));
    }
    if *ignored {
        testcase_tag.push_attribute(("ignored", "true"));
    }
    if *dynamic_test {
        testcase_tag.push_attribute(("dynamicTest", "true"));
    }
    push_common_attributes(
        &mut testcase_tag,
        display_name.as_deref(),
        parameter_types.as_deref(),
        unique_id.as_deref(),
        context.as_deref(),
    );

    if outcomes.is_empty() {
        return writer.write_event(Event::Empty(testcase_tag));
    }

    writer.write_event(Event::Start(testcase_tag))?;
    for outcome in outcomes {
        serialize_outcome(outcome, writer)?;
    }
    serialize_end_tag(TESTCASE_TAG, writer)
}

fn push_common_attributes(
    tag: &mut BytesStart<'_>,
    display_name: Option<&str>,
    parameter_types: Option<&[String]>,
    unique_id: Option<&str>,
    context: Option<&str>,
) {
    if let Some(display_name) = display_name {
        push_escaped_attribute(tag, "displayname", display_name);
    }
    if let Some(parameter_types) = parameter_types {
        push_escaped_attribute(tag, "parameters", &parameter_types.join(","));
    }
    if let Some(unique_id) = unique_id {
        push_escaped_attribute(tag, "uniqueid", unique_id);
    }
    if let Some(context) = context {
        push_escaped_attribute(tag, "context", context);
    }
}

fn serialize_outcome(
    outcome: &ReportOutcome,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let ReportOutcome {
        kind,
        message,
        ty,
        expected,
        actual,
        trace,
    } = outcome;

    let tag_name = kind.tag_name();
    let mut tag = BytesStart::new(tag_name);
    if let Some(message) = message {
        push_escaped_attribute(&mut tag, "message", message);
    }
    if let Some(ty) = ty {
        push_escaped_attribute(&mut tag, "type", ty);
    }

    if expected.is_none() && actual.is_none() && trace.is_none() {
        return writer.write_event(Event::Empty(tag));
    }

    writer.write_event(Event::Start(tag))?;
    if let Some(expected) = expected {
        serialize_text_element(EXPECTED_TAG, expected, writer)?;
    }
    if let Some(actual) = actual {
        serialize_text_element(ACTUAL_TAG, actual, writer)?;
    }
    if let Some(trace) = trace {
        serialize_text(trace, writer)?;
    }
    serialize_end_tag(tag_name, writer)
}

fn serialize_text_element(
    tag_name: &'static str,
    text: &str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag_name)))?;
    serialize_text(text, writer)?;
    serialize_end_tag(tag_name, writer)
}

fn serialize_text(text: &str, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
    let text = escape_control_chars(text);
    writer.write_event(Event::Text(BytesText::new(&text)))
}

fn serialize_end_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))
}

fn push_escaped_attribute(tag: &mut BytesStart<'_>, key: &str, value: &str) {
    tag.push_attribute((key, escape_control_chars(value).as_ref()));
}

/// Formats a time in seconds with at least one and at most three fractional digits.
///
/// ```
/// assert_eq!(testrun_xml::format_time(1.5), "1.5");
/// assert_eq!(testrun_xml::format_time(2.0), "2.0");
/// assert_eq!(testrun_xml::format_time(0.12345), "0.123");
/// ```
pub fn format_time(secs: f64) -> String {
    let mut formatted = format!("{secs:.3}");
    while formatted.ends_with('0') && !formatted.ends_with(".0") {
        formatted.pop();
    }
    formatted
}

/// Replaces control characters that XML 1.0 cannot represent with `\uXXXX` escapes.
///
/// Tab, line feed and carriage return are kept as-is.
pub fn escape_control_chars(s: &str) -> Cow<'_, str> {
    let needs_escape = |c: char| c < ' ' && !matches!(c, '\t' | '\n' | '\r');
    if !s.contains(needs_escape) {
        return Cow::Borrowed(s);
    }

    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if needs_escape(c) {
            escaped.push_str(&format!("\\u{:04x}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}
