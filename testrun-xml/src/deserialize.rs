// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read a `TestRunReport` from XML.

use crate::{
    DeserializeError, OutcomeKind, ReportCase, ReportFormat, ReportNode, ReportOutcome,
    ReportSuite, TestRunReport,
    serialize::{
        ACTUAL_TAG, EXPECTED_TAG, TESTCASE_TAG, TESTRUN_TAG, TESTSUITE_TAG, TESTSUITES_TAG,
    },
};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::io;

static DOCUMENT: &str = "document";

// JUnit elements that carry nothing the report model keeps.
static IGNORED_TAGS: &[&str] = &["properties", "property", "system-out", "system-err"];

pub(crate) fn deserialize_report(reader: impl io::BufRead) -> Result<TestRunReport, DeserializeError> {
    let mut reader = ReportReader::new(reader);

    loop {
        match reader.next_event()? {
            Event::Start(start) => {
                let attrs = Attributes::read(&start, &reader)?;
                let name = tag_name(&start);
                return match name.as_str() {
                    n if n == TESTRUN_TAG => read_testrun(&mut reader, attrs),
                    n if n == TESTSUITES_TAG => read_testsuites(&mut reader, attrs),
                    n if n == TESTSUITE_TAG => {
                        let suite = read_testsuite(&mut reader, attrs)?;
                        let mut report = TestRunReport::new(suite.name.clone());
                        report.format = ReportFormat::TestSuite;
                        report.add_child(ReportNode::Suite(suite));
                        Ok(report)
                    }
                    _ => Err(reader.unexpected(name, DOCUMENT)),
                };
            }
            Event::Eof => return Err(DeserializeError::UnexpectedEof),
            // Declarations, comments, doctypes and whitespace before the root.
            _ => {}
        }
    }
}

fn read_testrun(
    reader: &mut ReportReader<impl io::BufRead>,
    attrs: Attributes,
) -> Result<TestRunReport, DeserializeError> {
    let mut report = TestRunReport::new(attrs.get("name").unwrap_or_default());
    report.project = attrs.get_owned("project");
    report.tests = attrs.count(TESTRUN_TAG, "tests")?;
    report.started = attrs.count(TESTRUN_TAG, "started")?;
    report.failures = attrs.count(TESTRUN_TAG, "failures")?;
    report.errors = attrs.count(TESTRUN_TAG, "errors")?;
    report.ignored = attrs.count(TESTRUN_TAG, "ignored")?;
    report.include_tags = attrs.get_owned("include_tags");
    report.exclude_tags = attrs.get_owned("exclude_tags");
    report.format = ReportFormat::TestRun;
    report.children = read_children(reader, TESTRUN_TAG)?.children;
    Ok(report)
}

fn read_testsuites(
    reader: &mut ReportReader<impl io::BufRead>,
    attrs: Attributes,
) -> Result<TestRunReport, DeserializeError> {
    let mut report = TestRunReport::new(attrs.get("name").unwrap_or_default());
    report.format = ReportFormat::TestSuites;
    report.children = read_children(reader, TESTSUITES_TAG)?.children;
    Ok(report)
}

fn read_testsuite(
    reader: &mut ReportReader<impl io::BufRead>,
    attrs: Attributes,
) -> Result<ReportSuite, DeserializeError> {
    let name = attrs.required(TESTSUITE_TAG, "name")?;
    let name = match attrs.get("package") {
        Some(package) if !package.is_empty() => format!("{package}.{name}"),
        _ => name.to_owned(),
    };

    let mut suite = ReportSuite::new(name);
    suite.time = attrs.time(TESTSUITE_TAG)?;
    suite.incomplete = attrs.flag("incomplete");
    suite.display_name = attrs.get_owned("displayname");
    suite.parameter_types = attrs.parameter_types();
    suite.unique_id = attrs.get_owned("uniqueid");
    suite.context = attrs.get_owned("context");

    let Children { children, outcomes } = read_children(reader, TESTSUITE_TAG)?;
    suite.children = children;
    suite.outcomes = outcomes;
    Ok(suite)
}

fn read_testcase(
    reader: &mut ReportReader<impl io::BufRead>,
    attrs: Attributes,
) -> Result<ReportCase, DeserializeError> {
    let mut case = ReportCase::new(attrs.required(TESTCASE_TAG, "name")?);
    case.class_name = attrs.get_owned("classname");
    case.time = attrs.time(TESTCASE_TAG)?;
    case.incomplete = attrs.flag("incomplete");
    case.ignored = attrs.flag("ignored");
    case.dynamic_test = attrs.flag("dynamicTest");
    case.display_name = attrs.get_owned("displayname");
    case.parameter_types = attrs.parameter_types();
    case.unique_id = attrs.get_owned("uniqueid");
    case.context = attrs.get_owned("context");

    loop {
        match reader.next_event()? {
            Event::Start(start) => {
                let name = tag_name(&start);
                match outcome_kind(&name) {
                    Some(kind) => {
                        let attrs = Attributes::read(&start, reader)?;
                        case.outcomes.push(read_outcome(reader, kind, attrs)?);
                    }
                    None if IGNORED_TAGS.contains(&name.as_str()) => reader.skip_element()?,
                    None => return Err(reader.unexpected(name, TESTCASE_TAG)),
                }
            }
            Event::End(_) => return Ok(case),
            Event::Eof => return Err(DeserializeError::UnexpectedEof),
            _ => {}
        }
    }
}

#[derive(Default)]
struct Children {
    children: Vec<ReportNode>,
    outcomes: Vec<ReportOutcome>,
}

fn read_children(
    reader: &mut ReportReader<impl io::BufRead>,
    parent: &'static str,
) -> Result<Children, DeserializeError> {
    let mut children = Children::default();
    loop {
        match reader.next_event()? {
            Event::Start(start) => {
                let name = tag_name(&start);
                let attrs = Attributes::read(&start, reader)?;
                if name == TESTSUITE_TAG {
                    let suite = read_testsuite(reader, attrs)?;
                    children.children.push(ReportNode::Suite(suite));
                } else if name == TESTCASE_TAG {
                    let case = read_testcase(reader, attrs)?;
                    children.children.push(ReportNode::Case(case));
                } else if let Some(kind) = outcome_kind(&name).filter(|_| parent == TESTSUITE_TAG)
                {
                    children.outcomes.push(read_outcome(reader, kind, attrs)?);
                } else if IGNORED_TAGS.contains(&name.as_str()) {
                    reader.skip_element()?;
                } else {
                    return Err(reader.unexpected(name, parent));
                }
            }
            Event::End(_) => return Ok(children),
            Event::Eof => return Err(DeserializeError::UnexpectedEof),
            _ => {}
        }
    }
}

fn read_outcome(
    reader: &mut ReportReader<impl io::BufRead>,
    kind: OutcomeKind,
    attrs: Attributes,
) -> Result<ReportOutcome, DeserializeError> {
    let mut outcome = ReportOutcome::new(kind);
    outcome.message = attrs.get_owned("message");
    outcome.ty = attrs.get_owned("type");

    let mut trace = String::new();
    loop {
        match reader.next_event()? {
            Event::Start(start) => {
                let name = tag_name(&start);
                if name == EXPECTED_TAG {
                    outcome.expected = Some(reader.read_text()?);
                } else if name == ACTUAL_TAG {
                    outcome.actual = Some(reader.read_text()?);
                } else {
                    return Err(reader.unexpected(name, kind.tag_name()));
                }
                // Whitespace that preceded a comparison element is layout, not trace.
                trace.clear();
            }
            Event::Text(text) => trace.push_str(&reader.unescape(&text)?),
            Event::CData(data) => trace.push_str(&String::from_utf8_lossy(&data)),
            Event::End(_) => break,
            Event::Eof => return Err(DeserializeError::UnexpectedEof),
            _ => {}
        }
    }

    if !trace.trim().is_empty() {
        outcome.trace = Some(trace);
    }
    Ok(outcome)
}

fn outcome_kind(name: &str) -> Option<OutcomeKind> {
    match name {
        "error" => Some(OutcomeKind::Error),
        "failure" => Some(OutcomeKind::Failure),
        "skipped" => Some(OutcomeKind::Skipped),
        _ => None,
    }
}

fn tag_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

struct ReportReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: io::BufRead> ReportReader<R> {
    fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        // Empty elements are reported as a start/end pair so that every element is handled the
        // same way.
        reader.expand_empty_elements(true);
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    fn next_event(&mut self) -> Result<Event<'static>, DeserializeError> {
        self.buf.clear();
        let event = self
            .reader
            .read_event_into(&mut self.buf)
            .map(Event::into_owned);
        event.map_err(|error| self.xml_error(error))
    }

    /// Reads the text content of the current element up to its end tag.
    fn read_text(&mut self) -> Result<String, DeserializeError> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => text.push_str(&self.unescape(&t)?),
                Event::CData(data) => text.push_str(&String::from_utf8_lossy(&data)),
                Event::End(_) => return Ok(text),
                Event::Start(start) => {
                    return Err(self.unexpected(tag_name(&start), "text content"));
                }
                Event::Eof => return Err(DeserializeError::UnexpectedEof),
                _ => {}
            }
        }
    }

    /// Skips the current element and everything nested inside it.
    fn skip_element(&mut self) -> Result<(), DeserializeError> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_event()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                Event::Eof => return Err(DeserializeError::UnexpectedEof),
                _ => {}
            }
        }
        Ok(())
    }

    fn unescape(&self, text: &quick_xml::events::BytesText<'_>) -> Result<String, DeserializeError> {
        text.unescape()
            .map(|text| text.into_owned())
            .map_err(|error| self.xml_error(error))
    }

    fn unexpected(&self, name: String, parent: &str) -> DeserializeError {
        DeserializeError::UnexpectedElement {
            name,
            parent: parent.to_owned(),
            position: self.reader.buffer_position(),
        }
    }

    fn xml_error(&self, error: quick_xml::Error) -> DeserializeError {
        DeserializeError::Xml {
            position: self.reader.buffer_position(),
            error,
        }
    }
}

/// Attributes of a start tag, unescaped.
struct Attributes {
    attrs: Vec<(String, String)>,
}

impl Attributes {
    fn read<R>(start: &BytesStart<'_>, reader: &ReportReader<R>) -> Result<Self, DeserializeError>
    where
        R: io::BufRead,
    {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|error| reader.xml_error(error.into()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|error| reader.xml_error(error))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self { attrs })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get_owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_owned)
    }

    fn required(
        &self,
        element: &'static str,
        attribute: &'static str,
    ) -> Result<&str, DeserializeError> {
        self.get(attribute)
            .ok_or(DeserializeError::MissingAttribute { element, attribute })
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    fn count(&self, element: &'static str, attribute: &'static str) -> Result<usize, DeserializeError> {
        match self.get(attribute) {
            None => Ok(0),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| DeserializeError::InvalidNumber {
                    element,
                    attribute,
                    value: value.to_owned(),
                }),
        }
    }

    fn time(&self, element: &'static str) -> Result<Option<f64>, DeserializeError> {
        match self.get("time") {
            None => Ok(None),
            Some(value) => match value.trim().parse::<f64>() {
                Ok(time) if time.is_finite() && time >= 0.0 => Ok(Some(time)),
                _ => Err(DeserializeError::InvalidNumber {
                    element,
                    attribute: "time",
                    value: value.to_owned(),
                }),
            },
        }
    }

    fn parameter_types(&self) -> Option<Vec<String>> {
        self.get("parameters")
            .map(|params| params.split(',').map(|param| param.trim().to_owned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_testrun_document() {
        let xml = indoc! {r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <testrun name="nightly" project="Accounting" tests="3" started="3" failures="1" errors="0" ignored="1" include_tags="smoke">
                <testsuite name="Tests" time="1.75">
                    <testcase name="Tests.Adds" classname="Tests" time="0.5"/>
                    <testcase name="Tests.Fails" classname="Tests" time="1.25">
                        <failure message="values differ">
                            <expected>1</expected>
                            <actual>2</actual>{Tests.Fails(12)}: values differ</failure>
                    </testcase>
                    <testcase name="Tests.Skipped" classname="Tests" ignored="true">
                        <skipped/>
                    </testcase>
                </testsuite>
            </testrun>
        "#};

        let report: TestRunReport = xml.parse().expect("report parses");
        assert_eq!(report.name, "nightly");
        assert_eq!(report.project.as_deref(), Some("Accounting"));
        assert_eq!(
            (report.tests, report.started, report.failures, report.ignored),
            (3, 3, 1, 1)
        );
        assert_eq!(report.include_tags.as_deref(), Some("smoke"));
        assert_eq!(report.exclude_tags, None);
        assert_eq!(report.format, ReportFormat::TestRun);

        let ReportNode::Suite(suite) = &report.children[0] else {
            panic!("expected a suite, found {:?}", report.children[0]);
        };
        assert_eq!(suite.time, Some(1.75));
        assert_eq!(suite.children.len(), 3);

        let ReportNode::Case(failed) = &suite.children[1] else {
            panic!("expected a case");
        };
        assert_eq!(
            failed.outcomes,
            vec![ReportOutcome {
                kind: OutcomeKind::Failure,
                message: Some("values differ".to_owned()),
                ty: None,
                expected: Some("1".to_owned()),
                actual: Some("2".to_owned()),
                trace: Some("{Tests.Fails(12)}: values differ".to_owned()),
            }]
        );

        let ReportNode::Case(skipped) = &suite.children[2] else {
            panic!("expected a case");
        };
        assert!(skipped.ignored);
        assert_eq!(skipped.outcomes, vec![ReportOutcome::new(OutcomeKind::Skipped)]);
    }

    #[test]
    fn reads_top_level_testsuite() {
        let xml = indoc! {r#"
            <testsuite name="Lonely" package="org.example" tests="1" timestamp="2024-01-01T00:00:00">
                <properties>
                    <property name="env" value="ci"/>
                </properties>
                <testcase name="works" classname="org.example.Lonely"/>
                <system-out>noise</system-out>
            </testsuite>
        "#};

        let report: TestRunReport = xml.parse().expect("report parses");
        assert_eq!(report.format, ReportFormat::TestSuite);
        assert_eq!(report.name, "org.example.Lonely");
        assert_eq!(report.children.len(), 1);
        let ReportNode::Suite(suite) = &report.children[0] else {
            panic!("expected a suite");
        };
        assert_eq!(suite.children.len(), 1);
        assert_eq!(suite.children[0].name(), "works");
    }

    #[test]
    fn rejects_unknown_element() {
        let xml = r#"<testrun name="r"><testsuite name="s"><bogus/></testsuite></testrun>"#;
        let error = xml.parse::<TestRunReport>().expect_err("unknown element rejected");
        assert!(
            matches!(
                &error,
                DeserializeError::UnexpectedElement { name, parent, .. }
                    if name == "bogus" && parent == "testsuite"
            ),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn rejects_truncated_document() {
        let xml = r#"<testrun name="r"><testsuite name="s">"#;
        let error = xml.parse::<TestRunReport>().expect_err("truncated document rejected");
        assert!(
            matches!(
                error,
                DeserializeError::UnexpectedEof | DeserializeError::Xml { .. }
            ),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn rejects_bad_counter() {
        let xml = r#"<testrun name="r" tests="many"/>"#;
        let error = xml.parse::<TestRunReport>().expect_err("bad counter rejected");
        assert!(
            matches!(
                error,
                DeserializeError::InvalidNumber { attribute: "tests", .. }
            ),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn whitespace_only_trace_is_none() {
        let xml = indoc! {r#"
            <testrun name="r">
                <testcase name="t">
                    <error message="m">
                        <expected>a</expected>
                        <actual>b</actual>
                    </error>
                </testcase>
            </testrun>
        "#};
        let report: TestRunReport = xml.parse().expect("report parses");
        let ReportNode::Case(case) = &report.children[0] else {
            panic!("expected a case");
        };
        assert_eq!(case.outcomes[0].trace, None);
        assert_eq!(case.outcomes[0].expected.as_deref(), Some("a"));
    }
}
