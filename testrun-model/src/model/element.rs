// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{TestResult, TestStatus};
use std::fmt;

/// Identifies an element within a [`TestTree`](super::TestTree).
///
/// Ids are only meaningful for the tree that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub(super) usize);

impl ElementId {
    /// Returns the position of the element in creation order. The root is always 0.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single error, failure or skip reported for an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestErrorInfo {
    /// The status this error contributes to its element.
    pub status: TestStatus,
    /// A one-line description of the problem.
    pub message: Option<String>,
    /// The kind of error, as reported by the test engine.
    pub error_type: Option<String>,
    /// The stack trace.
    pub trace: Option<String>,
    /// The expected value of a failed comparison.
    pub expected: Option<String>,
    /// The actual value of a failed comparison.
    pub actual: Option<String>,
}

impl TestErrorInfo {
    /// Creates a new error record with the given status and no details.
    pub fn new(status: TestStatus) -> Self {
        Self {
            status,
            message: None,
            error_type: None,
            trace: None,
            expected: None,
            actual: None,
        }
    }

    /// Sets the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the error type.
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Sets the stack trace.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Sets the expected and actual values of a failed comparison.
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Returns true if a non-empty trace is present.
    pub fn has_trace(&self) -> bool {
        self.trace.as_deref().is_some_and(|trace| !trace.is_empty())
    }

    /// Returns true if both an expected and an actual value are present.
    pub fn is_comparison_failure(&self) -> bool {
        self.expected.is_some() && self.actual.is_some()
    }
}

/// Describes a suite or case to add to a tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementSpec {
    /// The raw test name.
    pub name: String,
    /// The name shown to users, if it differs from `name`.
    pub display_name: Option<String>,
    /// Parameter types of a parameterized test.
    pub parameter_types: Option<Vec<String>>,
    /// An identifier assigned by the test engine.
    pub unique_id: Option<String>,
    /// The execution context (for example client or server).
    pub context: Option<String>,
    /// An explicit class name. Cases only; derived from `name` when absent.
    pub class_name: Option<String>,
    /// True if the test was generated at run time. Cases only.
    pub dynamic_test: bool,
}

impl ElementSpec {
    /// Creates a spec with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Suite- or case-specific state.
#[derive(Clone, Debug)]
pub enum ElementKind {
    /// A container of other elements.
    Suite(SuiteState),
    /// A leaf test.
    Case(CaseState),
}

/// State specific to suites.
#[derive(Clone, Debug, Default)]
pub struct SuiteState {
    pub(super) children: Vec<ElementId>,
    // The fold of the children's aggregated statuses, or None while there are no children.
    pub(super) children_status: Option<TestStatus>,
}

/// State specific to cases.
#[derive(Clone, Debug, Default)]
pub struct CaseState {
    pub(super) class_name: Option<String>,
    pub(super) ignored: bool,
    pub(super) dynamic_test: bool,
}

/// The session counter a failing element was added to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CountedFailure {
    Error,
    Failure,
}

/// A node in the result tree.
#[derive(Clone, Debug)]
pub struct TestElement {
    pub(super) id: ElementId,
    pub(super) parent: Option<ElementId>,
    pub(super) name: String,
    pub(super) display_name: Option<String>,
    pub(super) parameter_types: Option<Vec<String>>,
    pub(super) unique_id: Option<String>,
    pub(super) context: Option<String>,
    pub(super) status: TestStatus,
    pub(super) errors: Vec<TestErrorInfo>,
    // Negative while running (minus the start time), NaN until timed.
    pub(super) elapsed: f64,
    pub(super) assumption_failure: bool,
    // The counter this element was added to, if any.
    pub(crate) failure_counted: Option<CountedFailure>,
    pub(crate) end_counted: bool,
    pub(super) kind: ElementKind,
}

impl TestElement {
    pub(super) fn new(
        id: ElementId,
        parent: Option<ElementId>,
        spec: ElementSpec,
        is_suite: bool,
    ) -> Self {
        let ElementSpec {
            name,
            display_name,
            parameter_types,
            unique_id,
            context,
            class_name,
            dynamic_test,
        } = spec;
        let kind = if is_suite {
            ElementKind::Suite(SuiteState::default())
        } else {
            ElementKind::Case(CaseState {
                class_name,
                ignored: false,
                dynamic_test,
            })
        };
        Self {
            id,
            parent,
            name,
            display_name,
            parameter_types,
            unique_id,
            context,
            status: TestStatus::NotRun,
            errors: Vec::new(),
            elapsed: f64::NAN,
            assumption_failure: false,
            failure_counted: None,
            end_counted: false,
            kind,
        }
    }

    /// Returns this element's id.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Returns the parent suite, or `None` for the root.
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Returns the raw test name.
    pub fn test_name(&self) -> &str {
        &self.name
    }

    /// Returns the display name if one was given, else the test name.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Returns the display name only if one was explicitly given.
    pub fn explicit_display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns the parameter types, if any.
    pub fn parameter_types(&self) -> Option<&[String]> {
        self.parameter_types.as_deref()
    }

    /// Returns the engine-assigned unique id.
    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// Returns the execution context.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns the element's own status, not taking children into account.
    pub fn own_status(&self) -> TestStatus {
        self.status
    }

    /// Returns the errors pushed onto this element, in order.
    pub fn errors(&self) -> &[TestErrorInfo] {
        &self.errors
    }

    /// Returns the raw stored elapsed time. Prefer
    /// [`TestTree::elapsed_time_in_seconds`](super::TestTree::elapsed_time_in_seconds).
    pub fn raw_elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Returns true if this element's outcome is an assumption failure.
    pub fn is_assumption_failure(&self) -> bool {
        self.assumption_failure
    }

    /// Returns the suite- or case-specific state.
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Returns true for suites (including the root).
    pub fn is_suite(&self) -> bool {
        matches!(self.kind, ElementKind::Suite(_))
    }

    /// Returns true for cases.
    pub fn is_case(&self) -> bool {
        matches!(self.kind, ElementKind::Case(_))
    }

    /// Returns the children of a suite, in insertion order. Empty for cases.
    pub fn children(&self) -> &[ElementId] {
        match &self.kind {
            ElementKind::Suite(suite) => &suite.children,
            ElementKind::Case(_) => &[],
        }
    }

    /// Returns true if this is a case that was ignored.
    pub fn is_ignored(&self) -> bool {
        matches!(&self.kind, ElementKind::Case(case) if case.ignored)
    }

    /// Returns true if this is a case that was generated at run time.
    pub fn is_dynamic_test(&self) -> bool {
        matches!(&self.kind, ElementKind::Case(case) if case.dynamic_test)
    }

    /// Returns the class name: the explicit one for cases that have it, otherwise one derived from
    /// the test name with [`extract_class_name`].
    pub fn class_name(&self) -> String {
        match &self.kind {
            ElementKind::Case(CaseState {
                class_name: Some(class_name),
                ..
            }) => class_name.clone(),
            _ => extract_class_name(&self.name),
        }
    }

    /// Returns the method name of a case: the last segment of the test name before its
    /// signature. `None` for suites.
    pub fn method_name(&self) -> Option<&str> {
        if self.is_suite() {
            return None;
        }
        Some(extract_method_name(&self.name))
    }

    /// Returns the element's own result.
    ///
    /// Assumption failures are reported as skipped, and so are ignored cases unless they failed.
    pub fn own_result(&self) -> TestResult {
        if self.assumption_failure
            || (self.is_ignored() && !self.status.is_error_or_failure())
        {
            TestResult::Skipped
        } else {
            self.status.to_result()
        }
    }

    /// Returns the messages, traces and comparison values of all pushed errors as one block of
    /// text, or `None` if nothing was reported.
    pub fn failure_trace(&self) -> Option<String> {
        let parts: Vec<String> = self
            .errors
            .iter()
            .flat_map(|error| {
                let comparison = error.is_comparison_failure().then(|| {
                    format!(
                        "expected: {}\nactual: {}",
                        error.expected.as_deref().unwrap_or_default(),
                        error.actual.as_deref().unwrap_or_default()
                    )
                });
                [error.message.clone(), error.trace.clone(), comparison]
            })
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Extracts a class-like name from a raw test name.
///
/// Bracketed group names produced for parameterized tests are returned unchanged. Otherwise the
/// method signature (from the last `(` onwards) and the method name before it are removed, and
/// inner-class separators (`$`) become `.`.
pub fn extract_class_name(test_name: &str) -> String {
    if test_name.starts_with('[') {
        return test_name.to_owned();
    }
    let class_part = match test_name.rfind('(') {
        Some(index) if index > 0 => {
            let without_signature = &test_name[..index];
            match without_signature.rfind('.') {
                Some(dot) => &without_signature[..dot],
                None => without_signature,
            }
        }
        _ => test_name,
    };
    class_part.replace('$', ".")
}

fn extract_method_name(test_name: &str) -> &str {
    let without_signature = match test_name.rfind('(') {
        Some(index) if index > 0 => &test_name[..index],
        _ => test_name,
    };
    match without_signature.rfind('.') {
        Some(dot) if dot + 1 < without_signature.len() => &without_signature[dot + 1..],
        _ => without_signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("[1] param=foo", "[1] param=foo" ; "bracketed group")]
    #[test_case("pkg.Foo$Inner.bar(x)", "pkg.Foo.Inner" ; "inner class with signature")]
    #[test_case("pkg.Foo.bar(int, String)", "pkg.Foo" ; "signature with parameters")]
    #[test_case("ОбщийМодуль.Тесты", "ОбщийМодуль.Тесты" ; "no signature")]
    #[test_case("Outer$Inner", "Outer.Inner" ; "inner class without signature")]
    #[test_case("(weird)", "(weird)" ; "paren at start")]
    fn class_name_extraction(input: &str, expected: &str) {
        assert_eq!(extract_class_name(input), expected);
    }

    #[test_case("pkg.Foo.bar(x)", "bar" ; "with signature")]
    #[test_case("Тесты.Сложение", "Сложение" ; "dotted")]
    #[test_case("single", "single" ; "single segment")]
    fn method_name_extraction(input: &str, expected: &str) {
        assert_eq!(extract_method_name(input), expected);
    }

    #[test]
    fn error_info_predicates() {
        let info = TestErrorInfo::new(TestStatus::Failure).with_trace("");
        assert!(!info.has_trace());
        assert!(!info.is_comparison_failure());

        let info = TestErrorInfo::new(TestStatus::Failure)
            .with_trace("{M(1)}: boom")
            .with_comparison("1", "2");
        assert!(info.has_trace());
        assert!(info.is_comparison_failure());
    }
}
