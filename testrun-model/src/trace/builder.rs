// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{BslStackTraceParser, StackTraceParser, TraceElement, TraceFrame};
use crate::{
    config::TraceConfig,
    kinds::{SourcePosition, TestResolver},
    model::TestElement,
};
use std::{fmt, sync::Arc};

/// How a frame relates to the test it was reported for. Only used for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameTag {
    /// Neither main nor side.
    Plain,
    /// The frame's module occurs in the test's name.
    Main,
    /// The frame's module belongs to the test framework.
    Side,
}

/// A node of a failure trace tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceItem {
    /// The text shown for the node. The first `:` of a message or frame text starts a new line.
    pub text: String,
    /// The index of the error this node was built from, in the element's error list.
    pub error_index: usize,
    /// The frame, for nodes built from a stack frame.
    pub frame: Option<TraceFrame>,
    /// The frame's position in the project sources, if the test kind could resolve it.
    pub position: Option<SourcePosition>,
    /// The frame's relation to the test.
    pub tag: FrameTag,
    /// Nested nodes.
    pub children: Vec<TraceItem>,
}

impl TraceItem {
    /// Returns the first line of the text.
    pub fn label(&self) -> &str {
        self.text.lines().next().unwrap_or_default()
    }
}

/// Builds failure trace trees for test elements.
#[derive(Clone)]
pub struct FailureTraceBuilder {
    parser: Arc<dyn StackTraceParser>,
    side_module_prefixes: Vec<String>,
}

impl fmt::Debug for FailureTraceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureTraceBuilder")
            .field("side_module_prefixes", &self.side_module_prefixes)
            .finish_non_exhaustive()
    }
}

impl FailureTraceBuilder {
    /// Creates a builder that uses [`BslStackTraceParser`].
    pub fn new(config: &TraceConfig) -> Self {
        Self {
            parser: Arc::new(BslStackTraceParser),
            side_module_prefixes: config.side_module_prefixes.clone(),
        }
    }

    /// Replaces the stack trace parser.
    pub fn with_parser(mut self, parser: Arc<dyn StackTraceParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Builds the trace tree of an element.
    ///
    /// Each error with a message gets a top-level node, with its parsed frames below. Frames of
    /// errors without a message are placed at the top level. Frames are resolved to source
    /// positions with `resolver`.
    pub fn build(&self, element: &TestElement, resolver: &dyn TestResolver) -> Vec<TraceItem> {
        let mut roots = Vec::new();
        for (error_index, error) in element.errors().iter().enumerate() {
            let frames = match &error.trace {
                Some(trace) if error.has_trace() => {
                    let elements = self.parser.parse(trace, element.test_name());
                    self.items(&elements, element.test_name(), error_index, resolver)
                }
                _ => Vec::new(),
            };

            match error.message.as_deref().filter(|message| !message.is_empty()) {
                Some(message) => roots.push(TraceItem {
                    text: split_first_colon(message),
                    error_index,
                    frame: None,
                    position: None,
                    tag: FrameTag::Plain,
                    children: frames,
                }),
                None => roots.extend(frames),
            }
        }
        roots
    }

    fn items(
        &self,
        elements: &[TraceElement],
        test_name: &str,
        error_index: usize,
        resolver: &dyn TestResolver,
    ) -> Vec<TraceItem> {
        elements
            .iter()
            .map(|element| {
                let module = element
                    .frame
                    .as_ref()
                    .map(TraceFrame::module_name)
                    .unwrap_or_default();
                let position = element
                    .frame
                    .as_ref()
                    .and_then(|frame| resolver.resolve(&frame.symlink, frame.line));
                TraceItem {
                    text: split_first_colon(&element.name),
                    error_index,
                    frame: element.frame.clone(),
                    position,
                    tag: self.tag(module, test_name),
                    children: self.items(&element.children, test_name, error_index, resolver),
                }
            })
            .collect()
    }

    fn tag(&self, module: &str, test_name: &str) -> FrameTag {
        if self
            .side_module_prefixes
            .iter()
            .any(|prefix| module.starts_with(prefix.as_str()))
        {
            FrameTag::Side
        } else if !module.trim().is_empty() && test_name.contains(module) {
            FrameTag::Main
        } else {
            FrameTag::Plain
        }
    }
}

fn split_first_colon(text: &str) -> String {
    match text.split_once(':') {
        Some((head, tail)) => format!("{head}\n{tail}"),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kinds::{NullTestKind, test_helpers::FakeKind, TestKind},
        model::{ElementSpec, TestErrorInfo, TestStatus, TestTree},
    };
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn config() -> TraceConfig {
        TraceConfig {
            side_module_prefixes: vec!["ЮТ".to_owned(), "Мокито".to_owned()],
        }
    }

    fn failing_case(errors: Vec<TestErrorInfo>) -> (TestTree, crate::model::ElementId) {
        let mut tree = TestTree::new("run");
        let case = tree
            .add_case(tree.root(), ElementSpec::new("Тесты.Сравнение"))
            .expect("root is a suite");
        for error in errors {
            tree.push_error(case, error).expect("case exists");
        }
        (tree, case)
    }

    #[test]
    fn frames_are_tagged() {
        let trace = indoc! {"
            {ОбщийМодуль.ЮТУтверждения.Модуль(301)}: ВызватьИсключение
            {ОбщийМодуль.Тесты.Модуль(12)}: Проверка
            {ОбщийМодуль.Прочее.Модуль(5)}: Вызов
        "};
        let (tree, case) = failing_case(vec![
            TestErrorInfo::new(TestStatus::Failure)
                .with_message("Сравнение: значения не равны")
                .with_trace(trace),
        ]);

        let items = FailureTraceBuilder::new(&config()).build(&tree[case], NullTestKind.resolver());
        assert_eq!(items.len(), 1);
        let message = &items[0];
        assert_eq!(message.text, "Сравнение\n значения не равны");
        assert_eq!(message.label(), "Сравнение");
        assert_eq!(message.tag, FrameTag::Plain);

        let tags: Vec<_> = message.children.iter().map(|item| item.tag).collect();
        assert_eq!(tags, [FrameTag::Side, FrameTag::Main, FrameTag::Plain]);
        assert!(message.children.iter().all(|item| item.position.is_none()));
    }

    #[test]
    fn errors_without_message_put_frames_at_top_level() {
        let (tree, case) = failing_case(vec![
            TestErrorInfo::new(TestStatus::Error).with_trace("{ОбщийМодуль.Тесты.Модуль(3)}: Ошибка"),
            TestErrorInfo::new(TestStatus::Error).with_message("Без трассировки"),
        ]);

        let items = FailureTraceBuilder::new(&config()).build(&tree[case], FakeKind.resolver());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].error_index, 0);
        assert_eq!(items[0].tag, FrameTag::Main);
        assert_eq!(
            items[0].position,
            Some(SourcePosition {
                module: "ОбщийМодуль.Тесты.Модуль".to_owned(),
                line: Some(3),
            })
        );
        assert_eq!(items[1].error_index, 1);
        assert_eq!(items[1].text, "Без трассировки");
        assert!(items[1].children.is_empty());
    }

    #[test]
    fn custom_parser() {
        struct OneLine;

        impl StackTraceParser for OneLine {
            fn parse(&self, trace: &str, _test_name: &str) -> Vec<TraceElement> {
                vec![TraceElement {
                    name: trace.to_owned(),
                    frame: None,
                    children: Vec::new(),
                }]
            }
        }

        let (tree, case) = failing_case(vec![
            TestErrorInfo::new(TestStatus::Failure).with_trace("anything at all"),
        ]);
        let items = FailureTraceBuilder::new(&config())
            .with_parser(Arc::new(OneLine))
            .build(&tree[case], NullTestKind.resolver());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "anything at all");
    }
}
