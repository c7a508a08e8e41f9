// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use regex::Regex;
use std::sync::LazyLock;

// `{Module.Path(line)}: text`, where the line number and the text are optional.
static FRAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\{(?P<symlink>[^{}()]+)(?:\((?P<line>\d+)\))?\}\s*:?\s*(?P<text>.*?)\s*$")
        .expect("frame regex is valid")
});

/// A reference to a location in the code under test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFrame {
    /// The dotted path of the module, e.g. `CommonModule.Tests.Module`.
    pub symlink: String,
    /// The 1-based line, if present.
    pub line: Option<u32>,
}

impl TraceFrame {
    /// Returns the module name: the second segment of the symbolic path, or an empty string if
    /// there is none.
    pub fn module_name(&self) -> &str {
        self.symlink.split('.').nth(1).unwrap_or_default()
    }
}

/// A line of a parsed stack trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceElement {
    /// The text of the line, without the frame reference.
    pub name: String,
    /// The frame, if the line refers to one.
    pub frame: Option<TraceFrame>,
    /// Lines nested below this one.
    pub children: Vec<TraceElement>,
}

impl TraceElement {
    fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame: None,
            children: Vec::new(),
        }
    }
}

/// Parses the trace text attached to a test error.
pub trait StackTraceParser: Send + Sync {
    /// Parses `trace`, reported for the test named `test_name`, into top-level elements.
    fn parse(&self, trace: &str, test_name: &str) -> Vec<TraceElement>;
}

/// Parses traces made of `{Module.Path(line)}: text` frame lines.
///
/// Every frame line becomes a top-level element. Any other non-blank line is attached to the
/// frame before it, or becomes a top-level element of its own if no frame has been seen yet.
#[derive(Clone, Copy, Debug, Default)]
pub struct BslStackTraceParser;

impl StackTraceParser for BslStackTraceParser {
    fn parse(&self, trace: &str, _test_name: &str) -> Vec<TraceElement> {
        let mut elements: Vec<TraceElement> = Vec::new();
        let mut in_frame = false;
        for line in trace.lines() {
            if let Some(captures) = FRAME_REGEX.captures(line) {
                let frame = TraceFrame {
                    symlink: captures["symlink"].trim().to_owned(),
                    line: captures
                        .name("line")
                        .and_then(|line| line.as_str().parse().ok()),
                };
                elements.push(TraceElement {
                    name: captures["text"].to_owned(),
                    frame: Some(frame),
                    children: Vec::new(),
                });
                in_frame = true;
                continue;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match elements.last_mut() {
                Some(frame) if in_frame => frame.children.push(TraceElement::text(line)),
                _ => elements.push(TraceElement::text(line)),
            }
        }
        elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("{ОбщийМодуль.Тесты.Модуль(42)}: Деление на 0", "ОбщийМодуль.Тесты.Модуль", Some(42), "Деление на 0" ; "full frame")]
    #[test_case("  {Module.Name}", "Module.Name", None, "" ; "no line or text")]
    #[test_case("{A.B(7)}:", "A.B", Some(7), "" ; "trailing colon")]
    fn frame_lines(line: &str, symlink: &str, number: Option<u32>, text: &str) {
        let elements = BslStackTraceParser.parse(line, "test");
        assert_eq!(
            elements,
            vec![TraceElement {
                name: text.to_owned(),
                frame: Some(TraceFrame {
                    symlink: symlink.to_owned(),
                    line: number,
                }),
                children: Vec::new(),
            }]
        );
    }

    #[test]
    fn text_lines_attach_to_previous_frame() {
        let trace = indoc! {"
            Ошибка при вызове метода
            {ОбщийМодуль.Тесты.Модуль(12)}: ЮТест.ОжидаетЧто(1).Равно(2)
                Ожидали 2, получили 1

            {ОбщийМодуль.ЮТУтверждения.Модуль(301)}: ВызватьИсключение
        "};
        let elements = BslStackTraceParser.parse(trace, "Тесты.Сравнение");
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].name, "Ошибка при вызове метода");
        assert_eq!(elements[0].frame, None);
        assert_eq!(
            elements[1].children,
            vec![TraceElement::text("Ожидали 2, получили 1")]
        );
        assert_eq!(
            elements[2].frame.as_ref().map(TraceFrame::module_name),
            Some("ЮТУтверждения")
        );
    }

    #[test]
    fn module_name_needs_two_segments() {
        let frame = TraceFrame {
            symlink: "Single".to_owned(),
            line: None,
        };
        assert_eq!(frame.module_name(), "");
    }
}
