// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::{
    fmt::{self, Write as _},
    io::{self, BufWriter, Write},
    sync::Once,
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Environment variable that sets the log filter, in `tracing_subscriber::filter::Targets` syntax.
pub(crate) const LOG_ENV: &str = "TESTRUN_LOG";

/// Log target whose events are printed without a level prefix.
pub(crate) const NO_HEADING_TARGET: &str = "testrun_viewer::no_heading";

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects},
    };

    pub(crate) const fn style() -> Styles {
        let heading = AnsiColor::Green.on_default().effects(Effects::BOLD);
        let literal = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
        Styles::styled()
            .header(heading)
            .usage(heading)
            .literal(literal)
            .placeholder(AnsiColor::Cyan.on_default())
            .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
            .valid(literal)
            .invalid(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    }
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Verbose output: debug logs, and failure traces in `show`
    #[arg(long, short, global = true, env = "TESTRUN_VIEWER_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "TESTRUN_VIEWER_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        init_logger(self.color, self.verbose);
        OutputContext {
            verbose: self.verbose,
            color: self.color,
        }
    }
}

/// Resolved output settings, shared by everything that writes to the terminal.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns general stderr styles for the current output context.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.bold = style().bold();
        }
        styles
    }

    /// Returns the styles used for reports written to stdout.
    pub(crate) fn report_styles(&self) -> ReportStyles {
        let mut styles = ReportStyles::default();
        if self.color.should_colorize(supports_color::Stream::Stdout) {
            styles.colorize();
        }
        styles
    }
}

/// When to colorize output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
#[must_use]
pub enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

static INIT_LOGGER: Once = Once::new();

fn init_logger(color: Color, verbose: bool) {
    let colorize = color.should_colorize(supports_color::Stream::Stderr);

    INIT_LOGGER.call_once(|| {
        let default_level = if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let targets = match std::env::var(LOG_ENV) {
            Ok(filter) if !filter.is_empty() => filter.parse().unwrap_or_else(|error| {
                eprintln!("ignoring invalid {LOG_ENV} value `{filter}`: {error}");
                Targets::new().with_default(default_level)
            }),
            _ => Targets::new().with_default(default_level),
        };

        let layer = tracing_subscriber::fmt::layer()
            .event_format(LevelPrefixFormatter { colorize })
            .with_writer(io::stderr)
            .with_filter(targets);

        tracing_subscriber::registry().with(layer).init();
    });
}

/// Writes `level: message key=value ...`, one event per line.
struct LevelPrefixFormatter {
    colorize: bool,
}

impl LevelPrefixFormatter {
    fn level_style(&self, level: Level) -> Style {
        if !self.colorize {
            return Style::new();
        }
        match level {
            Level::ERROR => style().red().bold(),
            Level::WARN => style().yellow().bold(),
            Level::INFO | Level::DEBUG => style().bold(),
            Level::TRACE => style().dimmed(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LevelPrefixFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING_TARGET {
            let level = *metadata.level();
            let label = match level {
                Level::ERROR => "error",
                Level::WARN => "warning",
                Level::INFO => "info",
                Level::DEBUG => "debug",
                Level::TRACE => "trace",
            };
            write!(writer, "{}: ", label.style(self.level_style(level)))?;
        }

        let mut fields = EventFields::default();
        event.record(&mut fields);
        writer.write_str(&fields.message)?;
        writer.write_str(&fields.extra)?;
        writeln!(writer)
    }
}

#[derive(Default)]
struct EventFields {
    message: String,
    extra: String,
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // Writing to a String cannot fail.
        let _ = if field.name() == "message" {
            write!(self.message, "{value:?}")
        } else {
            write!(self.extra, " {}={value:?}", field.name())
        };
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        let _ = if field.name() == "message" {
            self.message.write_str(value)
        } else {
            write!(self.extra, " {}={value}", field.name())
        };
    }
}

#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
}

/// Styles for the test trees, failure lists and summaries written to stdout.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReportStyles {
    pub(crate) name: Style,
    pub(crate) pass: Style,
    pub(crate) fail: Style,
    pub(crate) skip: Style,
    pub(crate) running: Style,
    pub(crate) time: Style,
}

impl ReportStyles {
    pub(crate) fn colorize(&mut self) {
        self.name = style().bold();
        self.pass = style().green().bold();
        self.fail = style().red().bold();
        self.skip = style().yellow().bold();
        self.running = style().cyan();
        self.time = style().dimmed();
    }
}

/// Where command output goes: the terminal, or a buffer in tests.
#[derive(Default)]
pub enum OutputWriter {
    /// Buffered stdout.
    #[default]
    Normal,
    /// Captured output.
    #[cfg(test)]
    Test {
        /// Everything written to stdout.
        stdout: Vec<u8>,
    },
}

impl OutputWriter {
    pub(crate) fn stdout_writer(&mut self) -> Box<dyn Write + '_> {
        match self {
            Self::Normal => Box::new(BufWriter::new(io::stdout())),
            #[cfg(test)]
            Self::Test { stdout } => Box::new(stdout),
        }
    }
}
