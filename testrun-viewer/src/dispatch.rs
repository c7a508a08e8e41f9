// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::{Result, ViewerExitCode},
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
    render::{TreeOptions, write_failed, write_summary, write_tree},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use testrun_model::{
    config::{UserConfig, UserConfigLocation},
    context::ViewerContext,
    history::HistoryDir,
    serialize::{export_session_to_path, import_session},
};
use tracing::{debug, info};

/// Inspect, convert and manage test run reports.
///
/// Reports are either `<testrun>` documents or JUnit XML reports.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct ViewerApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl ViewerApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let config = self.config_opts.make_config()?;
        debug!("loaded user config: {config:?}");
        self.command.exec(config, output, output_writer)
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// User config file [default: $XDG_CONFIG_HOME/testrun-viewer/config.toml], or `none`
    #[arg(
        long = "config",
        global = true,
        value_name = "PATH",
        env = "TESTRUN_VIEWER_CONFIG"
    )]
    config_file: Option<String>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<UserConfig> {
        let location = UserConfigLocation::from_cli_or_env(self.config_file.as_deref());
        Ok(UserConfig::from_location(location)?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the test tree of a report
    ///
    /// Each line shows an element's name, its aggregated status and its elapsed time. With
    /// --verbose, failure traces are shown below failed tests.
    Show {
        /// The report to show
        #[arg(value_name = "FILE")]
        file: Utf8PathBuf,

        /// Only show failed and errored elements
        #[arg(long)]
        failures_only: bool,
    },
    /// Print the names of failed tests, one per line
    Failed {
        /// The report to read
        #[arg(value_name = "FILE")]
        file: Utf8PathBuf,
    },
    /// Print a one-line summary of a report's counters
    ///
    /// Exits with code 100 if any test failed or errored.
    Summary {
        /// The report to summarize
        #[arg(value_name = "FILE")]
        file: Utf8PathBuf,
    },
    /// Convert a report to the `<testrun>` format
    Convert {
        /// The report to read
        #[arg(value_name = "INPUT")]
        input: Utf8PathBuf,

        /// Where to write the converted report
        #[arg(long, short, value_name = "OUTPUT")]
        output: Utf8PathBuf,
    },
    /// Manage the directory that idle sessions are swapped out to
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    /// List swap files, oldest first
    List,
    /// Delete all swap files
    Clear,
}

impl Command {
    fn exec(
        self,
        config: UserConfig,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let styles = output.report_styles();
        let mut writer = output_writer.stdout_writer();

        match self {
            Command::Show {
                file,
                failures_only,
            } => {
                let context = ViewerContext::new(config)?;
                let session = context.import_session(&file)?;
                let options = TreeOptions {
                    failures_only,
                    traces: output.verbose.then(|| context.trace_builder()),
                };

                let failed = session.status().is_error_or_failure();
                let written = if context.config().ui.show_on_error_only && !failed {
                    write_summary(&session, &styles, &mut writer)
                } else {
                    write_tree(&session, &options, &styles, &mut writer)
                };
                written.map_err(ExpectedError::write_output)?;
            }
            Command::Failed { file } => {
                let session = import_session(&file)?;
                write_failed(&session, &mut writer).map_err(ExpectedError::write_output)?;
            }
            Command::Summary { file } => {
                let session = import_session(&file)?;
                write_summary(&session, &styles, &mut writer)
                    .map_err(ExpectedError::write_output)?;
                writer.flush().map_err(ExpectedError::write_output)?;
                if session.status().is_error_or_failure() {
                    return Ok(ViewerExitCode::TEST_RUN_FAILED);
                }
            }
            Command::Convert {
                input,
                output: output_path,
            } => {
                if input == output_path {
                    return Err(ExpectedError::ConvertInPlace { path: input });
                }
                let session = import_session(&input)?;
                export_session_to_path(&session, &output_path)?;
                info!(
                    "converted {} ({} tests) to {output_path}",
                    input,
                    session.counters().total
                );
            }
            Command::History { command } => {
                let history = HistoryDir::from_config(&config.history)?;
                match command {
                    HistoryCommand::List => {
                        for file in history.list()? {
                            writeln!(
                                writer,
                                "{}  {}",
                                file.start_time.format("%Y-%m-%d %H:%M:%S%.3f"),
                                file.path
                            )
                            .map_err(ExpectedError::write_output)?;
                        }
                    }
                    HistoryCommand::Clear => {
                        let count = history.clear();
                        info!("deleted {count} swap files from {}", history.path());
                    }
                }
            }
        }

        writer.flush().map_err(ExpectedError::write_output)?;
        Ok(ViewerExitCode::OK)
    }
}
