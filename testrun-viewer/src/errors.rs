// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use testrun_model::errors::{ExportError, HistoryError, ImportError, UserConfigError};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `testrun-viewer` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum ViewerExitCode {}

impl ViewerExitCode {
    /// No errors occurred and the viewer exited normally.
    pub const OK: i32 = 0;

    /// The summarized run contains failed or errored tests.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// A report could not be read or parsed.
    pub const IMPORT_FAILED: i32 = 101;

    /// A report could not be written.
    pub const EXPORT_FAILED: i32 = 102;

    /// The history directory could not be used.
    pub const HISTORY_FAILED: i32 = 103;

    /// Writing data to stdout produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// The user configuration could not be loaded.
    pub const SETUP_ERROR: i32 = 96;
}

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected failure: bad input, an unreadable file, or an unwritable output.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("user config error")]
    UserConfig {
        #[from]
        err: UserConfigError,
    },
    #[error("import failed")]
    Import {
        #[from]
        err: ImportError,
    },
    #[error("export failed")]
    Export {
        #[from]
        err: ExportError,
    },
    #[error("history error")]
    History {
        #[from]
        err: HistoryError,
    },
    #[error("converted report would overwrite its input")]
    ConvertInPlace { path: Utf8PathBuf },
    #[error("error writing output")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn write_output(err: std::io::Error) -> Self {
        Self::WriteOutput { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::UserConfig { .. } | Self::ConvertInPlace { .. } => ViewerExitCode::SETUP_ERROR,
            Self::Import { .. } => ViewerExitCode::IMPORT_FAILED,
            Self::Export { .. } => ViewerExitCode::EXPORT_FAILED,
            Self::History { .. } => ViewerExitCode::HISTORY_FAILED,
            Self::WriteOutput { .. } => ViewerExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::UserConfig { err } => {
                error!("{err}");
                err.source()
            }
            Self::Import { err } => {
                error!("{err}");
                err.source()
            }
            Self::Export { err } => {
                error!("{err}");
                err.source()
            }
            Self::History { err } => {
                error!("{err}");
                err.source()
            }
            Self::ConvertInPlace { path } => {
                error!(
                    "refusing to convert `{}` in place: choose a different output path",
                    path.style(styles.bold)
                );
                None
            }
            Self::WriteOutput { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
