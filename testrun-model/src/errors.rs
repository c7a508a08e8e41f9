// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the test run model.

use crate::model::ElementId;
use camino::{FromPathBufError, Utf8PathBuf};
use testrun_xml::{DeserializeError, SerializeError};
use thiserror::Error;

/// An error that occurred while changing the shape or state of a [`TestTree`](crate::model::TestTree).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    /// The element does not exist in this tree.
    #[error("element {id} does not exist in this tree")]
    UnknownElement {
        /// The id that was looked up.
        id: ElementId,
    },

    /// Children can only be added to suites.
    #[error("cannot add a child to `{name}` ({id}): it is a test case, not a suite")]
    NotASuite {
        /// The id of the would-be parent.
        id: ElementId,
        /// The name of the would-be parent.
        name: String,
    },
}

/// An error that occurred while applying a reporting-channel event to a session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionEventError {
    /// The event referred to a test id that was never announced.
    #[error("unknown test id `{test_id}`")]
    UnknownTestId {
        /// The id from the reporting channel.
        test_id: String,
    },

    /// A test id was announced twice.
    #[error("test id `{test_id}` was already announced")]
    DuplicateTestId {
        /// The id from the reporting channel.
        test_id: String,
    },

    /// The tree rejected the change.
    #[error("error updating test tree")]
    Tree(#[from] TreeError),
}

/// An error that occurred while importing a test run report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    /// The report file could not be opened.
    #[error("error opening report at `{path}`")]
    Open {
        /// The report path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The report could not be parsed.
    #[error("error parsing report{}", .path.as_ref().map(|path| format!(" at `{path}`")).unwrap_or_default())]
    Parse {
        /// The report path, if the report was read from a file.
        path: Option<Utf8PathBuf>,
        /// The underlying error.
        #[source]
        error: DeserializeError,
    },

    /// The report described a tree that could not be built.
    #[error("error building test tree from report")]
    Tree(#[from] TreeError),
}

/// An error that occurred while exporting a session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// The output file could not be created.
    #[error("error creating report file at `{path}`")]
    Create {
        /// The output path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The report could not be written.
    #[error("error writing report")]
    Serialize(#[from] SerializeError),
}

/// An error that occurred while operating on the history directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    /// The history directory could not be created.
    #[error("error creating history directory `{path}`")]
    CreateDir {
        /// The directory path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The history directory could not be read.
    #[error("error reading history directory `{path}`")]
    ReadDir {
        /// The directory path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The platform cache directory could not be determined.
    #[error("could not determine the cache directory for history")]
    NoCacheDir,

    /// The cache directory is not valid UTF-8.
    #[error("cache directory is not valid UTF-8")]
    NonUtf8Path {
        /// The underlying error.
        #[source]
        error: FromPathBufError,
    },

    /// A session could not be written to its swap file.
    #[error("error swapping out session")]
    Export(#[from] ExportError),
}

/// An error that occurred while loading user configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserConfigError {
    /// An explicitly specified config file was not found.
    #[error("user config file not found at `{path}`")]
    FileNotFound {
        /// The path that was specified.
        path: Utf8PathBuf,
    },

    /// The config file could not be read.
    #[error("failed to read user config at `{path}`")]
    Read {
        /// The config path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The config file could not be parsed.
    #[error("failed to parse user config at `{path}`")]
    Parse {
        /// The config path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },

    /// The embedded default config could not be parsed.
    #[error("failed to parse the built-in default config")]
    ParseDefault {
        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },

    /// The config directory is not valid UTF-8.
    #[error("user config path is not valid UTF-8")]
    NonUtf8Path {
        /// The underlying error.
        #[source]
        error: FromPathBufError,
    },
}
