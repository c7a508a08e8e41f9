// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The on-disk history of test run sessions.
//!
//! Sessions that sit in the registry without being looked at can be swapped out: their tree is
//! exported to a swap file in the history directory and dropped from memory. Swap files are named
//! after the session's start time, `yyyyMMdd-HHmmss.SSS.xml`.

use crate::{
    config::{HistoryConfig, default_history_dir},
    errors::HistoryError,
    session::TestRunSession,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::{fs, io};
use tracing::{debug, warn};

const SWAP_FILE_EXTENSION: &str = "xml";
const SWAP_FILE_TIME_FORMAT: &str = "%Y%m%d-%H%M%S%.3f";

/// The directory that swap files are written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryDir {
    path: Utf8PathBuf,
}

/// A swap file found in the history directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapFile {
    /// The path to the file.
    pub path: Utf8PathBuf,
    /// The start time of the session, decoded from the file name.
    pub start_time: DateTime<Local>,
}

impl HistoryDir {
    /// Uses the given directory. It is created on first write.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses the configured directory, or the platform default.
    pub fn from_config(config: &HistoryConfig) -> Result<Self, HistoryError> {
        match &config.dir {
            Some(dir) => Ok(Self::new(dir.clone())),
            None => default_history_dir().map(Self::new),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Creates the directory if it does not exist.
    pub fn ensure_exists(&self) -> Result<(), HistoryError> {
        fs::create_dir_all(&self.path).map_err(|error| HistoryError::CreateDir {
            path: self.path.clone(),
            error,
        })
    }

    /// Returns the swap file path for a session started at `start_time`.
    pub fn swap_file_path(&self, start_time: DateTime<Local>) -> Utf8PathBuf {
        self.path.join(format!(
            "{}.{SWAP_FILE_EXTENSION}",
            start_time.format(SWAP_FILE_TIME_FORMAT)
        ))
    }

    /// Deletes a session's swap file, if it has one. Failures are logged and otherwise ignored.
    pub fn remove_swap_file(&self, session: &TestRunSession) {
        let path = match (session.swap_file(), session.start_time()) {
            (Some(path), _) => path,
            (None, Some(start_time)) => self.swap_file_path(start_time),
            (None, None) => return,
        };
        remove_file_best_effort(&path);
    }

    /// Lists the swap files in the directory, oldest first.
    ///
    /// Files whose names do not encode a start time are not swap files and are skipped. A missing
    /// directory has no swap files.
    pub fn list(&self) -> Result<Vec<SwapFile>, HistoryError> {
        let entries = match self.path.read_dir_utf8() {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(HistoryError::ReadDir {
                    path: self.path.clone(),
                    error,
                });
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|error| HistoryError::ReadDir {
                path: self.path.clone(),
                error,
            })?;
            let path = entry.path();
            if path.extension() != Some(SWAP_FILE_EXTENSION) {
                continue;
            }
            let Some(start_time) = path.file_stem().and_then(parse_swap_file_stem) else {
                continue;
            };
            files.push(SwapFile {
                path: path.to_owned(),
                start_time,
            });
        }
        files.sort_by_key(|file| file.start_time);
        Ok(files)
    }

    /// Deletes every swap file. Failures are logged and otherwise ignored.
    ///
    /// Returns the number of files deleted.
    pub fn clear(&self) -> usize {
        let files = match self.list() {
            Ok(files) => files,
            Err(error) => {
                warn!("failed to list history directory {}: {error}", self.path);
                return 0;
            }
        };
        files
            .iter()
            .filter(|file| remove_file_best_effort(&file.path))
            .count()
    }
}

fn parse_swap_file_stem(stem: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(stem, SWAP_FILE_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

fn remove_file_best_effort(path: &Utf8Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("removed swap file {path}");
            true
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => false,
        Err(error) => {
            warn!("failed to remove swap file {path}: {error}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ElementSpec, TestErrorInfo, TestResult, TestStatus},
        session::TestRunSession,
    };
    use camino_tempfile::tempdir;
    use chrono::Timelike;
    use pretty_assertions::assert_eq;

    #[test]
    fn swap_file_name_from_start_time() {
        let history = HistoryDir::new("/history");
        let start_time = Local
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .single()
            .expect("unambiguous time")
            .with_nanosecond(42_000_000)
            .expect("valid nanosecond");
        let path = history.swap_file_path(start_time);
        assert_eq!(path, "/history/20240309-070501.042.xml");
        assert_eq!(
            parse_swap_file_stem("20240309-070501.042"),
            Some(start_time)
        );
    }

    #[test]
    fn swap_out_and_in() {
        let temp_dir = tempdir().expect("tempdir created");
        let history = HistoryDir::new(temp_dir.path().join("history"));

        let session = TestRunSession::new("run");
        session.update_tree(|tree| {
            let suite = tree
                .add_suite(tree.root(), ElementSpec::new("Suite"))
                .expect("root is a suite");
            let case = tree
                .add_case(suite, ElementSpec::new("Suite.case"))
                .expect("suite is a suite");
            tree.set_status(case, TestStatus::Running).expect("valid id");
            tree.push_error(case, TestErrorInfo::new(TestStatus::Failure).with_message("no"))
                .expect("valid id");
            tree.set_status(case, TestStatus::Failure).expect("valid id");
        });

        assert!(session.swap_out(&history).expect("swap out succeeds"));
        assert!(session.is_swapped_out());
        assert_eq!(session.test_result(), TestResult::Failure);
        assert!(session.is_swapped_out(), "cached result does not swap in");

        let files = history.list().expect("history lists");
        assert_eq!(files.len(), 1);
        assert_eq!(Some(&files[0].path), session.swap_file().as_ref());
        let start_time = session.start_time().expect("session has started");
        assert!((start_time - files[0].start_time).num_milliseconds().abs() <= 1);

        assert_eq!(session.failed_test_names(), vec!["Suite.case"]);
        assert!(!session.is_swapped_out());

        history.remove_swap_file(&session);
        assert!(history.list().expect("history lists").is_empty());
    }

    #[test]
    fn clear_removes_swap_files_only() {
        let temp_dir = tempdir().expect("tempdir created");
        let history = HistoryDir::new(temp_dir.path());
        std::fs::write(temp_dir.path().join("20240101-000000.000.xml"), "<testrun/>")
            .expect("file written");
        std::fs::write(temp_dir.path().join("notes.txt"), "keep").expect("file written");
        std::fs::write(temp_dir.path().join("report.xml"), "<testrun/>").expect("file written");

        assert_eq!(history.clear(), 1);
        assert!(temp_dir.path().join("notes.txt").exists());
        assert!(temp_dir.path().join("report.xml").exists());
        assert!(history.list().expect("history lists").is_empty());
    }

    #[test]
    fn missing_directory_is_empty() {
        let temp_dir = tempdir().expect("tempdir created");
        let history = HistoryDir::new(temp_dir.path().join("missing"));
        assert!(history.list().expect("missing dir lists").is_empty());
        assert_eq!(history.clear(), 0);
    }
}
