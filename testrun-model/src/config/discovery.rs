// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of the user config file and the default history directory.

use crate::errors::{HistoryError, UserConfigError};
use camino::Utf8PathBuf;
use etcetera::{BaseStrategy, HomeDirError, base_strategy::Xdg};

const APP_DIR: &str = "testrun-viewer";

/// Returns the path the user config file is looked up at, or `None` if the home directory cannot
/// be determined.
///
/// The XDG layout is used on all platforms: `$XDG_CONFIG_HOME/testrun-viewer/config.toml`, or
/// `~/.config/testrun-viewer/config.toml` if `XDG_CONFIG_HOME` is unset.
pub fn user_config_path() -> Result<Option<Utf8PathBuf>, UserConfigError> {
    let strategy = match Xdg::new() {
        Ok(strategy) => strategy,
        Err(HomeDirError) => return Ok(None),
    };

    let config_path = strategy.config_dir().join(APP_DIR).join("config.toml");
    Utf8PathBuf::try_from(config_path)
        .map(Some)
        .map_err(|error| UserConfigError::NonUtf8Path { error })
}

/// Returns the default directory for swapped-out sessions:
/// `$XDG_CACHE_HOME/testrun-viewer/history`.
pub fn default_history_dir() -> Result<Utf8PathBuf, HistoryError> {
    let strategy = Xdg::new().map_err(|HomeDirError| HistoryError::NoCacheDir)?;
    let history_dir = strategy.cache_dir().join(APP_DIR).join("history");
    Utf8PathBuf::try_from(history_dir).map_err(|error| HistoryError::NonUtf8Path { error })
}
