// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::discovery::user_config_path;
use crate::errors::UserConfigError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{collections::BTreeSet, io};
use tracing::{debug, warn};

/// Special value for `--config` and `TESTRUN_VIEWER_CONFIG` that skips user config loading
/// entirely.
pub const USER_CONFIG_NONE: &str = "none";

/// Specifies where to load user configuration from.
#[derive(Clone, Copy, Debug)]
pub enum UserConfigLocation<'a> {
    /// Discover user config from the default location.
    Default,

    /// Skip user config loading entirely, using only built-in defaults.
    Isolated,

    /// Load user config from an explicit path. It is an error if the file does not exist.
    Explicit(&'a Utf8Path),
}

impl<'a> UserConfigLocation<'a> {
    /// Creates a location from a CLI or environment variable value.
    ///
    /// Returns `Default` if `None`, `Isolated` if `"none"`, otherwise `Explicit` with the path.
    pub fn from_cli_or_env(s: Option<&'a str>) -> Self {
        match s {
            None => Self::Default,
            Some(s) if s == USER_CONFIG_NONE => Self::Isolated,
            Some(s) => Self::Explicit(Utf8Path::new(s)),
        }
    }
}

/// User configuration with defaults applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserConfig {
    /// Session history settings.
    pub history: HistoryConfig,
    /// Failure trace settings.
    pub trace: TraceConfig,
    /// Presentation settings.
    pub ui: UiConfig,
}

/// Resolved `[history]` settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryConfig {
    /// The capacity of the session registry.
    pub max_sessions: usize,
    /// The directory swapped-out sessions are written to, if overridden.
    pub dir: Option<Utf8PathBuf>,
}

/// Resolved `[trace]` settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceConfig {
    /// Module name prefixes that mark a stack frame as belonging to the test framework.
    pub side_module_prefixes: Vec<String>,
}

/// Resolved `[ui]` settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UiConfig {
    /// Only surface a run when one of its tests fails.
    pub show_on_error_only: bool,
}

impl UserConfig {
    /// Loads user configuration from the given location and applies defaults.
    pub fn from_location(location: UserConfigLocation<'_>) -> Result<Self, UserConfigError> {
        let user_config =
            DeserializedUserConfig::from_location_with_warnings(location, &mut LogWarnings)?;
        let defaults = DefaultUserConfig::from_embedded()?;
        Ok(Self::resolve(defaults, user_config.unwrap_or_default()))
    }

    /// Returns the built-in defaults.
    pub fn defaults() -> Result<Self, UserConfigError> {
        Ok(Self::resolve(
            DefaultUserConfig::from_embedded()?,
            DeserializedUserConfig::default(),
        ))
    }

    fn resolve(defaults: DefaultUserConfig, user: DeserializedUserConfig) -> Self {
        Self {
            history: HistoryConfig {
                max_sessions: user.history.max_sessions.unwrap_or(defaults.history.max_sessions),
                dir: user.history.dir.or(defaults.history.dir),
            },
            trace: TraceConfig {
                side_module_prefixes: user
                    .trace
                    .side_module_prefixes
                    .unwrap_or(defaults.trace.side_module_prefixes),
            },
            ui: UiConfig {
                show_on_error_only: user
                    .ui
                    .show_on_error_only
                    .unwrap_or(defaults.ui.show_on_error_only),
            },
        }
    }
}

/// Handles warnings produced while loading user config.
trait UserConfigWarnings {
    /// Called with the unknown keys found in a config file.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

struct LogWarnings;

impl UserConfigWarnings for LogWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if let [key] = unknown.iter().collect::<Vec<_>>().as_slice() {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.push_str(key);
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("in user config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedUserConfig {
    #[serde(default)]
    history: DeserializedHistoryConfig,
    #[serde(default)]
    trace: DeserializedTraceConfig,
    #[serde(default)]
    ui: DeserializedUiConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedHistoryConfig {
    #[serde(default)]
    max_sessions: Option<usize>,
    #[serde(default)]
    dir: Option<Utf8PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedTraceConfig {
    #[serde(default)]
    side_module_prefixes: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedUiConfig {
    #[serde(default)]
    show_on_error_only: Option<bool>,
}

impl DeserializedUserConfig {
    fn from_location_with_warnings(
        location: UserConfigLocation<'_>,
        warnings: &mut impl UserConfigWarnings,
    ) -> Result<Option<Self>, UserConfigError> {
        match location {
            UserConfigLocation::Isolated => {
                debug!("user config: skipping (isolated)");
                Ok(None)
            }
            UserConfigLocation::Explicit(path) => {
                debug!("user config: loading from explicit path {path}");
                match Self::from_path_with_warnings(path, warnings)? {
                    Some(config) => Ok(Some(config)),
                    None => Err(UserConfigError::FileNotFound {
                        path: path.to_owned(),
                    }),
                }
            }
            UserConfigLocation::Default => match user_config_path()? {
                Some(path) => Self::from_path_with_warnings(&path, warnings),
                None => {
                    debug!("user config: could not determine config directory");
                    Ok(None)
                }
            },
        }
    }

    /// Returns `Ok(None)` if the file does not exist.
    fn from_path_with_warnings(
        path: &Utf8Path,
        warnings: &mut impl UserConfigWarnings,
    ) -> Result<Option<Self>, UserConfigError> {
        debug!("user config: attempting to load from {path}");
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("user config: file does not exist at {path}");
                return Ok(None);
            }
            Err(error) => {
                return Err(UserConfigError::Read {
                    path: path.to_owned(),
                    error,
                });
            }
        };

        let (config, unknown) =
            Self::deserialize_toml(&contents).map_err(|error| UserConfigError::Parse {
                path: path.to_owned(),
                error,
            })?;
        if !unknown.is_empty() {
            warnings.unknown_config_keys(path, &unknown);
        }

        debug!("user config: loaded successfully from {path}");
        Ok(Some(config))
    }

    fn deserialize_toml(contents: &str) -> Result<(Self, BTreeSet<String>), toml::de::Error> {
        let deserializer = toml::Deserializer::parse(contents)?;
        let mut unknown = BTreeSet::new();
        let config: DeserializedUserConfig = serde_ignored::deserialize(deserializer, |path| {
            unknown.insert(path.to_string());
        })?;
        Ok((config, unknown))
    }
}

/// The embedded defaults. Every setting except the history directory is required.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct DefaultUserConfig {
    history: DefaultHistoryConfig,
    trace: DefaultTraceConfig,
    ui: DefaultUiConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct DefaultHistoryConfig {
    max_sessions: usize,
    #[serde(default)]
    dir: Option<Utf8PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct DefaultTraceConfig {
    side_module_prefixes: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct DefaultUiConfig {
    show_on_error_only: bool,
}

impl DefaultUserConfig {
    /// The embedded default config TOML.
    const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    fn from_embedded() -> Result<Self, UserConfigError> {
        toml::from_str(Self::DEFAULT_CONFIG).map_err(|error| UserConfigError::ParseDefault { error })
    }
}
