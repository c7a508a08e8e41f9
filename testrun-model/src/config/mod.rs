// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User configuration for the test run viewer.
//!
//! ## Config file location
//!
//! The config file is looked up at `$XDG_CONFIG_HOME/testrun-viewer/config.toml`, falling back to
//! `~/.config/testrun-viewer/config.toml`. An explicit path can be given instead, and the special
//! value `none` skips loading entirely.
//!
//! ## Configuration hierarchy
//!
//! Each setting is resolved in the following order (highest priority first):
//!
//! 1. The user config file.
//! 2. Built-in defaults, embedded from `default-config.toml`.

mod discovery;
mod imp;

pub use discovery::*;
pub use imp::*;
