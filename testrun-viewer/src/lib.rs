// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inspect test run reports from the command line.
//!
//! `testrun-viewer` reads `<testrun>` documents and JUnit reports, prints their test trees,
//! failed tests and counters, converts JUnit reports to the `<testrun>` format, and manages the
//! directory that idle sessions are swapped out to.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod render;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
