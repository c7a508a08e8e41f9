// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Read and write the `<testrun>` XML document used to persist test-run history.
//!
//! The document is a tree of `<testsuite>` and `<testcase>` elements under a single `<testrun>`
//! root carrying run-level counters. Reports in the JUnit/Ant `<testsuites>` format, or a bare
//! `<testsuite>`, are accepted by the parser as well.

mod deserialize;
mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
pub use serialize::{escape_control_chars, format_time};
