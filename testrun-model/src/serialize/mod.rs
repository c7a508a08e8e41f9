// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion between sessions and `<testrun>` XML reports.
//!
//! Export walks the tree depth-first and writes one `<testsuite>` or `<testcase>` per element.
//! Import is the inverse: the whole document is parsed first, then a new tree is built from it
//! with the counters recomputed from the leaves. A document that fails to parse never produces a
//! partially built session.

pub(crate) mod export;
pub(crate) mod import;

pub use export::{export_session, export_session_to_path, session_to_report};
pub use import::{
    import_into_session, import_session, import_session_from_reader, import_session_from_str,
};
