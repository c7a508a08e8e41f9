// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! The result model behind a test run viewer.
//!
//! A [`TestRunSession`](session::TestRunSession) owns a [`TestTree`](model::TestTree) of suites
//! and cases. The tree is fed incrementally by [`RunnerEvent`](events::RunnerEvent)s from the
//! external test process; statuses are aggregated bottom-up as the events arrive. Sessions are
//! kept in a bounded [`SessionRegistry`](registry::SessionRegistry), can be swapped out to disk
//! while idle, and can be exported to and imported from the `<testrun>` XML document defined by
//! [`testrun_xml`].

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
mod helpers;
pub mod history;
pub mod kinds;
pub mod model;
pub mod registry;
pub mod serialize;
pub mod session;
pub mod trace;
