// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bounded registry of test run sessions.
//!
//! [`SessionRegistry`] keeps sessions youngest first and evicts the oldest idle ones once its
//! capacity is exceeded. A session whose process may still produce results is never evicted, so
//! the capacity can be exceeded for a while.
//!
//! [`LegacySessionAdapter`] bridges the registry to [`TestRunListener`](crate::events::TestRunListener)s,
//! which can only follow one session at a time.

mod imp;
mod legacy;

pub use imp::*;
pub use legacy::*;
