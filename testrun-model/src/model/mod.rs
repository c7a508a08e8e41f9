// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result tree: statuses, elements and their aggregation.

mod element;
mod status;
mod tree;

pub use element::*;
pub use status::*;
pub use tree::*;
