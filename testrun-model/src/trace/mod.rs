// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure traces: parsing raw stack traces and arranging them into a tree for display.
//!
//! A [`StackTraceParser`] turns the trace text attached to an error into frames.
//! [`FailureTraceBuilder`] then produces one [`TraceItem`] per reported message, with the parsed
//! frames below it. Frames are tagged [`FrameTag::Main`] when they come from the module under
//! test and [`FrameTag::Side`] when they come from the test framework itself.

mod builder;
mod parser;

pub use builder::*;
pub use parser::*;
