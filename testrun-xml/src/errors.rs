// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while serializing a [`TestRunReport`](crate::TestRunReport).
///
/// Returned by [`TestRunReport::serialize`](crate::TestRunReport::serialize) and
/// [`TestRunReport::to_string`](crate::TestRunReport::to_string).
#[derive(Debug, Error)]
#[error("error serializing test run report")]
pub struct SerializeError {
    #[from]
    inner: quick_xml::Error,
}

impl From<std::io::Error> for SerializeError {
    fn from(error: std::io::Error) -> Self {
        Self {
            inner: quick_xml::Error::from(error),
        }
    }
}

/// An error that occurs while reading a test run report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeserializeError {
    /// The document is not well-formed XML.
    #[error("malformed XML at byte {position}")]
    Xml {
        /// The byte offset at which the error was detected.
        position: usize,

        /// The underlying error.
        #[source]
        error: quick_xml::Error,
    },

    /// An element appeared where it is not allowed.
    #[error("unexpected element <{name}> inside <{parent}> at byte {position}")]
    UnexpectedElement {
        /// The name of the unexpected element.
        name: String,

        /// The name of the enclosing element, or `document` at the top level.
        parent: String,

        /// The byte offset of the element.
        position: usize,
    },

    /// A required attribute was missing.
    #[error("element <{element}> is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// The element the attribute belongs to.
        element: &'static str,

        /// The name of the missing attribute.
        attribute: &'static str,
    },

    /// A numeric attribute could not be parsed.
    #[error("attribute `{attribute}` of <{element}> has invalid value `{value}`")]
    InvalidNumber {
        /// The element the attribute belongs to.
        element: &'static str,

        /// The name of the attribute.
        attribute: &'static str,

        /// The value that failed to parse.
        value: String,
    },

    /// The document ended before the root element was closed, or had no root element at all.
    #[error("unexpected end of document")]
    UnexpectedEof,
}
