// SPDX-License-Identifier: MIT

//! Error types for document indexing.

use thiserror::Error;

/// An index passed to a [`Document`](crate::Document) accessor lies outside
/// the document.
///
/// These are caller bugs, not runtime conditions: the caller is expected to
/// validate against [`line_count`](crate::Document::line_count) or
/// [`len_utf16`](crate::Document::len_utf16) first. Offsets given to the edit
/// operations are clamped instead and never produce an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("line {line} out of range (document has {line_count} lines)")]
    LineOutOfRange { line: usize, line_count: usize },

    #[error("char index {index} out of range (document has {len} UTF-16 units)")]
    CharIndexOutOfRange { index: usize, len: usize },
}

/// Result alias for document operations.
pub type Result<T> = std::result::Result<T, TextError>;
