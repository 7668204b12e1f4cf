// SPDX-License-Identifier: MIT

//! # quill-text — Text storage for quill
//!
//! - **[`source`]** — `OriginalSource`, the immutable bytes a document opens with
//!   (owned or memory-mapped)
//! - **[`piece`]** — `TextBuffer`, an append-only piece table over the original
//! - **[`lines`]** — `LineIndex`, logical line starts with lazily resolved
//!   UTF-16 line text
//! - **[`document`]** — `Document`, the editing surface that keeps the two in
//!   step
//! - **[`position`]** — `TextPosition` (line, UTF-16 column) and `TextRange`
//! - **[`utf16`]** — UTF-8 ⇄ UTF-16 offset helpers
//!
//! All columns and char indices are UTF-16 code units; a `\n` counts as one.

pub mod document;
pub mod error;
pub mod lines;
pub mod piece;
pub mod position;
pub mod source;
pub mod utf16;

pub use document::Document;
pub use error::{Result, TextError};
pub use lines::{LineIndex, LogicalLine};
pub use piece::{Origin, Segment, TextBuffer};
pub use position::{TextPosition, TextRange};
pub use source::{MappedFile, OriginalSource};
