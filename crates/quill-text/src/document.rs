// SPDX-License-Identifier: MIT

//! Document — the public text-editing surface.
//!
//! A `Document` composes a [`TextBuffer`] (bytes) with a [`LineIndex`]
//! (lines) and speaks in [`TextPosition`]s whose columns are UTF-16 code
//! units. Every mutation goes through here so the two halves never disagree.
//!
//! # Errors vs clamping
//!
//! Line numbers and char indices that lie outside the document are caller
//! bugs and come back as [`TextError`]. Columns are clamped to the line they
//! address, and the byte-level edit operations clamp their offsets to the
//! text, because hosts routinely send "end of line" or "end of document"
//! positions computed from stale UI state.

use std::io;
use std::path::Path;

use tracing::warn;

use crate::error::{Result, TextError};
use crate::lines::{LineIndex, LogicalLine};
use crate::piece::TextBuffer;
use crate::position::{TextPosition, TextRange};
use crate::source::OriginalSource;
use crate::utf16;

/// An editable text document.
#[derive(Debug)]
pub struct Document {
    buffer: TextBuffer,
    lines: LineIndex,
    valid: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self::from_source(OriginalSource::Owned(text.into_bytes()))
    }
}

impl Document {
    // -- Construction -------------------------------------------------------

    /// An empty document with one empty line.
    #[must_use]
    pub fn new() -> Self {
        Self::from_source(OriginalSource::default())
    }

    /// A document whose original content is `text`.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_source(OriginalSource::Owned(text.as_bytes().to_vec()))
    }

    /// A document from UTF-16 text. Unpaired surrogates become U+FFFD.
    #[must_use]
    pub fn from_utf16(text: &[u16]) -> Self {
        Self::from(String::from_utf16_lossy(text))
    }

    /// A document over an existing original source.
    #[must_use]
    pub fn from_source(source: OriginalSource) -> Self {
        let buffer = TextBuffer::new(source);
        let lines = LineIndex::build(&buffer);
        Self {
            buffer,
            lines,
            valid: true,
        }
    }

    /// Open a file as a document.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the file cannot be opened or mapped.
    pub fn try_open(path: &Path) -> io::Result<Self> {
        OriginalSource::open(path).map(Self::from_source)
    }

    /// Open a file as a document, degrading to an empty, invalid document
    /// when it cannot be read. See [`is_valid`](Self::is_valid).
    #[must_use]
    pub fn open(path: &Path) -> Self {
        match Self::try_open(path) {
            Ok(document) => document,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot load document; using empty text");
                let mut document = Self::new();
                document.valid = false;
                document
            }
        }
    }

    /// False when this document stands in for a file that failed to load.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    // -- Whole-text access --------------------------------------------------

    /// The full text as UTF-8. Invalid bytes in a mapped file become U+FFFD.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buffer.to_bytes()).into_owned()
    }

    /// The full text as UTF-16.
    #[must_use]
    pub fn text_utf16(&self) -> Vec<u16> {
        utf16::decode(&self.buffer.to_bytes())
    }

    /// Total byte length.
    #[inline]
    #[must_use]
    pub const fn len_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// True when the document holds no text.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total length in UTF-16 code units. Resolves every dirty line.
    pub fn len_utf16(&mut self) -> usize {
        self.lines.len_utf16(&self.buffer)
    }

    /// Number of Unicode scalar values in `byte_len` bytes from `start_byte`
    /// (clamped to the text).
    #[must_use]
    pub fn count_chars(&self, start_byte: usize, byte_len: usize) -> usize {
        String::from_utf8_lossy(&self.buffer.read(start_byte, byte_len))
            .chars()
            .count()
    }

    /// The byte storage.
    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// The line table.
    #[inline]
    #[must_use]
    pub const fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    // -- Line access --------------------------------------------------------

    /// Number of logical lines. Always at least 1.
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn out_of_range(&self, line: usize) -> TextError {
        TextError::LineOutOfRange {
            line,
            line_count: self.lines.len(),
        }
    }

    fn line_bytes(&self, line: usize) -> Result<Vec<u8>> {
        let range = self
            .lines
            .content_byte_range(line, self.buffer.len())
            .ok_or_else(|| self.out_of_range(line))?;
        Ok(self.buffer.read(range.start, range.len()))
    }

    /// The line snapshot for `line`, without resolving it.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when `line >= line_count()`.
    pub fn line(&self, line: usize) -> Result<&LogicalLine> {
        self.lines.get(line).ok_or_else(|| self.out_of_range(line))
    }

    /// Resolve `line`'s character data (and that of every dirty line before
    /// it) and return the fresh snapshot.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when `line >= line_count()`.
    pub fn resolve_line(&mut self, line: usize) -> Result<&LogicalLine> {
        let err = self.out_of_range(line);
        self.lines.resolve(line, &self.buffer).ok_or(err)
    }

    /// Text of `line` without its trailing `\n`, as UTF-8.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when `line >= line_count()`.
    pub fn line_text(&self, line: usize) -> Result<String> {
        self.line_bytes(line)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Text of `line` without its trailing `\n`, as UTF-16. Served from the
    /// line cache when it is fresh.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when `line >= line_count()`.
    pub fn line_text_utf16(&self, line: usize) -> Result<Vec<u16>> {
        let snapshot = self.line(line)?;
        if !snapshot.is_char_dirty() {
            return Ok(snapshot.cached_text().to_vec());
        }
        self.line_bytes(line).map(|bytes| utf16::decode(&bytes))
    }

    /// Number of columns (UTF-16 units) on `line`.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when `line >= line_count()`.
    pub fn line_columns(&mut self, line: usize) -> Result<usize> {
        self.resolve_line(line).map(|l| l.cached_text().len())
    }

    // -- Coordinate conversion ----------------------------------------------

    /// Position of UTF-16 char index `index`.
    ///
    /// `index == len_utf16()` is valid and maps to the end of the last line.
    ///
    /// # Errors
    ///
    /// [`TextError::CharIndexOutOfRange`] when `index > len_utf16()`.
    pub fn position_of(&mut self, index: usize) -> Result<TextPosition> {
        let line = self.lines.line_of_char(index, &self.buffer);
        let snapshot = &self.lines.lines()[line];
        let column = index - snapshot.start_char();
        if column > snapshot.cached_text().len() {
            return Err(TextError::CharIndexOutOfRange {
                index,
                len: snapshot.start_char() + snapshot.cached_text().len(),
            });
        }
        Ok(TextPosition::new(line, column))
    }

    /// UTF-16 char index of `position`. The column is clamped to the line.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when the line does not exist.
    pub fn char_index_of(&mut self, position: TextPosition) -> Result<usize> {
        let line = self.resolve_line(position.line)?;
        Ok(line.start_char() + position.column.min(line.cached_text().len()))
    }

    /// Byte offset of `position`. The column is clamped to the line's content
    /// (the trailing `\n` is never addressed).
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when the line does not exist.
    pub fn byte_offset_of(&self, position: TextPosition) -> Result<usize> {
        let start = self.line(position.line)?.start_byte();
        let bytes = self.line_bytes(position.line)?;
        Ok(start + utf16::byte_offset_of_column(&bytes, position.column))
    }

    // -- Editing ------------------------------------------------------------

    /// Insert UTF-8 `text` at byte offset `byte` (clamped to the end). Returns
    /// the offset used.
    pub fn insert_at_byte(&mut self, byte: usize, text: &str) -> usize {
        if text.is_empty() {
            return byte.min(self.buffer.len());
        }
        let at = self.buffer.insert(byte, text);
        self.lines.on_insert(at, text);
        at
    }

    /// Delete `len` bytes from byte offset `byte` (both clamped). Returns the
    /// `(start, len)` actually removed.
    pub fn delete_bytes(&mut self, byte: usize, len: usize) -> (usize, usize) {
        let (at, removed) = self.buffer.delete(byte, len);
        self.lines.on_delete(at, removed);
        (at, removed)
    }

    /// Insert `text` at `position`.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when the line does not exist.
    pub fn insert(&mut self, position: TextPosition, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let at = self.byte_offset_of(position)?;
        self.insert_at_byte(at, text);
        Ok(())
    }

    /// Delete the text in `range`.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when either endpoint's line does not
    /// exist.
    pub fn delete(&mut self, range: TextRange) -> Result<()> {
        let start = self.byte_offset_of(range.start)?;
        let end = self.byte_offset_of(range.end)?;
        self.delete_bytes(start, end.saturating_sub(start));
        Ok(())
    }

    /// Replace the text in `range` with `text`.
    ///
    /// # Errors
    ///
    /// [`TextError::LineOutOfRange`] when either endpoint's line does not
    /// exist.
    pub fn replace(&mut self, range: TextRange, text: &str) -> Result<()> {
        let start = self.byte_offset_of(range.start)?;
        let end = self.byte_offset_of(range.end)?;
        self.delete_bytes(start, end.saturating_sub(start));
        self.insert_at_byte(start, text);
        Ok(())
    }

    // -- Layout bookkeeping -------------------------------------------------

    /// Record the rendered height of `line`.
    pub fn set_line_height(&mut self, line: usize, height: f32) {
        self.lines.set_height(line, height);
    }

    /// Clear `line`'s layout-dirty flag.
    pub fn mark_line_laid_out(&mut self, line: usize) {
        self.lines.mark_laid_out(line);
    }

    /// Drop the layout state of one line (e.g. after its decorations change).
    pub fn invalidate_line_layout(&mut self, line: usize) {
        self.lines.invalidate_line_layout(line);
    }

    /// Drop all layout state (heights, layout flags) but keep text caches.
    pub fn invalidate_layout(&mut self) {
        self.lines.invalidate_layout();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pos(line: usize, column: usize) -> TextPosition {
        TextPosition::new(line, column)
    }

    #[test]
    fn round_trips_original_text() {
        let text = "\n行1: 你好\n行2: World\n行3: 结束";
        assert_eq!(Document::from_text(text).text(), text);
        assert_eq!(Document::from_text("").text(), "");
    }

    #[test]
    fn three_line_scenario() {
        let mut doc = Document::from_text("ab\ncd\nef");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line_text(1).unwrap(), "cd");
        assert_eq!(doc.position_of(3).unwrap(), pos(1, 0));
        assert_eq!(doc.position_of(0).unwrap(), pos(0, 0));
        assert_eq!(doc.position_of(8).unwrap(), pos(2, 2));
    }

    #[test]
    fn insert_at_byte_scenario() {
        let mut doc = Document::from_text("ab");
        doc.insert_at_byte(1, "X\nY");
        assert_eq!(doc.text(), "aX\nYb");
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line_text(0).unwrap(), "aX");
        assert_eq!(doc.line_text(1).unwrap(), "Yb");
    }

    #[test]
    fn utf16_columns_for_astral_text() {
        let mut doc = Document::from_text("a😀b\nc");
        assert_eq!(doc.line_columns(0).unwrap(), 4);
        assert_eq!(doc.byte_offset_of(pos(0, 3)).unwrap(), 5);
        assert_eq!(doc.char_index_of(pos(1, 0)).unwrap(), 5);
        assert_eq!(doc.position_of(3).unwrap(), pos(0, 3));
    }

    #[test]
    fn replace_single_and_multi_line() {
        let mut doc = Document::from_text("\n行1: 你好\n行2: World\n行3: 结束");
        doc.replace(TextRange::new(pos(1, 4), pos(1, 6)), "您不好").unwrap();
        assert_eq!(doc.text(), "\n行1: 您不好\n行2: World\n行3: 结束");

        doc.replace(TextRange::new(pos(2, 4), pos(3, 2)), "宇宙\n最后一行").unwrap();
        assert_eq!(doc.text(), "\n行1: 您不好\n行2: 宇宙\n最后一行: 结束");
        assert_eq!(doc.line_count(), 4);

        doc.insert(pos(2, 1), "=====").unwrap();
        assert_eq!(doc.line_text(2).unwrap(), "行=====2: 宇宙");

        doc.delete(TextRange::new(pos(1, 0), pos(2, 7))).unwrap();
        assert_eq!(doc.text(), "\n: 宇宙\n最后一行: 结束");
    }

    #[test]
    fn delete_then_insert_restores_text() {
        let mut doc = Document::from_text("hello\nworld");
        let at = pos(1, 2);
        doc.insert(at, "big\nnew ").unwrap();
        doc.delete(TextRange::of_insertion(at, "big\nnew ")).unwrap();
        assert_eq!(doc.text(), "hello\nworld");
        assert_eq!(doc.line_count(), 2);
    }

    #[test]
    fn out_of_range_lines_error() {
        let mut doc = Document::from_text("a\nb");
        assert_eq!(
            doc.line_text(2),
            Err(TextError::LineOutOfRange {
                line: 2,
                line_count: 2
            })
        );
        assert!(doc.char_index_of(pos(5, 0)).is_err());
        assert!(doc.insert(pos(2, 0), "x").is_err());
        assert_eq!(doc.text(), "a\nb");
    }

    #[test]
    fn out_of_range_char_index_errors() {
        let mut doc = Document::from_text("ab\nc");
        assert_eq!(doc.position_of(4).unwrap(), pos(1, 1));
        assert_eq!(
            doc.position_of(5),
            Err(TextError::CharIndexOutOfRange { index: 5, len: 4 })
        );
    }

    #[test]
    fn column_clamps_to_line() {
        let mut doc = Document::from_text("ab\ncd");
        assert_eq!(doc.char_index_of(pos(0, 99)).unwrap(), 2);
        assert_eq!(doc.byte_offset_of(pos(0, 99)).unwrap(), 2);
    }

    #[test]
    fn edits_clamp_byte_offsets() {
        let mut doc = Document::from_text("ab");
        assert_eq!(doc.insert_at_byte(50, "c"), 2);
        assert_eq!(doc.delete_bytes(1, 50), (1, 2));
        assert_eq!(doc.text(), "a");
    }

    #[test]
    fn utf16_constructors_and_accessors() {
        let source: Vec<u16> = "x\n😀".encode_utf16().collect();
        let mut doc = Document::from_utf16(&source);
        assert_eq!(doc.text_utf16(), source);
        assert_eq!(doc.len_utf16(), 4);
        assert_eq!(doc.line_text_utf16(1).unwrap(), "😀".encode_utf16().collect::<Vec<_>>());
        assert_eq!(doc.count_chars(0, doc.len_bytes()), 3);
    }

    #[test]
    fn line_cache_survives_edits_before_it() {
        let mut doc = Document::from_text("one\ntwo\nthree");
        doc.resolve_line(2).unwrap();
        doc.insert(pos(2, 5), "!").unwrap();
        assert!(!doc.line(1).unwrap().is_char_dirty());
        assert!(doc.line(2).unwrap().is_char_dirty());
        assert_eq!(doc.line_text_utf16(2).unwrap(), "three!".encode_utf16().collect::<Vec<_>>());
    }

    #[test]
    fn open_missing_file_is_invalid_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::open(&dir.path().join("missing.txt"));
        assert!(!doc.is_valid());
        assert_eq!(doc.text(), "");
        assert_eq!(doc.line_count(), 1);
    }

    #[test]
    fn open_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x\ny\n").unwrap();
        let doc = Document::open(&path);
        assert!(doc.is_valid());
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line_text(1).unwrap(), "y");
    }

    #[test]
    fn columns_over_malformed_bytes_follow_lossy_decode() {
        let mut doc = Document::from_source(OriginalSource::Owned(vec![0xE4, b'a', b'b']));
        assert_eq!(doc.line_text(0).unwrap(), "\u{FFFD}ab");
        assert_eq!(doc.byte_offset_of(pos(0, 1)).unwrap(), 1);
        doc.insert(pos(0, 1), "X").unwrap();
        assert_eq!(doc.text(), "\u{FFFD}Xab");

        let doc = Document::from_source(OriginalSource::Owned(vec![0xF0, 0x9F, b'a']));
        assert_eq!(doc.line_text(0).unwrap(), "\u{FFFD}a");
        assert_eq!(doc.byte_offset_of(pos(0, 1)).unwrap(), 2);
        assert_eq!(doc.byte_offset_of(pos(0, 2)).unwrap(), 3);
    }
}
