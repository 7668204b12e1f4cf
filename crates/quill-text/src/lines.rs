// SPDX-License-Identifier: MIT

//! Line index — logical line boundaries over a [`TextBuffer`].
//!
//! One [`LogicalLine`] per `\n`-delimited line, indexed by line number. The
//! index keeps two kinds of data with different freshness rules:
//!
//! - **Byte offsets** (`start_byte`) are exact after every edit. Inserts and
//!   deletes shift them eagerly; this is a tight loop over a `Vec` with no
//!   text access.
//! - **Character data** (`start_char`, the cached UTF-16 text) is derived
//!   lazily. Edits only mark lines dirty; a line is resolved on demand from
//!   its bytes and the *previous* line's resolved `start_char`.
//!
//! # Resolution order
//!
//! Every edit dirties the edited line and everything after it, and resolution
//! always proceeds left to right, so resolved lines form a prefix of the
//! index. `first_dirty` marks where that prefix ends. Resolving line `i` is a
//! two-step protocol:
//!
//! 1. [`resolution_plan`](LineIndex::resolution_plan) — a pure query returning
//!    the contiguous range of lines that must be resolved, in order, before
//!    `i` is valid.
//! 2. [`resolve`](LineIndex::resolve) — executes the plan iteratively, each
//!    step reading only the line's bytes and its already-resolved
//!    predecessor.
//!
//! Character indices are UTF-16 code unit offsets from the start of the
//! document; the `\n` terminating a line counts as one unit.

use std::ops::Range;

use crate::piece::TextBuffer;
use crate::utf16;

// ---------------------------------------------------------------------------
// LogicalLine
// ---------------------------------------------------------------------------

/// Snapshot of one logical line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    start_byte: usize,
    start_char: usize,
    cached_text: Vec<u16>,
    is_char_dirty: bool,
    is_layout_dirty: bool,
    height: f32,
}

impl LogicalLine {
    fn dirty_at(start_byte: usize) -> Self {
        Self {
            start_byte,
            start_char: 0,
            cached_text: Vec::new(),
            is_char_dirty: true,
            is_layout_dirty: true,
            height: -1.0,
        }
    }

    fn invalidate(&mut self) {
        self.is_char_dirty = true;
        self.is_layout_dirty = true;
        self.height = -1.0;
    }

    /// Byte offset of the first byte of this line. Always current.
    #[inline]
    #[must_use]
    pub const fn start_byte(&self) -> usize {
        self.start_byte
    }

    /// UTF-16 offset of the first unit of this line. Only meaningful when
    /// [`is_char_dirty`](Self::is_char_dirty) is false.
    #[inline]
    #[must_use]
    pub const fn start_char(&self) -> usize {
        self.start_char
    }

    /// The line's text in UTF-16, without the trailing `\n`. Only meaningful
    /// when [`is_char_dirty`](Self::is_char_dirty) is false.
    #[inline]
    #[must_use]
    pub fn cached_text(&self) -> &[u16] {
        &self.cached_text
    }

    /// True when `start_char` and `cached_text` are stale.
    #[inline]
    #[must_use]
    pub const fn is_char_dirty(&self) -> bool {
        self.is_char_dirty
    }

    /// True when a layout engine must rebuild this line's runs.
    #[inline]
    #[must_use]
    pub const fn is_layout_dirty(&self) -> bool {
        self.is_layout_dirty
    }

    /// Rendered height, or a negative value when unmeasured.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// True once a height has been assigned since the last invalidation.
    #[inline]
    #[must_use]
    pub fn has_height(&self) -> bool {
        self.height >= 0.0
    }
}

// ---------------------------------------------------------------------------
// LineIndex
// ---------------------------------------------------------------------------

/// Logical line table for a [`TextBuffer`]. Never empty: an empty text has
/// one empty line.
#[derive(Debug, Clone)]
pub struct LineIndex {
    lines: Vec<LogicalLine>,
    /// Lines `0..first_dirty` are resolved; the rest are char-dirty.
    first_dirty: usize,
}

impl LineIndex {
    /// Scan `buffer` once for `\n` and build a fully dirty index.
    #[must_use]
    pub fn build(buffer: &TextBuffer) -> Self {
        let mut lines = vec![LogicalLine::dirty_at(0)];
        let mut offset = 0;
        for chunk in buffer.chunks() {
            for (i, &byte) in chunk.iter().enumerate() {
                if byte == b'\n' {
                    lines.push(LogicalLine::dirty_at(offset + i + 1));
                }
            }
            offset += chunk.len();
        }
        Self {
            lines,
            first_dirty: 0,
        }
    }

    // -- Accessors ----------------------------------------------------------

    /// Number of logical lines (at least 1).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All lines in order.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[LogicalLine] {
        &self.lines
    }

    /// One line, if it exists.
    #[inline]
    #[must_use]
    pub fn get(&self, line: usize) -> Option<&LogicalLine> {
        self.lines.get(line)
    }

    /// Index of the first char-dirty line (`len()` when all are resolved).
    #[inline]
    #[must_use]
    pub const fn first_dirty(&self) -> usize {
        self.first_dirty
    }

    /// Byte range of `line` **including** its trailing `\n`, given the total
    /// byte length of the text.
    #[must_use]
    pub fn byte_range(&self, line: usize, total_bytes: usize) -> Option<Range<usize>> {
        let start = self.lines.get(line)?.start_byte;
        let end = self
            .lines
            .get(line + 1)
            .map_or(total_bytes, |next| next.start_byte);
        Some(start..end)
    }

    /// Byte range of `line` **excluding** its trailing `\n`.
    #[must_use]
    pub fn content_byte_range(&self, line: usize, total_bytes: usize) -> Option<Range<usize>> {
        let range = self.byte_range(line, total_bytes)?;
        if line + 1 < self.lines.len() {
            // Every line but the last ends with exactly one '\n'.
            Some(range.start..range.end - 1)
        } else {
            Some(range)
        }
    }

    /// The line containing byte offset `byte`. Offsets past the end map to
    /// the last line.
    #[must_use]
    pub fn line_of_byte(&self, byte: usize) -> usize {
        self.lines
            .partition_point(|line| line.start_byte <= byte)
            .saturating_sub(1)
    }

    // -- Edit tracking ------------------------------------------------------

    /// Record that `text` was inserted at byte offset `at`.
    pub fn on_insert(&mut self, at: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let line = self.line_of_byte(at);
        let new_lines: Vec<LogicalLine> = text
            .bytes()
            .enumerate()
            .filter(|&(_, byte)| byte == b'\n')
            .map(|(i, _)| LogicalLine::dirty_at(at + i + 1))
            .collect();
        let inserted = new_lines.len();
        self.lines.splice(line + 1..line + 1, new_lines);

        let shift = text.len();
        for following in &mut self.lines[line + 1 + inserted..] {
            following.start_byte += shift;
        }
        self.invalidate_from(line);
    }

    /// Record that `len` bytes starting at `at` were deleted.
    pub fn on_delete(&mut self, at: usize, len: usize) {
        if len == 0 {
            return;
        }
        let end = at + len;
        let remove_from = self.lines.partition_point(|line| line.start_byte <= at);
        let remove_to = self.lines.partition_point(|line| line.start_byte <= end);
        if remove_from < remove_to {
            self.lines.drain(remove_from..remove_to);
        }
        for following in &mut self.lines[remove_from..] {
            following.start_byte -= len;
        }
        // `remove_from >= 1` because line 0 starts at byte 0 <= at.
        self.invalidate_from(remove_from.saturating_sub(1));
    }

    fn invalidate_from(&mut self, line: usize) {
        for dirty in &mut self.lines[line..] {
            dirty.invalidate();
        }
        self.first_dirty = self.first_dirty.min(line);
    }

    // -- Layout bookkeeping -------------------------------------------------

    /// Assign a measured height to `line`.
    pub fn set_height(&mut self, line: usize, height: f32) {
        if let Some(l) = self.lines.get_mut(line) {
            l.height = height;
        }
    }

    /// Clear the layout-dirty flag of `line` after its runs were rebuilt.
    pub fn mark_laid_out(&mut self, line: usize) {
        if let Some(l) = self.lines.get_mut(line) {
            l.is_layout_dirty = false;
        }
    }

    /// Mark one line layout-dirty and unmeasured.
    pub fn invalidate_line_layout(&mut self, line: usize) {
        if let Some(l) = self.lines.get_mut(line) {
            l.is_layout_dirty = true;
            l.height = -1.0;
        }
    }

    /// Mark every line layout-dirty and unmeasured (e.g. after a font change
    /// or when a new layout engine takes over). Character data is kept.
    pub fn invalidate_layout(&mut self) {
        for line in &mut self.lines {
            line.is_layout_dirty = true;
            line.height = -1.0;
        }
    }

    // -- Character resolution -----------------------------------------------

    /// Lines that must be resolved, in order, before `line` is valid.
    ///
    /// Empty when `line` is already resolved or does not exist.
    #[must_use]
    pub fn resolution_plan(&self, line: usize) -> Range<usize> {
        if line >= self.lines.len() || line < self.first_dirty {
            return self.first_dirty..self.first_dirty;
        }
        self.first_dirty..line + 1
    }

    /// Resolve `line` (and every dirty line before it). Returns `None` when
    /// the line does not exist.
    pub fn resolve(&mut self, line: usize, buffer: &TextBuffer) -> Option<&LogicalLine> {
        for step in self.resolution_plan(line) {
            self.resolve_next(step, buffer);
        }
        self.lines.get(line)
    }

    /// Resolve the single line `line`, whose predecessor must be resolved.
    fn resolve_next(&mut self, line: usize, buffer: &TextBuffer) {
        debug_assert_eq!(line, self.first_dirty, "resolution must run left to right");
        let start_char = if line == 0 {
            0
        } else {
            let prev = &self.lines[line - 1];
            prev.start_char + prev.cached_text.len() + 1
        };
        let bytes = self
            .content_byte_range(line, buffer.len())
            .map(|range| buffer.read(range.start, range.len()))
            .unwrap_or_default();

        let entry = &mut self.lines[line];
        entry.cached_text = utf16::decode(&bytes);
        entry.start_char = start_char;
        entry.is_char_dirty = false;
        self.first_dirty = line + 1;
    }

    /// Resolve lines until the resolved prefix covers char index `index` or
    /// every line is resolved.
    fn resolve_through_char(&mut self, index: usize, buffer: &TextBuffer) {
        while self.first_dirty < self.lines.len() {
            if self.first_dirty > 0 {
                let last = &self.lines[self.first_dirty - 1];
                // Start of the next line; `index` lies in a resolved line
                // once this boundary is beyond it.
                if last.start_char + last.cached_text.len() + 1 > index {
                    return;
                }
            }
            let next = self.first_dirty;
            self.resolve_next(next, buffer);
        }
    }

    /// The line containing UTF-16 char index `index`.
    ///
    /// Resolves lines left to right as far as needed, then binary-searches the
    /// resolved prefix. Indices past the end map to the last line.
    pub fn line_of_char(&mut self, index: usize, buffer: &TextBuffer) -> usize {
        self.resolve_through_char(index, buffer);
        self.lines[..self.first_dirty]
            .partition_point(|line| line.start_char <= index)
            .saturating_sub(1)
    }

    /// Total length of the text in UTF-16 code units. Resolves every line.
    pub fn len_utf16(&mut self, buffer: &TextBuffer) -> usize {
        let last = self.lines.len() - 1;
        self.resolve(last, buffer)
            .map_or(0, |line| line.start_char + line.cached_text.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
