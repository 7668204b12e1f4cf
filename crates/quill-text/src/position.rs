// SPDX-License-Identifier: MIT

//! Text position and range types.
//!
//! All coordinates are **0-indexed**. Line 0 is the first line, column 0 is
//! the first code unit. Columns count **UTF-16 code units**, not bytes or
//! Unicode scalar values: the platform text APIs that consume these positions
//! (Android `CharSequence`, .NET `string`) index text in UTF-16, so a
//! supplementary-plane character such as `'😀'` occupies two columns.
//!
//! Display layers should convert to 1-indexed for the user — that conversion
//! never belongs here.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TextPosition
// ---------------------------------------------------------------------------

/// A position in a document: (line, column), both 0-indexed.
///
/// `column` is the UTF-16 code unit offset from the start of the line. For
/// the line `"a😀b"`, column 1 is the start of the emoji and column 3 is `'b'`.
///
/// # Ordering
///
/// Positions are ordered lexicographically: line first, then column.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    /// The origin: line 0, column 0.
    pub const ZERO: Self = Self { line: 0, column: 0 };

    /// Create a new position.
    #[inline]
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The position reached after inserting `text` at `self`.
    ///
    /// Each `\n` in `text` advances the line and resets the column; the
    /// remaining tail advances the column by its UTF-16 length. This is the
    /// exclusive end of the range the inserted text occupies.
    #[must_use]
    pub fn advanced_by(self, text: &str) -> Self {
        match text.rfind('\n') {
            None => Self::new(self.line, self.column + crate::utf16::len(text)),
            Some(last_nl) => {
                let newlines = text.bytes().filter(|&b| b == b'\n').count();
                Self::new(
                    self.line + newlines,
                    crate::utf16::len(&text[last_nl + 1..]),
                )
            }
        }
    }
}

impl Ord for TextPosition {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.line
            .cmp(&other.line)
            .then(self.column.cmp(&other.column))
    }
}

impl PartialOrd for TextPosition {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({}:{})", self.line, self.column)
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

// ---------------------------------------------------------------------------
// TextRange
// ---------------------------------------------------------------------------

/// A half-open range in a document: `[start, end)`.
///
/// Ranges are normalized so that `start <= end`; use [`TextRange::new`]
/// which checks this in debug builds, or [`TextRange::ordered`] on untrusted
/// input (e.g. a selection dragged backwards).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl TextRange {
    /// Create a range. Panics in debug if `start > end`.
    #[inline]
    #[must_use]
    pub const fn new(start: TextPosition, end: TextPosition) -> Self {
        debug_assert!(
            start.line < end.line || (start.line == end.line && start.column <= end.column),
            "TextRange::new requires start <= end"
        );
        Self { start, end }
    }

    /// Create a range from two arbitrary positions, swapping if needed.
    #[inline]
    #[must_use]
    pub fn ordered(a: TextPosition, b: TextPosition) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// A zero-width range at the given position.
    #[inline]
    #[must_use]
    pub const fn point(pos: TextPosition) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// The range `text` occupies once inserted at `at`.
    #[must_use]
    pub fn of_insertion(at: TextPosition, text: &str) -> Self {
        Self {
            start: at,
            end: at.advanced_by(text),
        }
    }

    /// True when the range spans nothing (`start == end`).
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start.line == self.end.line && self.start.column == self.end.column
    }

    /// True when `pos` falls within `[start, end)`.
    #[inline]
    #[must_use]
    pub fn contains(self, pos: TextPosition) -> bool {
        pos >= self.start && pos < self.end
    }
}

impl fmt::Debug for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range({}:{} .. {}:{})",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_line_then_column() {
        let positions = [
            TextPosition::ZERO,
            TextPosition::new(0, 1),
            TextPosition::new(0, 100),
            TextPosition::new(1, 0),
            TextPosition::new(1, 1),
            TextPosition::new(10, 0),
        ];
        for window in positions.windows(2) {
            assert!(window[0] < window[1], "{:?} should be < {:?}", window[0], window[1]);
        }
    }

    #[test]
    fn advanced_by_plain_text() {
        assert_eq!(
            TextPosition::new(3, 5).advanced_by("hi"),
            TextPosition::new(3, 7)
        );
    }

    #[test]
    fn advanced_by_counts_utf16_units() {
        // 'é' is one unit, '😀' is a surrogate pair.
        assert_eq!(
            TextPosition::ZERO.advanced_by("é😀"),
            TextPosition::new(0, 3)
        );
    }

    #[test]
    fn advanced_by_newlines() {
        assert_eq!(
            TextPosition::new(3, 5).advanced_by("hi\nthere"),
            TextPosition::new(4, 5)
        );
        assert_eq!(
            TextPosition::ZERO.advanced_by("a\nb\n"),
            TextPosition::new(2, 0)
        );
    }

    #[test]
    fn advanced_by_empty_is_identity() {
        let p = TextPosition::new(2, 3);
        assert_eq!(p.advanced_by(""), p);
    }

    #[test]
    fn ordered_swaps_backwards_input() {
        let a = TextPosition::new(2, 0);
        let b = TextPosition::new(1, 4);
        let r = TextRange::ordered(a, b);
        assert_eq!(r.start, b);
        assert_eq!(r.end, a);
    }

    #[test]
    fn contains_is_half_open() {
        let r = TextRange::new(TextPosition::new(0, 2), TextPosition::new(1, 0));
        assert!(r.contains(TextPosition::new(0, 2)));
        assert!(r.contains(TextPosition::new(0, 99)));
        assert!(!r.contains(TextPosition::new(1, 0)));
        assert!(!r.contains(TextPosition::new(0, 1)));
    }

    #[test]
    fn point_range_is_empty() {
        assert!(TextRange::point(TextPosition::new(4, 4)).is_empty());
        assert!(!TextRange::of_insertion(TextPosition::ZERO, "x").is_empty());
    }

    #[test]
    fn display_is_one_indexed() {
        assert_eq!(TextPosition::new(0, 0).to_string(), "1:1");
        assert_eq!(
            TextRange::new(TextPosition::new(0, 1), TextPosition::new(2, 3)).to_string(),
            "1:2-3:4"
        );
    }
}
