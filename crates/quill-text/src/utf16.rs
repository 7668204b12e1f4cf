// SPDX-License-Identifier: MIT

//! UTF-8 ⇄ UTF-16 bookkeeping.
//!
//! Text is stored as UTF-8 but addressed in UTF-16 code units. These helpers
//! are the only place that knows how the two encodings line up.

/// Number of UTF-16 code units needed to encode `text`.
#[inline]
#[must_use]
pub fn len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Decode UTF-8 bytes into UTF-16, replacing invalid sequences with U+FFFD.
#[must_use]
pub fn decode(bytes: &[u8]) -> Vec<u16> {
    String::from_utf8_lossy(bytes).encode_utf16().collect()
}

/// Byte width and UTF-16 width of the sequence at the start of `bytes`.
///
/// A 4-byte sequence is a supplementary-plane codepoint and takes a surrogate
/// pair; everything shorter is a single unit. Malformed input follows the
/// maximal-subpart rule of a lossy decoder: an invalid lead byte advances one
/// byte, and a sequence cut short by a bad or missing continuation byte
/// covers the bytes consumed so far. Either way it counts as one U+FFFD unit.
/// Empty input yields `(0, 0)`.
#[must_use]
pub const fn sequence_widths(bytes: &[u8]) -> (usize, usize) {
    if bytes.is_empty() {
        return (0, 0);
    }
    let lead = bytes[0];
    let (len, second_lo, second_hi) = match lead {
        0x00..=0x7F => return (1, 1),
        0xC2..=0xDF => (2, 0x80, 0xBF),
        0xE0 => (3, 0xA0, 0xBF),
        0xED => (3, 0x80, 0x9F),
        0xE1..=0xEC | 0xEE..=0xEF => (3, 0x80, 0xBF),
        0xF0 => (4, 0x90, 0xBF),
        0xF1..=0xF3 => (4, 0x80, 0xBF),
        0xF4 => (4, 0x80, 0x8F),
        _ => return (1, 1),
    };
    let mut i = 1;
    while i < len {
        if i >= bytes.len() {
            return (i, 1);
        }
        let (lo, hi) = if i == 1 { (second_lo, second_hi) } else { (0x80, 0xBF) };
        if bytes[i] < lo || bytes[i] > hi {
            return (i, 1);
        }
        i += 1;
    }
    (len, if len == 4 { 2 } else { 1 })
}

/// Byte offset within `bytes` at which `column` UTF-16 units have been
/// consumed.
///
/// Walks one codepoint at a time. Stops at the end of `bytes` when the column
/// lies beyond it. A column that falls between the two halves of a surrogate
/// pair rounds forward past the whole codepoint.
#[must_use]
pub fn byte_offset_of_column(bytes: &[u8], column: usize) -> usize {
    let mut offset = 0;
    let mut units = 0;
    while offset < bytes.len() && units < column {
        let (step, width) = sequence_widths(&bytes[offset..]);
        offset += step;
        units += width;
    }
    offset
}
