// SPDX-License-Identifier: MIT

//! Piece table — the byte-level storage of a document.
//!
//! A [`TextBuffer`] never rewrites text. It keeps two byte stores:
//!
//! - the **original** content (immutable, possibly a file mapping), and
//! - the **edit buffer**, an append-only `String` that receives every
//!   inserted text,
//!
//! plus an ordered list of [`Segment`]s, each a reference into one of the two
//! stores. Reading the segments in order reconstructs the current text. An
//! insert appends to the edit buffer and splices one segment in (splitting
//! the segment it lands in); a delete shrinks, splits or drops segments. Edit
//! cost is proportional to the number of segments touched, never to the size
//! of the document.
//!
//! ```text
//! original: "hello world"        edits: "big "
//!
//! segments: [Original 0..6] [Edited 0..4] [Original 6..11]
//!   text  = "hello "         "big "         "world"
//! ```
//!
//! All offsets here are **byte** offsets. Lines, characters and UTF-16 are
//! layered on top by [`LineIndex`](crate::LineIndex) and
//! [`Document`](crate::Document).

use crate::source::OriginalSource;

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// Which byte store a segment points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The immutable original content.
    Original,
    /// The append-only edit buffer.
    Edited,
}

/// A contiguous run of bytes taken from one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    pub origin: Origin,
    /// Byte offset into the store named by `origin`.
    pub start: usize,
    /// Byte length. Never zero once an edit has settled.
    pub len: usize,
}

impl Segment {
    #[inline]
    const fn new(origin: Origin, start: usize, len: usize) -> Self {
        Self { origin, start, len }
    }
}

// ---------------------------------------------------------------------------
// TextBuffer
// ---------------------------------------------------------------------------

/// Byte storage for a document: original content, append-only edit buffer and
/// the segment list that stitches them together.
#[derive(Debug, Default)]
pub struct TextBuffer {
    original: OriginalSource,
    edits: String,
    segments: Vec<Segment>,
    len: usize,
}

impl TextBuffer {
    /// Create a buffer whose current text is exactly `original`.
    #[must_use]
    pub fn new(original: OriginalSource) -> Self {
        let len = original.len();
        let segments = if len == 0 {
            Vec::new()
        } else {
            vec![Segment::new(Origin::Original, 0, len)]
        };
        Self {
            original,
            edits: String::new(),
            segments,
            len,
        }
    }

    // -- Accessors ----------------------------------------------------------

    /// Current byte length of the text.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when the current text is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The segment list, in text order.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total bytes ever appended to the edit buffer. Only grows.
    #[inline]
    #[must_use]
    pub const fn edit_buffer_len(&self) -> usize {
        self.edits.len()
    }

    /// The original content this buffer was created from.
    #[inline]
    #[must_use]
    pub const fn original(&self) -> &OriginalSource {
        &self.original
    }

    fn bytes_of(&self, segment: Segment) -> &[u8] {
        let store = match segment.origin {
            Origin::Original => self.original.as_bytes(),
            Origin::Edited => self.edits.as_bytes(),
        };
        &store[segment.start..segment.start + segment.len]
    }

    // -- Reading ------------------------------------------------------------

    /// Copy `len` bytes starting at `start`.
    ///
    /// Clamps to the end of the text: a `start` past the end yields nothing,
    /// a `len` running past the end yields the remaining bytes.
    #[must_use]
    pub fn read(&self, start: usize, len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        self.read_into(start, len, &mut out);
        out
    }

    /// Append `len` bytes starting at `start` to `out`. Same clamping as
    /// [`read`](Self::read).
    pub fn read_into(&self, start: usize, len: usize, out: &mut Vec<u8>) {
        if start >= self.len {
            return;
        }
        let end = start + len.min(self.len - start);
        out.reserve(end - start);

        let mut offset = 0;
        for &segment in &self.segments {
            let seg_start = offset;
            let seg_end = offset + segment.len;
            offset = seg_end;
            if seg_end <= start {
                continue;
            }
            if seg_start >= end {
                break;
            }
            let from = start.max(seg_start) - seg_start;
            let to = end.min(seg_end) - seg_start;
            out.extend_from_slice(&self.bytes_of(segment)[from..to]);
        }
    }

    /// The current text as a sequence of borrowed byte chunks, one per
    /// segment, in order. Nothing is copied.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.segments.iter().map(|&segment| self.bytes_of(segment))
    }

    /// The whole current text as bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.read(0, self.len)
    }

    // -- Editing ------------------------------------------------------------

    /// Insert `text` at byte offset `start`.
    ///
    /// A `start` past the end clamps to the end. Returns the offset actually
    /// used. Empty text is a no-op.
    pub fn insert(&mut self, start: usize, text: &str) -> usize {
        let start = start.min(self.len);
        if text.is_empty() {
            return start;
        }

        let new_segment = Segment::new(Origin::Edited, self.edits.len(), text.len());
        self.edits.push_str(text);

        let mut offset = 0;
        let mut placed = false;
        for i in 0..self.segments.len() {
            let segment = self.segments[i];
            if offset + segment.len > start {
                let split_at = start - offset;
                if split_at == 0 {
                    self.segments.insert(i, new_segment);
                } else {
                    let right = Segment::new(
                        segment.origin,
                        segment.start + split_at,
                        segment.len - split_at,
                    );
                    self.segments[i].len = split_at;
                    self.segments.insert(i + 1, new_segment);
                    self.segments.insert(i + 2, right);
                }
                placed = true;
                break;
            }
            offset += segment.len;
        }
        if !placed {
            self.segments.push(new_segment);
        }

        self.len += text.len();
        start
    }

    /// Delete `len` bytes starting at `start`.
    ///
    /// Both ends clamp to the text. Returns the `(start, len)` actually
    /// removed; a zero `len` is a no-op.
    pub fn delete(&mut self, start: usize, len: usize) -> (usize, usize) {
        let start = start.min(self.len);
        let len = len.min(self.len - start);
        if len == 0 {
            return (start, 0);
        }
        let end = start + len;

        let mut offset = 0;
        let mut i = 0;
        while i < self.segments.len() && offset < end {
            let segment = self.segments[i];
            let seg_start = offset;
            let seg_end = offset + segment.len;
            offset = seg_end;

            let cut_start = seg_start.max(start);
            let cut_end = seg_end.min(end);
            if cut_start >= cut_end {
                i += 1;
                continue;
            }
            let cut = cut_end - cut_start;

            if cut == segment.len {
                self.segments.remove(i);
                continue;
            }
            if cut_start == seg_start {
                // Head removed.
                self.segments[i].start += cut;
                self.segments[i].len -= cut;
            } else if cut_end == seg_end {
                // Tail removed.
                self.segments[i].len -= cut;
            } else {
                // Middle removed: keep the left part, add the right part.
                let left = cut_start - seg_start;
                let right = Segment::new(
                    segment.origin,
                    segment.start + left + cut,
                    segment.len - left - cut,
                );
                self.segments[i].len = left;
                self.segments.insert(i + 1, right);
                i += 1;
            }
            i += 1;
        }

        self.len -= len;
        (start, len)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
