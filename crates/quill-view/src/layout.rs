// SPDX-License-Identifier: MIT

//! Layout engine — from document lines to positioned visual runs.
//!
//! The engine does not own the document; [`compose`](LayoutEngine::compose)
//! and friends borrow it per call. What the engine owns is everything derived
//! from measurement:
//!
//! - a **width cache** per `(style, text)` so the host measurer is called at
//!   most once for any string,
//! - a **line cache** holding each visible line's runs, valid while the
//!   document's `is_layout_dirty` flag for that line stays clear,
//! - the **text table** behind every run's [`TextId`].
//!
//! # Frame pipeline
//!
//! ```text
//!  visible_range ──► ensure_line (per visible line) ──► project_run (crop)
//!   scan heights       pieces ─► place (wrap) ─►          scroll, scale,
//!   vs. scroll_y       register texts, set height          gutter offset
//! ```
//!
//! Cached layouts are in unscaled content units with `x` measured from the
//! start of the text area; scale and scroll are applied when projecting.
//! Wrapped layouts depend on the text-area width, so any change to it (view
//! scale, viewport, gutter) relays out every line.
//!
//! # Text ids
//!
//! A run fully inside the viewport reuses the id of its cached text. A run
//! cut by the viewport edge gets a frame-scoped id for the visible substring,
//! released when the next frame is composed. Cached ids are released when
//! their line is laid out again or leaves the visible range.

use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};

use quill_input::PointF;
use quill_text::{Document, TextPosition};
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::decoration::{DecorationManager, InlayContent, LineDecorations};
use crate::measurer::TextMeasurer;
use crate::render::{EditorRenderModel, GuideLine, GuideLineDirection, TextId, VisualLine, VisualRun, VisualRunType};
use crate::slots::SlotTable;

/// Characters whose width spread decides whether a font is monospace.
pub const MONOSPACE_PROBE: &str = "iIl1!.,;:W0@";

// ---------------------------------------------------------------------------
// View parameters
// ---------------------------------------------------------------------------

/// How long lines are broken into rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WrapMode {
    /// One row per line; lines scroll horizontally.
    #[default]
    None,
    /// Break before the character that would overflow.
    CharBreak,
    /// Break at word boundaries; words wider than a row break by character.
    WordBreak,
}

/// The editor surface, in pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// A viewport of at most one pixel in either direction draws nothing.
    #[inline]
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.width > 1.0 && self.height > 1.0
    }
}

/// Zoom and scroll offsets. Scroll is in pixels at the current scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub scale: f32,
    pub scroll_x: f32,
    pub scroll_y: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

/// Layout knobs that do not change per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub wrap_mode: WrapMode,
    pub show_line_numbers: bool,
    /// Space on each side of the line numbers, in pixels.
    pub gutter_padding: f32,
    /// Max population std-dev of probe widths for a monospace font.
    pub monospace_tolerance: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            wrap_mode: WrapMode::None,
            show_line_numbers: true,
            gutter_padding: 8.0,
            monospace_tolerance: 0.5,
        }
    }
}

/// Logical lines intersecting the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRange {
    pub first_line: usize,
    /// Inclusive.
    pub last_line: usize,
    /// View y of the first line's top; negative when clipped above.
    pub first_line_y: f32,
}

impl VisibleRange {
    #[must_use]
    pub const fn lines(&self) -> RangeInclusive<usize> {
        self.first_line..=self.last_line
    }
}

/// Where the caret for a position is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Caret {
    /// View y of the top of the caret's logical line.
    pub line_y: f32,
    /// Top of the caret.
    pub point: PointF,
}

// ---------------------------------------------------------------------------
// Cached line layout
// ---------------------------------------------------------------------------

/// A run of one line, in unscaled units relative to the text area.
#[derive(Debug, Clone, PartialEq)]
struct LaidRun {
    kind: VisualRunType,
    row: usize,
    x: f32,
    width: f32,
    /// Document columns covered; empty for inserted content.
    columns: Range<usize>,
    text_id: TextId,
    style_id: u32,
    icon_id: Option<i32>,
}

impl LaidRun {
    const fn is_document_text(&self) -> bool {
        matches!(self.kind, VisualRunType::Text | VisualRunType::Whitespace)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct LineLayout {
    runs: Vec<LaidRun>,
    rows: usize,
}

/// A run before placement.
#[derive(Debug, Clone)]
struct Piece {
    kind: VisualRunType,
    columns: Range<usize>,
    text: Vec<u16>,
    style_id: u32,
    icon_id: Option<i32>,
}

impl Piece {
    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            kind: self.kind,
            columns: self.columns.start + range.start..self.columns.start + range.end,
            text: self.text[range].to_vec(),
            style_id: self.style_id,
            icon_id: None,
        }
    }
}

struct Placed {
    piece: Piece,
    row: usize,
    x: f32,
    width: f32,
}

// ---------------------------------------------------------------------------
// LayoutEngine
// ---------------------------------------------------------------------------

/// Lays out and crops the visible part of a document.
pub struct LayoutEngine {
    measurer: Box<dyn TextMeasurer>,
    decorations: DecorationManager,
    options: LayoutOptions,
    viewport: Viewport,
    view_state: ViewState,

    line_height: f32,
    is_monospace: bool,
    digit_width: f32,

    widths: HashMap<u32, HashMap<Vec<u16>, f32>>,
    texts: SlotTable<Vec<u16>>,
    lines: HashMap<usize, LineLayout>,
    frame_texts: Vec<TextId>,

    /// Text-area width the cached layouts were wrapped at.
    laid_wrap_width: Option<f32>,
    /// Set when every cached layout must be dropped before the next frame.
    stale: bool,
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("options", &self.options)
            .field("viewport", &self.viewport)
            .field("view_state", &self.view_state)
            .field("line_height", &self.line_height)
            .field("is_monospace", &self.is_monospace)
            .field("cached_lines", &self.lines.len())
            .field("texts", &self.texts.len())
            .finish_non_exhaustive()
    }
}

impl LayoutEngine {
    #[must_use]
    pub fn new(measurer: Box<dyn TextMeasurer>, options: LayoutOptions) -> Self {
        let mut engine = Self {
            measurer,
            decorations: DecorationManager::new(),
            options,
            viewport: Viewport::default(),
            view_state: ViewState::default(),
            line_height: 0.0,
            is_monospace: true,
            digit_width: 0.0,
            widths: HashMap::new(),
            texts: SlotTable::new(),
            lines: HashMap::new(),
            frame_texts: Vec::new(),
            laid_wrap_width: None,
            stale: true,
        };
        engine.reset_measurer();
        engine
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub const fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    #[inline]
    #[must_use]
    pub const fn view_state(&self) -> ViewState {
        self.view_state
    }

    pub const fn set_view_state(&mut self, view_state: ViewState) {
        self.view_state = view_state;
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: LayoutOptions) {
        if options != self.options {
            self.options = options;
            self.stale = true;
        }
    }

    pub fn set_wrap_mode(&mut self, wrap_mode: WrapMode) {
        self.set_options(LayoutOptions {
            wrap_mode,
            ..self.options
        });
    }

    /// Unscaled height of one text row.
    #[inline]
    #[must_use]
    pub const fn line_height(&self) -> f32 {
        self.line_height
    }

    #[inline]
    #[must_use]
    pub const fn is_monospace(&self) -> bool {
        self.is_monospace
    }

    #[inline]
    #[must_use]
    pub const fn decorations(&self) -> &DecorationManager {
        &self.decorations
    }

    /// Decorations for editing. Callers invalidate the affected lines'
    /// layout in the document.
    pub const fn decorations_mut(&mut self) -> &mut DecorationManager {
        &mut self.decorations
    }

    /// Text behind a run id, while the id is live.
    #[must_use]
    pub fn text_of(&self, id: TextId) -> Option<&[u16]> {
        self.texts.get(id).map(Vec::as_slice)
    }

    // -- Measurement --------------------------------------------------------

    fn measure(&mut self, text: &[u16], style_id: u32) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let cache = self.widths.entry(style_id).or_default();
        if let Some(&width) = cache.get(text) {
            return width;
        }
        let width = self.measurer.measure_width(text, style_id);
        cache.insert(text.to_vec(), width);
        width
    }

    /// Re-read font metrics, drop every cached width and layout, and redo
    /// monospace detection. Call after a font change.
    pub fn reset_measurer(&mut self) {
        self.line_height = self.measurer.font_metrics().line_height();
        self.widths.clear();

        let probe: Vec<f32> = MONOSPACE_PROBE
            .encode_utf16()
            .map(|unit| self.measure(&[unit], 0))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let n = probe.len() as f32;
        let mean = probe.iter().sum::<f32>() / n;
        let variance = probe.iter().map(|w| (w - mean).powi(2)).sum::<f32>() / n;
        self.is_monospace = variance.sqrt() < self.options.monospace_tolerance;
        self.digit_width = self.measure(&[u16::from(b'0')], 0);
        self.stale = true;

        debug!(
            line_height = self.line_height,
            monospace = self.is_monospace,
            "measurer reset"
        );
    }

    /// Width of the line-number gutter in pixels, 0 when hidden.
    pub fn gutter_width(&mut self, line_count: usize) -> f32 {
        if !self.options.show_line_numbers {
            return 0.0;
        }
        let widest = line_count.max(1);
        let number_width = if self.is_monospace {
            #[allow(clippy::cast_precision_loss)]
            let digits = (widest.ilog10() + 1) as f32;
            self.digit_width * digits
        } else {
            let label: Vec<u16> = widest.to_string().encode_utf16().collect();
            self.measure(&label, 0)
        };
        number_width.mul_add(self.view_state.scale, self.options.gutter_padding * 2.0)
    }

    // -- Cache management ---------------------------------------------------

    /// Start laying out `doc` from scratch (new document or invalidated
    /// measurements).
    pub fn attach(&mut self, doc: &mut Document) {
        doc.invalidate_layout();
        self.texts.clear();
        self.lines.clear();
        self.frame_texts.clear();
        self.laid_wrap_width = None;
        self.stale = false;
    }

    fn release(&mut self, layout: &LineLayout) {
        for run in &layout.runs {
            self.texts.remove(run.text_id);
        }
    }

    fn release_frame_texts(&mut self) {
        for id in std::mem::take(&mut self.frame_texts) {
            self.texts.remove(id);
        }
    }

    fn evict_outside(&mut self, keep: &RangeInclusive<usize>) {
        let evicted: Vec<usize> = self
            .lines
            .keys()
            .copied()
            .filter(|line| !keep.contains(line))
            .collect();
        for line in evicted {
            if let Some(layout) = self.lines.remove(&line) {
                self.release(&layout);
            }
        }
    }

    fn wrap_width(&self, split_x: f32) -> Option<f32> {
        match self.options.wrap_mode {
            WrapMode::None => None,
            WrapMode::CharBreak | WrapMode::WordBreak => {
                Some(((self.viewport.width - split_x) / self.view_state.scale).max(1.0))
            }
        }
    }

    /// Whether cached layouts still match the options and the wrap width.
    fn in_sync(&self, split_x: f32) -> bool {
        !self.stale && self.wrap_width(split_x) == self.laid_wrap_width
    }

    fn sync(&mut self, doc: &mut Document, split_x: f32) {
        if !self.in_sync(split_x) {
            self.attach(doc);
            self.laid_wrap_width = self.wrap_width(split_x);
        }
    }

    // -- Vertical placement -------------------------------------------------

    fn effective_height(&self, doc: &Document, line: usize) -> f32 {
        doc.line(line)
            .ok()
            .filter(|l| l.has_height())
            .map_or(self.line_height, |l| l.height())
    }

    /// Lines intersecting `[scroll_y, scroll_y + viewport.height]`.
    ///
    /// Unmeasured lines count as one row. `None` for an invalid viewport, an
    /// empty document, or a scroll position past the end.
    #[must_use]
    pub fn visible_range(&self, doc: &Document) -> Option<VisibleRange> {
        if !self.viewport.is_valid() || doc.is_empty() {
            return None;
        }
        let scale = self.view_state.scale;
        let top = self.view_state.scroll_y;
        let bottom = top + self.viewport.height;
        let line_count = doc.line_count();

        let mut acc = 0.0;
        let mut first = None;
        for line in 0..line_count {
            let height = self.effective_height(doc, line) * scale;
            if acc + height > top {
                first = Some((line, acc));
                break;
            }
            acc += height;
        }
        let (first_line, first_top) = first?;

        let mut last_line = first_line;
        let mut acc = first_top + self.effective_height(doc, first_line) * scale;
        for line in first_line + 1..line_count {
            if acc >= bottom {
                break;
            }
            last_line = line;
            acc += self.effective_height(doc, line) * scale;
        }
        Some(VisibleRange {
            first_line,
            last_line,
            first_line_y: first_top - top,
        })
    }

    /// View y of the top of `line`.
    fn line_top(&self, doc: &Document, line: usize) -> f32 {
        let above: f32 = (0..line).map(|l| self.effective_height(doc, l)).sum();
        above * self.view_state.scale - self.view_state.scroll_y
    }

    // -- Line layout --------------------------------------------------------

    fn ensure_line(&mut self, doc: &mut Document, line: usize) -> Option<&LineLayout> {
        let fresh = self.lines.contains_key(&line)
            && doc.line(line).is_ok_and(|l| !l.is_layout_dirty());
        if !fresh {
            let text = doc.resolve_line(line).ok()?.cached_text().to_vec();
            let decorations = self.decorations.line(line).cloned();
            let pieces = split_pieces(&text, decorations.as_ref());
            let placed = self.place(pieces);
            let layout = self.register(placed);
            #[allow(clippy::cast_precision_loss)]
            let height = layout.rows as f32 * self.line_height;
            if let Some(old) = self.lines.insert(line, layout) {
                self.release(&old);
            }
            doc.set_line_height(line, height);
            doc.mark_line_laid_out(line);
        }
        self.lines.get(&line)
    }

    fn piece_width(&mut self, piece: &Piece) -> f32 {
        if piece.icon_id.is_some() {
            self.line_height
        } else {
            self.measure(&piece.text, piece.style_id)
        }
    }

    fn place(&mut self, pieces: Vec<Piece>) -> Vec<Placed> {
        let mut placed = Vec::with_capacity(pieces.len());
        let Some(avail) = self.laid_wrap_width else {
            let mut x = 0.0;
            for piece in pieces {
                let width = self.piece_width(&piece);
                placed.push(Placed { piece, row: 0, x, width });
                x += width;
            }
            return placed;
        };

        let mut row = 0;
        let mut x = 0.0;
        for piece in pieces {
            if !matches!(piece.kind, VisualRunType::Text | VisualRunType::Whitespace) {
                let width = self.piece_width(&piece);
                if x > 0.0 && x + width > avail {
                    row += 1;
                    x = 0.0;
                }
                placed.push(Placed { piece, row, x, width });
                x += width;
                continue;
            }

            // Break opportunities, each narrow enough to fit a row unless it
            // is a single character.
            let mut atoms = Vec::new();
            if self.options.wrap_mode == WrapMode::WordBreak {
                for word in word_ranges(&piece.text) {
                    if self.measure(&piece.text[word.clone()], piece.style_id) > avail {
                        atoms.extend(code_points(&piece.text[word.clone()]).map(|cp| cp.start + word.start..cp.end + word.start));
                    } else {
                        atoms.push(word);
                    }
                }
            } else {
                atoms.extend(code_points(&piece.text));
            }

            let mut open: Option<(Range<usize>, f32, f32)> = None;
            for atom in atoms {
                let width = self.measure(&piece.text[atom.clone()], piece.style_id);
                if x > 0.0 && x + width > avail {
                    if let Some((range, start_x, run_width)) = open.take() {
                        placed.push(Placed { piece: piece.slice(range), row, x: start_x, width: run_width });
                    }
                    row += 1;
                    x = 0.0;
                }
                open = Some(match open {
                    Some((range, start_x, run_width)) => (range.start..atom.end, start_x, run_width + width),
                    None => (atom, x, width),
                });
                x += width;
            }
            if let Some((range, start_x, run_width)) = open {
                placed.push(Placed { piece: piece.slice(range), row, x: start_x, width: run_width });
            }
        }
        placed
    }

    fn register(&mut self, placed: Vec<Placed>) -> LineLayout {
        let rows = placed.iter().map(|p| p.row + 1).max().unwrap_or(1);
        let runs = placed
            .into_iter()
            .map(|Placed { piece, row, x, width }| LaidRun {
                kind: piece.kind,
                row,
                x,
                width,
                columns: piece.columns,
                text_id: self.texts.insert(piece.text),
                style_id: piece.style_id,
                icon_id: piece.icon_id,
            })
            .collect();
        LineLayout { runs, rows }
    }

    // -- Frame composition --------------------------------------------------

    /// Lay out the visible lines of `doc` and build the frame's render model
    /// (without cursor; the editor core fills that in).
    pub fn compose(&mut self, doc: &mut Document) -> EditorRenderModel {
        self.release_frame_texts();
        if !self.viewport.is_valid() {
            return EditorRenderModel::default();
        }
        let split_x = self.gutter_width(doc.line_count());
        self.sync(doc, split_x);

        let mut model = EditorRenderModel {
            split_x,
            ..EditorRenderModel::default()
        };
        if self.options.show_line_numbers {
            model.guide_lines.push(GuideLine {
                direction: GuideLineDirection::Vertical,
                start: PointF::new(split_x, 0.0),
                end: PointF::new(split_x, self.viewport.height),
            });
        }
        let Some(range) = self.visible_range(doc) else {
            return model;
        };

        let scale = self.view_state.scale;
        let row_height = self.line_height * scale;
        let mut y = range.first_line_y;
        for line in range.lines() {
            let Some(layout) = self.ensure_line(doc, line) else {
                break;
            };
            let layout = layout.clone();
            let mut rows: Vec<VisualLine> = (0..layout.rows)
                .map(|wrap_index| VisualLine {
                    logical_line: line,
                    wrap_index,
                    runs: Vec::new(),
                })
                .collect();
            for run in &layout.runs {
                #[allow(clippy::cast_precision_loss)]
                let run_y = (run.row as f32).mul_add(row_height, y);
                if let Some(visual) = self.project_run(run, run_y, split_x) {
                    rows[run.row].runs.push(visual);
                }
            }
            model.lines.extend(rows);
            y += self.effective_height(doc, line) * scale;
        }
        self.evict_outside(&range.lines());

        debug!(
            first = range.first_line,
            last = range.last_line,
            rows = model.lines.len(),
            live_texts = self.texts.len(),
            "composed frame"
        );
        model
    }

    /// Position a cached run in view coordinates, cropping it to the text
    /// area when lines do not wrap.
    fn project_run(&mut self, run: &LaidRun, y: f32, split_x: f32) -> Option<VisualRun> {
        let scale = self.view_state.scale;
        let visual = |x: f32, text_id: TextId| VisualRun {
            kind: run.kind,
            x,
            y,
            text_id,
            style_id: run.style_id,
            icon_id: run.icon_id,
        };
        if self.laid_wrap_width.is_some() {
            return Some(visual(run.x.mul_add(scale, split_x), run.text_id));
        }

        let left = split_x;
        let right = self.viewport.width;
        let x0 = run.x.mul_add(scale, split_x) - self.view_state.scroll_x;
        let x1 = run.width.mul_add(scale, x0);
        if x1 <= left || x0 >= right {
            return None;
        }
        if (x0 >= left && x1 <= right) || run.icon_id.is_some() {
            return Some(visual(x0, run.text_id));
        }

        let text = self.texts.get(run.text_id)?.clone();
        let mut cx = x0;
        let mut start = None;
        let mut end = text.len();
        for cp in code_points(&text) {
            let width = self.measure(&text[cp.clone()], run.style_id) * scale;
            if start.is_none() {
                if cx + width <= left {
                    cx += width;
                    continue;
                }
                start = Some((cp.start, cx));
            }
            if cx + width > right {
                end = cp.start;
                break;
            }
            cx += width;
        }
        let (start, start_x) = start?;
        if start >= end {
            return None;
        }
        let id = self.texts.insert(text[start..end].to_vec());
        self.frame_texts.push(id);
        Some(visual(start_x, id))
    }

    // -- Caret and hit testing ----------------------------------------------

    /// Row and unscaled x of `column` within a laid-out line.
    fn column_offset(&mut self, layout: &LineLayout, column: usize) -> (usize, f32) {
        for run in layout.runs.iter().filter(|r| r.is_document_text()) {
            if run.columns.contains(&column) {
                let prefix = column - run.columns.start;
                let text = self.texts.get(run.text_id).cloned().unwrap_or_default();
                let width = self.measure(&text[..prefix.min(text.len())], run.style_id);
                return (run.row, run.x + width);
            }
        }
        layout
            .runs
            .iter()
            .rev()
            .find(|r| r.is_document_text())
            .map_or((0, 0.0), |r| (r.row, r.x + r.width))
    }

    /// Caret placement for `position` (line clamped to the document, column
    /// clamped to the line).
    pub fn caret(&mut self, doc: &mut Document, position: TextPosition) -> Option<Caret> {
        let line = position.line.min(doc.line_count().saturating_sub(1));
        let line_y = self.line_top(doc, line);
        let layout = self.ensure_line(doc, line)?.clone();
        let (row, x) = self.column_offset(&layout, position.column);

        let scale = self.view_state.scale;
        let split_x = self.gutter_width(doc.line_count());
        let scroll_x = if self.laid_wrap_width.is_some() {
            0.0
        } else {
            self.view_state.scroll_x
        };
        #[allow(clippy::cast_precision_loss)]
        let y = (row as f32 * self.line_height).mul_add(scale, line_y);
        Some(Caret {
            line_y,
            point: PointF::new(x.mul_add(scale, split_x) - scroll_x, y),
        })
    }

    /// The document position under view point `(x, y)`, snapping to the
    /// nearest character boundary.
    ///
    /// Hit testing works against the last composed layout and never
    /// re-attaches, so text ids handed out for the current frame stay valid.
    /// `None` while a full relayout is pending (options or wrap width changed
    /// since the last [`compose`](Self::compose)).
    pub fn position_at(&mut self, doc: &mut Document, x: f32, y: f32) -> Option<TextPosition> {
        let scale = self.view_state.scale;
        if scale <= 0.0 {
            return None;
        }
        let line_count = doc.line_count();
        let split_x = self.gutter_width(line_count);
        if !self.in_sync(split_x) {
            return None;
        }

        let content_y = y + self.view_state.scroll_y;
        let mut line = line_count.saturating_sub(1);
        let mut line_top = None;
        let mut acc = 0.0;
        for l in 0..line_count {
            let height = self.effective_height(doc, l) * scale;
            if acc + height > content_y {
                line = l;
                line_top = Some(acc);
                break;
            }
            acc += height;
        }
        // Below the last line: hit its last row.
        let line_top = line_top.unwrap_or_else(|| acc - self.effective_height(doc, line) * scale);

        let layout = self.ensure_line(doc, line)?.clone();
        let row_height = self.line_height * scale;
        let row = if row_height > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let row = ((content_y - line_top) / row_height).floor().max(0.0) as usize;
            row.min(layout.rows - 1)
        } else {
            0
        };
        let scroll_x = if self.laid_wrap_width.is_some() {
            0.0
        } else {
            self.view_state.scroll_x
        };
        let content_x = (x - split_x + scroll_x) / scale;

        let row_runs: Vec<&LaidRun> = layout.runs.iter().filter(|r| r.row == row).collect();
        for run in &row_runs {
            if content_x >= run.x + run.width {
                continue;
            }
            if !run.is_document_text() {
                return Some(TextPosition::new(line, run.columns.start));
            }
            let text = self.texts.get(run.text_id).cloned().unwrap_or_default();
            let mut cx = run.x;
            for cp in code_points(&text) {
                let width = self.measure(&text[cp.clone()], run.style_id);
                if content_x < cx + width / 2.0 {
                    return Some(TextPosition::new(line, run.columns.start + cp.start));
                }
                cx += width;
            }
            return Some(TextPosition::new(line, run.columns.end));
        }
        let column = row_runs.last().map_or(0, |r| r.columns.end);
        Some(TextPosition::new(line, column))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const fn is_high_surrogate(unit: u16) -> bool {
    matches!(unit, 0xD800..=0xDBFF)
}

const fn is_low_surrogate(unit: u16) -> bool {
    matches!(unit, 0xDC00..=0xDFFF)
}

/// Unit ranges of each codepoint in `text`. Unpaired surrogates stand alone.
fn code_points(text: &[u16]) -> impl Iterator<Item = Range<usize>> + '_ {
    let mut i = 0;
    std::iter::from_fn(move || {
        let &unit = text.get(i)?;
        let len = if is_high_surrogate(unit) && text.get(i + 1).is_some_and(|&u| is_low_surrogate(u)) {
            2
        } else {
            1
        };
        let range = i..i + len;
        i += len;
        Some(range)
    })
}

/// Unit ranges of the word-boundary segments of `text`.
fn word_ranges(text: &[u16]) -> Vec<Range<usize>> {
    let decoded = String::from_utf16_lossy(text);
    let mut start = 0;
    decoded
        .split_word_bounds()
        .map(|word| {
            let len: usize = word.chars().map(char::len_utf16).sum();
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Move `column` off the second half of a surrogate pair.
fn snap_to_code_point(text: &[u16], column: usize) -> usize {
    if column > 0
        && column < text.len()
        && is_low_surrogate(text[column])
        && is_high_surrogate(text[column - 1])
    {
        column + 1
    } else {
        column
    }
}

const fn is_space(unit: u16) -> bool {
    matches!(unit, 0x20 | 0x09 | 0x3000)
}

/// Split a line into unplaced runs: style spans and whitespace split the
/// text; inlay hints and phantom texts are inserted before their column.
fn split_pieces(text: &[u16], decorations: Option<&LineDecorations>) -> Vec<Piece> {
    let len = text.len();
    let Some(decorations) = decorations else {
        if len == 0 {
            return Vec::new();
        }
        return vec![Piece {
            kind: VisualRunType::Text,
            columns: 0..len,
            text: text.to_vec(),
            style_id: 0,
            icon_id: None,
        }];
    };

    let anchor = |column: usize| snap_to_code_point(text, column.min(len));
    let mut boundaries = vec![0, len];
    for span in &decorations.spans {
        boundaries.push(anchor(span.column));
        boundaries.push(anchor(span.end()));
    }
    boundaries.extend(decorations.inlay_hints.iter().map(|h| anchor(h.column)));
    boundaries.extend(decorations.phantom_texts.iter().map(|p| anchor(p.column)));
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut inlays = decorations.inlay_hints.iter().peekable();
    let mut phantoms = decorations.phantom_texts.iter().peekable();
    let mut pieces = Vec::new();
    for (i, &start) in boundaries.iter().enumerate() {
        while let Some(hint) = inlays.next_if(|h| anchor(h.column) <= start) {
            let (text, icon_id) = match &hint.content {
                InlayContent::Text { text } => (text.encode_utf16().collect(), None),
                InlayContent::Icon { icon_id } => (Vec::new(), Some(*icon_id)),
            };
            pieces.push(Piece {
                kind: VisualRunType::InlayHint,
                columns: start..start,
                text,
                style_id: 0,
                icon_id,
            });
        }
        while let Some(phantom) = phantoms.next_if(|p| anchor(p.column) <= start) {
            pieces.push(Piece {
                kind: VisualRunType::PhantomText,
                columns: start..start,
                text: phantom.text.encode_utf16().collect(),
                style_id: 0,
                icon_id: None,
            });
        }
        let Some(&end) = boundaries.get(i + 1) else {
            break;
        };
        let style_id = decorations
            .spans
            .iter()
            .rev()
            .find(|s| s.column <= start && start < s.end())
            .map_or(0, |s| s.style_id);

        let mut run_start = start;
        while run_start < end {
            let space = is_space(text[run_start]);
            let run_end = (run_start + 1..end)
                .find(|&j| is_space(text[j]) != space)
                .unwrap_or(end);
            pieces.push(Piece {
                kind: if space {
                    VisualRunType::Whitespace
                } else {
                    VisualRunType::Text
                },
                columns: run_start..run_end,
                text: text[run_start..run_end].to_vec(),
                style_id,
                icon_id: None,
            });
            run_start = run_end;
        }
    }
    pieces
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::{InlayHint, PhantomText, StyleSpan};
    use crate::measurer::FontMetrics;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Every codepoint is `advance` wide; rows are 10 high.
    struct FixedMeasurer {
        advance: f32,
        calls: Rc<Cell<usize>>,
    }

    impl TextMeasurer for FixedMeasurer {
        fn measure_width(&mut self, text: &[u16], _style_id: u32) -> f32 {
            self.calls.set(self.calls.get() + 1);
            #[allow(clippy::cast_precision_loss)]
            let count = char::decode_utf16(text.iter().copied()).count() as f32;
            count * self.advance
        }

        fn font_metrics(&mut self) -> FontMetrics {
            FontMetrics::new(-8.0, 2.0)
        }
    }

    /// Narrow `i`/`l`, wide `W`/`@`, everything else 10.
    struct ProportionalMeasurer;

    impl TextMeasurer for ProportionalMeasurer {
        fn measure_width(&mut self, text: &[u16], _style_id: u32) -> f32 {
            String::from_utf16_lossy(text)
                .chars()
                .map(|c| match c {
                    'i' | 'l' | '!' | '.' | ',' | ';' | ':' => 4.0,
                    'W' | '@' => 16.0,
                    _ => 10.0,
                })
                .sum()
        }

        fn font_metrics(&mut self) -> FontMetrics {
            FontMetrics::new(-12.0, 4.0)
        }
    }

    fn engine_with(options: LayoutOptions, width: f32, height: f32) -> (LayoutEngine, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let measurer = FixedMeasurer {
            advance: 10.0,
            calls: Rc::clone(&calls),
        };
        let mut engine = LayoutEngine::new(Box::new(measurer), options);
        engine.set_viewport(Viewport::new(width, height));
        (engine, calls)
    }

    fn engine(width: f32, height: f32) -> LayoutEngine {
        let options = LayoutOptions {
            show_line_numbers: false,
            ..LayoutOptions::default()
        };
        engine_with(options, width, height).0
    }

    fn run_text(engine: &LayoutEngine, run: &VisualRun) -> String {
        String::from_utf16_lossy(engine.text_of(run.text_id).unwrap())
    }

    fn numbered(lines: usize) -> Document {
        let text: Vec<String> = (0..lines).map(|i| format!("line {i}")).collect();
        Document::from_text(&text.join("\n"))
    }

    #[test]
    fn invalid_viewport_or_empty_document_draws_nothing() {
        let mut doc = Document::from_text("abc");
        let mut tiny = engine(1.0, 100.0);
        assert!(tiny.compose(&mut doc).is_empty());

        let mut e = engine(100.0, 100.0);
        let mut empty = Document::new();
        assert!(e.compose(&mut empty).is_empty());
        assert_eq!(e.visible_range(&empty), None);
    }

    #[test]
    fn visible_range_brackets_the_viewport() {
        let doc = numbered(100);
        let mut e = engine(200.0, 55.0);
        e.set_view_state(ViewState {
            scroll_y: 25.0,
            ..ViewState::default()
        });
        let range = e.visible_range(&doc).unwrap();
        assert_eq!(range.first_line, 2);
        assert_eq!(range.last_line, 7);
        assert_eq!(range.first_line_y, -5.0);

        // Accumulated heights bracket [scroll_y, scroll_y + height].
        let top_of_first = 10.0 * 2.0;
        let bottom_of_last = 10.0 * 8.0;
        assert!(top_of_first <= 25.0 && 25.0 < top_of_first + 10.0);
        assert!(bottom_of_last >= 80.0);

        e.set_viewport(Viewport::new(200.0, 95.0));
        let wider = e.visible_range(&doc).unwrap();
        assert_eq!(wider.first_line, range.first_line);
        assert!(wider.last_line >= range.last_line);
    }

    #[test]
    fn scrolled_past_the_end_is_empty() {
        let mut doc = numbered(3);
        let mut e = engine(100.0, 50.0);
        e.set_view_state(ViewState {
            scroll_y: 500.0,
            ..ViewState::default()
        });
        assert!(e.compose(&mut doc).is_empty());
    }

    #[test]
    fn undecorated_lines_are_single_text_runs() {
        let mut doc = Document::from_text("hello\n\nworld");
        let mut e = engine(200.0, 100.0);
        let model = e.compose(&mut doc);
        assert_eq!(model.lines.len(), 3);
        assert_eq!(model.visible_lines(), Some((0, 2)));
        assert_eq!(model.lines[0].runs.len(), 1);
        assert_eq!(run_text(&e, &model.lines[0].runs[0]), "hello");
        assert!(model.lines[1].runs.is_empty());
        let world = &model.lines[2].runs[0];
        assert_eq!((world.kind, world.x, world.y), (VisualRunType::Text, 0.0, 20.0));
        assert_eq!(doc.line(2).unwrap().height(), 10.0);
        assert!(!doc.line(2).unwrap().is_layout_dirty());
    }

    #[test]
    fn cached_text_ids_are_stable_until_an_edit() {
        let mut doc = Document::from_text("abc\ndef");
        let mut e = engine(200.0, 100.0);
        let first = e.compose(&mut doc).lines[1].runs[0].text_id;
        let second = e.compose(&mut doc).lines[1].runs[0].text_id;
        assert_eq!(first, second);

        doc.insert(TextPosition::new(1, 3), "!").unwrap();
        let model = e.compose(&mut doc);
        let third = &model.lines[1].runs[0];
        assert_eq!(run_text(&e, third), "def!");
        assert_eq!(e.text_of(first), None);
    }

    #[test]
    fn widths_are_measured_once() {
        let options = LayoutOptions {
            show_line_numbers: false,
            ..LayoutOptions::default()
        };
        let (mut e, calls) = engine_with(options, 200.0, 100.0);
        let mut doc = Document::from_text("same\nsame\nsame");
        let before = calls.get();
        e.compose(&mut doc);
        assert_eq!(calls.get() - before, 1);
    }

    #[test]
    fn horizontal_crop_trims_to_whole_characters() {
        let mut doc = Document::from_text("abcdefghij");
        let mut e = engine(45.0, 20.0);
        e.set_view_state(ViewState {
            scroll_x: 15.0,
            ..ViewState::default()
        });
        let model = e.compose(&mut doc);
        let run = &model.lines[0].runs[0];
        assert_eq!(run_text(&e, run), "bcdef");
        assert_eq!(run.x, -5.0);

        // Cropped ids live for one frame only.
        let cropped = run.text_id;
        e.compose(&mut doc);
        assert_eq!(e.text_of(cropped), None);
    }

    #[test]
    fn crop_never_splits_a_surrogate_pair() {
        let mut doc = Document::from_text("a😀b");
        // Emoji spans 10..20; the right edge at 12 cuts it.
        let mut e = engine(12.0, 20.0);
        let model = e.compose(&mut doc);
        assert_eq!(run_text(&e, &model.lines[0].runs[0]), "a");

        e.set_view_state(ViewState {
            scroll_x: 15.0,
            ..ViewState::default()
        });
        let model = e.compose(&mut doc);
        let run = &model.lines[0].runs[0];
        assert_eq!(run_text(&e, run), "😀");
        assert_eq!(run.x, -5.0);
    }

    #[test]
    fn runs_outside_the_text_area_are_dropped() {
        let mut doc = Document::from_text("abc");
        let mut e = engine(50.0, 20.0);
        e.set_view_state(ViewState {
            scroll_x: 40.0,
            ..ViewState::default()
        });
        assert!(e.compose(&mut doc).lines[0].runs.is_empty());
    }

    #[test]
    fn monospace_detection() {
        let e = engine(100.0, 100.0);
        assert!(e.is_monospace());
        assert_eq!(e.line_height(), 10.0);

        let proportional = LayoutEngine::new(Box::new(ProportionalMeasurer), LayoutOptions::default());
        assert!(!proportional.is_monospace());
        assert_eq!(proportional.line_height(), 16.0);
    }

    #[test]
    fn gutter_grows_with_line_count_and_scale() {
        let (mut e, _) = engine_with(LayoutOptions::default(), 300.0, 100.0);
        assert_eq!(e.gutter_width(9), 10.0 + 16.0);
        assert_eq!(e.gutter_width(100), 30.0 + 16.0);
        e.set_view_state(ViewState {
            scale: 2.0,
            ..ViewState::default()
        });
        assert_eq!(e.gutter_width(100), 60.0 + 16.0);

        let mut hidden = engine(300.0, 100.0);
        assert_eq!(hidden.gutter_width(100), 0.0);
    }

    #[test]
    fn gutter_offsets_runs_and_adds_a_guide_line() {
        let (mut e, _) = engine_with(LayoutOptions::default(), 300.0, 100.0);
        let mut doc = Document::from_text("x");
        let model = e.compose(&mut doc);
        assert_eq!(model.split_x, 26.0);
        assert_eq!(model.lines[0].runs[0].x, 26.0);
        assert_eq!(model.guide_lines.len(), 1);
        assert_eq!(model.guide_lines[0].end, PointF::new(26.0, 100.0));
    }

    #[test]
    fn scale_multiplies_positions() {
        let mut doc = Document::from_text("ab\ncd");
        let mut e = engine(300.0, 100.0);
        e.set_view_state(ViewState {
            scale: 2.0,
            ..ViewState::default()
        });
        let model = e.compose(&mut doc);
        assert_eq!(model.lines[1].runs[0].y, 20.0);
        let caret = e.caret(&mut doc, TextPosition::new(1, 1)).unwrap();
        assert_eq!(caret.point, PointF::new(20.0, 20.0));
    }

    #[test]
    fn decorations_split_runs() {
        let mut doc = Document::from_text("ab cd");
        let mut e = engine(300.0, 100.0);
        e.decorations_mut().set_spans(0, vec![StyleSpan::new(0, 2, 7)]);
        e.decorations_mut().add_inlay_hint(0, InlayHint::text(3, "x:"));
        e.decorations_mut().add_phantom_text(0, PhantomText::new(5, "ef"));
        e.decorations_mut().add_inlay_hint(0, InlayHint::icon(0, 42));
        let model = e.compose(&mut doc);
        let runs: Vec<(VisualRunType, f32, u32, String)> = model.lines[0]
            .runs
            .iter()
            .map(|r| (r.kind, r.x, r.style_id, run_text(&e, r)))
            .collect();
        assert_eq!(
            runs,
            vec![
                (VisualRunType::InlayHint, 0.0, 0, String::new()),
                (VisualRunType::Text, 10.0, 7, "ab".to_string()),
                (VisualRunType::Whitespace, 30.0, 0, " ".to_string()),
                (VisualRunType::InlayHint, 40.0, 0, "x:".to_string()),
                (VisualRunType::Text, 60.0, 0, "cd".to_string()),
                (VisualRunType::PhantomText, 80.0, 0, "ef".to_string()),
            ]
        );
        assert_eq!(model.lines[0].runs[0].icon_id, Some(42));
    }

    #[test]
    fn caret_sits_after_inlays_and_before_phantom_text() {
        let mut doc = Document::from_text("ab");
        let mut e = engine(300.0, 100.0);
        e.decorations_mut().add_inlay_hint(0, InlayHint::text(1, "::"));
        e.decorations_mut().add_phantom_text(0, PhantomText::new(2, "zz"));
        e.compose(&mut doc);
        let at = |e: &mut LayoutEngine, doc: &mut Document, column| e.caret(doc, TextPosition::new(0, column)).unwrap().point.x;
        assert_eq!(at(&mut e, &mut doc, 0), 0.0);
        assert_eq!(at(&mut e, &mut doc, 1), 30.0);
        assert_eq!(at(&mut e, &mut doc, 2), 40.0);
        assert_eq!(at(&mut e, &mut doc, 9), 40.0);
    }

    #[test]
    fn char_break_wraps_rows() {
        let mut doc = Document::from_text("abcdefghij\nk");
        let mut e = engine(45.0, 100.0);
        e.set_wrap_mode(WrapMode::CharBreak);
        let model = e.compose(&mut doc);
        let rows: Vec<(usize, usize, String)> = model
            .lines
            .iter()
            .map(|l| (l.logical_line, l.wrap_index, run_text(&e, &l.runs[0])))
            .collect();
        assert_eq!(
            rows,
            vec![
                (0, 0, "abcd".to_string()),
                (0, 1, "efgh".to_string()),
                (0, 2, "ij".to_string()),
                (1, 0, "k".to_string()),
            ]
        );
        assert_eq!(doc.line(0).unwrap().height(), 30.0);
        assert_eq!(model.lines[3].runs[0].y, 30.0);
    }

    #[test]
    fn word_break_keeps_words_whole() {
        let mut doc = Document::from_text("aa bb cc\nabcdefghij");
        let mut e = engine(45.0, 100.0);
        e.set_wrap_mode(WrapMode::WordBreak);
        let model = e.compose(&mut doc);
        let rows: Vec<String> = model
            .lines
            .iter()
            .map(|l| l.runs.iter().map(|r| run_text(&e, r)).collect())
            .collect();
        assert_eq!(rows, vec!["aa ", "bb ", "cc", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_ignores_horizontal_scroll_and_relayouts_on_resize() {
        let mut doc = Document::from_text("abcdefghij");
        let mut e = engine(45.0, 100.0);
        e.set_wrap_mode(WrapMode::CharBreak);
        e.set_view_state(ViewState {
            scroll_x: 30.0,
            ..ViewState::default()
        });
        let model = e.compose(&mut doc);
        assert_eq!(model.lines[0].runs[0].x, 0.0);
        assert_eq!(model.lines.len(), 3);

        e.set_viewport(Viewport::new(105.0, 100.0));
        let model = e.compose(&mut doc);
        assert_eq!(model.lines.len(), 1);
        assert_eq!(doc.line(0).unwrap().height(), 10.0);
    }

    #[test]
    fn hit_testing_snaps_to_nearest_boundary() {
        let mut doc = Document::from_text("abcd\nxy");
        let mut e = engine(300.0, 100.0);
        e.compose(&mut doc);
        assert_eq!(e.position_at(&mut doc, 24.0, 5.0), Some(TextPosition::new(0, 2)));
        assert_eq!(e.position_at(&mut doc, 26.0, 5.0), Some(TextPosition::new(0, 3)));
        assert_eq!(e.position_at(&mut doc, 200.0, 15.0), Some(TextPosition::new(1, 2)));
        assert_eq!(e.position_at(&mut doc, -5.0, 500.0), Some(TextPosition::new(1, 0)));
    }

    #[test]
    fn hit_testing_keeps_frame_text_ids() {
        let mut doc = Document::from_text("abcd");
        let mut e = engine(300.0, 100.0);
        let id = e.compose(&mut doc).lines[0].runs[0].text_id;

        e.set_wrap_mode(WrapMode::CharBreak);
        assert_eq!(e.position_at(&mut doc, 24.0, 5.0), None);
        assert_eq!(e.text_of(id), Some("abcd".encode_utf16().collect::<Vec<_>>().as_slice()));

        e.compose(&mut doc);
        assert_eq!(e.text_of(id), None);
        assert_eq!(e.position_at(&mut doc, 24.0, 5.0), Some(TextPosition::new(0, 2)));
    }

    #[test]
    fn hit_testing_wrapped_rows() {
        let mut doc = Document::from_text("abcdefghij");
        let mut e = engine(45.0, 100.0);
        e.set_wrap_mode(WrapMode::CharBreak);
        e.compose(&mut doc);
        assert_eq!(e.position_at(&mut doc, 12.0, 15.0), Some(TextPosition::new(0, 5)));
        assert_eq!(e.position_at(&mut doc, 40.0, 25.0), Some(TextPosition::new(0, 10)));
        let caret = e.caret(&mut doc, TextPosition::new(0, 9)).unwrap();
        assert_eq!(caret.point, PointF::new(10.0, 20.0));
    }

    #[test]
    fn reset_measurer_drops_cached_layout() {
        let mut doc = Document::from_text("abc");
        let mut e = engine(300.0, 100.0);
        let id = e.compose(&mut doc).lines[0].runs[0].text_id;
        e.reset_measurer();
        let model = e.compose(&mut doc);
        assert_eq!(e.text_of(id), None);
        assert_eq!(run_text(&e, &model.lines[0].runs[0]), "abc");
    }

    #[test]
    fn lines_leaving_the_viewport_release_their_texts() {
        let mut doc = numbered(50);
        let mut e = engine(200.0, 30.0);
        let top = e.compose(&mut doc).lines[0].runs[0].text_id;
        e.set_view_state(ViewState {
            scroll_y: 200.0,
            ..ViewState::default()
        });
        let model = e.compose(&mut doc);
        assert_eq!(model.lines[0].logical_line, 20);
        assert_eq!(e.text_of(top), None);
    }

    #[test]
    fn split_pieces_snaps_span_edges_to_code_points() {
        let text: Vec<u16> = "a😀b".encode_utf16().collect();
        let decorations = LineDecorations {
            spans: vec![StyleSpan::new(2, 2, 1)],
            ..LineDecorations::default()
        };
        let pieces = split_pieces(&text, Some(&decorations));
        let columns: Vec<Range<usize>> = pieces.iter().map(|p| p.columns.clone()).collect();
        assert_eq!(columns, vec![0..3, 3..4]);
        assert_eq!(pieces[1].style_id, 1);
    }
}
