// SPDX-License-Identifier: MIT

//! Editor core — ties gestures, view state and layout together.
//!
//! ```text
//!  GestureEvent ──► GestureRecognizer ──► GestureResult
//!                                            │
//!            SCALE: scale *= ratio ◄─────────┤
//!            SCROLL: scroll += delta ◄───────┤
//!            TAP: cursor = hit test ◄────────┘
//!                        │
//!                        ▼
//!      LayoutEngine (view state, viewport) ──► build_render_model
//! ```
//!
//! The document is shared with the host through [`SharedDocument`]; the core
//! borrows it for the duration of a call and never across calls.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use quill_input::{GestureEvent, GestureRecognizer, GestureResult, GestureType, PointF, TouchConfig};
use quill_text::{Document, TextPosition};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decoration::{InlayHint, PhantomText, Style, StyleSpan};
use crate::layout::{LayoutEngine, LayoutOptions, ViewState, Viewport, WrapMode};
use crate::measurer::TextMeasurer;
use crate::render::{Cursor, EditorRenderModel, TextId};

/// A document shared between the host's handle table and its editors.
pub type SharedDocument = Rc<RefCell<Document>>;

// ---------------------------------------------------------------------------
// EditorConfig
// ---------------------------------------------------------------------------

/// Editor construction options. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub touch: TouchConfig,
    /// Upper bound of the view scale; the lower bound is 1.
    pub max_scale: f32,
    #[serde(flatten)]
    pub layout: LayoutOptions,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            touch: TouchConfig::default(),
            max_scale: 4.0,
            layout: LayoutOptions::default(),
        }
    }
}

impl EditorConfig {
    /// Defaults with the given touch thresholds.
    #[must_use]
    pub fn with_touch(touch_slop: f32, double_tap_timeout: u64) -> Self {
        Self {
            touch: TouchConfig {
                touch_slop,
                double_tap_timeout,
                ..TouchConfig::default()
            },
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// EditorCore
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EditorCore {
    config: EditorConfig,
    recognizer: GestureRecognizer,
    layout: LayoutEngine,
    document: Option<SharedDocument>,
    cursor: TextPosition,
    show_dragger: bool,
    /// Origin of the timestamps given to raw events.
    epoch: Instant,
}

impl EditorCore {
    #[must_use]
    pub fn new(config: EditorConfig, measurer: Box<dyn TextMeasurer>) -> Self {
        debug!(?config, "editor created");
        Self {
            config,
            recognizer: GestureRecognizer::new(config.touch),
            layout: LayoutEngine::new(measurer, config.layout),
            document: None,
            cursor: TextPosition::default(),
            show_dragger: false,
            epoch: Instant::now(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub const fn document(&self) -> Option<&SharedDocument> {
        self.document.as_ref()
    }

    // -- View ---------------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.layout.viewport()
    }

    pub const fn set_viewport(&mut self, viewport: Viewport) {
        self.layout.set_viewport(viewport);
    }

    #[inline]
    #[must_use]
    pub const fn view_state(&self) -> ViewState {
        self.layout.view_state()
    }

    /// Set scale and scroll directly, with the same clamping gestures get.
    pub fn set_view_state(&mut self, view_state: ViewState) {
        let max_scale = self.config.max_scale.max(1.0);
        self.layout.set_view_state(ViewState {
            scale: view_state.scale.clamp(1.0, max_scale),
            scroll_x: view_state.scroll_x.max(0.0),
            scroll_y: view_state.scroll_y.max(0.0),
        });
    }

    pub fn set_wrap_mode(&mut self, wrap_mode: WrapMode) {
        self.config.layout.wrap_mode = wrap_mode;
        self.layout.set_wrap_mode(wrap_mode);
    }

    /// Re-read font metrics and drop every measurement.
    pub fn reset_measurer(&mut self) {
        self.layout.reset_measurer();
    }

    // -- Document -----------------------------------------------------------

    /// Attach `document`, replacing any previous one. The cursor moves to
    /// the start.
    pub fn load_document(&mut self, document: SharedDocument) {
        match document.try_borrow_mut() {
            Ok(mut doc) => {
                self.layout.attach(&mut doc);
                debug!(lines = doc.line_count(), "document loaded");
            }
            Err(_) => warn!("document busy while loading; layout deferred"),
        }
        self.document = Some(document);
        self.cursor = TextPosition::default();
        self.show_dragger = false;
    }

    fn with_document<R>(&mut self, f: impl FnOnce(&mut LayoutEngine, &mut Document) -> R) -> Option<R> {
        let shared = self.document.as_ref()?;
        let Ok(mut doc) = shared.try_borrow_mut() else {
            warn!("document is borrowed elsewhere");
            return None;
        };
        Some(f(&mut self.layout, &mut doc))
    }

    // -- Gestures -----------------------------------------------------------

    /// Classify `event` and apply its effect on the view.
    pub fn handle_gesture_event(&mut self, event: &GestureEvent) -> GestureResult {
        let result = self.recognizer.handle(event);
        let mut view = self.view_state();
        match result.kind {
            GestureType::Scale => {
                view.scale *= result.scale;
                self.set_view_state(view);
                self.show_dragger = false;
            }
            GestureType::Scroll | GestureType::FastScroll => {
                view.scroll_x += result.scroll_x;
                view.scroll_y += result.scroll_y;
                self.set_view_state(view);
                self.show_dragger = false;
            }
            GestureType::Tap => {
                if let Some(position) = self.position_at(result.tap_point.x, result.tap_point.y) {
                    self.cursor = position;
                    self.show_dragger = true;
                }
            }
            GestureType::DoubleTap | GestureType::LongPress | GestureType::Undefined => {}
        }
        result
    }

    /// Like [`handle_gesture_event`](Self::handle_gesture_event) for hosts
    /// that pass raw arrays; the event is stamped with the editor's clock.
    pub fn handle_raw_event(&mut self, kind: u8, pointer_count: usize, coords: &[f32]) -> GestureResult {
        let time = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.handle_gesture_event(&GestureEvent::from_raw(kind, pointer_count, coords, time))
    }

    // -- Cursor -------------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> TextPosition {
        self.cursor
    }

    /// Move the cursor, clamped to the loaded document.
    pub fn set_cursor(&mut self, position: TextPosition) {
        let clamped = self.with_document(|_, doc| {
            let line = position.line.min(doc.line_count().saturating_sub(1));
            let columns = doc.line_columns(line).unwrap_or(0);
            TextPosition::new(line, position.column.min(columns))
        });
        self.cursor = clamped.unwrap_or_default();
    }

    /// Document position under view point `(x, y)`.
    pub fn position_at(&mut self, x: f32, y: f32) -> Option<TextPosition> {
        self.with_document(|layout, doc| layout.position_at(doc, x, y)).flatten()
    }

    // -- Rendering ----------------------------------------------------------

    /// Lay out the visible part of the document. Empty without a document
    /// or with an invalid viewport.
    pub fn build_render_model(&mut self) -> EditorRenderModel {
        let cursor = self.cursor;
        let show_dragger = self.show_dragger;
        self.with_document(|layout, doc| {
            let mut model = layout.compose(doc);
            if model.is_empty() {
                return model;
            }
            if let Some(caret) = layout.caret(doc, cursor) {
                model.cursor = Cursor {
                    position: caret.point,
                    show_dragger,
                };
                model.current_line = PointF::new(0.0, caret.line_y);
            }
            model
        })
        .unwrap_or_default()
    }

    /// Text behind a run id of the latest render model.
    #[must_use]
    pub fn text_of(&self, id: TextId) -> Option<&[u16]> {
        self.layout.text_of(id)
    }

    // -- Decorations --------------------------------------------------------

    fn invalidate_line(&mut self, line: usize) {
        self.with_document(|_, doc| doc.invalidate_line_layout(line));
    }

    pub fn register_style(&mut self, style: Style) {
        self.layout.decorations_mut().register_style(style);
    }

    pub fn set_line_spans(&mut self, line: usize, spans: Vec<StyleSpan>) {
        self.layout.decorations_mut().set_spans(line, spans);
        self.invalidate_line(line);
    }

    pub fn add_inlay_hint(&mut self, line: usize, hint: InlayHint) {
        self.layout.decorations_mut().add_inlay_hint(line, hint);
        self.invalidate_line(line);
    }

    pub fn add_phantom_text(&mut self, line: usize, phantom: PhantomText) {
        self.layout.decorations_mut().add_phantom_text(line, phantom);
        self.invalidate_line(line);
    }

    pub fn clear_line_decorations(&mut self, line: usize) {
        if self.layout.decorations_mut().clear_line(line) {
            self.invalidate_line(line);
        }
    }

    pub fn clear_decorations(&mut self) {
        let lines = self.layout.decorations_mut().clear();
        for line in lines {
            self.invalidate_line(line);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurer::FontMetrics;
    use crate::render::VisualRunType;
    use pretty_assertions::assert_eq;
    use quill_input::EventType;

    /// 10px per codepoint, 20px rows.
    struct Cells;

    impl TextMeasurer for Cells {
        fn measure_width(&mut self, text: &[u16], _style_id: u32) -> f32 {
            #[allow(clippy::cast_precision_loss)]
            let count = char::decode_utf16(text.iter().copied()).count() as f32;
            count * 10.0
        }

        fn font_metrics(&mut self) -> FontMetrics {
            FontMetrics::new(-16.0, 4.0)
        }
    }

    fn config() -> EditorConfig {
        EditorConfig {
            layout: LayoutOptions {
                show_line_numbers: false,
                ..LayoutOptions::default()
            },
            ..EditorConfig::default()
        }
    }

    fn editor(text: &str) -> (EditorCore, SharedDocument) {
        let mut editor = EditorCore::new(config(), Box::new(Cells));
        editor.set_viewport(Viewport::new(200.0, 100.0));
        let doc = Rc::new(RefCell::new(Document::from_text(text)));
        editor.load_document(Rc::clone(&doc));
        (editor, doc)
    }

    fn ev(kind: EventType, points: &[(f32, f32)], time: u64) -> GestureEvent {
        GestureEvent::new(kind, points.iter().map(|&(x, y)| PointF::new(x, y)).collect(), time)
    }

    fn tap(editor: &mut EditorCore, x: f32, y: f32, time: u64) -> GestureResult {
        editor.handle_gesture_event(&ev(EventType::TouchDown, &[(x, y)], time));
        editor.handle_gesture_event(&ev(EventType::TouchUp, &[(x, y)], time + 50))
    }

    #[test]
    fn without_a_document_frames_are_empty() {
        let mut editor = EditorCore::new(config(), Box::new(Cells));
        editor.set_viewport(Viewport::new(200.0, 100.0));
        assert!(editor.build_render_model().is_empty());
        assert_eq!(editor.position_at(10.0, 10.0), None);
        let result = tap(&mut editor, 10.0, 10.0, 0);
        assert_eq!(result.kind, GestureType::Tap);
        assert_eq!(editor.cursor(), TextPosition::default());
    }

    #[test]
    fn tap_places_the_cursor_and_shows_the_dragger() {
        let (mut editor, _doc) = editor("hello\nworld");
        editor.build_render_model();
        tap(&mut editor, 31.0, 25.0, 0);
        assert_eq!(editor.cursor(), TextPosition::new(1, 3));

        let model = editor.build_render_model();
        assert_eq!(model.cursor.position, PointF::new(30.0, 20.0));
        assert!(model.cursor.show_dragger);
        assert_eq!(model.current_line, PointF::new(0.0, 20.0));
    }

    #[test]
    fn tap_waits_for_a_frame_after_relayout() {
        let (mut editor, _doc) = editor("hello\nworld");
        let id = editor.build_render_model().lines[0].runs[0].text_id;

        editor.set_wrap_mode(WrapMode::CharBreak);
        tap(&mut editor, 31.0, 25.0, 0);
        assert_eq!(editor.cursor(), TextPosition::default());
        assert!(editor.text_of(id).is_some());

        editor.build_render_model();
        tap(&mut editor, 31.0, 25.0, 10_000);
        assert_eq!(editor.cursor(), TextPosition::new(1, 3));
    }

    #[test]
    fn scroll_moves_the_view_and_clamps_at_zero() {
        let (mut editor, _doc) = editor(&"line\n".repeat(40));
        editor.handle_gesture_event(&ev(EventType::TouchDown, &[(50.0, 90.0)], 0));
        let result = editor.handle_gesture_event(&ev(EventType::TouchMove, &[(50.0, 30.0)], 10));
        assert_eq!(result.kind, GestureType::Scroll);
        assert_eq!(editor.view_state().scroll_y, 60.0);
        assert_eq!(editor.build_render_model().visible_lines().map(|(first, _)| first), Some(3));

        editor.handle_gesture_event(&ev(EventType::TouchMove, &[(50.0, 200.0)], 20));
        assert_eq!(editor.view_state().scroll_y, 0.0);
        assert_eq!(editor.view_state().scroll_x, 0.0);
    }

    #[test]
    fn scroll_hides_the_dragger() {
        let (mut editor, _doc) = editor(&"line\n".repeat(40));
        tap(&mut editor, 5.0, 5.0, 0);
        assert!(editor.build_render_model().cursor.show_dragger);
        editor.handle_gesture_event(&ev(EventType::TouchDown, &[(50.0, 90.0)], 1000));
        editor.handle_gesture_event(&ev(EventType::TouchMove, &[(50.0, 30.0)], 1010));
        assert!(!editor.build_render_model().cursor.show_dragger);
    }

    #[test]
    fn scale_is_clamped() {
        let (mut editor, _doc) = editor("abc");
        let pinch = |editor: &mut EditorCore, from: f32, to: f32| {
            editor.handle_gesture_event(&ev(EventType::TouchDown, &[(0.0, 0.0)], 0));
            editor.handle_gesture_event(&ev(EventType::TouchPointerDown, &[(0.0, 0.0), (from, 0.0)], 0));
            editor.handle_gesture_event(&ev(EventType::TouchMove, &[(0.0, 0.0), (to, 0.0)], 10))
        };
        let result = pinch(&mut editor, 100.0, 200.0);
        assert_eq!(result.kind, GestureType::Scale);
        assert_eq!(editor.view_state().scale, 2.0);

        pinch(&mut editor, 100.0, 1000.0);
        assert_eq!(editor.view_state().scale, 4.0);

        pinch(&mut editor, 100.0, 1.0);
        assert_eq!(editor.view_state().scale, 1.0);
    }

    #[test]
    fn set_cursor_clamps_to_the_document() {
        let (mut editor, _doc) = editor("ab\ncdef");
        editor.set_cursor(TextPosition::new(9, 9));
        assert_eq!(editor.cursor(), TextPosition::new(1, 4));
    }

    #[test]
    fn edits_through_the_shared_document_show_up() {
        let (mut editor, doc) = editor("abc");
        editor.build_render_model();
        doc.borrow_mut().insert(TextPosition::new(0, 3), "def").unwrap();
        let model = editor.build_render_model();
        let run = &model.lines[0].runs[0];
        assert_eq!(String::from_utf16_lossy(editor.text_of(run.text_id).unwrap()), "abcdef");
    }

    #[test]
    fn busy_document_yields_an_empty_frame() {
        let (mut editor, doc) = editor("abc");
        let guard = doc.borrow();
        assert!(editor.build_render_model().is_empty());
        drop(guard);
        assert!(!editor.build_render_model().is_empty());
    }

    #[test]
    fn decorations_relayout_their_line() {
        let (mut editor, _doc) = editor("let x = 1;");
        assert_eq!(editor.build_render_model().lines[0].runs.len(), 1);

        editor.register_style(Style::new(1, 0x7F00_00FF, crate::decoration::StyleFlags::BOLD));
        editor.set_line_spans(0, vec![StyleSpan::new(0, 3, 1)]);
        editor.add_phantom_text(0, PhantomText::new(10, " // ok"));
        let model = editor.build_render_model();
        let kinds: Vec<VisualRunType> = model.lines[0].runs.iter().map(|r| r.kind).collect();
        assert_eq!(kinds.first(), Some(&VisualRunType::Text));
        assert_eq!(kinds.last(), Some(&VisualRunType::PhantomText));
        assert_eq!(model.lines[0].runs[0].style_id, 1);

        editor.clear_decorations();
        assert_eq!(editor.build_render_model().lines[0].runs.len(), 1);
    }

    #[test]
    fn raw_events_are_classified() {
        let (mut editor, _doc) = editor("abc");
        editor.handle_raw_event(EventType::TouchDown as u8, 1, &[5.0, 5.0]);
        let result = editor.handle_raw_event(EventType::TouchUp as u8, 1, &[5.0, 5.0]);
        assert_eq!(result.kind, GestureType::Tap);
    }

    #[test]
    fn config_from_partial_json() {
        let config: EditorConfig =
            serde_json::from_str(r#"{"max_scale": 3.0, "wrap_mode": "WORD_BREAK", "touch": {"touch_slop": 4.0}}"#).unwrap();
        assert_eq!(config.max_scale, 3.0);
        assert_eq!(config.layout.wrap_mode, WrapMode::WordBreak);
        assert!(config.layout.show_line_numbers);
        assert_eq!(config.touch.touch_slop, 4.0);
        assert_eq!(config.touch.double_tap_timeout, 300);
    }
}
