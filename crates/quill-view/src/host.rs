// SPDX-License-Identifier: MIT

//! Handle-based host boundary.
//!
//! Platform bindings (JNI, C ABI, managed interop) hold documents and editors
//! as opaque `u64`-packable [`SlotId`] handles instead of pointers.
//! [`EditorHost`] owns both tables. Unknown or freed handles never panic:
//! accessors answer with empty or zero values, and fallible text queries
//! answer `Ok` with an empty value so only real range errors surface.
//!
//! A freed document stays alive while an editor still has it loaded; it is
//! only unreachable through its handle.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use quill_input::{GestureEvent, GestureResult};
use quill_text::{Document, Result, TextPosition};
use tracing::debug;

use crate::editor::{EditorConfig, EditorCore, SharedDocument};
use crate::layout::Viewport;
use crate::measurer::TextMeasurer;
use crate::render::EditorRenderModel;
use crate::slots::{SlotId, SlotTable};

pub type DocumentHandle = SlotId;
pub type EditorHandle = SlotId;

#[derive(Debug, Default)]
pub struct EditorHost {
    documents: SlotTable<SharedDocument>,
    editors: SlotTable<EditorCore>,
}

impl EditorHost {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            documents: SlotTable::new(),
            editors: SlotTable::new(),
        }
    }

    // -- Documents ----------------------------------------------------------

    fn add_document(&mut self, document: Document) -> DocumentHandle {
        let handle = self.documents.insert(Rc::new(RefCell::new(document)));
        debug!(?handle, "document created");
        handle
    }

    pub fn create_document_from_utf8(&mut self, text: &str) -> DocumentHandle {
        self.add_document(Document::from_text(text))
    }

    pub fn create_document_from_utf16(&mut self, text: &[u16]) -> DocumentHandle {
        self.add_document(Document::from_utf16(text))
    }

    /// An unreadable file still yields a handle, to an invalid empty document.
    pub fn create_document_from_file(&mut self, path: &Path) -> DocumentHandle {
        self.add_document(Document::open(path))
    }

    /// Returns whether the handle was live.
    pub fn free_document(&mut self, handle: DocumentHandle) -> bool {
        let freed = self.documents.remove(handle).is_some();
        debug!(?handle, freed, "document freed");
        freed
    }

    #[must_use]
    pub fn document(&self, handle: DocumentHandle) -> Option<&SharedDocument> {
        self.documents.get(handle)
    }

    fn read<R>(&self, handle: DocumentHandle, f: impl FnOnce(&Document) -> R) -> Option<R> {
        let doc = self.documents.get(handle)?.try_borrow().ok()?;
        Some(f(&doc))
    }

    fn write<R>(&self, handle: DocumentHandle, f: impl FnOnce(&mut Document) -> R) -> Option<R> {
        let mut doc = self.documents.get(handle)?.try_borrow_mut().ok()?;
        Some(f(&mut doc))
    }

    #[must_use]
    pub fn document_text(&self, handle: DocumentHandle) -> String {
        self.read(handle, Document::text).unwrap_or_default()
    }

    #[must_use]
    pub fn document_text_utf16(&self, handle: DocumentHandle) -> Vec<u16> {
        self.read(handle, Document::text_utf16).unwrap_or_default()
    }

    /// 0 for an unknown handle.
    #[must_use]
    pub fn line_count(&self, handle: DocumentHandle) -> usize {
        self.read(handle, Document::line_count).unwrap_or(0)
    }

    /// # Errors
    ///
    /// `LineOutOfRange` for a line past the end of a live document.
    pub fn line_text(&self, handle: DocumentHandle, line: usize) -> Result<String> {
        self.read(handle, |doc| doc.line_text(line))
            .unwrap_or_else(|| Ok(String::new()))
    }

    /// # Errors
    ///
    /// `CharIndexOutOfRange` for an index past the end of a live document.
    pub fn position_of(&self, handle: DocumentHandle, index: usize) -> Result<TextPosition> {
        self.write(handle, |doc| doc.position_of(index))
            .unwrap_or_else(|| Ok(TextPosition::default()))
    }

    /// # Errors
    ///
    /// `LineOutOfRange` for a line past the end of a live document.
    pub fn char_index_of(&self, handle: DocumentHandle, position: TextPosition) -> Result<usize> {
        self.write(handle, |doc| doc.char_index_of(position))
            .unwrap_or(Ok(0))
    }

    // -- Editors ------------------------------------------------------------

    pub fn create_editor(
        &mut self,
        touch_slop: f32,
        double_tap_timeout: u64,
        measurer: Box<dyn TextMeasurer>,
    ) -> EditorHandle {
        self.create_editor_with_config(EditorConfig::with_touch(touch_slop, double_tap_timeout), measurer)
    }

    pub fn create_editor_with_config(&mut self, config: EditorConfig, measurer: Box<dyn TextMeasurer>) -> EditorHandle {
        self.editors.insert(EditorCore::new(config, measurer))
    }

    pub fn free_editor(&mut self, handle: EditorHandle) -> bool {
        self.editors.remove(handle).is_some()
    }

    #[must_use]
    pub fn editor(&self, handle: EditorHandle) -> Option<&EditorCore> {
        self.editors.get(handle)
    }

    pub fn editor_mut(&mut self, handle: EditorHandle) -> Option<&mut EditorCore> {
        self.editors.get_mut(handle)
    }

    pub fn set_viewport(&mut self, editor: EditorHandle, width: f32, height: f32) {
        if let Some(editor) = self.editors.get_mut(editor) {
            editor.set_viewport(Viewport::new(width, height));
        }
    }

    /// Returns false when either handle is unknown.
    pub fn load_document(&mut self, editor: EditorHandle, document: DocumentHandle) -> bool {
        let Some(shared) = self.documents.get(document).map(Rc::clone) else {
            return false;
        };
        let Some(editor) = self.editors.get_mut(editor) else {
            return false;
        };
        editor.load_document(shared);
        true
    }

    /// Dispatch a raw pointer event and return the compact result encoding.
    pub fn handle_gesture(&mut self, editor: EditorHandle, kind: u8, pointer_count: usize, coords: &[f32]) -> Vec<u8> {
        self.editors
            .get_mut(editor)
            .map_or_else(GestureResult::none, |editor| editor.handle_raw_event(kind, pointer_count, coords))
            .encode()
    }

    pub fn handle_gesture_event(&mut self, editor: EditorHandle, event: &GestureEvent) -> GestureResult {
        self.editors
            .get_mut(editor)
            .map_or_else(GestureResult::none, |editor| editor.handle_gesture_event(event))
    }

    pub fn reset_measurer(&mut self, editor: EditorHandle) {
        if let Some(editor) = self.editors.get_mut(editor) {
            editor.reset_measurer();
        }
    }

    pub fn render_model(&mut self, editor: EditorHandle) -> EditorRenderModel {
        self.editors
            .get_mut(editor)
            .map(EditorCore::build_render_model)
            .unwrap_or_default()
    }

    /// # Errors
    ///
    /// Fails only if the model holds a non-finite float.
    pub fn render_model_json(&mut self, editor: EditorHandle) -> serde_json::Result<String> {
        self.render_model(editor).to_json()
    }

    /// Text behind a packed run text id of `editor`'s latest frame.
    #[must_use]
    pub fn text_of(&self, editor: EditorHandle, text_id: u64) -> Option<&[u16]> {
        self.editors.get(editor)?.text_of(SlotId::from_u64(text_id))
    }

    /// Free every editor and document. Outstanding handles become stale.
    pub fn release_all(&mut self) {
        debug!(
            editors = self.editors.len(),
            documents = self.documents.len(),
            "releasing all handles"
        );
        self.editors.clear();
        self.documents.clear();
    }
}
