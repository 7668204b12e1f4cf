// SPDX-License-Identifier: MIT

//! Decorations — styles, style spans, inlay hints and phantom text.
//!
//! Decorations are stored per logical line and read by the layout engine
//! when it builds a line's runs. Columns are UTF-16 units, like everywhere
//! else in the editor.
//!
//! - **Style spans** split a line's text into differently styled runs.
//! - **Inlay hints** insert a label or icon *between* characters without
//!   changing the text (parameter names, type hints).
//! - **Phantom text** inserts ghost text that is not part of the document
//!   (completion previews).

use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Styles
// ---------------------------------------------------------------------------

bitflags! {
    /// Font variations a style can request from the measurer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct StyleFlags: u8 {
        const BOLD   = 1 << 0;
        const ITALIC = 1 << 1;
    }
}

/// A registered text style. `color` is ARGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Style {
    pub style_id: u32,
    pub color: i32,
    pub flags: StyleFlags,
}

impl Style {
    #[must_use]
    pub const fn new(style_id: u32, color: i32, flags: StyleFlags) -> Self {
        Self {
            style_id,
            color,
            flags,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_bold(&self) -> bool {
        self.flags.contains(StyleFlags::BOLD)
    }

    #[inline]
    #[must_use]
    pub const fn is_italic(&self) -> bool {
        self.flags.contains(StyleFlags::ITALIC)
    }
}

/// Styles by id. Id 0 is the default style and needs no registration.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: HashMap<u32, Style>,
}

impl StyleRegistry {
    /// Register or replace a style.
    pub fn register(&mut self, style: Style) {
        self.styles.insert(style.style_id, style);
    }

    #[must_use]
    pub fn get(&self, style_id: u32) -> Option<&Style> {
        self.styles.get(&style_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Line decorations
// ---------------------------------------------------------------------------

/// `length` UTF-16 units from `column` drawn with `style_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleSpan {
    pub column: usize,
    pub length: usize,
    pub style_id: u32,
}

impl StyleSpan {
    #[must_use]
    pub const fn new(column: usize, length: usize, style_id: u32) -> Self {
        Self {
            column,
            length,
            style_id,
        }
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.column + self.length
    }
}

/// What an inlay hint shows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InlayContent {
    Text { text: String },
    Icon { icon_id: i32 },
}

/// Content inserted before the character at `column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InlayHint {
    pub column: usize,
    #[serde(flatten)]
    pub content: InlayContent,
}

impl InlayHint {
    #[must_use]
    pub fn text(column: usize, text: impl Into<String>) -> Self {
        Self {
            column,
            content: InlayContent::Text { text: text.into() },
        }
    }

    #[must_use]
    pub const fn icon(column: usize, icon_id: i32) -> Self {
        Self {
            column,
            content: InlayContent::Icon { icon_id },
        }
    }
}

/// Ghost text inserted before the character at `column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhantomText {
    pub column: usize,
    pub text: String,
}

impl PhantomText {
    #[must_use]
    pub fn new(column: usize, text: impl Into<String>) -> Self {
        Self {
            column,
            text: text.into(),
        }
    }
}

/// Everything decorating one logical line, each list sorted by column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDecorations {
    pub spans: Vec<StyleSpan>,
    pub inlay_hints: Vec<InlayHint>,
    pub phantom_texts: Vec<PhantomText>,
}

impl LineDecorations {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.inlay_hints.is_empty() && self.phantom_texts.is_empty()
    }
}

// ---------------------------------------------------------------------------
// DecorationManager
// ---------------------------------------------------------------------------

/// Style registry plus per-line decorations.
#[derive(Debug, Clone, Default)]
pub struct DecorationManager {
    styles: StyleRegistry,
    lines: HashMap<usize, LineDecorations>,
}

impl DecorationManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub const fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn register_style(&mut self, style: Style) {
        self.styles.register(style);
    }

    /// Decorations of `line`, if any.
    #[must_use]
    pub fn line(&self, line: usize) -> Option<&LineDecorations> {
        self.lines.get(&line).filter(|d| !d.is_empty())
    }

    /// Replace the style spans of `line`. Zero-length spans are dropped.
    pub fn set_spans(&mut self, line: usize, mut spans: Vec<StyleSpan>) {
        spans.retain(|span| span.length > 0);
        spans.sort_by_key(|span| span.column);
        self.lines.entry(line).or_default().spans = spans;
    }

    pub fn add_inlay_hint(&mut self, line: usize, hint: InlayHint) {
        let hints = &mut self.lines.entry(line).or_default().inlay_hints;
        let at = hints.partition_point(|h| h.column <= hint.column);
        hints.insert(at, hint);
    }

    pub fn add_phantom_text(&mut self, line: usize, phantom: PhantomText) {
        let phantoms = &mut self.lines.entry(line).or_default().phantom_texts;
        let at = phantoms.partition_point(|p| p.column <= phantom.column);
        phantoms.insert(at, phantom);
    }

    /// Remove every decoration from `line`. Returns whether it had any.
    pub fn clear_line(&mut self, line: usize) -> bool {
        self.lines.remove(&line).is_some_and(|d| !d.is_empty())
    }

    /// Remove all line decorations (styles stay registered). Returns the
    /// lines that had any.
    pub fn clear(&mut self) -> Vec<usize> {
        self.lines
            .drain()
            .filter(|(_, d)| !d.is_empty())
            .map(|(line, _)| line)
            .collect()
    }
}
