// SPDX-License-Identifier: MIT

//! Render model — the per-frame snapshot handed to the host.
//!
//! Everything here is plain data in view coordinates (pixels, origin at the
//! top-left of the editor surface, scale and scroll already applied). Run
//! texts are not inlined; each run carries a [`TextId`] the host resolves
//! through the editor.
//!
//! ```text
//! EditorRenderModel
//! ├── split_x, current_line, cursor
//! ├── guide_lines: [GuideLine]
//! └── lines: [VisualLine]
//!     └── runs: [VisualRun { type, x, y, text_id, style_id }]
//! ```

use quill_input::PointF;
use serde::Serialize;

use crate::slots::SlotId;

/// Id of a run's text in the layout engine's text table.
pub type TextId = SlotId;

/// What a visual run draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisualRunType {
    Text,
    Whitespace,
    /// Line terminator marker, for hosts that draw visible newlines. The
    /// layout engine itself ends lines implicitly.
    Newline,
    InlayHint,
    PhantomText,
}

/// A contiguous span of one rendering kind. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualRun {
    #[serde(rename = "type")]
    pub kind: VisualRunType,
    pub x: f32,
    pub y: f32,
    pub text_id: TextId,
    pub style_id: u32,
    /// Icon of an icon inlay hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_id: Option<i32>,
}

/// One screen row of a logical line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualLine {
    pub logical_line: usize,
    /// Row index within the logical line; 0 unless the line wraps.
    pub wrap_index: usize,
    pub runs: Vec<VisualRun>,
}

/// Cursor caret position (top of the caret) and whether the drag handle shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Cursor {
    pub position: PointF,
    pub show_dragger: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuideLineDirection {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GuideLine {
    pub direction: GuideLineDirection,
    pub start: PointF,
    pub end: PointF,
}

/// Everything the host needs to paint one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditorRenderModel {
    /// X of the boundary between the line-number gutter and the text.
    pub split_x: f32,
    /// Top-left of the current-line highlight.
    pub current_line: PointF,
    pub lines: Vec<VisualLine>,
    pub cursor: Cursor,
    pub guide_lines: Vec<GuideLine>,
}

impl EditorRenderModel {
    /// True when there is nothing to draw (no document, invalid viewport).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Logical lines on screen, first and last inclusive.
    #[must_use]
    pub fn visible_lines(&self) -> Option<(usize, usize)> {
        Some((self.lines.first()?.logical_line, self.lines.last()?.logical_line))
    }

    /// Serialize as JSON.
    ///
    /// # Errors
    ///
    /// Fails only if a float is non-finite and the serializer rejects it.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::SlotTable;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_uses_wire_names() {
        let mut texts = SlotTable::new();
        let id = texts.insert(());
        let model = EditorRenderModel {
            split_x: 20.0,
            current_line: PointF::new(0.0, 16.0),
            lines: vec![VisualLine {
                logical_line: 1,
                wrap_index: 0,
                runs: vec![VisualRun {
                    kind: VisualRunType::PhantomText,
                    x: 20.0,
                    y: 16.0,
                    text_id: id,
                    style_id: 0,
                    icon_id: None,
                }],
            }],
            cursor: Cursor {
                position: PointF::new(20.0, 16.0),
                show_dragger: true,
            },
            guide_lines: vec![GuideLine {
                direction: GuideLineDirection::Vertical,
                start: PointF::new(20.0, 0.0),
                end: PointF::new(20.0, 100.0),
            }],
        };
        let json: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        assert_eq!(json["lines"][0]["runs"][0]["type"], "PHANTOM_TEXT");
        assert_eq!(json["lines"][0]["runs"][0]["text_id"], 0);
        assert!(json["lines"][0]["runs"][0].get("icon_id").is_none());
        assert_eq!(json["guide_lines"][0]["direction"], "VERTICAL");
        assert_eq!(json["cursor"]["show_dragger"], true);
        assert_eq!(json["current_line"]["y"], 16.0);
        assert_eq!(model.visible_lines(), Some((1, 1)));
    }
}
