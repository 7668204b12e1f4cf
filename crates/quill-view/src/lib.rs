// SPDX-License-Identifier: MIT

//! # quill-view — Layout and editor orchestration for quill
//!
//! - **[`measurer`]** — `TextMeasurer`, the host's text measurement capability
//! - **[`decoration`]** — styles, style spans, inlay hints and phantom text
//! - **[`layout`]** — `LayoutEngine`: visible range, run building, wrapping,
//!   horizontal crop, caret placement and hit testing
//! - **[`render`]** — `EditorRenderModel`, the per-frame output
//! - **[`editor`]** — `EditorCore`, which applies gestures to the view and
//!   builds render models
//! - **[`host`]** — `EditorHost`, the handle-based boundary for platform
//!   bindings
//! - **[`slots`]** — generation-tagged `SlotTable` behind every handle and run
//!   text id
//!
//! ```text
//!   host ──► EditorHost ──► EditorCore ──► LayoutEngine ──► TextMeasurer
//!                │              │               │
//!                └── Document ◄─┴───────────────┘
//! ```

pub mod decoration;
pub mod editor;
pub mod host;
pub mod layout;
pub mod measurer;
pub mod render;
pub mod slots;

pub use decoration::{
    DecorationManager, InlayContent, InlayHint, LineDecorations, PhantomText, Style, StyleFlags, StyleRegistry,
    StyleSpan,
};
pub use editor::{EditorConfig, EditorCore, SharedDocument};
pub use host::{DocumentHandle, EditorHandle, EditorHost};
pub use layout::{Caret, LayoutEngine, LayoutOptions, ViewState, Viewport, VisibleRange, WrapMode};
pub use measurer::{FontMetrics, TextMeasurer};
pub use render::{Cursor, EditorRenderModel, GuideLine, GuideLineDirection, TextId, VisualLine, VisualRun, VisualRunType};
pub use slots::{SlotId, SlotTable};
