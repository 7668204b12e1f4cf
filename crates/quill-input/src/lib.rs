// SPDX-License-Identifier: MIT

//! # quill-input — Pointer gesture recognition for quill
//!
//! - **[`event`]** — `PointF`, `EventType`, and `GestureEvent` (raw host input)
//! - **[`gesture`]** — `GestureRecognizer`, which classifies events into taps,
//!   double taps, long presses, scrolls, fast scrolls and pinch scales
//!
//! This crate has no knowledge of documents or layout; the editor core
//! interprets the results.

pub mod event;
pub mod gesture;

pub use event::{EventType, GestureEvent, PointF};
pub use gesture::{GestureRecognizer, GestureResult, GestureType, TouchConfig};
