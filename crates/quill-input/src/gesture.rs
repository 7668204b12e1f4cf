// SPDX-License-Identifier: MIT

//! Gesture classification.
//!
//! [`GestureRecognizer`] turns a stream of [`GestureEvent`]s into at most one
//! [`GestureResult`] per event. It remembers just enough of the current touch
//! session to do so:
//!
//! ```text
//!   TOUCH_DOWN ──► (tap candidate) ──MOVE > slop──► SCROLL ... (not a tap)
//!        │                │
//!        │             TOUCH_UP ──► DOUBLE_TAP | LONG_PRESS | TAP
//!        │
//!   POINTER_DOWN ──► (two fingers) ──MOVE──► SCALE | FAST_SCROLL
//! ```
//!
//! Time comes from the events themselves, so the recognizer is a pure
//! function of its inputs and needs no clock. It knows nothing about
//! documents or layout.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::event::{EventType, GestureEvent, PointF};

// ---------------------------------------------------------------------------
// TouchConfig
// ---------------------------------------------------------------------------

/// Thresholds for gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    /// Movement (px) below which a press still counts as a tap.
    pub touch_slop: f32,
    /// Max gap (ms) between two taps of a double tap.
    pub double_tap_timeout: u64,
    /// Press duration (ms) beyond which a tap becomes a long press.
    pub long_press_ms: u64,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            touch_slop: 10.0,
            double_tap_timeout: 300,
            long_press_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// GestureType / GestureResult
// ---------------------------------------------------------------------------

/// What a gesture was classified as. Discriminants are the wire values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum GestureType {
    #[default]
    Undefined = 0,
    Tap = 1,
    DoubleTap = 2,
    LongPress = 3,
    Scale = 4,
    Scroll = 5,
    FastScroll = 6,
}

impl GestureType {
    /// True for the kinds that carry a tap point.
    #[inline]
    #[must_use]
    pub const fn is_tap_like(self) -> bool {
        matches!(self, Self::Tap | Self::DoubleTap | Self::LongPress)
    }

    /// True for the kinds that carry a scroll delta.
    #[inline]
    #[must_use]
    pub const fn is_scroll(self) -> bool {
        matches!(self, Self::Scroll | Self::FastScroll)
    }
}

/// A classified gesture and its payload. Only the fields relevant to `kind`
/// are meaningful; the rest hold their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureResult {
    #[serde(rename = "type")]
    pub kind: GestureType,
    pub tap_point: PointF,
    /// Multiplicative scale change for [`GestureType::Scale`].
    pub scale: f32,
    /// Scroll delta for the scroll kinds, already negated (content moves
    /// opposite to the finger).
    pub scroll_x: f32,
    pub scroll_y: f32,
}

impl Default for GestureResult {
    fn default() -> Self {
        Self {
            kind: GestureType::Undefined,
            tap_point: PointF::default(),
            scale: 1.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

impl GestureResult {
    /// No gesture.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tap(kind: GestureType, point: PointF) -> Self {
        Self {
            kind,
            tap_point: point,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scale(ratio: f32) -> Self {
        Self {
            kind: GestureType::Scale,
            scale: ratio,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scroll(kind: GestureType, scroll_x: f32, scroll_y: f32) -> Self {
        Self {
            kind,
            scroll_x,
            scroll_y,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.kind == GestureType::Undefined
    }

    /// Compact little-endian encoding for host bindings: an `i32` type
    /// followed by the payload floats for that type.
    ///
    /// | type                         | payload              |
    /// |------------------------------|----------------------|
    /// | TAP, DOUBLE_TAP, LONG_PRESS  | `x: f32, y: f32`     |
    /// | SCALE                        | `scale: f32`         |
    /// | SCROLL, FAST_SCROLL          | `dx: f32, dy: f32`   |
    /// | UNDEFINED                    | none                 |
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&i32::from(self.kind as u8).to_le_bytes());
        let payload = match self.kind {
            GestureType::Tap | GestureType::DoubleTap | GestureType::LongPress => {
                [Some(self.tap_point.x), Some(self.tap_point.y)]
            }
            GestureType::Scale => [Some(self.scale), None],
            GestureType::Scroll | GestureType::FastScroll => {
                [Some(self.scroll_x), Some(self.scroll_y)]
            }
            GestureType::Undefined => [None, None],
        };
        for value in payload.into_iter().flatten() {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// GestureRecognizer
// ---------------------------------------------------------------------------

/// Per-session gesture state machine. See the module docs.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    config: TouchConfig,
    down_points: Vec<PointF>,
    down_time: u64,
    last_move_point: PointF,
    /// Baseline finger distance for the next SCALE ratio.
    last_distance: f32,
    is_tap: bool,
    /// Point and time of the last TAP that may still pair into a double tap.
    last_tap: Option<(PointF, u64)>,
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(TouchConfig::default())
    }
}

impl GestureRecognizer {
    #[must_use]
    pub const fn new(config: TouchConfig) -> Self {
        Self {
            config,
            down_points: Vec::new(),
            down_time: 0,
            last_move_point: PointF::new(0.0, 0.0),
            last_distance: 0.0,
            is_tap: false,
            last_tap: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &TouchConfig {
        &self.config
    }

    pub const fn set_config(&mut self, config: TouchConfig) {
        self.config = config;
    }

    /// Feed one event and return its classification (possibly none).
    pub fn handle(&mut self, event: &GestureEvent) -> GestureResult {
        let Some(&first) = event.points.first() else {
            return GestureResult::none();
        };
        let result = match event.kind {
            EventType::MouseDown => {
                self.down_points.clone_from(&event.points);
                self.down_time = event.time;
                self.click(first, event.time)
            }
            EventType::TouchDown => {
                self.down_points.clone_from(&event.points);
                self.down_time = event.time;
                self.last_move_point = first;
                self.is_tap = true;
                GestureResult::none()
            }
            EventType::TouchPointerDown => {
                self.down_points.clone_from(&event.points);
                if let [a, b, ..] = self.down_points[..] {
                    self.last_distance = a.distance(b);
                }
                self.is_tap = false;
                GestureResult::none()
            }
            EventType::TouchPointerUp => {
                self.down_points.clone_from(&event.points);
                self.last_move_point = first;
                self.is_tap = false;
                GestureResult::none()
            }
            EventType::TouchMove => self.on_move(&event.points),
            EventType::TouchUp => self.on_up(event.time),
            EventType::TouchCancel | EventType::Undefined => GestureResult::none(),
        };
        if !result.is_none() {
            trace!(kind = ?result.kind, time = event.time, "gesture classified");
        }
        result
    }

    fn double_tap_pending(&self, point: PointF, time: u64) -> bool {
        self.last_tap.is_some_and(|(tap_point, tap_time)| {
            time.saturating_sub(tap_time) <= self.config.double_tap_timeout
                && point.distance(tap_point) < self.config.touch_slop
        })
    }

    fn click(&mut self, point: PointF, time: u64) -> GestureResult {
        if self.double_tap_pending(point, time) {
            self.is_tap = false;
            self.last_tap = None;
            GestureResult::tap(GestureType::DoubleTap, point)
        } else {
            self.is_tap = true;
            self.last_tap = Some((point, time));
            GestureResult::tap(GestureType::Tap, point)
        }
    }

    fn on_move(&mut self, points: &[PointF]) -> GestureResult {
        match (self.down_points.as_slice(), points) {
            ([_], [current, ..]) => {
                let current = *current;
                if current.distance(self.last_move_point) <= self.config.touch_slop {
                    return GestureResult::none();
                }
                self.is_tap = false;
                let dx = current.x - self.last_move_point.x;
                let dy = current.y - self.last_move_point.y;
                self.last_move_point = current;
                GestureResult::scroll(GestureType::Scroll, -dx, -dy)
            }
            ([down0, down1, ..], [current0, current1, ..]) => {
                self.is_tap = false;
                let (dx0, dy0) = (current0.x - down0.x, current0.y - down0.y);
                let (dx1, dy1) = (current1.x - down1.x, current1.y - down1.y);
                let shared_x = shared_displacement(dx0, dx1);
                let shared_y = shared_displacement(dy0, dy1);
                if shared_x.is_some() || shared_y.is_some() {
                    let (sx, sy) = (shared_x.unwrap_or(0.0), shared_y.unwrap_or(0.0));
                    if sx.abs() > sy.abs() {
                        GestureResult::scroll(GestureType::FastScroll, -sx, 0.0)
                    } else {
                        GestureResult::scroll(GestureType::FastScroll, 0.0, -sy)
                    }
                } else {
                    let distance = current0.distance(*current1);
                    let baseline = self.last_distance;
                    self.last_distance = distance;
                    if baseline <= f32::EPSILON {
                        return GestureResult::none();
                    }
                    GestureResult::scale(distance / baseline)
                }
            }
            _ => GestureResult::none(),
        }
    }

    fn on_up(&mut self, time: u64) -> GestureResult {
        if !std::mem::take(&mut self.is_tap) {
            return GestureResult::none();
        }
        let Some(&point) = self.down_points.first() else {
            return GestureResult::none();
        };
        if self.double_tap_pending(point, time) {
            self.last_tap = None;
            GestureResult::tap(GestureType::DoubleTap, point)
        } else if time.saturating_sub(self.down_time) > self.config.long_press_ms {
            // A long press ends any double-tap pairing.
            self.last_tap = None;
            GestureResult::tap(GestureType::LongPress, point)
        } else {
            self.last_tap = Some((point, time));
            GestureResult::tap(GestureType::Tap, point)
        }
    }
}

/// The larger-magnitude of two displacements when they point the same way.
fn shared_displacement(a: f32, b: f32) -> Option<f32> {
    let same_direction = (a > 0.0 && b > 0.0) || (a < 0.0 && b < 0.0);
    same_direction.then(|| if a.abs() >= b.abs() { a } else { b })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
