// SPDX-License-Identifier: MIT

//! Raw pointer input as delivered by the host platform.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PointF
// ---------------------------------------------------------------------------

/// A point in view coordinates (pixels).
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Kind of a pointer event. Discriminants are the wire values hosts send.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum EventType {
    #[default]
    Undefined = 0,
    /// First finger down.
    TouchDown = 1,
    /// An additional finger down.
    TouchPointerDown = 2,
    TouchMove = 3,
    /// A finger lifted while others remain.
    TouchPointerUp = 4,
    /// Last finger lifted.
    TouchUp = 5,
    TouchCancel = 6,
    /// Desktop click; classified immediately as a tap or double tap.
    MouseDown = 7,
}

impl EventType {
    /// Decode a wire value. Unknown values map to [`EventType::Undefined`].
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::TouchDown,
            2 => Self::TouchPointerDown,
            3 => Self::TouchMove,
            4 => Self::TouchPointerUp,
            5 => Self::TouchUp,
            6 => Self::TouchCancel,
            7 => Self::MouseDown,
            _ => Self::Undefined,
        }
    }
}

// ---------------------------------------------------------------------------
// GestureEvent
// ---------------------------------------------------------------------------

/// One pointer event: its kind, the active pointer positions, and a
/// timestamp in milliseconds on any monotonic clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default)]
    pub points: Vec<PointF>,
    #[serde(default)]
    pub time: u64,
}

impl GestureEvent {
    #[must_use]
    pub const fn new(kind: EventType, points: Vec<PointF>, time: u64) -> Self {
        Self { kind, points, time }
    }

    /// Build an event from the flat host encoding: `pointer_count` pairs of
    /// `x, y` in `coords`. Pairs missing from `coords` are dropped.
    #[must_use]
    pub fn from_raw(kind: u8, pointer_count: usize, coords: &[f32], time: u64) -> Self {
        let points = coords
            .chunks_exact(2)
            .take(pointer_count)
            .map(|pair| PointF::new(pair[0], pair[1]))
            .collect();
        Self::new(EventType::from_u8(kind), points, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(PointF::new(0.0, 0.0).distance(PointF::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn from_u8_maps_unknown_to_undefined() {
        assert_eq!(EventType::from_u8(5), EventType::TouchUp);
        assert_eq!(EventType::from_u8(7), EventType::MouseDown);
        assert_eq!(EventType::from_u8(42), EventType::Undefined);
    }

    #[test]
    fn from_raw_pairs_coordinates() {
        let event = GestureEvent::from_raw(2, 2, &[1.0, 2.0, 3.0, 4.0], 9);
        assert_eq!(event.kind, EventType::TouchPointerDown);
        assert_eq!(event.points, vec![PointF::new(1.0, 2.0), PointF::new(3.0, 4.0)]);
        assert_eq!(event.time, 9);
    }

    #[test]
    fn from_raw_drops_missing_pairs() {
        let event = GestureEvent::from_raw(1, 3, &[1.0, 2.0, 3.0], 0);
        assert_eq!(event.points, vec![PointF::new(1.0, 2.0)]);
    }

    #[test]
    fn deserializes_script_lines() {
        let event: GestureEvent =
            serde_json::from_str(r#"{"type":"TOUCH_DOWN","points":[{"x":10,"y":10}],"time":5}"#)
                .unwrap();
        assert_eq!(event, GestureEvent::new(EventType::TouchDown, vec![PointF::new(10.0, 10.0)], 5));
    }
}
