// SPDX-License-Identifier: MIT

//! Text measurement capability supplied by the host.

use serde::{Deserialize, Serialize};

/// Vertical font metrics, in the measurer's units. `ascent` is negative
/// (above the baseline) and `descent` positive, as platform APIs report them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontMetrics {
    pub ascent: f32,
    pub descent: f32,
}

impl FontMetrics {
    #[must_use]
    pub const fn new(ascent: f32, descent: f32) -> Self {
        Self { ascent, descent }
    }

    /// Height of one unscaled text row.
    #[inline]
    #[must_use]
    pub fn line_height(self) -> f32 {
        self.descent - self.ascent
    }
}

/// Measures text as the host platform renders it.
///
/// Widths are at scale 1; the layout engine applies the view scale itself and
/// memoizes results, so implementations need not cache.
pub trait TextMeasurer {
    /// Advance width of `text` (UTF-16) drawn with style `style_id`.
    fn measure_width(&mut self, text: &[u16], style_id: u32) -> f32;

    /// Metrics of the base font.
    fn font_metrics(&mut self) -> FontMetrics;
}

impl<M: TextMeasurer + ?Sized> TextMeasurer for Box<M> {
    fn measure_width(&mut self, text: &[u16], style_id: u32) -> f32 {
        (**self).measure_width(text, style_id)
    }

    fn font_metrics(&mut self) -> FontMetrics {
        (**self).font_metrics()
    }
}
