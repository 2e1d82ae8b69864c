#![forbid(unsafe_code)]

//! Visible-axis bounds derived from a position set, and the pixel ↔ frame map.
//!
//! A [`CoordinateSystem`] is a pure value recomputed whenever positions
//! change. It never shrinks while it is being extended, which keeps the axis
//! from jumping under the pointer mid-drag.

use cutline_core::{Frame, PositionMap, TrackGeometry};
use serde::{Deserialize, Serialize};

/// Default number of frames of slack on each side of the outermost entries.
pub const DEFAULT_FRAME_PADDING: Frame = 30;

/// `{min, max, range}` of the visible axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoordinateSystem {
    pub min: Frame,
    pub max: Frame,
    pub range: Frame,
    /// Padding applied when bounds are extended to include a new frame.
    pub padding: Frame,
}

impl CoordinateSystem {
    /// Bounds of an empty timeline. `range == 0`; see [`is_degenerate`](Self::is_degenerate).
    pub const EMPTY: Self = Self {
        min: 0,
        max: 0,
        range: 0,
        padding: 0,
    };

    /// Derive bounds from the current positions.
    ///
    /// `min = lowest − padding`, `max = highest + padding`. An empty map
    /// yields `{0, 0, 0}`.
    #[must_use]
    pub fn from_positions(positions: &PositionMap, padding: Frame) -> Self {
        let padding = padding.max(0);
        match (positions.min_frame(), positions.max_frame()) {
            (Some(lo), Some(hi)) => {
                let min = lo.saturating_sub(padding);
                let max = hi.saturating_add(padding);
                Self {
                    min,
                    max,
                    range: max - min,
                    padding,
                }
            }
            _ => Self {
                padding,
                ..Self::EMPTY
            },
        }
    }

    /// Whether the axis has zero span. Pixel mapping is undefined here.
    #[inline]
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.range <= 0
    }

    /// Whether `frame` lies within `[min, max]`.
    #[inline]
    #[must_use]
    pub const fn contains(&self, frame: Frame) -> bool {
        frame >= self.min && frame <= self.max
    }

    /// Grow the bounds (with padding) so `frame` is visible. Never shrinks.
    pub fn extend_to(&mut self, frame: Frame) {
        let lo = frame.saturating_sub(self.padding);
        let hi = frame.saturating_add(self.padding);
        self.min = self.min.min(lo);
        self.max = self.max.max(hi);
        self.range = self.max - self.min;
    }

    /// Smallest bounds covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        let min = self.min.min(other.min);
        let max = self.max.max(other.max);
        Self {
            min,
            max,
            range: max - min,
            padding: self.padding.max(other.padding),
        }
    }

    /// Map a pointer X (container pixels) to a frame.
    ///
    /// The result is clamped below at `0` but not above: dragging past the
    /// right edge yields frames beyond `max`, and the caller extends the
    /// bounds. Returns `None` for a degenerate axis or unusable geometry.
    #[must_use]
    pub fn frame_at(&self, pointer_x: f64, geometry: &TrackGeometry) -> Option<Frame> {
        if self.is_degenerate() || !pointer_x.is_finite() {
            return None;
        }
        let usable = geometry.usable_width()?;
        let fraction = (pointer_x - geometry.padding_px) / usable;
        let frame = (self.min as f64 + fraction * self.range as f64).round();
        if !frame.is_finite() {
            return None;
        }
        Some((frame as Frame).max(0))
    }

    /// Pixel X at which `frame` is drawn. Inverse of [`frame_at`](Self::frame_at)
    /// up to rounding.
    #[must_use]
    pub fn pixel_for(&self, frame: Frame, geometry: &TrackGeometry) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        let usable = geometry.usable_width()?;
        let fraction = (frame - self.min) as f64 / self.range as f64;
        Some(geometry.padding_px + fraction * usable)
    }
}
