#![forbid(unsafe_code)]

//! Pointer and track geometry primitives.

use serde::{Deserialize, Serialize};

/// A pointer location in container pixels (origin at the track's left edge).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    /// Create a new pointer position.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for PointerPosition {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// One raw pointer sample as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerInput {
    pub position: PointerPosition,
    /// Whether the primary button is held for this sample.
    pub primary_pressed: bool,
}

impl PointerInput {
    /// Sample with the primary button held.
    #[must_use]
    pub const fn pressed(x: f64, y: f64) -> Self {
        Self {
            position: PointerPosition::new(x, y),
            primary_pressed: true,
        }
    }

    /// Sample with no button held.
    #[must_use]
    pub const fn released(x: f64, y: f64) -> Self {
        Self {
            position: PointerPosition::new(x, y),
            primary_pressed: false,
        }
    }
}

/// Pixel geometry of the track container that hosts the timeline.
///
/// The axis occupies `[padding_px, width_px - padding_px]`; the padding keeps
/// entries at the extremes grabbable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackGeometry {
    /// Total container width in pixels.
    pub width_px: f64,
    /// Fixed padding on each horizontal edge.
    pub padding_px: f64,
}

impl TrackGeometry {
    /// Create a new geometry.
    #[must_use]
    pub const fn new(width_px: f64, padding_px: f64) -> Self {
        Self {
            width_px,
            padding_px,
        }
    }

    /// Width available to the axis, or `None` when the container has no
    /// usable span (collapsed, not yet measured, or non-finite).
    #[must_use]
    pub fn usable_width(&self) -> Option<f64> {
        let usable = self.width_px - 2.0 * self.padding_px;
        (usable.is_finite() && self.padding_px >= 0.0 && usable > 0.0).then_some(usable)
    }
}
