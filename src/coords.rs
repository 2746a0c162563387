//! Conversion between pixel and percent-of-container coordinates.
//!
//! "Percent" throughout the crate always means percent of the container's
//! current pixel bounding box on the given axis. These helpers are the single
//! source of truth for that semantics.

use serde::{Deserialize, Serialize};

/// Axis selector for coordinate conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Pixel size of the map container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    /// Whether both axes have a real layout extent.
    pub fn is_laid_out(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    fn extent(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        }
    }
}

/// Convert a pixel value into percent of the container on `axis`.
///
/// Returns 0 when the container has no extent on that axis yet (not laid
/// out), rather than dividing by zero.
pub fn to_percent(pixels: f64, axis: Axis, container: Size) -> f64 {
    let extent = container.extent(axis);
    if extent == 0.0 {
        return 0.0;
    }
    pixels * 100.0 / extent
}

/// Convert a percent-of-container value into pixels on `axis`.
pub fn to_pixels(percent: f64, axis: Axis, container: Size) -> f64 {
    percent / 100.0 * container.extent(axis)
}
