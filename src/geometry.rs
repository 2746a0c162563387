//! Derivation of a path's rendered geometry from its endpoint stages.
//!
//! A path is rendered as a line element anchored at its start point,
//! extending rightward before rotation, and rotated around that anchor.
//! Everything here reproduces that rendering model: the quadrant correction
//! on the angle is not a generic `atan2` and must stay as is, or the sign
//! convention stops matching the rotation transform.

use serde::{Deserialize, Serialize};

use crate::coords::Size;
use crate::graph::StageTelemetry;
use crate::{MAX_PATH_WIDTH_RATIO, MIN_PATH_WIDTH_PX};

/// Derived rendering geometry of one path.
///
/// `x`/`y` are percent of container, `length` and `width` are pixels, `angle`
/// is radians. Always recomputable from the endpoint stages and container
/// size; never authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathTelemetry {
    pub x: f64,
    pub y: f64,
    pub length: f64,
    pub angle: f64,
    pub width: f64,
}

/// Effective stroke width in pixels for a stage of `stage_width_px` and a
/// width factor (default or author override).
///
/// Clamped to at least [`MIN_PATH_WIDTH_PX`] and at most
/// [`MAX_PATH_WIDTH_RATIO`] of the stage width, so neither an invisible nor
/// a stage-swallowing stroke can be configured.
pub fn effective_stroke_width(stage_width_px: f64, width_factor: f64) -> f64 {
    (stage_width_px * width_factor)
        .max(MIN_PATH_WIDTH_PX)
        .min(stage_width_px * MAX_PATH_WIDTH_RATIO)
}

/// Compute the rendered telemetry of a path between two stages.
///
/// Returns `None` when the container has no layout extent yet; the caller
/// must skip the visual update and retry on the next triggering event.
///
/// Two co-located stages produce a non-finite angle (the raw tangent's
/// denominator is zero). That degenerate frame is tolerated, not clamped;
/// callers never panic on it.
pub fn compute_path_telemetry(
    from: &StageTelemetry,
    to: &StageTelemetry,
    map_size: Size,
    width_factor: f64,
) -> Option<PathTelemetry> {
    if !map_size.is_laid_out() {
        return None;
    }

    let from_x_px = from.x / 100.0 * map_size.width;
    let from_y_px = from.y / 100.0 * map_size.height;
    let to_x_px = to.x / 100.0 * map_size.width;
    let to_y_px = to.y / 100.0 * map_size.height;
    let width_px = from.width / 100.0 * map_size.width;
    let height_px = from.height / 100.0 * map_size.height;

    let delta_x_px = from_x_px - to_x_px;
    let delta_y_px = from_y_px - to_y_px;

    // The line extends rightward from its anchor, so when the target lies to
    // the left (delta >= 0) the raw tangent is off by half a turn.
    let angle_offset = if delta_x_px >= 0.0 {
        std::f64::consts::PI
    } else {
        0.0
    };
    let angle = (delta_y_px / delta_x_px).atan() + angle_offset;

    // Start the line on the edge of the circular hotspot, not its center.
    let offset_to_border_x = width_px / 2.0 * angle.cos() * 100.0 / map_size.width;
    let offset_to_border_y = height_px / 2.0 * angle.sin() * 100.0 / map_size.height;

    let width = effective_stroke_width(width_px, width_factor);

    // Center the stroke on the true connecting line.
    let offset_path_stroke = width / 2.0 * 100.0 / map_size.height;

    let x = from.x + from.width / 2.0 + offset_to_border_x;
    let y = from.y + from.height / 2.0 + offset_to_border_y - offset_path_stroke;

    // Circle-edge to circle-edge, assuming a circular hotspot. An
    // approximation for non-square stages.
    let length = (delta_x_px * delta_x_px + delta_y_px * delta_y_px).sqrt() - width_px;

    Some(PathTelemetry {
        x,
        y,
        length,
        angle,
        width,
    })
}
