//! Stage graph and path geometry engine for map-based learning activities.
//!
//! An author places labeled stages on a background image and connects
//! mutually-neighboring stages with paths. The engine keeps the adjacency
//! graph symmetric while stages are dragged around and continuously
//! re-derives each path's rendered geometry (anchor point, length, rotation
//! angle, stroke width) from the stages' percent-of-container telemetry,
//! recomputing only the edges incident to a moved stage where possible.
//!
//! The surrounding editor UI (forms, drag toolbar, dialogs) is out of scope;
//! it talks to [`MapEditor`] through plain method calls and a change
//! callback.

pub mod cli;
pub mod coords;
pub mod editor;
pub mod geometry;
pub mod graph;
pub mod params;
pub mod registry;

pub use coords::{Axis, Size, to_percent, to_pixels};
pub use editor::{EditTarget, EditorState, MapEditor, MapEditorConfig, StageEdit};
pub use geometry::{PathTelemetry, compute_path_telemetry, effective_stroke_width};
pub use graph::{PartialTelemetry, Stage, StageGraph, StageId, StageKind, StageTelemetry};
pub use params::{ElementParams, MapParams, PathParams, TelemetryParams};
pub use registry::{PathKey, PathRegistry, PathStyle, PathVisual, PathVisuals};

use thiserror::Error;

/// Default stage size as percent of container width. Height gets adjusted to
/// the container ratio so the hotspot renders square. 4.375% is a compromise:
/// feels large on 1920px wide maps but still leaves 42px for accessibility on
/// 960px wide ones.
pub const DEFAULT_STAGE_SIZE_PERCENT: f64 = 4.375;

/// Default stroke width of a path as a fraction of the stage's pixel width.
pub const DEFAULT_PATH_WIDTH_FACTOR: f64 = 0.2;

/// A path stroke is never thinner than this, in pixels.
pub const MIN_PATH_WIDTH_PX: f64 = 1.0;

/// A path stroke is never wider than this fraction of the stage width.
pub const MAX_PATH_WIDTH_RATIO: f64 = 0.3;

/// Label prefix used when generating names for freshly placed stages.
pub const UNNAMED_STAGE_PREFIX: &str = "Unnamed stage";

/// Errors surfaced by the editor engine.
///
/// Layout-not-ready situations are deliberately absent: geometry that cannot
/// be computed yet yields `None` and is retried on the next triggering event.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("unknown stage id {0}")]
    UnknownStage(StageId),

    #[error("invalid telemetry value '{value}' for field '{field}'")]
    InvalidTelemetry { field: &'static str, value: String },

    #[error("operation '{0}' is not allowed in the current editor state")]
    InvalidTransition(&'static str),
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
