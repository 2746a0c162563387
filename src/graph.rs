//! The stage graph: an id-keyed arena of stages plus their symmetric
//! neighbor (adjacency) sets.
//!
//! Stages are keyed by permanent opaque ids assigned at creation, never by
//! position. An earlier generation of this editor indexed neighbors by array
//! position and had to renumber every reference on removal; stable ids
//! eliminate that entire class of bugs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::PathKey;
use crate::{DEFAULT_STAGE_SIZE_PERCENT, UNNAMED_STAGE_PREFIX};

/// Stable, never-reused identifier of a stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StageId(Uuid);

impl StageId {
    pub fn new() -> Self {
        StageId(Uuid::new_v4())
    }
}

impl Default for StageId {
    fn default() -> Self {
        StageId::new()
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stage variant tag. Only the form-rendering layer branches on it; graph and
/// geometry rules are identical for all kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    #[default]
    Stage,
    SpecialStage,
}

/// Position and size of a stage, in percent of the container's pixel
/// bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTelemetry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl StageTelemetry {
    /// Default telemetry for a freshly placed stage: centered, default size,
    /// height scaled by the container's aspect ratio so the hotspot renders
    /// square.
    pub fn centered(aspect_ratio: f64) -> Self {
        let width = DEFAULT_STAGE_SIZE_PERCENT;
        let height = DEFAULT_STAGE_SIZE_PERCENT * aspect_ratio;
        StageTelemetry {
            x: 50.0 - width / 2.0,
            y: 50.0 - height / 2.0,
            width,
            height,
        }
    }
}

/// Partial telemetry update; unspecified axes and dimensions are untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialTelemetry {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl PartialTelemetry {
    pub fn position(x: f64, y: f64) -> Self {
        PartialTelemetry {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }
}

/// One placeable, labeled location on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub id: StageId,
    pub label: String,
    pub kind: StageKind,
    /// Auxiliary variant field, only meaningful for special stages and only
    /// interpreted by the form layer.
    pub special_type: Option<String>,
    pub telemetry: StageTelemetry,
    pub neighbors: BTreeSet<StageId>,
}

/// Ordered collection of stages and their adjacency.
///
/// Invariants held after every completed operation:
/// - neighbor sets are symmetric,
/// - no stage lists itself as a neighbor,
/// - every listed neighbor id refers to an existing stage.
#[derive(Debug, Clone, Default)]
pub struct StageGraph {
    stages: HashMap<StageId, Stage>,
    order: Vec<StageId>,
}

impl StageGraph {
    pub fn new() -> Self {
        StageGraph::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.stages.contains_key(&id)
    }

    pub fn get(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    /// Stages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.order.iter().filter_map(|id| self.stages.get(id))
    }

    /// Insert a new stage with an empty neighbor set and return its id.
    ///
    /// A `None` label generates "Unnamed stage N", counting existing stages
    /// that already carry the prefix.
    pub fn add_stage(
        &mut self,
        label: Option<String>,
        kind: StageKind,
        telemetry: StageTelemetry,
    ) -> StageId {
        let label = label.unwrap_or_else(|| {
            let prefix = format!("{UNNAMED_STAGE_PREFIX} ");
            let unnamed = self
                .iter()
                .filter(|stage| stage.label.starts_with(&prefix))
                .count();
            format!("{prefix}{}", unnamed + 1)
        });

        let id = StageId::new();
        self.stages.insert(
            id,
            Stage {
                id,
                label,
                kind,
                special_type: None,
                telemetry,
                neighbors: BTreeSet::new(),
            },
        );
        self.order.push(id);
        id
    }

    /// Re-insert a fully formed stage, e.g. when loading persisted params.
    /// Neighbor symmetry is the caller's responsibility here; see
    /// [`crate::params::MapParams`] for the repairing loader.
    pub(crate) fn insert_raw(&mut self, stage: Stage) {
        let id = stage.id;
        if self.stages.insert(id, stage).is_none() {
            self.order.push(id);
        }
    }

    /// Remove a stage and every reference to it. Returns false when the id
    /// is unknown.
    pub fn remove_stage(&mut self, id: StageId) -> bool {
        if self.stages.remove(&id).is_none() {
            return false;
        }
        self.order.retain(|other| *other != id);
        for stage in self.stages.values_mut() {
            stage.neighbors.remove(&id);
        }
        true
    }

    /// Make `id`'s neighbor set match `desired`, keeping the relation
    /// symmetric in one pass: every other stage gains or loses `id`
    /// according to whether it appears in `desired`.
    ///
    /// Self references and ids of non-existent stages in `desired` are
    /// ignored.
    pub fn set_neighbors(&mut self, id: StageId, desired: &[StageId]) -> crate::Result<()> {
        if !self.stages.contains_key(&id) {
            return Err(crate::EditorError::UnknownStage(id));
        }

        let desired: BTreeSet<StageId> = desired
            .iter()
            .copied()
            .filter(|other| *other != id && self.stages.contains_key(other))
            .collect();

        for stage in self.stages.values_mut() {
            if stage.id == id {
                stage.neighbors = desired.clone();
            } else if desired.contains(&stage.id) {
                stage.neighbors.insert(id);
            } else {
                stage.neighbors.remove(&id);
            }
        }

        Ok(())
    }

    /// Merge a partial telemetry update into a stage.
    pub fn update_telemetry(
        &mut self,
        id: StageId,
        update: PartialTelemetry,
    ) -> crate::Result<()> {
        let stage = self
            .stages
            .get_mut(&id)
            .ok_or(crate::EditorError::UnknownStage(id))?;

        if let Some(x) = update.x {
            stage.telemetry.x = x;
        }
        if let Some(y) = update.y {
            stage.telemetry.y = y;
        }
        if let Some(width) = update.width {
            stage.telemetry.width = width;
        }
        if let Some(height) = update.height {
            stage.telemetry.height = height;
        }

        Ok(())
    }

    pub fn set_label(&mut self, id: StageId, label: String) -> crate::Result<()> {
        let stage = self
            .stages
            .get_mut(&id)
            .ok_or(crate::EditorError::UnknownStage(id))?;
        stage.label = label;
        Ok(())
    }

    pub fn set_special_type(
        &mut self,
        id: StageId,
        special_type: Option<String>,
    ) -> crate::Result<()> {
        let stage = self
            .stages
            .get_mut(&id)
            .ok_or(crate::EditorError::UnknownStage(id))?;
        stage.special_type = special_type;
        Ok(())
    }

    /// Every unordered neighbor pair exactly once, first-seen in stage
    /// insertion order. The reverse of an emitted pair is never emitted.
    pub fn required_edges(&self) -> Vec<PathKey> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();

        for stage in self.iter() {
            for neighbor in &stage.neighbors {
                let key = PathKey::new(stage.id, *neighbor);
                if seen.insert(key) {
                    edges.push(key);
                }
            }
        }

        edges
    }
}
