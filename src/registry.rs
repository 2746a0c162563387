//! The path registry: one visual object per unordered stage pair, reconciled
//! against the graph's required-edge set.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::PathTelemetry;
use crate::graph::StageId;

/// Canonical identity of a path: an unordered stage pair stored with its
/// smaller id first. There is no semantic directionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathKey {
    pub from: StageId,
    pub to: StageId,
}

impl PathKey {
    /// Build the canonical key for a pair. Self pairs are a programming
    /// error; the graph never emits them.
    pub fn new(a: StageId, b: StageId) -> Self {
        debug_assert_ne!(a, b, "a path cannot connect a stage to itself");
        if a <= b {
            PathKey { from: a, to: b }
        } else {
            PathKey { from: b, to: a }
        }
    }

    /// Whether the pair has `id` as one of its endpoints.
    pub fn touches(&self, id: StageId) -> bool {
        self.from == id || self.to == id
    }
}

/// Line style of a path, an author-facing visual choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    #[default]
    Solid,
    Dotted,
    Dashed,
    Double,
}

/// Author-settable visual overrides, independent of derived geometry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathVisuals {
    /// CSS color of the stroke.
    pub color: Option<String>,
    /// Stroke width as a fraction of the stage width, overriding the
    /// configured default factor.
    pub width_factor: Option<f64>,
    pub style: Option<PathStyle>,
}

impl PathVisuals {
    pub fn is_default(&self) -> bool {
        self.color.is_none() && self.width_factor.is_none() && self.style.is_none()
    }
}

/// One path visual: author overrides plus the last derived telemetry pushed
/// to it. The telemetry is a render cache, never a source of truth.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathVisual {
    pub visuals: PathVisuals,
    pub telemetry: Option<PathTelemetry>,
}

/// Sparse collection of path visuals keyed by unordered stage pair.
#[derive(Debug, Clone, Default)]
pub struct PathRegistry {
    paths: HashMap<PathKey, PathVisual>,
}

impl PathRegistry {
    pub fn new() -> Self {
        PathRegistry::default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, key: PathKey) -> bool {
        self.paths.contains_key(&key)
    }

    pub fn get(&self, key: PathKey) -> Option<&PathVisual> {
        self.paths.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathKey, &PathVisual)> {
        self.paths.iter()
    }

    /// Author width override for a pair, fed back into the stroke width
    /// computation instead of the global default factor.
    pub fn width_factor_override(&self, key: PathKey) -> Option<f64> {
        self.paths.get(&key).and_then(|path| path.visuals.width_factor)
    }

    /// Replace the author visuals of an existing pair. Unknown pairs are
    /// ignored; visuals only exist for required edges.
    pub fn set_visuals(&mut self, key: PathKey, visuals: PathVisuals) {
        if let Some(path) = self.paths.get_mut(&key) {
            path.visuals = visuals;
        }
    }

    /// Pre-seed the visuals of a pair that is about to become required, e.g.
    /// when loading persisted params before the first layout pass.
    pub(crate) fn insert_visuals(&mut self, key: PathKey, visuals: PathVisuals) {
        self.paths.entry(key).or_default().visuals = visuals;
    }

    /// Make the visual set match `required`.
    ///
    /// Missing pairs are created with neutral visuals; pairs no longer
    /// required are destroyed. Telemetry is recomputed through `provider`
    /// for every surviving pair, or only for pairs touching `scope` when one
    /// is given (edges between unmoved stages stay valid). A provider
    /// returning `None` (container not laid out) leaves the previous
    /// telemetry untouched.
    pub fn reconcile<F>(&mut self, required: &[PathKey], scope: Option<StageId>, mut provider: F)
    where
        F: FnMut(PathKey, Option<f64>) -> Option<PathTelemetry>,
    {
        let required_set: HashSet<PathKey> = required.iter().copied().collect();

        let before = self.paths.len();
        self.paths.retain(|key, _| required_set.contains(key));
        let removed = before - self.paths.len();

        let mut created = 0;
        let mut updated = 0;

        for key in required {
            let visual = self.paths.entry(*key).or_insert_with(|| {
                created += 1;
                PathVisual::default()
            });

            let in_scope = scope.is_none_or(|id| key.touches(id));
            if !in_scope {
                continue;
            }

            if let Some(telemetry) = provider(*key, visual.visuals.width_factor) {
                visual.telemetry = Some(telemetry);
                updated += 1;
            }
        }

        debug!(created, updated, removed, total = self.paths.len(), "reconciled paths");
    }
}
