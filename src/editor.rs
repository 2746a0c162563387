//! The map editor controller: owns the stage graph and path registry and
//! mutates them in response to external events (drag, form edits, removal
//! confirmation, visibility and layout changes).
//!
//! No other component mutates the graph or registry. Everything runs
//! synchronously inside one event at a time; the only deferred work is
//! layout-size-dependent (sanitization and reconciliation wait until the
//! host reports a non-zero container size via [`MapEditor::set_container_size`]).

use tracing::debug;

use crate::coords::{Axis, Size, to_percent, to_pixels};
use crate::geometry::{PathTelemetry, compute_path_telemetry};
use crate::graph::{PartialTelemetry, StageGraph, StageId, StageKind, StageTelemetry};
use crate::params::MapParams;
use crate::registry::{PathKey, PathRegistry, PathVisuals};
use crate::{DEFAULT_PATH_WIDTH_FACTOR, EditorError, Result};

/// Engine configuration. Replaces the ambient style source of the original
/// design with explicit values.
#[derive(Debug, Clone, Copy)]
pub struct MapEditorConfig {
    /// Default path stroke width as a fraction of the stage width, used when
    /// a path has no author override.
    pub path_width_factor: f64,
}

impl Default for MapEditorConfig {
    fn default() -> Self {
        MapEditorConfig {
            path_width_factor: DEFAULT_PATH_WIDTH_FACTOR,
        }
    }
}

/// What a modal form is currently editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Stage(StageId),
    Path(PathKey),
}

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Hidden,
    Idle,
    Dragging(StageId),
    Editing(EditTarget),
}

/// Validated stage changes coming back from the external form collaborator.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct StageEdit {
    pub label: Option<String>,
    pub special_type: Option<Option<String>>,
    pub telemetry: Option<PartialTelemetry>,
    pub neighbors: Option<Vec<StageId>>,
}

type ChangeCallback = Box<dyn FnMut(&MapParams)>;

/// Orchestrates [`StageGraph`], [`PathRegistry`] and the geometry resolver in
/// response to host events, and notifies the host when parameters change.
pub struct MapEditor {
    config: MapEditorConfig,
    graph: StageGraph,
    registry: PathRegistry,
    state: EditorState,
    container: Size,
    background: Option<Size>,
    /// One-time clamp of stage positions into the canvas, run on the first
    /// laid-out frame after show(). Prevents stages from drifting off-canvas
    /// after a background aspect-ratio change in an earlier session.
    needs_sanitize: bool,
    pending_removal: Option<StageId>,
    on_changed: Option<ChangeCallback>,
}

impl std::fmt::Debug for MapEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapEditor")
            .field("state", &self.state)
            .field("stages", &self.graph.len())
            .field("paths", &self.registry.len())
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl MapEditor {
    pub fn new(config: MapEditorConfig) -> Self {
        MapEditor {
            config,
            graph: StageGraph::new(),
            registry: PathRegistry::new(),
            state: EditorState::Hidden,
            container: Size::ZERO,
            background: None,
            needs_sanitize: false,
            pending_removal: None,
            on_changed: None,
        }
    }

    /// Restore an editor from persisted params.
    pub fn from_params(params: MapParams, config: MapEditorConfig) -> Result<Self> {
        let (graph, registry) = params.into_state()?;
        let mut editor = MapEditor::new(config);
        editor.graph = graph;
        editor.registry = registry;
        Ok(editor)
    }

    /// Register the host callback invoked after every committed change with
    /// the serializable parameter snapshot.
    pub fn on_changed(&mut self, callback: impl FnMut(&MapParams) + 'static) {
        self.on_changed = Some(Box::new(callback));
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    pub fn container_size(&self) -> Size {
        self.container
    }

    /// Current serializable snapshot.
    pub fn params(&self) -> MapParams {
        MapParams::from_state(&self.graph, &self.registry)
    }

    /// Derived telemetry of one path, if it has been computed since the last
    /// layout.
    pub fn path_telemetry(&self, key: PathKey) -> Option<PathTelemetry> {
        self.registry.get(key).and_then(|path| path.telemetry)
    }

    // --- visibility and layout -------------------------------------------

    /// The editor became visible. Sanitization and reconciliation run now if
    /// the container already has a layout, otherwise as soon as
    /// [`set_container_size`](Self::set_container_size) reports one.
    pub fn show(&mut self) {
        if self.state != EditorState::Hidden {
            return;
        }
        self.state = EditorState::Idle;
        self.needs_sanitize = true;
        if self.container.is_laid_out() {
            self.sanitize_positions();
            self.needs_sanitize = false;
            self.reconcile(None);
        }
    }

    pub fn hide(&mut self) {
        self.state = EditorState::Hidden;
        self.pending_removal = None;
    }

    /// The host finished layout and reports the container's pixel size.
    /// Also the resize handler: every edge's pixel geometry may have
    /// changed, so reconciliation is never scoped here.
    pub fn set_container_size(&mut self, size: Size) {
        self.container = size;
        if self.state == EditorState::Hidden || !size.is_laid_out() {
            return;
        }
        if self.needs_sanitize {
            self.sanitize_positions();
            self.needs_sanitize = false;
        }
        self.reconcile(None);
    }

    /// The background image loaded with the given natural pixel size; the
    /// host calls this whenever a newly selected map image finishes loading.
    /// A changed aspect ratio rescales every stage's percent height so the
    /// visible hotspot size is retained.
    pub fn set_background_size(&mut self, size: Size) {
        if let Some(previous) = self.background {
            if previous != size && previous.is_laid_out() && size.is_laid_out() {
                let scale_factor =
                    size.width / size.height * previous.height / previous.width;
                let ids: Vec<StageId> = self.graph.iter().map(|stage| stage.id).collect();
                for id in ids {
                    let height = self
                        .graph
                        .get(id)
                        .map(|stage| stage.telemetry.height * scale_factor);
                    // Ids were just read from the graph.
                    let _ = self.graph.update_telemetry(
                        id,
                        PartialTelemetry {
                            height,
                            ..Default::default()
                        },
                    );
                }
                self.reconcile(None);
                self.notify_changed();
            }
        }
        self.background = Some(size);
    }

    // --- structural changes ----------------------------------------------

    /// Place a new stage. With no explicit telemetry it is centered at the
    /// default size, height adjusted to the container's aspect ratio; with
    /// no label it gets a generated "Unnamed stage N" name.
    ///
    /// A stage dropped from the host toolbar arrives here; the pointer
    /// release that ends the drop then reports its final position through
    /// [`update_map_element`](Self::update_map_element).
    pub fn create_element(
        &mut self,
        kind: StageKind,
        label: Option<String>,
        telemetry: Option<StageTelemetry>,
    ) -> StageId {
        let telemetry = telemetry.unwrap_or_else(|| {
            let ratio = if self.container.is_laid_out() {
                self.container.width / self.container.height
            } else {
                1.0
            };
            StageTelemetry::centered(ratio)
        });

        let id = self.graph.add_stage(label, kind, telemetry);
        debug!(stage = %id, "created stage");
        self.reconcile(None);
        self.notify_changed();
        id
    }

    /// Position a stage at a percent coordinate (the drag collaborator's
    /// release contract).
    pub fn update_map_element(&mut self, id: StageId, x: f64, y: f64) -> Result<()> {
        self.graph
            .update_telemetry(id, PartialTelemetry::position(x, y))?;
        self.reconcile(Some(id));
        self.notify_changed();
        Ok(())
    }

    // --- dragging ---------------------------------------------------------

    pub fn start_drag(&mut self, id: StageId) -> Result<()> {
        if self.state != EditorState::Idle {
            return Err(EditorError::InvalidTransition("start_drag"));
        }
        if !self.graph.contains(id) {
            return Err(EditorError::UnknownStage(id));
        }
        self.state = EditorState::Dragging(id);
        Ok(())
    }

    /// Per-pointer-move update with a pixel position. Only the edges
    /// incident to the dragged stage are recomputed, bounding per-frame
    /// work.
    pub fn drag_to(&mut self, id: StageId, x_px: f64, y_px: f64) -> Result<()> {
        if self.state != EditorState::Dragging(id) {
            return Err(EditorError::InvalidTransition("drag_to"));
        }
        let x = to_percent(x_px, Axis::X, self.container);
        let y = to_percent(y_px, Axis::Y, self.container);
        self.graph
            .update_telemetry(id, PartialTelemetry::position(x, y))?;
        self.reconcile(Some(id));
        Ok(())
    }

    /// Pointer released at a percent position. A drag without net movement
    /// still reconciles; that is idempotent.
    pub fn end_drag(&mut self, id: StageId, x: f64, y: f64) -> Result<()> {
        if self.state != EditorState::Dragging(id) {
            return Err(EditorError::InvalidTransition("end_drag"));
        }
        self.graph
            .update_telemetry(id, PartialTelemetry::position(x, y))?;
        self.state = EditorState::Idle;
        self.reconcile(Some(id));
        self.notify_changed();
        Ok(())
    }

    // --- modal editing ----------------------------------------------------

    /// A form opened for a stage or path. The form itself is external; the
    /// controller only tracks that editing is in progress.
    pub fn open_editor(&mut self, target: EditTarget) -> Result<()> {
        if self.state != EditorState::Idle {
            return Err(EditorError::InvalidTransition("open_editor"));
        }
        match target {
            EditTarget::Stage(id) if !self.graph.contains(id) => {
                return Err(EditorError::UnknownStage(id));
            }
            EditTarget::Path(key) if !self.registry.contains(key) => {
                return Err(EditorError::InvalidTransition("open_editor"));
            }
            _ => {}
        }
        self.state = EditorState::Editing(target);
        Ok(())
    }

    /// The form collaborator reported "done" with valid fields for a stage.
    /// Applies the changes, keeps the neighbor relation symmetric, and
    /// reconciles the full graph (the neighbor set may have changed
    /// structurally).
    pub fn commit_stage_edit(&mut self, id: StageId, edit: StageEdit) -> Result<()> {
        if self.state != EditorState::Editing(EditTarget::Stage(id)) {
            return Err(EditorError::InvalidTransition("commit_stage_edit"));
        }

        if let Some(label) = edit.label {
            self.graph.set_label(id, label)?;
        }
        if let Some(telemetry) = edit.telemetry {
            self.graph.update_telemetry(id, telemetry)?;
        }
        if let Some(neighbors) = edit.neighbors {
            self.graph.set_neighbors(id, &neighbors)?;
        }
        if let Some(special_type) = edit.special_type {
            self.graph.set_special_type(id, special_type)?;
        }

        self.state = EditorState::Idle;
        self.reconcile(None);
        self.notify_changed();
        Ok(())
    }

    /// The form collaborator reported "done" for a path's visuals.
    pub fn commit_path_edit(&mut self, key: PathKey, visuals: PathVisuals) -> Result<()> {
        if self.state != EditorState::Editing(EditTarget::Path(key)) {
            return Err(EditorError::InvalidTransition("commit_path_edit"));
        }
        self.registry.set_visuals(key, visuals);
        self.state = EditorState::Idle;
        self.reconcile(None);
        self.notify_changed();
        Ok(())
    }

    /// The form was dismissed; nothing was committed.
    pub fn cancel_edit(&mut self) -> Result<()> {
        match self.state {
            EditorState::Editing(_) => {
                self.state = EditorState::Idle;
                Ok(())
            }
            _ => Err(EditorError::InvalidTransition("cancel_edit")),
        }
    }

    // --- removal with confirmation ---------------------------------------

    /// Arm removal of a stage pending the external confirmation dialog.
    /// Nothing is mutated until [`confirm_removal`](Self::confirm_removal).
    pub fn request_removal(&mut self, id: StageId) -> Result<()> {
        if !self.graph.contains(id) {
            return Err(EditorError::UnknownStage(id));
        }
        self.pending_removal = Some(id);
        Ok(())
    }

    /// The confirmation dialog confirmed. Removes the stage, cleans every
    /// neighbor reference, destroys the affected path visuals.
    pub fn confirm_removal(&mut self) -> Option<StageId> {
        let id = self.pending_removal.take()?;
        if !self.graph.remove_stage(id) {
            return None;
        }
        debug!(stage = %id, "removed stage");

        // A form open for the removed stage (or one of its paths) is gone
        // with it.
        if let EditorState::Editing(target) = self.state {
            let affected = match target {
                EditTarget::Stage(stage) => stage == id,
                EditTarget::Path(key) => key.touches(id),
            };
            if affected {
                self.state = EditorState::Idle;
            }
        }

        self.reconcile(None);
        self.notify_changed();
        Some(id)
    }

    /// The confirmation dialog was dismissed; no structural change occurs.
    pub fn dismiss_removal(&mut self) {
        self.pending_removal = None;
    }

    // --- internals --------------------------------------------------------

    /// Clamp every stage's pixel position into `[0, container - stage]` and
    /// convert back to percent.
    fn sanitize_positions(&mut self) {
        let container = self.container;
        let updates: Vec<(StageId, PartialTelemetry)> = self
            .graph
            .iter()
            .filter_map(|stage| {
                let telemetry = stage.telemetry;
                let x_px = to_pixels(telemetry.x, Axis::X, container);
                let y_px = to_pixels(telemetry.y, Axis::Y, container);
                let width_px = to_pixels(telemetry.width, Axis::X, container);
                let height_px = to_pixels(telemetry.height, Axis::Y, container);

                let max_x = (container.width - width_px).max(0.0);
                let max_y = (container.height - height_px).max(0.0);
                let clamped_x = x_px.clamp(0.0, max_x);
                let clamped_y = y_px.clamp(0.0, max_y);

                if clamped_x == x_px && clamped_y == y_px {
                    return None;
                }

                Some((
                    stage.id,
                    PartialTelemetry::position(
                        to_percent(clamped_x, Axis::X, container),
                        to_percent(clamped_y, Axis::Y, container),
                    ),
                ))
            })
            .collect();

        for (id, update) in updates {
            debug!(stage = %id, "clamped off-canvas stage back into view");
            // Ids were just read from the graph.
            let _ = self.graph.update_telemetry(id, update);
        }
    }

    /// Reconcile path visuals against the graph's required edges. With a
    /// scope, only edges touching that stage get fresh telemetry.
    fn reconcile(&mut self, scope: Option<StageId>) {
        let required = self.graph.required_edges();
        let graph = &self.graph;
        let container = self.container;
        let default_factor = self.config.path_width_factor;

        self.registry.reconcile(&required, scope, |key, override_factor| {
            let from = graph.get(key.from);
            let to = graph.get(key.to);
            debug_assert!(
                from.is_some() && to.is_some(),
                "required edge references a missing stage; the graph must be updated first"
            );
            compute_path_telemetry(
                &from?.telemetry,
                &to?.telemetry,
                container,
                override_factor.unwrap_or(default_factor),
            )
        });
    }

    fn notify_changed(&mut self) {
        if self.on_changed.is_none() {
            return;
        }
        let params = MapParams::from_state(&self.graph, &self.registry);
        if let Some(callback) = self.on_changed.as_mut() {
            callback(&params);
        }
    }
}
