//! Vector edition task
//!
//! Drives one editing session over a layer table:
//!
//! ```text
//! Idle --start()--> Active --start_feature_edition(id)--> Editing
//!   ^                 |  ^                                  |
//!   +-----end()-------+  +----end_feature_edition(commit)---+
//! ```
//!
//! Pointer input arrives in display coordinates and is edited in world
//! coordinates. Geometries are stored in the layer reference and only
//! written back to the table when a feature edition is committed, so
//! discarding never needs a rollback.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use geo_types::Coord;

use crate::config::EditConfig;
use crate::domain::{
    Envelope, FeatureId, Geometry, GeometryCollection, GeometryKind, Layer, SelectMode, Srid,
    VertexId,
};
use crate::edit::{GuiGeometryCreator, GuiGeometryEditor};
use crate::error::{EditError, EditResult};
use crate::selection::{FeatureSelection, FeatureSelectionSource, LayerSelectionSource};
use crate::snap::SnapTool;
use crate::table::Table;
use crate::world::{CoordTransform, IdentityTransform, WorldContext, transform_geometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Active,
    Editing,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Idle => write!(f, "idle"),
            TaskState::Active => write!(f, "active"),
            TaskState::Editing => write!(f, "editing a feature"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditMode {
    /// Building a geometry with the creator; `appended` rows were added by
    /// `new_feature` and go away on discard
    Create { appended: bool },
    /// Reshaping an existing geometry with the editor
    Modify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeatureEdit {
    feature: FeatureId,
    mode: EditMode,
}

/// Render overlays, in draw order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Deleted,
    Modified,
    Selected,
    InProgress,
}

/// Geometries of one overlay with the style they are drawn with
#[derive(Debug)]
pub struct OverlayLayer<'a> {
    pub kind: OverlayKind,
    pub style: &'a str,
    pub geometries: Cow<'a, GeometryCollection>,
}

pub struct VectorEditionTask {
    config: EditConfig,
    table: Option<Box<dyn Table>>,
    layer: Option<Layer>,
    world: Option<Box<dyn WorldContext>>,
    transform: Box<dyn CoordTransform>,
    vector_type: Option<GeometryKind>,
    snap: Option<SnapTool>,
    selection: FeatureSelection,
    creator: GuiGeometryCreator,
    editor: GuiGeometryEditor,
    active: bool,
    edited: Option<FeatureEdit>,
    modified: BTreeSet<FeatureId>,
    /// Geometry of each deleted feature, in the layer reference
    deleted: BTreeMap<FeatureId, Option<Geometry>>,
    modified_cache: OnceCell<GeometryCollection>,
    deleted_cache: OnceCell<GeometryCollection>,
}

impl VectorEditionTask {
    pub fn new(config: EditConfig) -> Self {
        let editor = GuiGeometryEditor::new(config.search_margin_px);
        Self {
            config,
            table: None,
            layer: None,
            world: None,
            transform: Box::new(IdentityTransform),
            vector_type: None,
            snap: None,
            selection: FeatureSelection::new(),
            creator: GuiGeometryCreator::new(),
            editor,
            active: false,
            edited: None,
            modified: BTreeSet::new(),
            deleted: BTreeMap::new(),
            modified_cache: OnceCell::new(),
            deleted_cache: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn state(&self) -> TaskState {
        match (self.active, self.edited) {
            (_, Some(_)) => TaskState::Editing,
            (true, None) => TaskState::Active,
            (false, None) => TaskState::Idle,
        }
    }

    fn invalid_state(&self, operation: &'static str) -> EditError {
        EditError::InvalidState {
            operation,
            state: self.state(),
        }
    }

    fn invalidate_caches(&mut self) {
        self.modified_cache.take();
        self.deleted_cache.take();
    }

    fn world_srid(&self) -> Srid {
        self.world.as_ref().map_or(Srid::UNKNOWN, |w| w.srid())
    }

    // Bindings

    /// Bind the table being edited and the layer describing it
    pub fn bind_layer(&mut self, table: Box<dyn Table>, layer: Layer) -> EditResult<()> {
        if self.active {
            return Err(self.invalid_state("bind a layer"));
        }
        layer.geometry_column_index(&*table)?;
        if table.is_read_only() {
            log::info!("Layer {} is read-only", layer.datasource);
        }
        self.table = Some(table);
        self.layer = Some(layer);
        self.invalidate_caches();
        Ok(())
    }

    /// Hand the table back to the host
    pub fn unbind_layer(&mut self) -> EditResult<Option<Box<dyn Table>>> {
        if self.active {
            return Err(self.invalid_state("unbind the layer"));
        }
        self.layer = None;
        self.invalidate_caches();
        Ok(self.table.take())
    }

    pub fn table(&self) -> Option<&dyn Table> {
        self.table.as_deref()
    }

    pub fn layer(&self) -> Option<&Layer> {
        self.layer.as_ref()
    }

    /// Bind the viewport pointer input comes from; call again after a pan or
    /// zoom so pixel tolerances follow
    pub fn set_world(&mut self, world: Box<dyn WorldContext>) -> EditResult<()> {
        if self.edited.is_some() {
            return Err(self.invalid_state("change the viewport"));
        }
        self.world = Some(world);
        self.invalidate_caches();
        self.refresh_snap_buffers();
        Ok(())
    }

    pub fn set_transform(&mut self, transform: Box<dyn CoordTransform>) -> EditResult<()> {
        if self.edited.is_some() {
            return Err(self.invalid_state("change the coordinate transform"));
        }
        self.transform = transform;
        self.invalidate_caches();
        self.refresh_snap_buffers();
        Ok(())
    }

    /// Kind of geometry created for features without one; collections
    /// cannot be entered by pointer
    pub fn set_vector_type(&mut self, kind: GeometryKind) -> EditResult<()> {
        if self.edited.is_some() {
            return Err(self.invalid_state("change the vector type"));
        }
        if kind == GeometryKind::Collection {
            return Err(EditError::InvalidGeometry(kind));
        }
        self.vector_type = Some(kind);
        Ok(())
    }

    pub fn vector_type(&self) -> Option<GeometryKind> {
        self.vector_type
    }

    /// Attach or detach a snap tool; buffers are built right away when the
    /// task is running
    pub fn attach_snap_tool(&mut self, snap: Option<SnapTool>) {
        self.snap = snap;
        if self.active {
            self.refresh_snap_buffers();
        }
    }

    pub fn snap_tool(&self) -> Option<&SnapTool> {
        self.snap.as_ref()
    }

    /// Rebuild the snap buffers from the table for the current viewport;
    /// a feature open in the vertex editor stays out of them
    pub fn refresh_snap_buffers(&mut self) {
        let reshaped = self.reshaped_feature();
        let (Some(snap), Some(table), Some(world)) =
            (self.snap.as_mut(), self.table.as_deref(), self.world.as_deref())
        else {
            return;
        };
        if let Err(err) = snap.create_buffer_geometries(table, world, &*self.transform) {
            log::warn!("Failed to build snap buffers: {}", err);
        }
        if let Some(id) = reshaped {
            snap.remove_feature(id);
        }
    }

    /// Feature whose existing geometry is open in the vertex editor
    fn reshaped_feature(&self) -> Option<FeatureId> {
        self.edited
            .filter(|edit| edit.mode == EditMode::Modify)
            .map(|edit| edit.feature)
    }

    /// Put the stored geometry of `id` back into the snap buffers
    fn restore_snap_buffers(&mut self, id: FeatureId) {
        let (Some(snap), Some(layer), Some(table)) =
            (self.snap.as_mut(), self.layer.as_ref(), self.table.as_deref())
        else {
            return;
        };
        match layer.read_geometry(table, id) {
            Ok(Some(stored)) => {
                snap.add_geometry(id, &stored);
            }
            Ok(None) => {}
            Err(err) => log::warn!("Not snapping to feature {}: {}", id, err),
        }
    }

    pub fn feature_selector(&self) -> &FeatureSelection {
        &self.selection
    }

    pub fn feature_selector_mut(&mut self) -> &mut FeatureSelection {
        &mut self.selection
    }

    // Lifecycle

    pub fn start(&mut self) -> EditResult<()> {
        if self.active {
            return Err(self.invalid_state("start"));
        }
        if self.table.is_none() {
            return Err(EditError::MissingBinding("table"));
        }
        let layer = self.layer.clone().ok_or(EditError::MissingBinding("layer"))?;
        if self.world.is_none() {
            return Err(EditError::MissingBinding("world"));
        }
        if self.vector_type.is_none() {
            return Err(EditError::MissingBinding("vector type"));
        }

        log::info!("Starting vector edition of {}", layer.datasource);
        self.selection
            .set_source(Some(FeatureSelectionSource::Layer(LayerSelectionSource::new(
                layer,
            ))));
        self.modified.clear();
        self.deleted.clear();
        self.invalidate_caches();
        self.active = true;
        self.refresh_snap_buffers();
        Ok(())
    }

    pub fn end(&mut self) -> EditResult<()> {
        if !self.active || self.edited.is_some() {
            return Err(self.invalid_state("end the task"));
        }
        log::info!(
            "Ending vector edition: {} modified, {} deleted",
            self.modified.len(),
            self.deleted.len()
        );
        self.active = false;
        self.selection.set_source(None);
        self.invalidate_caches();
        Ok(())
    }

    fn check_writable(&self) -> EditResult<()> {
        match self.table.as_deref() {
            None => Err(EditError::MissingBinding("table")),
            Some(table) if table.is_read_only() => Err(EditError::ReadOnlyTable),
            Some(_) => Ok(()),
        }
    }

    /// Preconditions shared by every way of opening a feature edition
    fn check_can_open_edit(&self, operation: &'static str) -> EditResult<()> {
        if !self.active {
            return Err(self.invalid_state(operation));
        }
        self.check_writable()?;
        if let Some(edit) = self.edited {
            return Err(EditError::EditInProgress(edit.feature));
        }
        Ok(())
    }

    fn current_edit(&self, operation: &'static str) -> EditResult<FeatureEdit> {
        self.edited.ok_or_else(|| self.invalid_state(operation))
    }

    pub fn edited_feature(&self) -> Option<FeatureId> {
        self.edited.map(|edit| edit.feature)
    }

    /// Open feature `id` for edition: its geometry goes to the vertex editor,
    /// or to the creator when it has none yet
    pub fn start_feature_edition(&mut self, id: FeatureId) -> EditResult<()> {
        self.check_can_open_edit("start a feature edition")?;
        let world_srid = self.world_srid();
        let layer = self.layer.as_ref().ok_or(EditError::MissingBinding("layer"))?;
        let table = self.table.as_deref().ok_or(EditError::MissingBinding("table"))?;

        let mode = match layer.read_geometry(table, id)? {
            Some(stored) => {
                let geometry = transform_geometry(&stored, world_srid, &*self.transform).ok_or(
                    EditError::TransformFailed {
                        from: stored.srid(),
                        to: world_srid,
                    },
                )?;
                if self.editor.start(geometry).is_err() {
                    return Err(self.invalid_state("start a feature edition"));
                }
                EditMode::Modify
            }
            None => {
                let kind = self
                    .vector_type
                    .ok_or(EditError::MissingBinding("vector type"))?;
                if !self.creator.start(kind, world_srid) {
                    return Err(self.invalid_state("start a feature edition"));
                }
                EditMode::Create { appended: false }
            }
        };
        log::debug!("Editing feature {} ({:?})", id, mode);
        if mode == EditMode::Modify {
            // Dragged vertices must not snap to their own old positions
            if let Some(snap) = self.snap.as_mut() {
                snap.remove_feature(id);
            }
        }
        self.edited = Some(FeatureEdit { feature: id, mode });
        self.invalidate_caches();
        Ok(())
    }

    /// Append an empty row and open it in the creator
    pub fn new_feature(&mut self) -> EditResult<FeatureId> {
        self.check_can_open_edit("create a feature")?;
        let kind = self
            .vector_type
            .ok_or(EditError::MissingBinding("vector type"))?;
        let world_srid = self.world_srid();
        let table = self
            .table
            .as_deref_mut()
            .ok_or(EditError::MissingBinding("table"))?;
        let id = table.append_row()?;
        if !self.creator.start(kind, world_srid) {
            table.delete_row(id)?;
            return Err(self.invalid_state("create a feature"));
        }
        log::debug!("Creating feature {}", id);
        self.edited = Some(FeatureEdit {
            feature: id,
            mode: EditMode::Create { appended: true },
        });
        self.invalidate_caches();
        Ok(id)
    }

    /// Close the open feature edition, writing it back when `commit` is set.
    /// An invalid new geometry is refused and the edition stays open.
    pub fn end_feature_edition(&mut self, commit: bool) -> EditResult<()> {
        let edit = self.current_edit("end a feature edition")?;
        if commit {
            self.check_writable()?;
            self.commit_edit(edit)?;
        } else {
            self.discard_edit(edit);
        }
        self.edited = None;
        self.invalidate_caches();
        Ok(())
    }

    fn commit_edit(&mut self, edit: FeatureEdit) -> EditResult<()> {
        let geometry = match edit.mode {
            EditMode::Create { .. } => {
                if !self.creator.is_valid() {
                    let kind = self.creator.kind().unwrap_or_default();
                    log::debug!(
                        "Refusing to commit feature {}: {} is not valid",
                        edit.feature,
                        kind
                    );
                    return Err(EditError::InvalidGeometry(kind));
                }
                self.creator.real_geometry()
            }
            EditMode::Modify if self.editor.has_changed() => self.editor.geometry().cloned(),
            EditMode::Modify => None,
        };
        match geometry {
            Some(geometry) => self.write_feature(edit.feature, &geometry)?,
            None => self.restore_snap_buffers(edit.feature),
        }
        self.creator.end();
        self.editor.end();
        Ok(())
    }

    fn discard_edit(&mut self, edit: FeatureEdit) {
        self.creator.end();
        self.editor.end();
        if edit.mode == (EditMode::Create { appended: true }) {
            if let Some(table) = self.table.as_deref_mut() {
                if let Err(err) = table.delete_row(edit.feature) {
                    log::warn!("Failed to drop discarded feature {}: {}", edit.feature, err);
                }
            }
        }
        if edit.mode == EditMode::Modify {
            self.restore_snap_buffers(edit.feature);
        }
        log::debug!("Discarded edition of feature {}", edit.feature);
    }

    /// Store a world geometry as the geometry of `id`
    fn write_feature(&mut self, id: FeatureId, geometry: &Geometry) -> EditResult<()> {
        let layer = self.layer.as_ref().ok_or(EditError::MissingBinding("layer"))?;
        let table = self
            .table
            .as_deref_mut()
            .ok_or(EditError::MissingBinding("table"))?;
        let stored = transform_geometry(geometry, layer.srid, &*self.transform)
            .ok_or(EditError::TransformFailed {
                from: geometry.srid(),
                to: layer.srid,
            })?
            .with_id(id.into());
        layer.write_geometry(table, id, &stored)?;
        self.modified.insert(id);
        if let Some(snap) = self.snap.as_mut() {
            snap.add_geometry(id, &stored);
        }
        log::debug!("Committed feature {}", id);
        Ok(())
    }

    /// Remove a feature from the table, remembering its geometry for display
    pub fn delete_feature(&mut self, id: FeatureId) -> EditResult<()> {
        if !self.active {
            return Err(self.invalid_state("delete a feature"));
        }
        self.check_writable()?;
        if self.edited_feature() == Some(id) {
            return Err(EditError::EditInProgress(id));
        }
        let layer = self.layer.as_ref().ok_or(EditError::MissingBinding("layer"))?;
        let table = self
            .table
            .as_deref_mut()
            .ok_or(EditError::MissingBinding("table"))?;
        if !table.contains_row(id) {
            return Err(EditError::UnknownFeature(id));
        }
        let geometry = layer.read_geometry(&*table, id).unwrap_or_else(|err| {
            log::warn!("Deleting feature {} with unreadable geometry: {}", id, err);
            None
        });
        table.delete_row(id)?;
        let datasource = layer.datasource.clone();

        self.deleted.insert(id, geometry);
        self.modified.remove(&id);
        if let Err(err) = self.selection.unselect(id, &datasource) {
            log::debug!("Deleted feature {} was not unselected: {}", id, err);
        }
        if let Some(snap) = self.snap.as_mut() {
            snap.remove_feature(id);
        }
        self.invalidate_caches();
        log::debug!("Deleted feature {}", id);
        Ok(())
    }

    // Pointer input

    /// Display position in world coordinates, snapped when a snap tool is
    /// attached
    fn pointer_to_world(&self, x: f64, y: f64) -> EditResult<Coord> {
        let world = self.world.as_deref().ok_or(EditError::MissingBinding("world"))?;
        let mut c = world.display_to_world(x, y);
        if let Some(snap) = &self.snap {
            snap.snap_point(&mut c, world.srid(), &*self.transform);
        }
        Ok(c)
    }

    /// Left click: append a vertex to a new geometry, or split an edge of an
    /// existing one
    pub fn add_point(&mut self, x: f64, y: f64) -> EditResult<bool> {
        match self.current_edit("add a point")?.mode {
            EditMode::Create { .. } => {
                let c = self.pointer_to_world(x, y)?;
                Ok(self.creator.append_world_point(c))
            }
            EditMode::Modify => {
                let world = self.world.as_deref().ok_or(EditError::MissingBinding("world"))?;
                Ok(self.editor.insert_point_at(x, y, world).is_some())
            }
        }
    }

    /// Pointer motion; moves the phantom vertex of a new geometry
    pub fn move_pointer(&mut self, x: f64, y: f64) -> EditResult<bool> {
        match self.current_edit("move the pointer")?.mode {
            EditMode::Create { .. } => {
                let c = self.pointer_to_world(x, y)?;
                Ok(self.creator.move_phantom_world(c))
            }
            EditMode::Modify => Ok(false),
        }
    }

    pub fn remove_last_point(&mut self) -> EditResult<bool> {
        match self.current_edit("remove a point")?.mode {
            EditMode::Create { .. } => Ok(self.creator.remove_last_point()),
            EditMode::Modify => Ok(false),
        }
    }

    /// Right click: stop point entry without touching the table
    pub fn cancel_point_entry(&mut self) -> EditResult<()> {
        match self.current_edit("cancel point entry")?.mode {
            EditMode::Create { .. } => self.creator.hide_phantom_point(),
            EditMode::Modify => self.editor.clear_selection(),
        }
        Ok(())
    }

    pub fn select_vertex(&mut self, x: f64, y: f64) -> EditResult<Option<VertexId>> {
        match self.current_edit("select a vertex")?.mode {
            EditMode::Create { .. } => Ok(None),
            EditMode::Modify => {
                let world = self.world.as_deref().ok_or(EditError::MissingBinding("world"))?;
                Ok(self.editor.select_point_at(x, y, world))
            }
        }
    }

    /// Drag of the selected vertex
    pub fn move_selected_vertex(&mut self, x: f64, y: f64) -> EditResult<bool> {
        match self.current_edit("move a vertex")?.mode {
            EditMode::Create { .. } => Ok(false),
            EditMode::Modify => {
                let c = self.pointer_to_world(x, y)?;
                Ok(self.editor.move_selected_world(c))
            }
        }
    }

    pub fn delete_selected_vertex(&mut self) -> EditResult<bool> {
        match self.current_edit("delete a vertex")?.mode {
            EditMode::Create { .. } => Ok(false),
            EditMode::Modify => Ok(self.editor.delete_selected_point()),
        }
    }

    /// Select the features under a display rectangle; a single click is
    /// widened by the search margin
    pub fn select_features(
        &mut self,
        display_area: &Envelope,
        mode: SelectMode,
    ) -> EditResult<bool> {
        if !self.active {
            return Err(self.invalid_state("select features"));
        }
        let world = self.world.as_deref().ok_or(EditError::MissingBinding("world"))?;
        let area = if display_area.width() <= f64::EPSILON && display_area.height() <= f64::EPSILON
        {
            display_area.expand(self.config.search_margin_px)
        } else {
            *display_area
        };
        self.selection
            .select_area(self.table.as_deref(), &area, world, &*self.transform, mode)
    }

    // Queries

    pub fn is_modified_feature(&self, id: FeatureId) -> bool {
        self.modified.contains(&id)
    }

    pub fn is_deleted_feature(&self, id: FeatureId) -> bool {
        self.deleted.contains_key(&id)
    }

    fn world_collection(
        &self,
        geometries: impl IntoIterator<Item = Geometry>,
    ) -> GeometryCollection {
        let srid = self.world_srid();
        let mut out = GeometryCollection::new(srid);
        for geometry in geometries {
            let Some(geometry) = transform_geometry(&geometry, srid, &*self.transform) else {
                log::debug!("Overlay skips geometry {}: cannot reach {}", geometry.id(), srid);
                continue;
            };
            if let Err(err) = out.append(geometry) {
                log::warn!("Overlay skips geometry: {}", err);
            }
        }
        out
    }

    /// Committed geometries of the session in world coordinates, without
    /// the feature currently being edited
    pub fn modified_geometries(&self) -> &GeometryCollection {
        self.modified_cache.get_or_init(|| {
            let (Some(layer), Some(table)) = (self.layer.as_ref(), self.table.as_deref()) else {
                return GeometryCollection::new(self.world_srid());
            };
            let edited = self.edited_feature();
            let stored = self
                .modified
                .iter()
                .filter(|id| Some(**id) != edited)
                .filter_map(|id| match layer.read_geometry(table, *id) {
                    Ok(geometry) => geometry,
                    Err(err) => {
                        log::warn!("Cannot read modified feature {}: {}", id, err);
                        None
                    }
                });
            self.world_collection(stored)
        })
    }

    /// Geometries of the features deleted this session in world coordinates
    pub fn deleted_geometries(&self) -> &GeometryCollection {
        self.deleted_cache
            .get_or_init(|| self.world_collection(self.deleted.values().flatten().cloned()))
    }

    pub fn selected_geometries(&self) -> GeometryCollection {
        self.selection
            .selected_geometries(self.table.as_deref(), self.world_srid(), &*self.transform)
    }

    /// The geometry being created or edited, phantom vertex included
    pub fn in_progress_geometry(&self) -> Option<&Geometry> {
        self.creator.geometry().or_else(|| self.editor.geometry())
    }

    /// Everything the viewport draws over the layer, bottom to top
    pub fn overlay_layers(&self) -> Vec<OverlayLayer<'_>> {
        let style = &self.config.style;
        let mut layers = vec![
            OverlayLayer {
                kind: OverlayKind::Deleted,
                style: &style.deleted,
                geometries: Cow::Borrowed(self.deleted_geometries()),
            },
            OverlayLayer {
                kind: OverlayKind::Modified,
                style: &style.modified,
                geometries: Cow::Borrowed(self.modified_geometries()),
            },
            OverlayLayer {
                kind: OverlayKind::Selected,
                style: &style.selected,
                geometries: Cow::Owned(self.selected_geometries()),
            },
        ];
        if let Some(geometry) = self.in_progress_geometry() {
            layers.push(OverlayLayer {
                kind: OverlayKind::InProgress,
                style: &style.in_progress,
                geometries: Cow::Owned(GeometryCollection::from(geometry.clone())),
            });
        }
        layers
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::config::{SnapConfig, SnapMode, ToleranceUnit};
    use crate::domain::DatasourceId;
    use crate::table::{CellValue, Column, ColumnKind, MemoryTable};
    use crate::world::Viewport;
    use geo_types::coord;

    const WEB: Srid = Srid(3857);

    fn layer() -> Layer {
        Layer::new(DatasourceId::new("parcels"), "geom", WEB)
    }

    /// Feature 1 is a square, feature 2 a triangle
    fn parcels(read_only: bool) -> MemoryTable {
        let mut table = MemoryTable::new(vec![
            Column::new("geom", ColumnKind::Geometry),
            Column::new("name", ColumnKind::Text),
        ]);
        for (wkt, name) in [
            ("POLYGON((10 10,50 10,50 50,10 50,10 10))", "square"),
            ("POLYGON((60 60,90 60,90 90,60 60))", "triangle"),
        ] {
            let id = table.append_row().unwrap();
            table.set_cell_value(0, id, CellValue::Text(wkt.into())).unwrap();
            table.set_cell_value(1, id, CellValue::Text(name.into())).unwrap();
        }
        table.set_read_only(read_only);
        table
    }

    /// One world unit per pixel; display (x, y) is world (x, 100 - y)
    fn viewport() -> Box<Viewport> {
        Box::new(Viewport::new(
            Envelope::new(0.0, 0.0, 100.0, 100.0),
            100.0,
            100.0,
            WEB,
        ))
    }

    /// Table whose write access can be withdrawn while it is bound
    struct LockableTable {
        inner: MemoryTable,
        locked: Rc<Cell<bool>>,
    }

    impl Table for LockableTable {
        fn columns(&self) -> &[Column] {
            self.inner.columns()
        }

        fn rows(&self) -> Vec<FeatureId> {
            self.inner.rows()
        }

        fn cell_value(&self, column: usize, row: FeatureId) -> Option<CellValue> {
            self.inner.cell_value(column, row)
        }

        fn set_cell_value(
            &mut self,
            column: usize,
            row: FeatureId,
            value: CellValue,
        ) -> EditResult<()> {
            if self.locked.get() {
                return Err(EditError::ReadOnlyTable);
            }
            self.inner.set_cell_value(column, row, value)
        }

        fn append_row(&mut self) -> EditResult<FeatureId> {
            if self.locked.get() {
                return Err(EditError::ReadOnlyTable);
            }
            self.inner.append_row()
        }

        fn delete_row(&mut self, row: FeatureId) -> EditResult<()> {
            if self.locked.get() {
                return Err(EditError::ReadOnlyTable);
            }
            self.inner.delete_row(row)
        }

        fn is_read_only(&self) -> bool {
            self.locked.get() || self.inner.is_read_only()
        }
    }

    fn vertex_snap(tolerance: f64) -> SnapTool {
        SnapTool::new(
            layer(),
            SnapConfig {
                mode: SnapMode::Vertex,
                tolerance,
                unit: ToleranceUnit::Map,
            },
        )
    }

    fn task_over(table: impl Table + 'static) -> VectorEditionTask {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut task = VectorEditionTask::new(EditConfig::default());
        task.bind_layer(Box::new(table), layer()).unwrap();
        task.set_world(viewport()).unwrap();
        task.set_vector_type(GeometryKind::Polygon).unwrap();
        task.start().unwrap();
        task
    }

    fn stored_geometry(task: &VectorEditionTask, id: FeatureId) -> Option<Geometry> {
        layer().read_geometry(task.table().unwrap(), id).unwrap()
    }

    #[test]
    fn test_start_requires_bindings() {
        let mut task = VectorEditionTask::new(EditConfig::default());
        assert_eq!(task.start(), Err(EditError::MissingBinding("table")));
        task.bind_layer(Box::new(parcels(false)), layer()).unwrap();
        assert_eq!(task.start(), Err(EditError::MissingBinding("world")));
        task.set_world(viewport()).unwrap();
        assert_eq!(task.start(), Err(EditError::MissingBinding("vector type")));
        task.set_vector_type(GeometryKind::Polygon).unwrap();
        task.start().unwrap();
        assert_eq!(task.state(), TaskState::Active);
        assert!(matches!(
            task.start(),
            Err(EditError::InvalidState {
                state: TaskState::Active,
                ..
            })
        ));
    }

    #[test]
    fn test_polygon_commit_needs_three_distinct_points() {
        let mut task = task_over(parcels(false));
        let id = task.new_feature().unwrap();
        assert_eq!(id, FeatureId(3));

        task.add_point(10.0, 90.0).unwrap();
        task.add_point(90.0, 90.0).unwrap();
        assert_eq!(
            task.end_feature_edition(true),
            Err(EditError::InvalidGeometry(GeometryKind::Polygon))
        );
        assert_eq!(task.state(), TaskState::Editing);
        assert_eq!(task.edited_feature(), Some(id));

        task.add_point(90.0, 10.0).unwrap();
        task.end_feature_edition(true).unwrap();
        assert_eq!(task.state(), TaskState::Active);
        assert!(task.is_modified_feature(id));

        let stored = stored_geometry(&task, id).unwrap();
        assert_eq!(
            stored.coords(),
            &[
                coord! { x: 10.0, y: 10.0 },
                coord! { x: 90.0, y: 10.0 },
                coord! { x: 90.0, y: 90.0 },
            ]
        );
    }

    #[test]
    fn test_read_only_table_refuses_feature_edition() {
        let locked = Rc::new(Cell::new(false));
        let mut task = task_over(LockableTable {
            inner: parcels(false),
            locked: Rc::clone(&locked),
        });
        task.start_feature_edition(FeatureId(1)).unwrap();
        task.select_vertex(10.0, 90.0).unwrap();
        task.move_selected_vertex(5.0, 95.0).unwrap();
        task.end_feature_edition(true).unwrap();
        let committed = task.modified_geometries().clone();
        assert_eq!(committed.len(), 1);

        locked.set(true);
        assert_eq!(
            task.start_feature_edition(FeatureId(2)),
            Err(EditError::ReadOnlyTable)
        );
        assert_eq!(task.new_feature(), Err(EditError::ReadOnlyTable));
        assert_eq!(
            task.delete_feature(FeatureId(2)),
            Err(EditError::ReadOnlyTable)
        );
        assert_eq!(task.state(), TaskState::Active);
        assert!(task.is_modified_feature(FeatureId(1)));
        assert!(!task.is_deleted_feature(FeatureId(2)));
        assert_eq!(task.modified_geometries(), &committed);
        assert_eq!(
            stored_geometry(&task, FeatureId(1)).unwrap().coords()[0],
            coord! { x: 5.0, y: 5.0 }
        );
    }

    #[test]
    fn test_table_read_only_from_the_start() {
        let mut task = task_over(parcels(true));
        assert_eq!(
            task.start_feature_edition(FeatureId(1)),
            Err(EditError::ReadOnlyTable)
        );
        assert_eq!(task.edited_feature(), None);
        assert_eq!(task.in_progress_geometry(), None);
    }

    #[test]
    fn test_second_feature_edition_is_refused() {
        let mut task = task_over(parcels(false));
        task.start_feature_edition(FeatureId(1)).unwrap();
        task.select_vertex(50.0, 50.0).unwrap();
        task.move_selected_vertex(45.0, 55.0).unwrap();
        let before = task.in_progress_geometry().cloned();
        assert!(before.is_some());

        assert_eq!(
            task.start_feature_edition(FeatureId(2)),
            Err(EditError::EditInProgress(FeatureId(1)))
        );
        assert_eq!(task.new_feature(), Err(EditError::EditInProgress(FeatureId(1))));
        assert_eq!(task.edited_feature(), Some(FeatureId(1)));
        assert_eq!(task.in_progress_geometry().cloned(), before);
        assert!(matches!(
            task.end(),
            Err(EditError::InvalidState {
                state: TaskState::Editing,
                ..
            })
        ));
    }

    #[test]
    fn test_vertex_move_is_written_on_commit_only() {
        let mut task = task_over(parcels(false));
        task.start_feature_edition(FeatureId(1)).unwrap();
        // World (50, 50) is display (50, 50)
        assert_eq!(task.select_vertex(51.0, 49.0).unwrap(), Some(VertexId::new(0, 2)));
        assert!(task.move_selected_vertex(55.0, 45.0).unwrap());
        assert_eq!(
            stored_geometry(&task, FeatureId(1)).unwrap().coords()[2],
            coord! { x: 50.0, y: 50.0 }
        );

        task.end_feature_edition(true).unwrap();
        assert_eq!(
            stored_geometry(&task, FeatureId(1)).unwrap().coords()[2],
            coord! { x: 55.0, y: 55.0 }
        );
        assert!(task.is_modified_feature(FeatureId(1)));
        assert_eq!(task.modified_geometries().len(), 1);

        // While edited again it only shows as in progress
        task.start_feature_edition(FeatureId(1)).unwrap();
        assert!(task.modified_geometries().is_empty());
        assert!(task.in_progress_geometry().is_some());
    }

    #[test]
    fn test_unchanged_edit_is_not_recorded() {
        let mut task = task_over(parcels(false));
        task.start_feature_edition(FeatureId(2)).unwrap();
        task.end_feature_edition(true).unwrap();
        assert!(!task.is_modified_feature(FeatureId(2)));
    }

    #[test]
    fn test_discarded_new_feature_drops_its_row() {
        let mut task = task_over(parcels(false));
        let id = task.new_feature().unwrap();
        task.add_point(10.0, 10.0).unwrap();
        task.end_feature_edition(false).unwrap();
        assert!(!task.table().unwrap().contains_row(id));
        assert!(!task.is_modified_feature(id));
        assert_eq!(task.in_progress_geometry(), None);
    }

    #[test]
    fn test_delete_clears_modified_flag() {
        let mut task = task_over(parcels(false));
        task.start_feature_edition(FeatureId(1)).unwrap();
        task.select_vertex(10.0, 90.0).unwrap();
        task.move_selected_vertex(5.0, 95.0).unwrap();
        task.end_feature_edition(true).unwrap();
        assert!(task.is_modified_feature(FeatureId(1)));

        task.delete_feature(FeatureId(1)).unwrap();
        assert!(!task.is_modified_feature(FeatureId(1)));
        assert!(task.is_deleted_feature(FeatureId(1)));
        assert!(task.modified_geometries().is_empty());
        assert_eq!(task.deleted_geometries().len(), 1);
        assert!(!task.table().unwrap().contains_row(FeatureId(1)));
        assert_eq!(
            task.delete_feature(FeatureId(1)),
            Err(EditError::UnknownFeature(FeatureId(1)))
        );
    }

    #[test]
    fn test_cancel_point_entry_hides_phantom() {
        let mut task = task_over(parcels(false));
        let id = task.new_feature().unwrap();
        task.add_point(20.0, 20.0).unwrap();
        task.move_pointer(40.0, 20.0).unwrap();
        assert_eq!(task.in_progress_geometry().unwrap().vertex_count(), 2);

        task.cancel_point_entry().unwrap();
        assert_eq!(task.in_progress_geometry().unwrap().vertex_count(), 1);
        assert_eq!(
            task.table().unwrap().cell_value(0, id),
            Some(CellValue::Null)
        );
    }

    #[test]
    fn test_points_snap_to_layer_vertices() {
        let mut task = task_over(parcels(false));
        task.attach_snap_tool(Some(SnapTool::new(
            layer(),
            SnapConfig {
                mode: SnapMode::Vertex,
                tolerance: 5.0,
                unit: ToleranceUnit::Map,
            },
        )));
        task.new_feature().unwrap();
        // Display (12, 88) is world (12, 12), next to the square's corner
        task.add_point(12.0, 88.0).unwrap();
        assert_eq!(
            task.in_progress_geometry().unwrap().coords()[0],
            coord! { x: 10.0, y: 10.0 }
        );
    }

    #[test]
    fn test_dragged_vertex_ignores_its_own_old_position() {
        let mut task = task_over(parcels(false));
        task.attach_snap_tool(Some(vertex_snap(5.0)));
        task.start_feature_edition(FeatureId(1)).unwrap();
        let snap = task.snap_tool().unwrap();
        assert!(snap.vertex_buffers().iter().all(|b| b.feature != FeatureId(1)));

        // Display (13, 87) is world (13, 13), within reach of the old corner
        assert_eq!(task.select_vertex(10.0, 90.0).unwrap(), Some(VertexId::new(0, 0)));
        assert!(task.move_selected_vertex(13.0, 87.0).unwrap());
        assert_eq!(
            task.in_progress_geometry().unwrap().coords()[0],
            coord! { x: 13.0, y: 13.0 }
        );
        task.end_feature_edition(true).unwrap();

        assert!(task.is_modified_feature(FeatureId(1)));
        assert_eq!(
            stored_geometry(&task, FeatureId(1)).unwrap().coords()[0],
            coord! { x: 13.0, y: 13.0 }
        );
        let snap = task.snap_tool().unwrap();
        assert!(snap
            .vertex_buffers()
            .iter()
            .any(|b| b.feature == FeatureId(1) && b.center == coord! { x: 13.0, y: 13.0 }));
    }

    #[test]
    fn test_closed_edit_restores_snap_buffers() {
        let mut task = task_over(parcels(false));
        task.attach_snap_tool(Some(vertex_snap(5.0)));
        // Four square corners and three triangle corners
        assert_eq!(task.snap_tool().unwrap().vertex_buffers().len(), 7);

        task.start_feature_edition(FeatureId(1)).unwrap();
        assert_eq!(task.snap_tool().unwrap().vertex_buffers().len(), 3);
        task.end_feature_edition(false).unwrap();
        assert_eq!(task.snap_tool().unwrap().vertex_buffers().len(), 7);

        task.start_feature_edition(FeatureId(2)).unwrap();
        task.end_feature_edition(true).unwrap();
        assert!(!task.is_modified_feature(FeatureId(2)));
        assert_eq!(task.snap_tool().unwrap().vertex_buffers().len(), 7);
    }

    #[test]
    fn test_click_selects_feature_under_pointer() {
        let mut task = task_over(parcels(false));
        let rx = task.feature_selector_mut().subscribe();
        assert!(task
            .select_features(&Envelope::of_point(coord! { x: 30.0, y: 70.0 }), SelectMode::Replace)
            .unwrap());
        let parcels_id = DatasourceId::new("parcels");
        assert!(task.feature_selector().is_selected(FeatureId(1), &parcels_id));
        assert!(!task.feature_selector().is_selected(FeatureId(2), &parcels_id));
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(task.selected_geometries().len(), 1);
    }

    #[test]
    fn test_overlay_layers_are_ordered() {
        let mut task = task_over(parcels(false));
        task.feature_selector_mut()
            .select(FeatureId(2), &DatasourceId::new("parcels"))
            .unwrap();
        task.new_feature().unwrap();
        task.add_point(5.0, 5.0).unwrap();

        let layers = task.overlay_layers();
        let kinds: Vec<_> = layers.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OverlayKind::Deleted,
                OverlayKind::Modified,
                OverlayKind::Selected,
                OverlayKind::InProgress,
            ]
        );
        assert_eq!(layers[2].geometries.len(), 1);
        assert_eq!(layers[3].style, task.config().style.in_progress);
    }

    #[test]
    fn test_end_releases_selection_source() {
        let mut task = task_over(parcels(false));
        task.end().unwrap();
        assert_eq!(task.state(), TaskState::Idle);
        assert!(task.feature_selector().source().is_none());
        assert!(task.unbind_layer().unwrap().is_some());
    }
}
