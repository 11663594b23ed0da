//! Vertex editing of an existing geometry
//!
//! Hit testing happens in display space so the search margin stays constant
//! in pixels whatever the zoom level.

use geo_types::Coord;

use crate::domain::measure;
use crate::domain::{Envelope, Geometry, VertexId};
use crate::world::WorldContext;

#[derive(Debug)]
pub struct GuiGeometryEditor {
    geometry: Option<Geometry>,
    selected: Option<VertexId>,
    changed: bool,
    /// Pixels added around a click when searching for vertices or edges
    search_margin_px: f64,
}

impl GuiGeometryEditor {
    pub fn new(search_margin_px: f64) -> Self {
        Self {
            geometry: None,
            selected: None,
            changed: false,
            search_margin_px: search_margin_px.max(0.0),
        }
    }

    /// Take ownership of `geometry` for a session; it is handed back if a
    /// session is already open
    pub fn start(&mut self, geometry: Geometry) -> Result<(), Geometry> {
        if self.geometry.is_some() {
            return Err(geometry);
        }
        log::debug!("Editing geometry {} ({} vertices)", geometry.id(), geometry.vertex_count());
        self.geometry = Some(geometry);
        self.selected = None;
        self.changed = false;
        Ok(())
    }

    pub fn is_editing(&self) -> bool {
        self.geometry.is_some()
    }

    /// Vertices whose display position falls inside `display_box`; a single
    /// click box is widened by the search margin
    pub fn find_points(&self, display_box: &Envelope, world: &dyn WorldContext) -> Vec<VertexId> {
        let Some(geometry) = &self.geometry else {
            return Vec::new();
        };
        let area = if display_box.width() <= f64::EPSILON && display_box.height() <= f64::EPSILON
        {
            display_box.expand(self.search_margin_px)
        } else {
            *display_box
        };
        geometry
            .vertices()
            .into_iter()
            .filter(|(_, c)| area.contains(world.world_to_display(*c)))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn select_point(&mut self, id: VertexId) -> bool {
        match &self.geometry {
            Some(g) if g.vertex(id).is_some() => {
                self.selected = Some(id);
                true
            }
            _ => false,
        }
    }

    /// Select the vertex nearest to a click, or clear the selection when no
    /// vertex lies within the margin
    pub fn select_point_at(
        &mut self,
        x: f64,
        y: f64,
        world: &dyn WorldContext,
    ) -> Option<VertexId> {
        let click = Coord { x, y };
        let geometry = self.geometry.as_ref()?;
        let nearest = self
            .find_points(&Envelope::of_point(click), world)
            .into_iter()
            .filter_map(|id| {
                let c = geometry.vertex(id)?;
                Some((measure::distance(click, world.world_to_display(c)), id))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, id)| id);
        self.selected = nearest;
        nearest
    }

    pub fn selected_point(&self) -> Option<VertexId> {
        self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn move_selected_point(&mut self, x: f64, y: f64, world: &dyn WorldContext) -> bool {
        self.move_selected_world(world.display_to_world(x, y))
    }

    pub fn move_selected_world(&mut self, c: Coord) -> bool {
        let (Some(geometry), Some(id)) = (self.geometry.as_mut(), self.selected) else {
            return false;
        };
        let moved = geometry.set_vertex(id, c);
        self.changed |= moved;
        moved
    }

    /// Remove the selected vertex unless the geometry would fall below the
    /// minimum vertex count of its kind
    pub fn delete_selected_point(&mut self) -> bool {
        let (Some(geometry), Some(id)) = (self.geometry.as_mut(), self.selected) else {
            return false;
        };
        if !geometry.remove_vertex(id) {
            log::debug!("Refusing to delete vertex {:?} of {}", id, geometry.id());
            return false;
        }
        self.selected = None;
        self.changed = true;
        true
    }

    /// Split the edge nearest to a click, within the search margin, with a
    /// new vertex; the new vertex becomes the selection
    pub fn insert_point_at(
        &mut self,
        x: f64,
        y: f64,
        world: &dyn WorldContext,
    ) -> Option<VertexId> {
        let click = Coord { x, y };
        let geometry = self.geometry.as_mut()?;
        let (position, split) = geometry
            .edges()
            .into_iter()
            .map(|(position, a, b)| {
                let (a, b) = (world.world_to_display(a), world.world_to_display(b));
                let on_edge = measure::closest_point_on_segment(click, a, b);
                (measure::distance(click, on_edge), position, on_edge)
            })
            .filter(|(d, _, _)| *d <= self.search_margin_px)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, position, on_edge)| (position, on_edge))?;

        if !geometry.insert_vertex(position, world.display_to_world(split.x, split.y)) {
            return None;
        }
        self.selected = Some(position);
        self.changed = true;
        Some(position)
    }

    /// True once any mutation succeeded since `start`
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// Close the session and hand the geometry back as it is now
    pub fn end(&mut self) -> Option<Geometry> {
        self.selected = None;
        self.changed = false;
        self.geometry.take()
    }
}

impl Default for GuiGeometryEditor {
    fn default() -> Self {
        Self::new(7.0)
    }
}
