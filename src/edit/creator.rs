//! Point-by-point construction of a new geometry
//!
//! While entering a line or polygon the last vertex is a phantom that
//! follows the pointer, so the preview shows the segment about to be added.

use geo_types::Coord;

use crate::domain::measure;
use crate::domain::{Geometry, GeometryKind, Srid};
use crate::world::WorldContext;

#[derive(Debug, Default)]
pub struct GuiGeometryCreator {
    /// Geometry under construction, `None` while idle
    geometry: Option<Geometry>,
    /// Whether the last vertex of `geometry` is the phantom
    phantom: bool,
    /// Last known pointer position in world coordinates
    last_pointer: Option<Coord>,
}

impl GuiGeometryCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new empty geometry; refused while a session is open or for
    /// collections, which cannot be entered by pointer
    pub fn start(&mut self, kind: GeometryKind, srid: Srid) -> bool {
        if self.geometry.is_some() || kind == GeometryKind::Collection {
            return false;
        }
        log::debug!("Creating {} in {}", kind, srid);
        self.geometry = Some(Geometry::empty(kind, srid));
        self.phantom = false;
        self.last_pointer = None;
        true
    }

    pub fn is_editing(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn kind(&self) -> Option<GeometryKind> {
        self.geometry.as_ref().map(Geometry::kind)
    }

    /// Append a vertex under the display position
    pub fn append_point(&mut self, x: f64, y: f64, world: &dyn WorldContext) -> bool {
        self.append_world_point(world.display_to_world(x, y))
    }

    /// Append a vertex already expressed (and possibly snapped) in world
    /// coordinates
    pub fn append_world_point(&mut self, c: Coord) -> bool {
        let Some(geometry) = self.geometry.as_mut() else {
            return false;
        };
        self.last_pointer = Some(c);
        if geometry.kind() == GeometryKind::Point {
            return geometry.push_vertex(c);
        }
        if self.phantom {
            geometry.pop_vertex();
        }
        // The real vertex, then a phantom on top of it
        geometry.push_vertex(c);
        geometry.push_vertex(c);
        self.phantom = true;
        true
    }

    pub fn move_phantom_point(&mut self, x: f64, y: f64, world: &dyn WorldContext) -> bool {
        self.move_phantom_world(world.display_to_world(x, y))
    }

    /// Reposition the phantom, showing it again if it was hidden
    pub fn move_phantom_world(&mut self, c: Coord) -> bool {
        let real = self.real_point_count();
        let Some(geometry) = self.geometry.as_mut() else {
            return false;
        };
        self.last_pointer = Some(c);
        if geometry.kind() == GeometryKind::Point || real == 0 {
            return false;
        }
        if self.phantom {
            if let Some(last) = geometry.last_vertex_mut() {
                *last = c;
            }
        } else {
            geometry.push_vertex(c);
            self.phantom = true;
        }
        true
    }

    pub fn hide_phantom_point(&mut self) {
        if !self.phantom {
            return;
        }
        if let Some(geometry) = self.geometry.as_mut() {
            geometry.pop_vertex();
        }
        self.phantom = false;
    }

    /// Remove the last real vertex; the phantom comes back at the last
    /// pointer position while real vertices remain
    pub fn remove_last_point(&mut self) -> bool {
        if self.real_point_count() == 0 {
            return false;
        }
        self.hide_phantom_point();
        let Some(geometry) = self.geometry.as_mut() else {
            return false;
        };
        geometry.pop_vertex();
        if geometry.kind() != GeometryKind::Point && !geometry.is_empty() {
            if let Some(pointer) = self.last_pointer {
                geometry.push_vertex(pointer);
                self.phantom = true;
            }
        }
        true
    }

    pub fn real_point_count(&self) -> usize {
        self.geometry
            .as_ref()
            .map_or(0, |g| g.vertex_count() - usize::from(self.phantom))
    }

    fn real_coords(&self) -> &[Coord] {
        match &self.geometry {
            Some(g) => &g.coords()[..self.real_point_count()],
            None => &[],
        }
    }

    /// Whether the real vertices alone make a valid geometry
    pub fn is_valid(&self) -> bool {
        let Some(kind) = self.kind() else {
            return false;
        };
        measure::distinct_count(self.real_coords()) >= kind.min_vertices()
    }

    /// Preview of the geometry, phantom included
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// Copy of the geometry made of the real vertices only
    pub fn real_geometry(&self) -> Option<Geometry> {
        let mut geometry = self.geometry.clone()?;
        if self.phantom {
            geometry.pop_vertex();
        }
        Some(geometry)
    }

    /// Close the session and hand over the geometry without its phantom
    pub fn end(&mut self) -> Option<Geometry> {
        self.hide_phantom_point();
        self.last_pointer = None;
        self.geometry.take()
    }
}
