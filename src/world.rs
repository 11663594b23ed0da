//! Display/world coordinate mapping and spatial reference transforms
//!
//! Both are consumed, not implemented, by the engine: the host supplies a
//! [`WorldContext`] for the viewport being edited and a [`CoordTransform`]
//! for reprojection. [`Viewport`] and [`IdentityTransform`] cover the common
//! single-SRS case.

use geo_types::Coord;

use crate::domain::{Envelope, Geometry, Srid};

/// Mapping between display pixels and world coordinates of one viewport
pub trait WorldContext {
    fn display_to_world(&self, x: f64, y: f64) -> Coord;

    fn world_to_display(&self, world: Coord) -> Coord;

    /// Spatial reference of world coordinates
    fn srid(&self) -> Srid;

    /// World units per display pixel, when the viewport has a raster model
    fn pixel_size(&self) -> Option<f64>;

    /// World envelope covered by a display-space envelope
    fn display_envelope_to_world(&self, display: &Envelope) -> Envelope {
        let a = self.display_to_world(display.min_x, display.min_y);
        let b = self.display_to_world(display.max_x, display.max_y);
        Envelope::from_corners(a, b)
    }
}

/// Reprojection of single coordinates between spatial references
pub trait CoordTransform {
    /// Transform `coord` in place; false when the pair is not supported
    fn transform(&self, from: Srid, to: Srid, coord: &mut Coord) -> bool;
}

/// Only "transforms" between identical references
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityTransform;

impl CoordTransform for IdentityTransform {
    fn transform(&self, from: Srid, to: Srid, _coord: &mut Coord) -> bool {
        from == to
    }
}

/// Copy of `geometry` expressed in `to`; `None` when any vertex fails
pub fn transform_geometry(
    geometry: &Geometry,
    to: Srid,
    transform: &dyn CoordTransform,
) -> Option<Geometry> {
    let from = geometry.srid();
    let mut out = geometry.clone();
    if from != to {
        if !out.for_each_coord_mut(&mut |c: &mut Coord| transform.transform(from, to, c)) {
            log::debug!("Could not transform geometry {} from {} to {}", out.id(), from, to);
            return None;
        }
        out.set_srid(to);
    }
    Some(out)
}

/// Transform a single coordinate, returning `None` on failure
pub fn transform_coord(
    mut coord: Coord,
    from: Srid,
    to: Srid,
    transform: &dyn CoordTransform,
) -> Option<Coord> {
    if from == to || transform.transform(from, to, &mut coord) {
        Some(coord)
    } else {
        None
    }
}

/// Viewport showing `extent` on a `width` x `height` pixel surface, y axis
/// pointing down on the display and up in the world
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    extent: Envelope,
    width: f64,
    height: f64,
    srid: Srid,
}

impl Viewport {
    pub fn new(extent: Envelope, width: f64, height: f64, srid: Srid) -> Self {
        Self {
            extent,
            width: width.max(1.0),
            height: height.max(1.0),
            srid,
        }
    }

    pub fn extent(&self) -> Envelope {
        self.extent
    }

    /// Pan or zoom
    pub fn set_extent(&mut self, extent: Envelope) {
        self.extent = extent;
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }
}

impl WorldContext for Viewport {
    fn display_to_world(&self, x: f64, y: f64) -> Coord {
        Coord {
            x: self.extent.min_x + x / self.width * self.extent.width(),
            y: self.extent.max_y - y / self.height * self.extent.height(),
        }
    }

    fn world_to_display(&self, world: Coord) -> Coord {
        let ew = self.extent.width();
        let eh = self.extent.height();
        Coord {
            x: if ew > 0.0 {
                (world.x - self.extent.min_x) / ew * self.width
            } else {
                0.0
            },
            y: if eh > 0.0 {
                (self.extent.max_y - world.y) / eh * self.height
            } else {
                0.0
            },
        }
    }

    fn srid(&self) -> Srid {
        self.srid
    }

    fn pixel_size(&self) -> Option<f64> {
        let size = self.extent.width() / self.width;
        (size > 0.0).then_some(size)
    }
}
