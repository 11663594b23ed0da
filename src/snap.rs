//! Snapping of pointer input to existing layer geometries
//!
//! Buffers are built in the layer's spatial reference from every feature of
//! the layer table. A candidate coming from the viewport is transformed into
//! the layer reference, tested against the buffers and, on a hit, replaced
//! by the nearest vertex or edge point expressed back in world coordinates.
//!
//! Missing spatial references or a viewport without a pixel size collapse
//! the tolerance to zero, which turns snapping into a no-op.

use std::cmp::Ordering;

use geo_types::Coord;

use crate::config::{SnapConfig, SnapMode, ToleranceUnit};
use crate::domain::measure;
use crate::domain::{Envelope, FeatureId, Geometry, Layer, Srid};
use crate::error::EditResult;
use crate::table::Table;
use crate::world::{CoordTransform, WorldContext, transform_coord};

/// Segments per quarter circle when rendering a vertex buffer
const BUFFER_QUADRANT_SEGMENTS: usize = 8;

/// Disc around one vertex of a feature
#[derive(Clone, Debug, PartialEq)]
pub struct VertexBuffer {
    pub feature: FeatureId,
    pub center: Coord,
    pub radius: f64,
}

impl VertexBuffer {
    pub fn contains(&self, c: Coord) -> bool {
        measure::distance(self.center, c) <= self.radius
    }

    /// Polygon approximating the disc, for display
    pub fn to_polygon(&self, srid: Srid) -> Geometry {
        Geometry::polygon(
            measure::circle_ring(self.center, self.radius, BUFFER_QUADRANT_SEGMENTS),
            srid,
        )
    }
}

/// Corridor around every edge of a feature
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentBuffer {
    pub feature: FeatureId,
    pub segments: Vec<(Coord, Coord)>,
    /// Envelope of the segments grown by the radius
    pub envelope: Envelope,
    pub radius: f64,
}

impl SegmentBuffer {
    fn new(feature: FeatureId, geometry: &Geometry, radius: f64) -> Option<Self> {
        let segments = geometry.segments();
        let envelope = geometry.envelope()?.expand(radius);
        if segments.is_empty() {
            return None;
        }
        Some(Self {
            feature,
            segments,
            envelope,
            radius,
        })
    }

    pub fn contains(&self, c: Coord) -> bool {
        self.nearest(c).is_some()
    }

    /// Closest point on the edges within the radius, with its distance and
    /// the index of the edge it lies on
    fn nearest(&self, c: Coord) -> Option<(f64, usize, Coord)> {
        if !self.envelope.contains(c) {
            return None;
        }
        self.segments
            .iter()
            .enumerate()
            .map(|(i, (a, b))| {
                let p = measure::closest_point_on_segment(c, *a, *b);
                (measure::distance(c, p), i, p)
            })
            .filter(|(d, _, _)| *d <= self.radius)
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
    }
}

/// Hit candidate ordered by distance, then feature id, then position
struct Hit {
    distance: f64,
    feature: FeatureId,
    order: (usize, usize),
    target: Coord,
}

fn closest(a: &Hit, b: &Hit) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.feature.cmp(&b.feature))
        .then(a.order.cmp(&b.order))
}

#[derive(Debug, Clone)]
pub struct SnapTool {
    layer: Layer,
    config: SnapConfig,
    /// Tolerance in layer units computed by the last buffer rebuild
    buffer_distance: f64,
    vertex_buffers: Vec<VertexBuffer>,
    segment_buffers: Vec<SegmentBuffer>,
}

impl SnapTool {
    pub fn new(layer: Layer, config: SnapConfig) -> Self {
        Self {
            layer,
            config,
            buffer_distance: 0.0,
            vertex_buffers: Vec::new(),
            segment_buffers: Vec::new(),
        }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    pub fn mode(&self) -> SnapMode {
        self.config.mode
    }

    /// Takes effect on the next buffer rebuild
    pub fn set_config(&mut self, config: SnapConfig) {
        self.config = config;
    }

    pub fn buffer_distance(&self) -> f64 {
        self.buffer_distance
    }

    pub fn vertex_buffers(&self) -> &[VertexBuffer] {
        &self.vertex_buffers
    }

    pub fn segment_buffers(&self) -> &[SegmentBuffer] {
        &self.segment_buffers
    }

    /// Snap tolerance in layer units for the given viewport
    pub fn calculate_buffer_distance(
        &self,
        world: &dyn WorldContext,
        transform: &dyn CoordTransform,
    ) -> f64 {
        let layer_srid = self.layer.srid;
        let world_srid = world.srid();
        if !layer_srid.is_known() || !world_srid.is_known() {
            log::debug!("Snapping disabled: unknown spatial reference");
            return 0.0;
        }
        match self.config.unit {
            ToleranceUnit::Map => self.config.tolerance.max(0.0),
            ToleranceUnit::Pixel => {
                let Some(pixel_size) = world.pixel_size() else {
                    log::debug!("Snapping disabled: viewport has no pixel size");
                    return 0.0;
                };
                let distance = pixel_size * self.config.tolerance.max(0.0);
                if layer_srid == world_srid {
                    return distance;
                }
                // Measure the world distance again once reprojected
                let origin = world.display_to_world(0.0, 0.0);
                let offset = Coord {
                    x: origin.x + distance,
                    y: origin.y,
                };
                match (
                    transform_coord(origin, world_srid, layer_srid, transform),
                    transform_coord(offset, world_srid, layer_srid, transform),
                ) {
                    (Some(a), Some(b)) => measure::distance(a, b),
                    _ => {
                        log::debug!("Snapping disabled: cannot reach {}", layer_srid);
                        0.0
                    }
                }
            }
        }
    }

    /// Rebuild every buffer from the layer table
    pub fn create_buffer_geometries(
        &mut self,
        table: &dyn Table,
        world: &dyn WorldContext,
        transform: &dyn CoordTransform,
    ) -> EditResult<()> {
        self.vertex_buffers.clear();
        self.segment_buffers.clear();
        self.buffer_distance = self.calculate_buffer_distance(world, transform);
        if self.buffer_distance <= 0.0 {
            return Ok(());
        }
        self.layer.geometry_column_index(table)?;
        for row in table.rows() {
            match self.layer.read_geometry(table, row) {
                Ok(Some(geometry)) => self.push_buffers(row, &geometry),
                Ok(None) => {}
                Err(err) => log::warn!("No snap buffers for feature {}: {}", row, err),
            }
        }
        log::debug!(
            "Built {} vertex and {} segment buffers (distance {})",
            self.vertex_buffers.len(),
            self.segment_buffers.len(),
            self.buffer_distance
        );
        Ok(())
    }

    fn push_buffers(&mut self, feature: FeatureId, geometry: &Geometry) {
        let radius = self.buffer_distance;
        if self.config.mode.uses_vertices() {
            self.vertex_buffers
                .extend(geometry.vertices().into_iter().map(|(_, center)| VertexBuffer {
                    feature,
                    center,
                    radius,
                }));
        }
        if self.config.mode.uses_segments() {
            self.segment_buffers
                .extend(SegmentBuffer::new(feature, geometry, radius));
        }
    }

    /// Replace the buffers of one feature; `geometry` is in the layer
    /// reference
    pub fn add_geometry(&mut self, feature: FeatureId, geometry: &Geometry) -> bool {
        if geometry.srid() != self.layer.srid {
            log::warn!(
                "Not snapping to feature {}: {} is not the layer reference {}",
                feature,
                geometry.srid(),
                self.layer.srid
            );
            return false;
        }
        self.remove_feature(feature);
        if self.buffer_distance <= 0.0 {
            return false;
        }
        self.push_buffers(feature, geometry);
        true
    }

    pub fn remove_feature(&mut self, feature: FeatureId) {
        self.vertex_buffers.retain(|b| b.feature != feature);
        self.segment_buffers.retain(|b| b.feature != feature);
    }

    fn vertex_hit(&self, c: Coord) -> Option<Hit> {
        self.vertex_buffers
            .iter()
            .enumerate()
            .filter(|(_, b)| b.contains(c))
            .map(|(i, b)| Hit {
                distance: measure::distance(c, b.center),
                feature: b.feature,
                order: (i, 0),
                target: b.center,
            })
            .min_by(closest)
    }

    fn segment_hit(&self, c: Coord) -> Option<Hit> {
        self.segment_buffers
            .iter()
            .enumerate()
            .filter_map(|(i, b)| {
                let (distance, segment, target) = b.nearest(c)?;
                Some(Hit {
                    distance,
                    feature: b.feature,
                    order: (i, segment),
                    target,
                })
            })
            .min_by(closest)
    }

    /// Move `candidate`, given in `world_srid`, onto the nearest buffered
    /// vertex or edge; false leaves it untouched
    pub fn snap_point(
        &self,
        candidate: &mut Coord,
        world_srid: Srid,
        transform: &dyn CoordTransform,
    ) -> bool {
        if self.buffer_distance <= 0.0 {
            return false;
        }
        let layer_srid = self.layer.srid;
        let Some(c) = transform_coord(*candidate, world_srid, layer_srid, transform) else {
            return false;
        };

        let hit = match self.config.mode {
            SnapMode::Vertex => self.vertex_hit(c),
            SnapMode::Segment => self.segment_hit(c),
            SnapMode::VertexSegment => self.vertex_hit(c).or_else(|| self.segment_hit(c)),
        };
        let Some(hit) = hit else {
            return false;
        };
        match transform_coord(hit.target, layer_srid, world_srid, transform) {
            Some(snapped) => {
                log::trace!("Snapped to feature {} at {:?}", hit.feature, snapped);
                *candidate = snapped;
                true
            }
            None => false,
        }
    }
}
