//! Geometry values edited by the engine
//!
//! Coordinates are `geo_types::Coord<f64>`. Polygon rings are stored open: the
//! closing vertex is implied and only materialized when the geometry is written
//! as WKT. Validity is derived from the vertices rather than stored.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use geo_types::Coord;
use serde::{Deserialize, Serialize};
use wkt::{ToWkt, TryFromWkt};

use super::collection::GeometryCollection;
use super::feature::FeatureId;
use super::measure;
use crate::error::{EditError, EditResult};

/// Spatial reference identifier (EPSG code)
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Srid(pub i32);

impl Srid {
    /// Missing spatial reference
    pub const UNKNOWN: Srid = Srid(0);

    pub fn is_known(self) -> bool {
        self != Self::UNKNOWN
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "EPSG:{}", self.0)
        } else {
            f.write_str("unknown SRS")
        }
    }
}

/// Identity of a geometry inside a collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryId {
    /// Geometry read from, or destined for, a feature row
    Feature(i64),
    /// Geometry that only lives in memory
    Transient(u64),
}

static NEXT_TRANSIENT_ID: AtomicU64 = AtomicU64::new(1);

impl GeometryId {
    /// Allocate a fresh in-memory id
    pub fn transient() -> Self {
        GeometryId::Transient(NEXT_TRANSIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<FeatureId> for GeometryId {
    fn from(id: FeatureId) -> Self {
        GeometryId::Feature(id.0)
    }
}

impl fmt::Display for GeometryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryId::Feature(id) => write!(f, "feature:{id}"),
            GeometryId::Transient(id) => write!(f, "#{id}"),
        }
    }
}

/// Geometry type tag
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    Line,
    #[default]
    Polygon,
    Collection,
}

impl GeometryKind {
    /// Fewest vertices a valid geometry of this kind can have
    pub fn min_vertices(self) -> usize {
        match self {
            GeometryKind::Point => 1,
            GeometryKind::Line => 2,
            GeometryKind::Polygon => 3,
            GeometryKind::Collection => 0,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GeometryKind::Point => "point",
            GeometryKind::Line => "line",
            GeometryKind::Polygon => "polygon",
            GeometryKind::Collection => "collection",
        })
    }
}

/// Axis aligned bounding box in world or display coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope from two arbitrary corners
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    pub fn from_corners(a: Coord, b: Coord) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    /// Zero-sized envelope around a single coordinate
    pub fn of_point(c: Coord) -> Self {
        Self::new(c.x, c.y, c.x, c.y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Coord {
        Coord {
            x: (self.min_x + self.max_x) * 0.5,
            y: (self.min_y + self.max_y) * 0.5,
        }
    }

    /// Check if this envelope contains a coordinate (boundary included)
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Calculate the intersection of two envelopes
    pub fn intersect(&self, other: &Envelope) -> Option<Envelope> {
        if !self.intersects(other) {
            return None;
        }
        Some(Envelope {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Grow the envelope by `margin` on every side
    pub fn expand(&self, margin: f64) -> Envelope {
        Envelope {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn merge(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn corners(&self) -> [Coord; 4] {
        [
            Coord { x: self.min_x, y: self.min_y },
            Coord { x: self.max_x, y: self.min_y },
            Coord { x: self.max_x, y: self.max_y },
            Coord { x: self.min_x, y: self.max_y },
        ]
    }
}

/// Address of a vertex: `part` is the index of the simple geometry in
/// depth-first order, `index` the position inside it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId {
    pub part: usize,
    pub index: usize,
}

impl VertexId {
    pub fn new(part: usize, index: usize) -> Self {
        Self { part, index }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Point(Option<Coord>),
    Line(Vec<Coord>),
    /// Open exterior ring, then open interior rings; holes are carried
    /// through reads and writes but never edited
    Polygon(Vec<Coord>, Vec<Vec<Coord>>),
    Collection(GeometryCollection),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    id: GeometryId,
    srid: Srid,
    shape: Shape,
}

impl Geometry {
    /// Create a geometry of `kind` without vertices
    pub fn empty(kind: GeometryKind, srid: Srid) -> Self {
        let shape = match kind {
            GeometryKind::Point => Shape::Point(None),
            GeometryKind::Line => Shape::Line(Vec::new()),
            GeometryKind::Polygon => Shape::Polygon(Vec::new(), Vec::new()),
            GeometryKind::Collection => Shape::Collection(GeometryCollection::new(srid)),
        };
        Self {
            id: GeometryId::transient(),
            srid,
            shape,
        }
    }

    pub fn point(c: Coord, srid: Srid) -> Self {
        Self {
            id: GeometryId::transient(),
            srid,
            shape: Shape::Point(Some(c)),
        }
    }

    pub fn line(coords: Vec<Coord>, srid: Srid) -> Self {
        Self {
            id: GeometryId::transient(),
            srid,
            shape: Shape::Line(coords),
        }
    }

    /// Create a polygon; a closing vertex equal to the first one is dropped
    pub fn polygon(ring: Vec<Coord>, srid: Srid) -> Self {
        Self {
            id: GeometryId::transient(),
            srid,
            shape: Shape::Polygon(open_ring(ring), Vec::new()),
        }
    }

    pub fn collection(collection: GeometryCollection) -> Self {
        Self {
            id: GeometryId::transient(),
            srid: collection.srid(),
            shape: Shape::Collection(collection),
        }
    }

    pub fn with_id(mut self, id: GeometryId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn set_id(&mut self, id: GeometryId) {
        self.id = id;
    }

    pub fn srid(&self) -> Srid {
        self.srid
    }

    /// Change the spatial reference label; children of a collection are
    /// updated before the collection itself
    pub fn set_srid(&mut self, srid: Srid) {
        if let Shape::Collection(c) = &mut self.shape {
            c.assign_spatial_reference(srid);
        }
        self.srid = srid;
    }

    pub fn kind(&self) -> GeometryKind {
        match self.shape {
            Shape::Point(_) => GeometryKind::Point,
            Shape::Line(_) => GeometryKind::Line,
            Shape::Polygon(..) => GeometryKind::Polygon,
            Shape::Collection(_) => GeometryKind::Collection,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.shape, Shape::Collection(_))
    }

    pub fn as_collection(&self) -> Option<&GeometryCollection> {
        match &self.shape {
            Shape::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Vertices of a simple geometry; empty for collections
    pub fn coords(&self) -> &[Coord] {
        match &self.shape {
            Shape::Point(p) => p.as_slice(),
            Shape::Line(v) | Shape::Polygon(v, _) => v,
            Shape::Collection(_) => &[],
        }
    }

    /// Holes of a polygon, open like the exterior ring
    pub fn interior_rings(&self) -> &[Vec<Coord>] {
        match &self.shape {
            Shape::Polygon(_, holes) => holes,
            _ => &[],
        }
    }

    /// Total vertex count, collections included
    pub fn vertex_count(&self) -> usize {
        self.leaves().iter().map(|leaf| leaf.coords().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    pub fn is_valid(&self) -> bool {
        match &self.shape {
            Shape::Point(p) => p.is_some(),
            Shape::Line(v) => measure::distinct_count(v) >= GeometryKind::Line.min_vertices(),
            Shape::Polygon(v, _) => {
                measure::distinct_count(v) >= GeometryKind::Polygon.min_vertices()
            }
            Shape::Collection(c) => c.is_valid(),
        }
    }

    /// Lines are closed when they end where they start; polygon rings are
    /// implicitly closed once valid; points never are
    pub fn is_closed(&self) -> bool {
        match &self.shape {
            Shape::Point(_) => false,
            Shape::Line(v) => v.len() > 2 && v.first() == v.last(),
            Shape::Polygon(..) => self.is_valid(),
            Shape::Collection(c) => c.is_closed(),
        }
    }

    /// Append a vertex to a simple geometry; a point has its vertex replaced
    pub fn push_vertex(&mut self, c: Coord) -> bool {
        match &mut self.shape {
            Shape::Point(p) => {
                *p = Some(c);
                true
            }
            Shape::Line(v) | Shape::Polygon(v, _) => {
                v.push(c);
                true
            }
            Shape::Collection(_) => false,
        }
    }

    pub fn pop_vertex(&mut self) -> Option<Coord> {
        match &mut self.shape {
            Shape::Point(p) => p.take(),
            Shape::Line(v) | Shape::Polygon(v, _) => v.pop(),
            Shape::Collection(_) => None,
        }
    }

    pub fn last_vertex_mut(&mut self) -> Option<&mut Coord> {
        match &mut self.shape {
            Shape::Point(p) => p.as_mut(),
            Shape::Line(v) | Shape::Polygon(v, _) => v.last_mut(),
            Shape::Collection(_) => None,
        }
    }

    /// Simple geometries in depth-first order
    pub fn leaves(&self) -> Vec<&Geometry> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Geometry>) {
        match &self.shape {
            Shape::Collection(c) => c.iter().for_each(|child| child.collect_leaves(out)),
            _ => out.push(self),
        }
    }

    fn leaf_mut(&mut self, part: usize) -> Option<&mut Geometry> {
        let mut remaining = part;
        self.find_leaf_mut(&mut remaining)
    }

    fn find_leaf_mut(&mut self, remaining: &mut usize) -> Option<&mut Geometry> {
        if !self.is_collection() {
            if *remaining == 0 {
                return Some(self);
            }
            *remaining -= 1;
            return None;
        }
        let Shape::Collection(c) = &mut self.shape else {
            return None;
        };
        for child in c.iter_mut() {
            if let Some(found) = child.find_leaf_mut(remaining) {
                return Some(found);
            }
        }
        None
    }

    pub fn vertices(&self) -> Vec<(VertexId, Coord)> {
        self.leaves()
            .into_iter()
            .enumerate()
            .flat_map(|(part, leaf)| {
                leaf.coords()
                    .iter()
                    .enumerate()
                    .map(move |(index, c)| (VertexId::new(part, index), *c))
            })
            .collect()
    }

    pub fn vertex(&self, id: VertexId) -> Option<Coord> {
        self.leaves()
            .get(id.part)
            .and_then(|leaf| leaf.coords().get(id.index).copied())
    }

    pub fn set_vertex(&mut self, id: VertexId, c: Coord) -> bool {
        let Some(leaf) = self.leaf_mut(id.part) else {
            return false;
        };
        match &mut leaf.shape {
            Shape::Point(p) if id.index == 0 && p.is_some() => {
                *p = Some(c);
                true
            }
            Shape::Line(v) | Shape::Polygon(v, _) => match v.get_mut(id.index) {
                Some(slot) => {
                    *slot = c;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Insert a vertex so that it ends up at `id`; points cannot grow
    pub fn insert_vertex(&mut self, id: VertexId, c: Coord) -> bool {
        let Some(leaf) = self.leaf_mut(id.part) else {
            return false;
        };
        match &mut leaf.shape {
            Shape::Line(v) | Shape::Polygon(v, _) if id.index <= v.len() => {
                v.insert(id.index, c);
                true
            }
            _ => false,
        }
    }

    /// Remove a vertex unless that leaves fewer than the kind's minimum
    pub fn remove_vertex(&mut self, id: VertexId) -> bool {
        let Some(leaf) = self.leaf_mut(id.part) else {
            return false;
        };
        let min = leaf.kind().min_vertices();
        match &mut leaf.shape {
            Shape::Line(v) | Shape::Polygon(v, _) if id.index < v.len() && v.len() > min => {
                v.remove(id.index);
                true
            }
            _ => false,
        }
    }

    /// Edges with the position a vertex splitting them would be inserted at
    pub fn edges(&self) -> Vec<(VertexId, Coord, Coord)> {
        let mut out = Vec::new();
        for (part, leaf) in self.leaves().into_iter().enumerate() {
            let v = leaf.coords();
            for (i, pair) in v.windows(2).enumerate() {
                out.push((VertexId::new(part, i + 1), pair[0], pair[1]));
            }
            if leaf.kind() == GeometryKind::Polygon && v.len() >= 3 {
                out.push((VertexId::new(part, v.len()), v[v.len() - 1], v[0]));
            }
        }
        out
    }

    pub fn segments(&self) -> Vec<(Coord, Coord)> {
        self.edges().into_iter().map(|(_, a, b)| (a, b)).collect()
    }

    pub fn envelope(&self) -> Option<Envelope> {
        self.leaves()
            .iter()
            .flat_map(|leaf| leaf.coords().iter())
            .map(|c| Envelope::of_point(*c))
            .reduce(|acc, env| acc.merge(&env))
    }

    pub fn intersects_envelope(&self, env: &Envelope) -> bool {
        match &self.shape {
            Shape::Point(p) => p.is_some_and(|c| env.contains(c)),
            Shape::Line(v) => {
                v.iter().any(|c| env.contains(*c))
                    || v
                        .windows(2)
                        .any(|s| measure::segment_intersects_envelope(s[0], s[1], env))
            }
            Shape::Polygon(v, _) => {
                v.iter().any(|c| env.contains(*c))
                    || self
                        .segments()
                        .iter()
                        .any(|(a, b)| measure::segment_intersects_envelope(*a, *b, env))
                    || env.corners().iter().any(|c| measure::point_in_ring(*c, v))
            }
            Shape::Collection(c) => c.iter().any(|child| child.intersects_envelope(env)),
        }
    }

    /// Visit every coordinate, polygon holes included; stops at the first
    /// visit returning false
    pub fn for_each_coord_mut(&mut self, f: &mut dyn FnMut(&mut Coord) -> bool) -> bool {
        match &mut self.shape {
            Shape::Point(p) => p.as_mut().is_none_or(|c| f(c)),
            Shape::Line(v) => v.iter_mut().all(|c| f(c)),
            Shape::Polygon(v, holes) => {
                v.iter_mut().all(|c| f(c)) && holes.iter_mut().flatten().all(|c| f(c))
            }
            Shape::Collection(c) => c.iter_mut().all(|child| child.for_each_coord_mut(&mut *f)),
        }
    }

    pub fn to_geo(&self) -> EditResult<geo_types::Geometry<f64>> {
        Ok(match &self.shape {
            Shape::Point(Some(c)) => geo_types::Geometry::Point(geo_types::Point(*c)),
            Shape::Point(None) => return Err(EditError::EmptyGeometry),
            Shape::Line(v) => {
                geo_types::Geometry::LineString(geo_types::LineString::new(v.clone()))
            }
            Shape::Polygon(v, holes) => geo_types::Geometry::Polygon(geo_types::Polygon::new(
                geo_types::LineString::new(v.clone()),
                holes
                    .iter()
                    .map(|ring| geo_types::LineString::new(ring.clone()))
                    .collect(),
            )),
            Shape::Collection(c) => {
                let parts = c
                    .iter()
                    .map(Geometry::to_geo)
                    .collect::<EditResult<Vec<_>>>()?;
                join_parts(c.multi_kind(), parts)
            }
        })
    }

    /// Convert a `geo_types` value; multi-geometries become collections
    /// tagged with their member kind so they are written back as such
    pub fn from_geo(geo: geo_types::Geometry<f64>, srid: Srid) -> EditResult<Self> {
        use geo_types::Geometry as G;

        let shape = match geo {
            G::Point(p) => Shape::Point(Some(p.0)),
            G::Line(l) => Shape::Line(vec![l.start, l.end]),
            G::LineString(ls) => Shape::Line(ls.0),
            G::Polygon(p) => polygon_shape(p),
            G::Rect(r) => polygon_shape(r.to_polygon()),
            G::Triangle(t) => polygon_shape(t.to_polygon()),
            G::MultiPoint(mp) => {
                collection_of(mp.0.into_iter().map(G::Point), srid, Some(GeometryKind::Point))?
            }
            G::MultiLineString(ml) => {
                collection_of(ml.0.into_iter().map(G::LineString), srid, Some(GeometryKind::Line))?
            }
            G::MultiPolygon(mp) => {
                collection_of(mp.0.into_iter().map(G::Polygon), srid, Some(GeometryKind::Polygon))?
            }
            G::GeometryCollection(gc) => collection_of(gc.0.into_iter(), srid, None)?,
            #[allow(unreachable_patterns)]
            _ => return Err(EditError::MalformedWkt("unsupported geometry type".into())),
        };
        Ok(Self {
            id: GeometryId::transient(),
            srid,
            shape,
        })
    }

    pub fn to_wkt(&self) -> EditResult<String> {
        Ok(self.to_geo()?.wkt_string())
    }

    pub fn from_wkt(text: &str, srid: Srid) -> EditResult<Self> {
        let geo = geo_types::Geometry::<f64>::try_from_wkt_str(text)
            .map_err(|e| EditError::MalformedWkt(e.to_string()))?;
        Self::from_geo(geo, srid)
    }
}

fn open_ring(mut ring: Vec<Coord>) -> Vec<Coord> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn polygon_shape(polygon: geo_types::Polygon<f64>) -> Shape {
    let (exterior, interiors) = polygon.into_inner();
    let holes = interiors.into_iter().map(|ring| open_ring(ring.0)).collect();
    Shape::Polygon(open_ring(exterior.0), holes)
}

fn collection_of(
    children: impl Iterator<Item = geo_types::Geometry<f64>>,
    srid: Srid,
    multi: Option<GeometryKind>,
) -> EditResult<Shape> {
    let mut collection = GeometryCollection::new(srid).with_multi_kind(multi);
    for child in children {
        collection.append(Geometry::from_geo(child, srid)?)?;
    }
    Ok(Shape::Collection(collection))
}

/// Rebuild the multi-geometry a collection was read from; a mixed or
/// mistagged collection is written as a plain geometry collection
fn join_parts(
    multi: Option<GeometryKind>,
    parts: Vec<geo_types::Geometry<f64>>,
) -> geo_types::Geometry<f64> {
    use geo_types::Geometry as G;

    match multi {
        Some(GeometryKind::Point) if parts.iter().all(|p| matches!(p, G::Point(_))) => {
            G::MultiPoint(
                parts
                    .into_iter()
                    .filter_map(|p| geo_types::Point::try_from(p).ok())
                    .collect(),
            )
        }
        Some(GeometryKind::Line) if parts.iter().all(|p| matches!(p, G::LineString(_))) => {
            G::MultiLineString(
                parts
                    .into_iter()
                    .filter_map(|p| geo_types::LineString::try_from(p).ok())
                    .collect(),
            )
        }
        Some(GeometryKind::Polygon) if parts.iter().all(|p| matches!(p, G::Polygon(_))) => {
            G::MultiPolygon(
                parts
                    .into_iter()
                    .filter_map(|p| geo_types::Polygon::try_from(p).ok())
                    .collect(),
            )
        }
        _ => G::GeometryCollection(geo_types::GeometryCollection(parts)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::coord;

    const WEB: Srid = Srid(3857);

    fn square() -> Geometry {
        Geometry::polygon(
            vec![
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 10.0, y: 0.0 },
                coord! { x: 10.0, y: 10.0 },
                coord! { x: 0.0, y: 10.0 },
            ],
            WEB,
        )
    }

    #[test]
    fn test_envelope_normalizes_corners() {
        let env = Envelope::new(5.0, 8.0, -1.0, 2.0);
        assert_eq!(env, Envelope::new(-1.0, 2.0, 5.0, 8.0));
        assert_eq!(env.width(), 6.0);
        assert_eq!(env.height(), 6.0);
        assert!(env.contains(coord! { x: 5.0, y: 2.0 }));
    }

    #[test]
    fn test_envelope_intersection() {
        let a = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let b = Envelope::new(5.0, 5.0, 20.0, 20.0);
        assert_eq!(a.intersect(&b), Some(Envelope::new(5.0, 5.0, 10.0, 10.0)));
        assert_eq!(a.intersect(&Envelope::new(11.0, 11.0, 12.0, 12.0)), None);
    }

    #[test]
    fn test_polygon_validity_counts_distinct_points() {
        let a = coord! { x: 0.0, y: 0.0 };
        let b = coord! { x: 1.0, y: 0.0 };
        assert!(!Geometry::polygon(vec![a, b], WEB).is_valid());
        assert!(!Geometry::polygon(vec![a, b, b], WEB).is_valid());
        assert!(square().is_valid());
        assert!(square().is_closed());
    }

    #[test]
    fn test_polygon_constructor_opens_closed_ring() {
        let mut ring = square().coords().to_vec();
        ring.push(ring[0]);
        assert_eq!(Geometry::polygon(ring, WEB).coords().len(), 4);
    }

    #[test]
    fn test_line_closed_only_when_ends_meet() {
        let a = coord! { x: 0.0, y: 0.0 };
        let b = coord! { x: 1.0, y: 0.0 };
        let c = coord! { x: 1.0, y: 1.0 };
        assert!(!Geometry::line(vec![a, b, c], WEB).is_closed());
        assert!(Geometry::line(vec![a, b, c, a], WEB).is_closed());
        assert!(!Geometry::point(a, WEB).is_closed());
    }

    #[test]
    fn test_remove_vertex_respects_minimum() {
        let mut g = square();
        assert!(g.remove_vertex(VertexId::new(0, 1)));
        assert_eq!(g.coords().len(), 3);
        assert!(!g.remove_vertex(VertexId::new(0, 0)));
        assert_eq!(g.coords().len(), 3);
    }

    #[test]
    fn test_vertex_addressing_in_collection() {
        let mut c = GeometryCollection::new(WEB);
        c.append(Geometry::point(coord! { x: 1.0, y: 1.0 }, WEB)).unwrap();
        c.append(square()).unwrap();
        let mut g = Geometry::collection(c);

        assert_eq!(g.vertex_count(), 5);
        assert_eq!(g.vertex(VertexId::new(1, 2)), Some(coord! { x: 10.0, y: 10.0 }));
        assert!(g.set_vertex(VertexId::new(1, 2), coord! { x: 12.0, y: 12.0 }));
        assert_eq!(g.vertex(VertexId::new(1, 2)), Some(coord! { x: 12.0, y: 12.0 }));
        assert!(!g.set_vertex(VertexId::new(2, 0), coord! { x: 0.0, y: 0.0 }));
        assert!(!g.insert_vertex(VertexId::new(0, 1), coord! { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn test_polygon_edges_include_closing_edge() {
        let edges = square().edges();
        assert_eq!(edges.len(), 4);
        let (at, a, b) = edges[3];
        assert_eq!(at, VertexId::new(0, 4));
        assert_eq!(a, coord! { x: 0.0, y: 10.0 });
        assert_eq!(b, coord! { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_polygon_intersects_envelope_inside_it() {
        let g = square();
        assert!(g.intersects_envelope(&Envelope::new(4.0, 4.0, 6.0, 6.0)));
        assert!(g.intersects_envelope(&Envelope::new(-1.0, -1.0, 1.0, 1.0)));
        assert!(!g.intersects_envelope(&Envelope::new(20.0, 20.0, 30.0, 30.0)));
    }

    #[test]
    fn test_line_intersects_envelope_across() {
        let g = Geometry::line(
            vec![coord! { x: -10.0, y: 5.0 }, coord! { x: 20.0, y: 5.0 }],
            WEB,
        );
        assert!(g.intersects_envelope(&Envelope::new(0.0, 0.0, 10.0, 10.0)));
        assert!(!g.intersects_envelope(&Envelope::new(0.0, 6.0, 10.0, 10.0)));
    }

    #[test]
    fn test_wkt_polygon_round_trip_keeps_open_ring() {
        let text = square().to_wkt().unwrap();
        assert!(text.starts_with("POLYGON"));
        let back = Geometry::from_wkt(&text, WEB).unwrap();
        assert_eq!(back.kind(), GeometryKind::Polygon);
        assert_eq!(back.coords(), square().coords());
        assert_eq!(back.srid(), WEB);
    }

    #[test]
    fn test_wkt_multipoint_becomes_collection() {
        let g = Geometry::from_wkt("MULTIPOINT((1 2),(3 4))", WEB).unwrap();
        let c = g.as_collection().unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.iter().all(|child| child.srid() == WEB));
    }

    #[test]
    fn test_edited_multipolygon_is_written_as_multipolygon() {
        let mut g = Geometry::from_wkt(
            "MULTIPOLYGON(((10 10,50 10,50 50,10 50,10 10)),((60 60,90 60,90 90,60 60)))",
            WEB,
        )
        .unwrap();
        assert_eq!(g.as_collection().unwrap().multi_kind(), Some(GeometryKind::Polygon));
        assert!(g.set_vertex(VertexId::new(0, 0), coord! { x: 12.0, y: 12.0 }));

        let text = g.to_wkt().unwrap();
        assert!(text.starts_with("MULTIPOLYGON"), "{text}");
        let back = Geometry::from_wkt(&text, WEB).unwrap();
        assert_eq!(back.as_collection().unwrap().len(), 2);
        assert_eq!(back.vertex(VertexId::new(0, 0)), Some(coord! { x: 12.0, y: 12.0 }));
    }

    #[test]
    fn test_multiline_and_multipoint_keep_their_type() {
        let mut lines =
            Geometry::from_wkt("MULTILINESTRING((0 0,5 5),(10 10,20 20))", WEB).unwrap();
        assert!(lines.set_vertex(VertexId::new(1, 1), coord! { x: 25.0, y: 20.0 }));
        assert!(lines.to_wkt().unwrap().starts_with("MULTILINESTRING"));

        let points = Geometry::from_wkt("MULTIPOINT((1 2),(3 4))", WEB).unwrap();
        assert!(points.to_wkt().unwrap().starts_with("MULTIPOINT"));

        let mixed = Geometry::from_wkt("GEOMETRYCOLLECTION(POINT(1 2),LINESTRING(0 0,1 1))", WEB)
            .unwrap();
        assert_eq!(mixed.as_collection().unwrap().multi_kind(), None);
        assert!(mixed.to_wkt().unwrap().starts_with("GEOMETRYCOLLECTION"));
    }

    #[test]
    fn test_polygon_hole_survives_vertex_move() {
        let mut g = Geometry::from_wkt(
            "POLYGON((10 10,50 10,50 50,10 50,10 10),(20 20,30 20,30 30,20 20))",
            WEB,
        )
        .unwrap();
        assert_eq!(g.vertex_count(), 4);
        assert!(g.set_vertex(VertexId::new(0, 2), coord! { x: 55.0, y: 55.0 }));

        let back = Geometry::from_wkt(&g.to_wkt().unwrap(), WEB).unwrap();
        assert_eq!(back.coords()[2], coord! { x: 55.0, y: 55.0 });
        assert_eq!(
            back.interior_rings(),
            &[vec![
                coord! { x: 20.0, y: 20.0 },
                coord! { x: 30.0, y: 20.0 },
                coord! { x: 30.0, y: 30.0 },
            ]]
        );
    }

    #[test]
    fn test_coordinate_visit_reaches_holes() {
        let mut g = Geometry::from_wkt(
            "POLYGON((0 0,40 0,40 40,0 40,0 0),(10 10,20 10,20 20,10 10))",
            WEB,
        )
        .unwrap();
        assert!(g.for_each_coord_mut(&mut |c: &mut Coord| {
            c.x += 100.0;
            true
        }));
        assert_eq!(g.coords()[0], coord! { x: 100.0, y: 0.0 });
        assert_eq!(g.interior_rings()[0][0], coord! { x: 110.0, y: 10.0 });
    }

    #[test]
    fn test_malformed_wkt_is_reported() {
        let err = Geometry::from_wkt("POLYGON((0 0, 1", WEB).unwrap_err();
        assert!(matches!(err, EditError::MalformedWkt(_)));
    }

    #[test]
    fn test_empty_point_has_no_wkt() {
        let g = Geometry::empty(GeometryKind::Point, WEB);
        assert_eq!(g.to_wkt(), Err(EditError::EmptyGeometry));
    }
}
