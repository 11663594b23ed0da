//! Ordered, owning aggregate of geometries sharing one spatial reference

use geo_types::Coord;

use super::geometry::{Envelope, Geometry, GeometryId, GeometryKind, Srid};
use crate::error::{EditError, EditResult};

/// Owns its geometries; every member carries the collection's SRID
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryCollection {
    srid: Srid,
    items: Vec<Geometry>,
    /// Member kind of the multi-geometry this collection was read from
    multi: Option<GeometryKind>,
}

impl GeometryCollection {
    pub fn new(srid: Srid) -> Self {
        Self {
            srid,
            items: Vec::new(),
            multi: None,
        }
    }

    /// Mark the collection as a multi-point, multi-line or multi-polygon
    pub fn with_multi_kind(mut self, kind: Option<GeometryKind>) -> Self {
        self.multi = kind.filter(|k| *k != GeometryKind::Collection);
        self
    }

    pub fn multi_kind(&self) -> Option<GeometryKind> {
        self.multi
    }

    pub fn srid(&self) -> Srid {
        self.srid
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: GeometryId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: GeometryId) -> Option<usize> {
        self.items.iter().position(|g| g.id() == id)
    }

    fn check_insertable(&self, g: &Geometry) -> EditResult<()> {
        if g.srid() != self.srid {
            return Err(EditError::SpatialReferenceMismatch {
                expected: self.srid,
                found: g.srid(),
            });
        }
        if self.contains(g.id()) {
            return Err(EditError::DuplicateGeometry(g.id()));
        }
        Ok(())
    }

    /// Take ownership of `g` at the end of the collection
    pub fn append(&mut self, g: Geometry) -> EditResult<()> {
        self.check_insertable(&g)?;
        self.items.push(g);
        Ok(())
    }

    /// Take ownership of `g`, placing it right before `reference`
    pub fn insert_before(&mut self, g: Geometry, reference: GeometryId) -> EditResult<()> {
        let at = self
            .position(reference)
            .ok_or(EditError::MissingGeometry(reference))?;
        self.check_insertable(&g)?;
        self.items.insert(at, g);
        Ok(())
    }

    /// Detach a geometry and hand it back to the caller
    pub fn remove_by_id(&mut self, id: GeometryId) -> Option<Geometry> {
        let at = self.position(id)?;
        Some(self.items.remove(at))
    }

    /// Detach and drop a geometry
    pub fn delete_by_id(&mut self, id: GeometryId) -> bool {
        self.remove_by_id(id).is_some()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Relabel every member first, then the collection, so no member is ever
    /// checked against a half-updated SRID
    pub fn assign_spatial_reference(&mut self, srid: Srid) {
        for g in &mut self.items {
            g.set_srid(srid);
        }
        self.srid = srid;
    }

    /// True when every member is valid; vacuously true when empty
    pub fn is_valid(&self) -> bool {
        self.items.iter().all(Geometry::is_valid)
    }

    /// True when every member is closed; vacuously true when empty
    pub fn is_closed(&self) -> bool {
        self.items.iter().all(Geometry::is_closed)
    }

    pub fn get(&self, id: GeometryId) -> Option<&Geometry> {
        self.items.iter().find(|g| g.id() == id)
    }

    pub fn get_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.items.iter_mut().find(|g| g.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Geometry> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Geometry> {
        self.items.iter_mut()
    }

    pub fn ids(&self) -> Vec<GeometryId> {
        self.items.iter().map(Geometry::id).collect()
    }

    pub fn envelope(&self) -> Option<Envelope> {
        self.items
            .iter()
            .filter_map(Geometry::envelope)
            .reduce(|acc, env| acc.merge(&env))
    }

    /// Members touching `env`, in collection order
    pub fn query(&self, env: &Envelope) -> Vec<&Geometry> {
        self.items
            .iter()
            .filter(|g| g.intersects_envelope(env))
            .collect()
    }

    /// Every vertex of every member
    pub fn coords(&self) -> Vec<Coord> {
        self.items
            .iter()
            .flat_map(|g| g.vertices().into_iter().map(|(_, c)| c))
            .collect()
    }
}

impl From<Geometry> for GeometryCollection {
    fn from(g: Geometry) -> Self {
        Self {
            srid: g.srid(),
            items: vec![g],
            multi: None,
        }
    }
}

impl<'a> IntoIterator for &'a GeometryCollection {
    type Item = &'a Geometry;
    type IntoIter = std::slice::Iter<'a, Geometry>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::coord;

    const WEB: Srid = Srid(3857);
    const WGS84: Srid = Srid(4326);

    fn pt(x: f64, y: f64) -> Geometry {
        Geometry::point(coord! { x: x, y: y }, WEB)
    }

    #[test]
    fn test_append_rejects_mismatched_srid() {
        let mut c = GeometryCollection::new(WEB);
        let g = Geometry::point(coord! { x: 0.0, y: 0.0 }, WGS84);
        assert_eq!(
            c.append(g),
            Err(EditError::SpatialReferenceMismatch {
                expected: WEB,
                found: WGS84
            })
        );
        assert!(c.is_empty());
    }

    #[test]
    fn test_append_rejects_duplicate_id() {
        let mut c = GeometryCollection::new(WEB);
        let g = pt(1.0, 1.0);
        let copy = g.clone();
        c.append(g).unwrap();
        assert_eq!(c.append(copy.clone()), Err(EditError::DuplicateGeometry(copy.id())));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_remove_and_reappend_lands_at_end() {
        let mut c = GeometryCollection::new(WEB);
        let (a, b, d) = (pt(0.0, 0.0), pt(1.0, 1.0), pt(2.0, 2.0));
        let (ida, idb, idd) = (a.id(), b.id(), d.id());
        c.append(a).unwrap();
        c.append(b).unwrap();
        c.append(d).unwrap();

        let removed = c.remove_by_id(idb).unwrap();
        assert_eq!(c.ids(), vec![ida, idd]);
        c.append(removed).unwrap();
        assert_eq!(c.ids(), vec![ida, idd, idb]);
    }

    #[test]
    fn test_delete_by_id_drops_member() {
        let mut c = GeometryCollection::new(WEB);
        let g = pt(0.0, 0.0);
        let id = g.id();
        c.append(g).unwrap();
        assert!(c.delete_by_id(id));
        assert!(!c.delete_by_id(id));
        assert!(c.get(id).is_none());
    }

    #[test]
    fn test_insert_before_requires_reference() {
        let mut c = GeometryCollection::new(WEB);
        let a = pt(0.0, 0.0);
        let ida = a.id();
        c.append(a).unwrap();

        let b = pt(1.0, 1.0);
        let idb = b.id();
        c.insert_before(b, ida).unwrap();
        assert_eq!(c.ids(), vec![idb, ida]);

        let missing = GeometryId::transient();
        assert_eq!(
            c.insert_before(pt(5.0, 5.0), missing),
            Err(EditError::MissingGeometry(missing))
        );
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_assign_spatial_reference_propagates_to_nested_members() {
        let mut inner = GeometryCollection::new(WEB);
        inner.append(pt(0.0, 0.0)).unwrap();
        let mut c = GeometryCollection::new(WEB);
        c.append(Geometry::collection(inner)).unwrap();
        c.append(pt(3.0, 3.0)).unwrap();

        c.assign_spatial_reference(WGS84);
        assert_eq!(c.srid(), WGS84);
        for g in &c {
            assert_eq!(g.srid(), WGS84);
            if let Some(nested) = g.as_collection() {
                assert_eq!(nested.srid(), WGS84);
                assert!(nested.iter().all(|n| n.srid() == WGS84));
            }
        }
        // Still accepts members of the new reference
        c.append(Geometry::point(coord! { x: 9.0, y: 9.0 }, WGS84)).unwrap();
    }

    #[test]
    fn test_validity_is_vacuous_when_empty() {
        let mut c = GeometryCollection::new(WEB);
        assert!(c.is_valid());
        assert!(c.is_closed());
        c.append(Geometry::empty(GeometryKind::Polygon, WEB)).unwrap();
        assert!(!c.is_valid());
    }

    #[test]
    fn test_envelope_and_query() {
        let mut c = GeometryCollection::new(WEB);
        c.append(pt(0.0, 0.0)).unwrap();
        c.append(pt(10.0, 5.0)).unwrap();
        assert_eq!(c.envelope(), Some(Envelope::new(0.0, 0.0, 10.0, 5.0)));
        assert_eq!(c.query(&Envelope::new(9.0, 4.0, 11.0, 6.0)).len(), 1);
        assert_eq!(c.coords().len(), 2);
    }
}
