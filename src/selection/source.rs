//! Selection sources
//!
//! A source owns the set of selected features for one backing. The layer
//! source is scoped to a single datasource and queries the layer table; the
//! external source accepts any datasource and queries geometries registered
//! by the host.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
    DatasourceId, Envelope, FeatureId, FeatureKey, Geometry, GeometryCollection, GeometryId,
    Layer, SelectMode, Srid,
};
use crate::error::{EditError, EditResult};
use crate::table::Table;
use crate::world::{CoordTransform, transform_coord, transform_geometry};

/// Envelope covering `env` once its corners are expressed in `to`
fn transform_envelope(
    env: &Envelope,
    from: Srid,
    to: Srid,
    transform: &dyn CoordTransform,
) -> Option<Envelope> {
    env.corners()
        .into_iter()
        .map(|c| transform_coord(c, from, to, transform).map(Envelope::of_point))
        .reduce(|acc, env| Some(acc?.merge(&env?)))
        .flatten()
}

/// Collect `geometry` into `out`, giving it a fresh id if another member
/// already uses its id
fn push_unique(out: &mut GeometryCollection, mut geometry: Geometry) {
    if out.contains(geometry.id()) {
        geometry.set_id(GeometryId::transient());
    }
    if let Err(err) = out.append(geometry) {
        log::warn!("Dropping selected geometry: {}", err);
    }
}

/// Replace or extend `selected` with `matches`; true if anything changed
fn apply_matches<K: Ord + Clone>(
    selected: &mut BTreeSet<K>,
    matches: BTreeSet<K>,
    mode: SelectMode,
) -> bool {
    match mode {
        SelectMode::Replace => {
            let changed = *selected != matches;
            *selected = matches;
            changed
        }
        SelectMode::Accumulate => {
            let before = selected.len();
            selected.extend(matches);
            selected.len() != before
        }
    }
}

/// Selection over the features of one layer table
#[derive(Debug, Clone)]
pub struct LayerSelectionSource {
    layer: Layer,
    selected: BTreeSet<FeatureId>,
}

impl LayerSelectionSource {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            selected: BTreeSet::new(),
        }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    fn check_datasource(&self, datasource: &DatasourceId) -> EditResult<()> {
        if *datasource != self.layer.datasource {
            return Err(EditError::DatasourceMismatch {
                expected: self.layer.datasource.clone(),
                found: datasource.clone(),
            });
        }
        Ok(())
    }

    fn select(&mut self, id: FeatureId, datasource: &DatasourceId) -> EditResult<bool> {
        self.check_datasource(datasource)?;
        Ok(self.selected.insert(id))
    }

    fn unselect(&mut self, id: FeatureId, datasource: &DatasourceId) -> EditResult<bool> {
        self.check_datasource(datasource)?;
        Ok(self.selected.remove(&id))
    }

    fn select_area(
        &mut self,
        table: Option<&dyn Table>,
        area: &Envelope,
        area_srid: Srid,
        transform: &dyn CoordTransform,
        mode: SelectMode,
    ) -> EditResult<bool> {
        let table = table.ok_or(EditError::MissingBinding("table"))?;
        self.layer.geometry_column_index(table)?;
        let Some(area) = transform_envelope(area, area_srid, self.layer.srid, transform) else {
            log::debug!("Area selection skipped: cannot reach {}", self.layer.srid);
            return Ok(false);
        };

        let mut matches = BTreeSet::new();
        for row in table.rows() {
            match self.layer.read_geometry(table, row) {
                Ok(Some(g)) if g.intersects_envelope(&area) => {
                    matches.insert(row);
                }
                Ok(_) => {}
                Err(err) => log::warn!("Skipping feature {} in area selection: {}", row, err),
            }
        }
        Ok(apply_matches(&mut self.selected, matches, mode))
    }

    fn selected_geometries(
        &self,
        table: Option<&dyn Table>,
        srid: Srid,
        transform: &dyn CoordTransform,
    ) -> GeometryCollection {
        let mut out = GeometryCollection::new(srid);
        let Some(table) = table else {
            return out;
        };
        for id in &self.selected {
            let geometry = match self.layer.read_geometry(table, *id) {
                Ok(Some(g)) => g,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("Cannot read selected feature {}: {}", id, err);
                    continue;
                }
            };
            if let Some(g) = transform_geometry(&geometry, srid, transform) {
                push_unique(&mut out, g);
            }
        }
        out
    }
}

/// Selection over geometries supplied by the host, from any datasource
#[derive(Debug, Clone, Default)]
pub struct ExternalSelectionSource {
    geometries: BTreeMap<FeatureKey, Geometry>,
    selected: BTreeSet<FeatureKey>,
}

impl ExternalSelectionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a feature geometry known to area queries and rendering
    pub fn register(&mut self, key: FeatureKey, geometry: Geometry) {
        self.geometries.insert(key, geometry);
    }

    /// Forget a feature geometry; it stays selected if it was
    pub fn unregister(&mut self, key: &FeatureKey) -> Option<Geometry> {
        self.geometries.remove(key)
    }

    fn select_area(
        &mut self,
        area: &Envelope,
        area_srid: Srid,
        transform: &dyn CoordTransform,
        mode: SelectMode,
    ) -> bool {
        let matches: BTreeSet<FeatureKey> = self
            .geometries
            .iter()
            .filter(|(_, g)| {
                transform_envelope(area, area_srid, g.srid(), transform)
                    .is_some_and(|env| g.intersects_envelope(&env))
            })
            .map(|(key, _)| key.clone())
            .collect();
        apply_matches(&mut self.selected, matches, mode)
    }

    fn selected_geometries(
        &self,
        srid: Srid,
        transform: &dyn CoordTransform,
    ) -> GeometryCollection {
        let mut out = GeometryCollection::new(srid);
        for key in &self.selected {
            if let Some(g) = self
                .geometries
                .get(key)
                .and_then(|g| transform_geometry(g, srid, transform))
            {
                push_unique(&mut out, g);
            }
        }
        out
    }
}

/// The closed set of selection backings
#[derive(Debug, Clone)]
pub enum FeatureSelectionSource {
    Layer(LayerSelectionSource),
    External(ExternalSelectionSource),
}

impl FeatureSelectionSource {
    /// Datasource this source is scoped to; `None` when source-agnostic
    pub fn working_datasource_id(&self) -> Option<&DatasourceId> {
        match self {
            FeatureSelectionSource::Layer(s) => Some(&s.layer.datasource),
            FeatureSelectionSource::External(_) => None,
        }
    }

    pub fn select(&mut self, id: FeatureId, datasource: &DatasourceId) -> EditResult<bool> {
        match self {
            FeatureSelectionSource::Layer(s) => s.select(id, datasource),
            FeatureSelectionSource::External(s) => {
                Ok(s.selected.insert(FeatureKey::new(datasource.clone(), id)))
            }
        }
    }

    pub fn unselect(&mut self, id: FeatureId, datasource: &DatasourceId) -> EditResult<bool> {
        match self {
            FeatureSelectionSource::Layer(s) => s.unselect(id, datasource),
            FeatureSelectionSource::External(s) => {
                Ok(s.selected.remove(&FeatureKey::new(datasource.clone(), id)))
            }
        }
    }

    pub fn clear(&mut self) -> bool {
        match self {
            FeatureSelectionSource::Layer(s) => {
                let changed = !s.selected.is_empty();
                s.selected.clear();
                changed
            }
            FeatureSelectionSource::External(s) => {
                let changed = !s.selected.is_empty();
                s.selected.clear();
                changed
            }
        }
    }

    pub fn is_selected(&self, id: FeatureId, datasource: &DatasourceId) -> bool {
        match self {
            FeatureSelectionSource::Layer(s) => {
                s.layer.datasource == *datasource && s.selected.contains(&id)
            }
            FeatureSelectionSource::External(s) => s
                .selected
                .contains(&FeatureKey::new(datasource.clone(), id)),
        }
    }

    pub fn selected(&self) -> Vec<FeatureKey> {
        match self {
            FeatureSelectionSource::Layer(s) => s
                .selected
                .iter()
                .map(|id| FeatureKey::new(s.layer.datasource.clone(), *id))
                .collect(),
            FeatureSelectionSource::External(s) => s.selected.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FeatureSelectionSource::Layer(s) => s.selected.len(),
            FeatureSelectionSource::External(s) => s.selected.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select the features whose geometry intersects `area`, given in
    /// `area_srid`. A failed transform leaves the selection untouched.
    pub fn select_area(
        &mut self,
        table: Option<&dyn Table>,
        area: &Envelope,
        area_srid: Srid,
        transform: &dyn CoordTransform,
        mode: SelectMode,
    ) -> EditResult<bool> {
        match self {
            FeatureSelectionSource::Layer(s) => {
                s.select_area(table, area, area_srid, transform, mode)
            }
            FeatureSelectionSource::External(s) => {
                Ok(s.select_area(area, area_srid, transform, mode))
            }
        }
    }

    /// Selected geometries expressed in `srid`; unreadable or
    /// untransformable features are skipped
    pub fn selected_geometries(
        &self,
        table: Option<&dyn Table>,
        srid: Srid,
        transform: &dyn CoordTransform,
    ) -> GeometryCollection {
        match self {
            FeatureSelectionSource::Layer(s) => s.selected_geometries(table, srid, transform),
            FeatureSelectionSource::External(s) => s.selected_geometries(srid, transform),
        }
    }
}
