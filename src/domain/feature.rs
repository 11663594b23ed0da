//! Features and the layer metadata that ties them to a table
//!
//! A feature is one table row. Its geometry lives in a WKT text cell of the
//! layer's geometry column; an empty or null cell means "no geometry yet".

use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::{Geometry, Srid};
use crate::error::{EditError, EditResult};
use crate::table::{CellValue, Table};

/// Row-unique feature identifier
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FeatureId(pub i64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the data source a layer is read from
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasourceId(pub String);

impl DatasourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DatasourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where and how a table stores the features of one vector layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub datasource: DatasourceId,
    pub geometry_column: String,
    /// Spatial reference of the stored geometries
    pub srid: Srid,
}

/// A feature row with its decoded geometry
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Option<Geometry>,
    /// Non-geometry cells, by column name
    pub attributes: Vec<(String, CellValue)>,
}

impl Layer {
    pub fn new(datasource: DatasourceId, geometry_column: impl Into<String>, srid: Srid) -> Self {
        Self {
            datasource,
            geometry_column: geometry_column.into(),
            srid,
        }
    }

    pub fn geometry_column_index(&self, table: &dyn Table) -> EditResult<usize> {
        table
            .column_by_name(&self.geometry_column)
            .ok_or_else(|| EditError::UnknownColumn(self.geometry_column.clone()))
    }

    /// Decode the geometry cell of `feature`; the result is tagged with the
    /// feature id and the layer SRID
    pub fn read_geometry(
        &self,
        table: &dyn Table,
        feature: FeatureId,
    ) -> EditResult<Option<Geometry>> {
        let column = self.geometry_column_index(table)?;
        if !table.contains_row(feature) {
            return Err(EditError::UnknownFeature(feature));
        }
        match table.cell_value(column, feature) {
            Some(CellValue::Text(text)) if !text.trim().is_empty() => {
                let geometry = Geometry::from_wkt(&text, self.srid)?;
                Ok(Some(geometry.with_id(feature.into())))
            }
            _ => Ok(None),
        }
    }

    /// Encode `geometry` as WKT into the geometry cell of `feature`
    pub fn write_geometry(
        &self,
        table: &mut dyn Table,
        feature: FeatureId,
        geometry: &Geometry,
    ) -> EditResult<()> {
        if geometry.srid() != self.srid {
            return Err(EditError::SpatialReferenceMismatch {
                expected: self.srid,
                found: geometry.srid(),
            });
        }
        let column = self.geometry_column_index(table)?;
        table.set_cell_value(column, feature, CellValue::Text(geometry.to_wkt()?))
    }

    pub fn feature(&self, table: &dyn Table, id: FeatureId) -> EditResult<Feature> {
        let geometry = self.read_geometry(table, id)?;
        let attributes = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, column)| column.name != self.geometry_column)
            .map(|(index, column)| {
                let value = table.cell_value(index, id).unwrap_or(CellValue::Null);
                (column.name.clone(), value)
            })
            .collect();
        Ok(Feature {
            id,
            geometry,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeometryId, GeometryKind};
    use crate::table::{Column, ColumnKind, MemoryTable};
    use geo_types::coord;

    fn layer() -> Layer {
        Layer::new(DatasourceId::new("parcels"), "geom", Srid(3857))
    }

    fn table() -> MemoryTable {
        MemoryTable::new(vec![
            Column::new("name", ColumnKind::Text),
            Column::new("geom", ColumnKind::Geometry),
        ])
    }

    #[test]
    fn test_row_without_geometry_reads_as_none() {
        let mut t = table();
        let id = t.append_row().unwrap();
        assert_eq!(layer().read_geometry(&t, id).unwrap(), None);
    }

    #[test]
    fn test_write_then_read_geometry() {
        let mut t = table();
        let id = t.append_row().unwrap();
        let g = Geometry::point(coord! { x: 3.0, y: 4.0 }, Srid(3857));
        layer().write_geometry(&mut t, id, &g).unwrap();

        let back = layer().read_geometry(&t, id).unwrap().unwrap();
        assert_eq!(back.kind(), GeometryKind::Point);
        assert_eq!(back.id(), GeometryId::Feature(id.0));
        assert_eq!(back.coords(), &[coord! { x: 3.0, y: 4.0 }]);
    }

    #[test]
    fn test_write_rejects_foreign_srid() {
        let mut t = table();
        let id = t.append_row().unwrap();
        let g = Geometry::point(coord! { x: 3.0, y: 4.0 }, Srid(4326));
        assert!(matches!(
            layer().write_geometry(&mut t, id, &g),
            Err(EditError::SpatialReferenceMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_geometry_column() {
        let t = MemoryTable::new(vec![Column::new("name", ColumnKind::Text)]);
        assert_eq!(
            layer().read_geometry(&t, FeatureId(1)),
            Err(EditError::UnknownColumn("geom".into()))
        );
    }

    #[test]
    fn test_feature_splits_attributes_from_geometry() {
        let mut t = table();
        let id = t.append_row().unwrap();
        t.set_cell_value(0, id, CellValue::Text("lot 7".into())).unwrap();
        let feature = layer().feature(&t, id).unwrap();
        assert_eq!(feature.id, id);
        assert!(feature.geometry.is_none());
        assert_eq!(
            feature.attributes,
            vec![("name".to_string(), CellValue::Text("lot 7".into()))]
        );
    }
}
