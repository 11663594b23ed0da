//! Error type surfaced by editing operations
//!
//! Every failure is local and retriable: the operation that reports it leaves the
//! engine state as it was. The `Display` text is meant for the UI status line.

use crate::domain::{DatasourceId, FeatureId, GeometryId, GeometryKind, Srid};
use crate::task::TaskState;

/// Result alias for editing operations
pub type EditResult<T> = Result<T, EditError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("the layer table is read-only")]
    ReadOnlyTable,

    #[error("cannot {operation} while the task is {state}")]
    InvalidState {
        operation: &'static str,
        state: TaskState,
    },

    #[error("feature {0} is already being edited")]
    EditInProgress(FeatureId),

    #[error("no {0} is bound to the task")]
    MissingBinding(&'static str),

    #[error("feature {0} does not exist")]
    UnknownFeature(FeatureId),

    #[error("column '{0}' does not exist")]
    UnknownColumn(String),

    #[error("the {0} is not valid yet")]
    InvalidGeometry(GeometryKind),

    #[error("the geometry has no vertices")]
    EmptyGeometry,

    #[error("malformed WKT: {0}")]
    MalformedWkt(String),

    #[error("cannot transform coordinates from {from} to {to}")]
    TransformFailed { from: Srid, to: Srid },

    #[error("spatial reference {found} does not match {expected}")]
    SpatialReferenceMismatch { expected: Srid, found: Srid },

    #[error("geometry {0} is already in the collection")]
    DuplicateGeometry(GeometryId),

    #[error("geometry {0} is not in the collection")]
    MissingGeometry(GeometryId),

    #[error("datasource '{found}' is not the working datasource '{expected}'")]
    DatasourceMismatch {
        expected: DatasourceId,
        found: DatasourceId,
    },

    #[error("no feature selection source is configured")]
    NoSelectionSource,
}
