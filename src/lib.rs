//! Interactive editing of 2D vector features
//!
//! A [`VectorEditionTask`] edits the features of one layer table from
//! pointer input: new geometries are built point by point, existing ones
//! are reshaped vertex by vertex, and every change is written back as WKT
//! when a feature edition is committed. Snapping, feature selection and the
//! render overlays hang off the task.
//!
//! The host supplies the backing [`Table`], the viewport mapping
//! ([`WorldContext`]) and reprojection ([`CoordTransform`]).

pub mod config;
pub mod domain;
pub mod edit;
pub mod error;
pub mod selection;
pub mod snap;
pub mod table;
pub mod task;
pub mod world;

pub use config::EditConfig;
pub use domain::{
    DatasourceId, Envelope, Feature, FeatureId, FeatureKey, Geometry, GeometryCollection,
    GeometryId, GeometryKind, Layer, SelectMode, SelectionEvent, Srid, VertexId,
};
pub use error::{EditError, EditResult};
pub use selection::{FeatureSelection, FeatureSelectionSource};
pub use snap::SnapTool;
pub use table::{MemoryTable, Table};
pub use task::{OverlayKind, OverlayLayer, TaskState, VectorEditionTask};
pub use world::{CoordTransform, IdentityTransform, Viewport, WorldContext};
