//! Selection keys, modes and change notifications

use super::feature::{DatasourceId, FeatureId};

/// A feature qualified by the datasource it belongs to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey {
    pub datasource: DatasourceId,
    pub feature: FeatureId,
}

impl FeatureKey {
    pub fn new(datasource: DatasourceId, feature: FeatureId) -> Self {
        Self {
            datasource,
            feature,
        }
    }
}

/// How an area selection combines with the current selection
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Clear the selection before adding the features in the area
    #[default]
    Replace,
    /// Add the features in the area to the current selection
    Accumulate,
}

/// Published to subscribers after every change so viewports can re-render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// A different source was configured, or the source was removed
    SourceChanged { datasource: Option<DatasourceId> },
    /// Features were selected or unselected
    Changed { datasource: Option<DatasourceId> },
    /// The selection was emptied
    Cleared,
}
