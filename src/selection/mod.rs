//! Feature selection façade
//!
//! Wraps an optional [`FeatureSelectionSource`] and publishes a
//! [`SelectionEvent`] to every subscriber after each change. Subscribers
//! that dropped their receiver are pruned on the next publish.

mod source;

pub use source::{ExternalSelectionSource, FeatureSelectionSource, LayerSelectionSource};

use crossbeam_channel::{Receiver, Sender};

use crate::domain::{
    DatasourceId, Envelope, FeatureId, FeatureKey, GeometryCollection, SelectMode, SelectionEvent,
    Srid,
};
use crate::error::{EditError, EditResult};
use crate::table::Table;
use crate::world::{CoordTransform, WorldContext};

#[derive(Debug, Default)]
pub struct FeatureSelection {
    source: Option<FeatureSelectionSource>,
    subscribers: Vec<Sender<SelectionEvent>>,
}

impl FeatureSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for selection changes
    pub fn subscribe(&mut self) -> Receiver<SelectionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: SelectionEvent) {
        log::trace!("Selection event: {:?}", event);
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn publish_changed(&mut self) {
        let datasource = self.working_datasource_id().cloned();
        self.publish(SelectionEvent::Changed { datasource });
    }

    fn source_mut(&mut self) -> EditResult<&mut FeatureSelectionSource> {
        self.source.as_mut().ok_or(EditError::NoSelectionSource)
    }

    /// Replace the source; the previous selection goes with it
    pub fn set_source(&mut self, source: Option<FeatureSelectionSource>) {
        self.source = source;
        let datasource = self.working_datasource_id().cloned();
        log::debug!("Selection source changed: {:?}", datasource);
        self.publish(SelectionEvent::SourceChanged { datasource });
    }

    pub fn source(&self) -> Option<&FeatureSelectionSource> {
        self.source.as_ref()
    }

    /// Access to a configured external source for registering geometries
    pub fn external_source_mut(&mut self) -> Option<&mut ExternalSelectionSource> {
        match self.source.as_mut() {
            Some(FeatureSelectionSource::External(s)) => Some(s),
            _ => None,
        }
    }

    pub fn working_datasource_id(&self) -> Option<&DatasourceId> {
        self.source.as_ref().and_then(|s| s.working_datasource_id())
    }

    /// Select a feature; true if it was not selected before
    pub fn select(&mut self, id: FeatureId, datasource: &DatasourceId) -> EditResult<bool> {
        let changed = self.source_mut()?.select(id, datasource)?;
        if changed {
            self.publish_changed();
        }
        Ok(changed)
    }

    /// Unselect a feature; true if it was selected before
    pub fn unselect(&mut self, id: FeatureId, datasource: &DatasourceId) -> EditResult<bool> {
        let changed = self.source_mut()?.unselect(id, datasource)?;
        if changed {
            self.publish_changed();
        }
        Ok(changed)
    }

    /// Flip the selection state of a feature, returning the new state
    pub fn toggle(&mut self, id: FeatureId, datasource: &DatasourceId) -> EditResult<bool> {
        if self.is_selected(id, datasource) {
            self.unselect(id, datasource)?;
            Ok(false)
        } else {
            self.select(id, datasource)?;
            Ok(true)
        }
    }

    pub fn clear(&mut self) -> bool {
        let changed = self.source.as_mut().is_some_and(|s| s.clear());
        if changed {
            self.publish(SelectionEvent::Cleared);
        }
        changed
    }

    pub fn is_selected(&self, id: FeatureId, datasource: &DatasourceId) -> bool {
        self.source
            .as_ref()
            .is_some_and(|s| s.is_selected(id, datasource))
    }

    pub fn selected_ids(&self) -> Vec<FeatureKey> {
        self.source.as_ref().map(|s| s.selected()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.source.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select the features intersecting a display-space rectangle
    pub fn select_area(
        &mut self,
        table: Option<&dyn Table>,
        display_area: &Envelope,
        world: &dyn WorldContext,
        transform: &dyn CoordTransform,
        mode: SelectMode,
    ) -> EditResult<bool> {
        let area = world.display_envelope_to_world(display_area);
        let srid = world.srid();
        let changed = self
            .source_mut()?
            .select_area(table, &area, srid, transform, mode)?;
        if changed {
            self.publish_changed();
        }
        Ok(changed)
    }

    /// Selected geometries expressed in `srid`, ready for rendering
    pub fn selected_geometries(
        &self,
        table: Option<&dyn Table>,
        srid: Srid,
        transform: &dyn CoordTransform,
    ) -> GeometryCollection {
        match &self.source {
            Some(s) => s.selected_geometries(table, srid, transform),
            None => GeometryCollection::new(srid),
        }
    }
}
