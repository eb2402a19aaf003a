//! State store adapter — the engine-facing mapping layer over a `RecordStore`.
//!
//! Records are created only by the provisioning flow's initial write
//! ([`StateStoreAdapter::record_initial`]). `save_state` merges into an
//! existing record and refuses to materialize one that does not exist.

use std::sync::Arc;

use dockyard_core::{Category, epoch_millis};
use tracing::{debug, warn};

use crate::category::CategoryMap;
use crate::error::{StateError, StateResult};
use crate::store::RecordStore;
use crate::types::*;

/// Result of a successful `save_state`.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedState {
    pub record: StateRecord,
    /// Names of the fields the save changed.
    pub changed: Vec<String>,
}

#[derive(Clone)]
pub struct StateStoreAdapter {
    store: Arc<dyn RecordStore>,
    categories: Arc<CategoryMap>,
}

impl StateStoreAdapter {
    pub fn new(store: Arc<dyn RecordStore>, categories: CategoryMap) -> Self {
        Self {
            store,
            categories: Arc::new(categories),
        }
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    /// Category for a resource type, or `UnmappableResourceType`.
    pub fn category_for(&self, resource_type: &str) -> StateResult<Category> {
        self.categories.category_for(resource_type)
    }

    /// Look up a record by `(provider_resource_id, category)`. A miss is `Ok(None)`.
    pub async fn get_state(
        &self,
        organization_id: &str,
        resource_id: &str,
        category: Category,
    ) -> StateResult<Option<StateRecord>> {
        let found = self
            .store
            .query_by_provider_resource_id(organization_id, category, resource_id)
            .await?;
        Ok(found.map(|stored| stored.record))
    }

    /// Write the initial record for a freshly provisioned resource.
    pub async fn record_initial(
        &self,
        organization_id: &str,
        mut record: StateRecord,
    ) -> StateResult<StateRecord> {
        record.last_updated = epoch_millis();
        let id = self
            .store
            .insert(organization_id, record.category, &record)
            .await?;
        debug!(%id, category = %record.category, status = %record.state.status, "initial state recorded");
        Ok(record)
    }

    /// Merge an update into the existing record at `(provider_resource_id, category)`.
    ///
    /// Fails with `CannotSaveUnknownResource` when no record exists there.
    /// `last_updated` is always refreshed.
    pub async fn save_state(
        &self,
        organization_id: &str,
        update: &StateUpdate,
        category: Category,
    ) -> StateResult<SavedState> {
        let stored = self
            .store
            .query_by_provider_resource_id(organization_id, category, &update.provider_resource_id)
            .await?
            .ok_or_else(|| StateError::CannotSaveUnknownResource {
                provider_resource_id: update.provider_resource_id.clone(),
                category,
            })?;

        let mut record = stored.record;
        let changed = record.merge(update);
        record.last_updated = epoch_millis().max(record.last_updated);

        let patch = RecordPatch {
            provider: Some(record.provider.clone()),
            state: Some(record.state.clone()),
            last_updated: record.last_updated,
        };
        self.store
            .patch(organization_id, category, &stored.id, &patch)
            .await?;
        debug!(id = %stored.id, %category, ?changed, "state saved");
        Ok(SavedState { record, changed })
    }

    /// Remove the record at `(provider_resource_id, category)`. No-op on a miss.
    pub async fn delete_state(
        &self,
        organization_id: &str,
        resource_id: &str,
        category: Category,
    ) -> StateResult<bool> {
        let Some(stored) = self
            .store
            .query_by_provider_resource_id(organization_id, category, resource_id)
            .await?
        else {
            debug!(%resource_id, %category, "no state to delete");
            return Ok(false);
        };
        self.store
            .delete(organization_id, category, &stored.id)
            .await
    }

    /// Remove matching records from every category. Returns the categories
    /// a record was removed from.
    pub async fn delete_everywhere(
        &self,
        organization_id: &str,
        resource_id: &str,
    ) -> StateResult<Vec<Category>> {
        let mut removed = Vec::new();
        for category in Category::ALL {
            if self.delete_state(organization_id, resource_id, category).await? {
                removed.push(category);
            }
        }
        if removed.len() > 1 {
            warn!(%resource_id, ?removed, "resource had state in more than one category");
        }
        Ok(removed)
    }

    /// Probe the categories in fixed order and return the first hit.
    pub async fn find_state(
        &self,
        organization_id: &str,
        resource_id: &str,
    ) -> StateResult<Option<ResourceMapping>> {
        for category in Category::ALL {
            if let Some(record) = self.get_state(organization_id, resource_id, category).await? {
                return Ok(Some(ResourceMapping {
                    category,
                    mapping: record,
                }));
            }
        }
        Ok(None)
    }
}
