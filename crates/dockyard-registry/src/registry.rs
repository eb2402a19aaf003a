//! Resource registry — in-memory map of resource id → provisioned resource.
//!
//! The registry is an explicit object constructed at startup and shared by
//! handle (`Clone` is cheap). Entries are scoped to the organization that
//! created them: every lookup matches on `(organization_id, id)`, so an id
//! owned by another organization is simply `NotFound`.
//!
//! Every update is treated as a full re-provision signal: fields are not
//! diffed, the entry simply re-enters `Provisioning`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use dockyard_core::*;

use crate::error::{RegistryError, RegistryResult};

/// Issues strictly increasing millisecond stamps. Ids are
/// `type-provider-stamp`, so two resources never share an id.
#[derive(Debug, Default)]
struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    fn stamp(&self) -> u64 {
        let now = epoch_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(prev + 1)
    }
}

type SlotKey = (String, ResourceId);

fn key(organization_id: &str, id: &str) -> SlotKey {
    (organization_id.to_string(), id.to_string())
}

struct Slot {
    /// Registration stamp; orders `list`.
    seq: u64,
    resource: ProvisionedResource,
}

/// Tracks provisioned resources for the lifetime of the process.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    slots: Arc<RwLock<HashMap<SlotKey, Slot>>>,
    ids: Arc<IdGenerator>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a declaration and start tracking it in `Provisioning`.
    pub async fn create(
        &self,
        organization_id: &str,
        declaration: &ResourceDeclaration,
        category: Category,
    ) -> RegistryResult<ProvisionedResource> {
        declaration.validate()?;

        let seq = self.ids.stamp();
        let id = format!("{}-{}-{seq}", declaration.resource_type, declaration.provider);
        let now = epoch_millis();
        let resource = ProvisionedResource {
            id: id.clone(),
            organization_id: organization_id.to_string(),
            resource_type: declaration.resource_type.clone(),
            provider: declaration.provider.clone(),
            category,
            native_resource_id: None,
            state: ResourceState::Provisioning,
            configuration: declaration.configuration.clone().unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        self.slots.write().await.insert(
            key(organization_id, &id),
            Slot {
                seq,
                resource: resource.clone(),
            },
        );
        info!(resource_id = %id, org = %organization_id, provider = %resource.provider, %category, "resource registered");
        Ok(resource)
    }

    /// Track a resource rebuilt from persisted state.
    ///
    /// An entry already tracked under the same `(organization_id, id)` wins
    /// and is returned unchanged.
    pub async fn restore(&self, resource: ProvisionedResource) -> ProvisionedResource {
        let mut slots = self.slots.write().await;
        let slot_key = key(&resource.organization_id, &resource.id);
        if let Some(existing) = slots.get(&slot_key) {
            return existing.resource.clone();
        }
        debug!(resource_id = %resource.id, org = %resource.organization_id, "resource restored from state store");
        let seq = self.ids.stamp();
        slots.insert(
            slot_key,
            Slot {
                seq,
                resource: resource.clone(),
            },
        );
        resource
    }

    /// Apply a partial declaration and return the entry to `Provisioning`.
    pub async fn update(
        &self,
        organization_id: &str,
        id: &str,
        partial: &PartialDeclaration,
    ) -> RegistryResult<ProvisionedResource> {
        let mut slots = self.slots.write().await;
        let resource = &mut slots
            .get_mut(&key(organization_id, id))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?
            .resource;

        if let Some(resource_type) = &partial.resource_type {
            if *resource_type != resource.resource_type {
                return Err(ValidationError::ImmutableType {
                    from: resource.resource_type.clone(),
                    to: resource_type.clone(),
                }
                .into());
            }
        }
        if let Some(provider) = &partial.provider {
            if provider.trim().is_empty() {
                return Err(ValidationError::EmptyField("provider").into());
            }
            resource.provider = provider.clone();
        }
        if let Some(configuration) = &partial.configuration {
            for (key, value) in configuration {
                resource.configuration.insert(key.clone(), value.clone());
            }
        }

        resource.state = ResourceState::Provisioning;
        resource.updated_at = epoch_millis();
        debug!(resource_id = %id, "resource updated, re-entering provisioning");
        Ok(resource.clone())
    }

    /// Move an entry to `Deprovisioning` ahead of its removal.
    pub async fn mark_deprovisioning(
        &self,
        organization_id: &str,
        id: &str,
    ) -> RegistryResult<ProvisionedResource> {
        self.set_state(organization_id, id, ResourceState::Deprovisioning)
            .await
    }

    /// Stop tracking a resource. Returns the final entry in `Deleted` state.
    pub async fn delete(&self, organization_id: &str, id: &str) -> RegistryResult<ProvisionedResource> {
        let mut slots = self.slots.write().await;
        let mut resource = slots
            .remove(&key(organization_id, id))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?
            .resource;

        if resource.state != ResourceState::Deprovisioning {
            debug!(resource_id = %id, from = %resource.state, "deleting without deprovisioning step");
        }
        resource.state = ResourceState::Deleted;
        resource.updated_at = epoch_millis();
        info!(resource_id = %id, "resource deleted");
        Ok(resource)
    }

    pub async fn get(&self, organization_id: &str, id: &str) -> Option<ProvisionedResource> {
        self.slots
            .read()
            .await
            .get(&key(organization_id, id))
            .map(|slot| slot.resource.clone())
    }

    /// Resources tracked for an organization, oldest first.
    pub async fn list(&self, organization_id: &str) -> Vec<ProvisionedResource> {
        let slots = self.slots.read().await;
        let mut owned: Vec<&Slot> = slots
            .iter()
            .filter(|((org, _), _)| org == organization_id)
            .map(|(_, slot)| slot)
            .collect();
        owned.sort_by_key(|slot| slot.seq);
        owned.into_iter().map(|slot| slot.resource.clone()).collect()
    }

    /// Record a successful provisioning call.
    pub async fn mark_provisioned(
        &self,
        organization_id: &str,
        id: &str,
        native_resource_id: Option<String>,
    ) -> RegistryResult<ProvisionedResource> {
        let mut slots = self.slots.write().await;
        let resource = &mut slots
            .get_mut(&key(organization_id, id))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?
            .resource;
        if native_resource_id.is_some() {
            resource.native_resource_id = native_resource_id;
        }
        resource.state = ResourceState::Provisioned;
        resource.updated_at = epoch_millis();
        info!(resource_id = %id, "resource provisioned");
        Ok(resource.clone())
    }

    /// Record a failed provisioning call.
    pub async fn mark_failed(
        &self,
        organization_id: &str,
        id: &str,
        reason: &str,
    ) -> RegistryResult<ProvisionedResource> {
        warn!(resource_id = %id, %reason, "resource failed");
        self.set_state(
            organization_id,
            id,
            ResourceState::Failed {
                reason: reason.to_string(),
            },
        )
        .await
    }

    async fn set_state(
        &self,
        organization_id: &str,
        id: &str,
        state: ResourceState,
    ) -> RegistryResult<ProvisionedResource> {
        let mut slots = self.slots.write().await;
        let resource = &mut slots
            .get_mut(&key(organization_id, id))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?
            .resource;
        resource.state = state;
        resource.updated_at = epoch_millis();
        Ok(resource.clone())
    }
}
