//! Dock adapter API — the engine's entry points.
//!
//! Every operation checks the caller's permission before anything else,
//! then holds the resource id's lock for the rest of the call so writes to
//! one resource never interleave. Calls on different ids run concurrently.
//!
//! Resources are scoped to the caller's organization. The registry is a
//! cache in front of the state store: when it misses (for example after a
//! restart), the entry is rebuilt from the stored record.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dockyard_core::types::epoch_millis;
use dockyard_core::{
    CallerContext, Category, DockyardConfig, EngineConfig, PartialDeclaration, ProviderKind,
    ProvisionedResource, ResourceDeclaration, ResourceState,
};
use dockyard_providers::{
    BackendRegistry, ProviderRegistry, ProvisionRequest, ProvisioningBackend, ProviderReport,
    ReportedStatus, Selection, select_provider,
};
use dockyard_registry::{IdLocks, ResourceRegistry};
use dockyard_state::{
    CategoryMap, RecordState, RecordStore, ResourceMapping, StateRecord, StateStoreAdapter,
    StateUpdate,
};

use crate::error::{DockError, DockResult};
use crate::reconcile::{SyncReport, reconcile};

#[derive(Clone)]
pub struct DockAdapterApi {
    providers: ProviderRegistry,
    backends: BackendRegistry,
    registry: ResourceRegistry,
    state: StateStoreAdapter,
    locks: IdLocks,
    engine: EngineConfig,
}

impl DockAdapterApi {
    pub fn new(
        providers: ProviderRegistry,
        backends: BackendRegistry,
        state: StateStoreAdapter,
        engine: EngineConfig,
    ) -> Self {
        Self {
            providers,
            backends,
            registry: ResourceRegistry::new(),
            state,
            locks: IdLocks::new(),
            engine,
        }
    }

    /// Build the engine from `dockyard.toml` settings.
    ///
    /// Every resource type a configured provider declares must map to a
    /// category; otherwise startup fails with `UnmappableResourceType`.
    pub async fn bootstrap(
        config: &DockyardConfig,
        store: Arc<dyn RecordStore>,
        backends: BackendRegistry,
    ) -> DockResult<Self> {
        let categories = CategoryMap::builtin().with_entries(&config.categories);
        categories.validate_all(config.declared_resource_types().iter().map(String::as_str))?;

        let providers = ProviderRegistry::from_config(&config.providers).await?;
        for provider in providers.native_providers().await {
            if backends.resolve(ProviderKind::Native, &provider.name).await.is_err() {
                warn!(provider = %provider.name, "native provider has no backend; calls will fail");
            }
        }

        info!(
            providers = config.providers.len(),
            policy = ?config.engine.reconcile_policy,
            execution = ?config.engine.execution,
            "dock adapter API ready"
        );
        Ok(Self::new(
            providers,
            backends,
            StateStoreAdapter::new(store, categories),
            config.engine.clone(),
        ))
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn state(&self) -> &StateStoreAdapter {
        &self.state
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    // ── Provision ──────────────────────────────────────────────────

    /// Validate, select a backend, track, record initial state, provision.
    pub async fn provision(
        &self,
        ctx: &CallerContext,
        declaration: &ResourceDeclaration,
        cancel: &CancellationToken,
    ) -> DockResult<ProvisionedResource> {
        require_write(ctx, "provision")?;
        declaration.validate()?;

        let selection = self
            .select(&declaration.resource_type, &declaration.provider)
            .await?;
        let category = self.state.category_for(&declaration.resource_type)?;

        let org = &ctx.organization_id;
        let resource = self.registry.create(org, declaration, category).await?;
        let _guard = self.locks.lock(&lock_key(org, &resource.id)).await;

        let mut state = RecordState::new(category, selection.method, ResourceState::Provisioning);
        state.merge_reported(&resource.configuration);
        let initial = StateRecord {
            resource_id: resource.id.clone(),
            resource_type: resource.resource_type.clone(),
            provider: resource.provider.clone(),
            provider_resource_id: resource.id.clone(),
            category,
            state,
            last_updated: 0,
        };
        if let Err(e) = self.state.record_initial(org, initial).await {
            self.registry
                .mark_failed(org, &resource.id, &e.to_string())
                .await?;
            return Err(e.into());
        }
        info!(
            resource_id = %resource.id,
            provider = %selection.provider,
            method = %selection.method,
            %category,
            "provisioning"
        );

        let request = ProvisionRequest {
            resource_id: resource.id.clone(),
            resource_type: resource.resource_type.clone(),
            category,
            provider: selection.provider.clone(),
            configuration: resource.configuration.clone(),
            vendor_resource_id: None,
        };
        let outcome = match self.backend_for(&selection, &request, cancel).await {
            Ok(backend) => backend
                .provision(&request, cancel)
                .await
                .map_err(|e| call_failed(&selection, &request, cancel, e)),
            Err(e) => Err(e),
        };
        self.finalize(ctx, &resource.id, &selection, outcome).await
    }

    // ── Update ─────────────────────────────────────────────────────

    /// Apply a partial declaration and re-provision through the backend.
    pub async fn update(
        &self,
        ctx: &CallerContext,
        resource_id: &str,
        partial: &PartialDeclaration,
        cancel: &CancellationToken,
    ) -> DockResult<ProvisionedResource> {
        require_write(ctx, "update")?;
        let org = &ctx.organization_id;
        let _guard = self.locks.lock(&lock_key(org, resource_id)).await;

        let existing = self
            .tracked(org, resource_id)
            .await?
            .ok_or_else(|| DockError::NotFound(resource_id.to_string()))?;
        let provider = partial.provider.as_deref().unwrap_or(&existing.provider);
        let selection = self.select(&existing.resource_type, provider).await?;

        // The registry entry only changes once the state write is known to land.
        if self
            .state
            .get_state(org, resource_id, existing.category)
            .await?
            .is_none()
        {
            return Err(DockError::CannotSaveUnknownResource {
                resource_id: resource_id.to_string(),
                category: existing.category,
            });
        }

        let resource = self.registry.update(org, resource_id, partial).await?;

        let mut update = StateUpdate::new(resource_id).with_status(ResourceState::Provisioning);
        update.provider = Some(resource.provider.clone());
        update.source = Some(selection.method);
        if let Some(configuration) = &partial.configuration {
            update.reported = configuration.clone();
        }
        let saved = self
            .state
            .save_state(org, &update, resource.category)
            .await?;
        debug!(resource_id, changed = ?saved.changed, "update propagated to state store");

        let request = ProvisionRequest {
            resource_id: resource.id.clone(),
            resource_type: resource.resource_type.clone(),
            category: resource.category,
            provider: selection.provider.clone(),
            configuration: resource.configuration.clone(),
            vendor_resource_id: saved.record.state.vendor_resource_id.clone(),
        };
        let outcome = match self.backend_for(&selection, &request, cancel).await {
            Ok(backend) => backend
                .update(&request, cancel)
                .await
                .map_err(|e| call_failed(&selection, &request, cancel, e)),
            Err(e) => Err(e),
        };
        self.finalize(ctx, resource_id, &selection, outcome).await
    }

    // ── Delete ─────────────────────────────────────────────────────

    /// Deprovision through the backend, stop tracking, and remove state.
    pub async fn delete(
        &self,
        ctx: &CallerContext,
        resource_id: &str,
        cancel: &CancellationToken,
    ) -> DockResult<ProvisionedResource> {
        require_write(ctx, "delete")?;
        let org = &ctx.organization_id;
        let _guard = self.locks.lock(&lock_key(org, resource_id)).await;

        let existing = self
            .tracked(org, resource_id)
            .await?
            .ok_or_else(|| DockError::NotFound(resource_id.to_string()))?;

        let stored = self
            .state
            .get_state(org, resource_id, existing.category)
            .await?;
        let selection = match &stored {
            Some(record) => Selection {
                method: record.state.source,
                provider: record.provider.clone(),
                adapter_name: (record.state.source == ProviderKind::Adapter)
                    .then(|| record.provider.clone()),
            },
            None => self.select(&existing.resource_type, &existing.provider).await?,
        };

        self.registry.mark_deprovisioning(org, resource_id).await?;
        if stored.is_some() {
            let update = StateUpdate::new(resource_id).with_status(ResourceState::Deprovisioning);
            self.state.save_state(org, &update, existing.category).await?;
        }

        let request = ProvisionRequest {
            resource_id: existing.id.clone(),
            resource_type: existing.resource_type.clone(),
            category: existing.category,
            provider: selection.provider.clone(),
            configuration: existing.configuration.clone(),
            vendor_resource_id: stored
                .as_ref()
                .and_then(|r| r.state.vendor_resource_id.clone()),
        };
        let outcome = match self.backend_for(&selection, &request, cancel).await {
            Ok(backend) => backend
                .deprovision(&request, cancel)
                .await
                .map_err(|e| call_failed(&selection, &request, cancel, e)),
            Err(e) => Err(e),
        };
        if let Err(err) = outcome {
            let reason = err.to_string();
            self.registry.mark_failed(org, resource_id, &reason).await?;
            if stored.is_some() {
                let update = StateUpdate::new(resource_id)
                    .with_status(ResourceState::Failed { reason });
                self.state.save_state(org, &update, existing.category).await?;
            }
            return Err(err);
        }

        let deleted = self.registry.delete(org, resource_id).await?;
        let removed = self.state.delete_everywhere(org, resource_id).await?;
        info!(resource_id, ?removed, "resource deleted");
        Ok(deleted)
    }

    // ── State ──────────────────────────────────────────────────────

    /// Find a resource's stored state by probing every category in order.
    pub async fn get_resource_state(
        &self,
        ctx: &CallerContext,
        resource_id: &str,
    ) -> DockResult<Option<ResourceMapping>> {
        require_read(ctx, "get_resource_state")?;
        Ok(self
            .state
            .find_state(&ctx.organization_id, resource_id)
            .await?)
    }

    /// Refresh a resource's stored state from its provider.
    ///
    /// Whether the vendor report is applied follows the configured
    /// reconcile policy. `last_updated` is refreshed either way.
    pub async fn sync_resource_state(
        &self,
        ctx: &CallerContext,
        resource_id: &str,
        cancel: &CancellationToken,
    ) -> DockResult<SyncReport> {
        require_write(ctx, "sync_resource_state")?;
        let org = &ctx.organization_id;
        let _guard = self.locks.lock(&lock_key(org, resource_id)).await;

        let found = self
            .state
            .find_state(org, resource_id)
            .await?
            .ok_or_else(|| DockError::ResourceStateNotFound(resource_id.to_string()))?;
        let stored = self
            .state
            .get_state(org, resource_id, found.category)
            .await?
            .ok_or_else(|| DockError::ResourceStateNotFound(resource_id.to_string()))?;

        let cached = match self.registry.get(org, resource_id).await {
            Some(cached) => cached,
            None => {
                self.registry
                    .restore(rebuild(org, found.category, &stored))
                    .await
            }
        };
        let selection = Selection {
            method: stored.state.source,
            provider: stored.provider.clone(),
            adapter_name: (stored.state.source == ProviderKind::Adapter)
                .then(|| stored.provider.clone()),
        };
        let request = ProvisionRequest {
            resource_id: resource_id.to_string(),
            resource_type: stored.resource_type.clone(),
            category: found.category,
            provider: stored.provider.clone(),
            configuration: cached.configuration,
            vendor_resource_id: stored.state.vendor_resource_id.clone(),
        };
        let report = self
            .backend_for(&selection, &request, cancel)
            .await?
            .status(&request, cancel)
            .await
            .map_err(|e| call_failed(&selection, &request, cancel, e))?;

        let policy = self.engine.reconcile_policy;
        let (update, applied) = reconcile(policy, &stored, &report);
        let saved = self.state.save_state(org, &update, found.category).await?;
        if applied {
            self.refresh_cache(org, resource_id, &saved.record).await?;
        }
        info!(
            resource_id,
            ?policy,
            applied,
            changed = ?saved.changed,
            "resource state synced"
        );

        Ok(SyncReport {
            mapping: ResourceMapping {
                category: found.category,
                mapping: saved.record,
            },
            changed_fields: saved.changed,
            policy,
            applied,
        })
    }

    /// Every resource the engine is tracking for the caller's organization.
    pub async fn list_resources(&self, ctx: &CallerContext) -> DockResult<Vec<ProvisionedResource>> {
        require_read(ctx, "list_resources")?;
        Ok(self.registry.list(&ctx.organization_id).await)
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Registry entry for `(org, id)`, rebuilt from the state store on a miss.
    async fn tracked(&self, org: &str, resource_id: &str) -> DockResult<Option<ProvisionedResource>> {
        if let Some(cached) = self.registry.get(org, resource_id).await {
            return Ok(Some(cached));
        }
        let Some(found) = self.state.find_state(org, resource_id).await? else {
            return Ok(None);
        };
        let resource = rebuild(org, found.category, &found.mapping);
        Ok(Some(self.registry.restore(resource).await))
    }

    async fn select(&self, resource_type: &str, provider: &str) -> DockResult<Selection> {
        let natives = self.providers.native_providers().await;
        let adapters = self.backends.adapter_names().await;
        Ok(select_provider(resource_type, provider, &natives, &adapters)?)
    }

    /// Resolve the selected backend, unless the call is already cancelled.
    async fn backend_for(
        &self,
        selection: &Selection,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> DockResult<Arc<dyn ProvisioningBackend>> {
        if cancel.is_cancelled() {
            return Err(DockError::Cancelled {
                resource_id: request.resource_id.clone(),
            });
        }
        Ok(self
            .backends
            .resolve(selection.method, &selection.provider)
            .await?)
    }

    /// Record a provision/update outcome in the registry and the state store.
    async fn finalize(
        &self,
        ctx: &CallerContext,
        resource_id: &str,
        selection: &Selection,
        outcome: DockResult<ProviderReport>,
    ) -> DockResult<ProvisionedResource> {
        let org = &ctx.organization_id;
        let category = self
            .registry
            .get(org, resource_id)
            .await
            .map(|r| r.category)
            .ok_or_else(|| DockError::NotFound(resource_id.to_string()))?;

        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                let reason = err.to_string();
                self.registry.mark_failed(org, resource_id, &reason).await?;
                let update =
                    StateUpdate::new(resource_id).with_status(ResourceState::Failed { reason });
                self.state.save_state(org, &update, category).await?;
                return Err(err);
            }
        };

        let native_resource_id = (selection.method == ProviderKind::Native)
            .then(|| report.vendor_resource_id.clone());
        let status = report.status.to_state();
        let mut update = StateUpdate::new(resource_id).with_status(status.clone());
        update.source = Some(selection.method);
        update.native_resource_id = native_resource_id.clone();
        update.vendor_resource_id = Some(report.vendor_resource_id.clone());
        update.last_provisioned_at = Some(epoch_millis());
        update.reported = report.fields;
        self.state.save_state(org, &update, category).await?;

        let resource = match &report.status {
            ReportedStatus::Ready => {
                self.registry
                    .mark_provisioned(org, resource_id, native_resource_id)
                    .await?
            }
            ReportedStatus::Failed { reason } => {
                self.registry.mark_failed(org, resource_id, reason).await?
            }
            ReportedStatus::Pending => self
                .registry
                .get(org, resource_id)
                .await
                .ok_or_else(|| DockError::NotFound(resource_id.to_string()))?,
        };
        Ok(resource)
    }

    /// Carry a reconciled status over to the registry cache.
    async fn refresh_cache(
        &self,
        org: &str,
        resource_id: &str,
        record: &StateRecord,
    ) -> DockResult<()> {
        let Some(cached) = self.registry.get(org, resource_id).await else {
            return Ok(());
        };
        if cached.state == record.state.status {
            return Ok(());
        }
        match &record.state.status {
            ResourceState::Provisioned => {
                self.registry
                    .mark_provisioned(org, resource_id, record.state.native_resource_id.clone())
                    .await?;
            }
            ResourceState::Failed { reason } => {
                self.registry.mark_failed(org, resource_id, reason).await?;
            }
            other => debug!(resource_id, status = %other, "cache left as is"),
        }
        Ok(())
    }
}

fn lock_key(org: &str, resource_id: &str) -> String {
    format!("{org}/{resource_id}")
}

/// Registry entry for a resource known only from its stored record.
fn rebuild(org: &str, category: Category, record: &StateRecord) -> ProvisionedResource {
    ProvisionedResource {
        id: record.resource_id.clone(),
        organization_id: org.to_string(),
        resource_type: record.resource_type.clone(),
        provider: record.provider.clone(),
        category,
        native_resource_id: record.state.native_resource_id.clone(),
        state: record.state.status.clone(),
        configuration: record.state.reported(),
        created_at: record.last_updated,
        updated_at: record.last_updated,
    }
}

fn call_failed(
    selection: &Selection,
    request: &ProvisionRequest,
    cancel: &CancellationToken,
    source: anyhow::Error,
) -> DockError {
    if cancel.is_cancelled() {
        return DockError::Cancelled {
            resource_id: request.resource_id.clone(),
        };
    }
    DockError::ProviderCallFailed {
        resource_id: request.resource_id.clone(),
        provider: selection.provider.clone(),
        source,
    }
}

pub(crate) fn require_write(ctx: &CallerContext, operation: &'static str) -> DockResult<()> {
    if !ctx.can_write() {
        warn!(user = %ctx.user_id, org = %ctx.organization_id, operation, "write denied");
        return Err(DockError::PermissionDenied {
            operation,
            required: "write",
        });
    }
    Ok(())
}

fn require_read(ctx: &CallerContext, operation: &'static str) -> DockResult<()> {
    if !ctx.can_read() {
        warn!(user = %ctx.user_id, org = %ctx.organization_id, operation, "read denied");
        return Err(DockError::PermissionDenied {
            operation,
            required: "read",
        });
    }
    Ok(())
}
