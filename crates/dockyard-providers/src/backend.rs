//! Provisioning backend call surface.
//!
//! Native backends and dock adapters expose the same four calls. Transient
//! vendor errors are the backend's to classify and retry; whatever it
//! returns as an error is treated as final by the engine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dockyard_core::{Category, Configuration, ProviderKind, ResourceState};

use crate::error::{ProviderError, ProviderResult};

/// What a backend is asked to act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Engine resource id, also the idempotency key for the vendor call.
    pub resource_id: String,
    pub resource_type: String,
    pub category: Category,
    pub provider: String,
    pub configuration: Configuration,
    /// Known once the resource has been provisioned.
    pub vendor_resource_id: Option<String>,
}

/// Vendor-side status of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportedStatus {
    Pending,
    Ready,
    Failed { reason: String },
}

impl ReportedStatus {
    pub fn to_state(&self) -> ResourceState {
        match self {
            ReportedStatus::Pending => ResourceState::Provisioning,
            ReportedStatus::Ready => ResourceState::Provisioned,
            ReportedStatus::Failed { reason } => ResourceState::Failed {
                reason: reason.clone(),
            },
        }
    }
}

/// What a backend reports back about a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReport {
    pub vendor_resource_id: String,
    pub status: ReportedStatus,
    /// Vendor-reported fields.
    #[serde(default)]
    pub fields: Configuration,
    /// Unix timestamp (millis) at which the vendor observed this state.
    pub observed_at: u64,
}

#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    async fn provision(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport>;

    async fn update(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport>;

    async fn deprovision(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;

    /// Current vendor-side view of the resource.
    async fn status(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport>;
}

/// Backends by provider name: native implementations and dock adapters.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    natives: Arc<RwLock<HashMap<String, Arc<dyn ProvisioningBackend>>>>,
    /// Registration order is kept; it is the adapter list handed to selection.
    adapters: Arc<RwLock<Vec<(String, Arc<dyn ProvisioningBackend>)>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_native(&self, name: &str, backend: Arc<dyn ProvisioningBackend>) {
        self.natives.write().await.insert(name.to_string(), backend);
        info!(provider = %name, "native backend registered");
    }

    /// Register (or replace) a per-vendor dock adapter.
    pub async fn register_adapter(&self, name: &str, backend: Arc<dyn ProvisioningBackend>) {
        let mut adapters = self.adapters.write().await;
        match adapters.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = backend,
            None => adapters.push((name.to_string(), backend)),
        }
        info!(adapter = %name, "dock adapter registered");
    }

    pub async fn adapter_names(&self) -> Vec<String> {
        self.adapters
            .read()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Resolve the backend for a selection method and provider name.
    pub async fn resolve(
        &self,
        kind: ProviderKind,
        name: &str,
    ) -> ProviderResult<Arc<dyn ProvisioningBackend>> {
        let found = match kind {
            ProviderKind::Native => self.natives.read().await.get(name).cloned(),
            ProviderKind::Adapter => self
                .adapters
                .read()
                .await
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, b)| b.clone()),
        };
        found.ok_or_else(|| ProviderError::BackendMissing {
            provider: name.to_string(),
            kind,
        })
    }
}
