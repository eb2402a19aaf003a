//! A backend that provisions nothing.
//!
//! Every call succeeds immediately and echoes the requested configuration
//! back as the reported fields. `dockyardd` registers one for every
//! configured provider.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dockyard_core::types::epoch_millis;

use crate::backend::{ProviderReport, ProvisionRequest, ProvisioningBackend, ReportedStatus};

#[derive(Debug, Clone, Default)]
pub struct DryRunBackend;

impl DryRunBackend {
    pub fn new() -> Self {
        Self
    }

    fn report(&self, request: &ProvisionRequest) -> ProviderReport {
        let vendor_resource_id = request
            .vendor_resource_id
            .clone()
            .unwrap_or_else(|| format!("dry-{}", request.resource_id));
        ProviderReport {
            vendor_resource_id,
            status: ReportedStatus::Ready,
            fields: request.configuration.clone(),
            observed_at: epoch_millis(),
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> anyhow::Result<()> {
    if cancel.is_cancelled() {
        anyhow::bail!("cancelled before dispatch");
    }
    Ok(())
}

#[async_trait]
impl ProvisioningBackend for DryRunBackend {
    async fn provision(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport> {
        ensure_live(cancel)?;
        debug!(resource_id = %request.resource_id, "dry-run provision");
        Ok(self.report(request))
    }

    async fn update(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport> {
        ensure_live(cancel)?;
        debug!(resource_id = %request.resource_id, "dry-run update");
        Ok(self.report(request))
    }

    async fn deprovision(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        ensure_live(cancel)?;
        debug!(resource_id = %request.resource_id, "dry-run deprovision");
        Ok(())
    }

    async fn status(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport> {
        ensure_live(cancel)?;
        Ok(self.report(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockyard_core::Category;
    use serde_json::json;

    fn request() -> ProvisionRequest {
        let mut configuration = dockyard_core::Configuration::new();
        configuration.insert("region".to_string(), json!("fra1"));
        ProvisionRequest {
            resource_id: "server-dry-run-1".to_string(),
            resource_type: "server".to_string(),
            category: Category::Servers,
            provider: "dry-run".to_string(),
            configuration,
            vendor_resource_id: None,
        }
    }

    #[tokio::test]
    async fn provision_echoes_configuration() {
        let backend = DryRunBackend::new();
        let report = backend
            .provision(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.vendor_resource_id, "dry-server-dry-run-1");
        assert_eq!(report.status, ReportedStatus::Ready);
        assert_eq!(report.fields.get("region"), Some(&json!("fra1")));
    }

    #[tokio::test]
    async fn known_vendor_id_is_kept() {
        let backend = DryRunBackend::new();
        let mut req = request();
        req.vendor_resource_id = Some("droplet-42".to_string());
        let report = backend.status(&req, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.vendor_resource_id, "droplet-42");
    }

    #[tokio::test]
    async fn cancelled_token_fails_the_call() {
        let backend = DryRunBackend::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(backend.deprovision(&request(), &cancel).await.is_err());
    }
}
