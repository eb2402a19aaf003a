//! Deployments: plan a resource set, then provision it through the facade.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dockyard_core::{CallerContext, ProvisionedResource, ResourceDeclaration};
use dockyard_orchestrator::{DeploymentResource, PlanRunner, ResourceExecutor, create_plan};

use crate::dock::{DockAdapterApi, require_write};
use crate::error::DockResult;

/// What a completed deployment provisioned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentOutcome {
    /// Plan order the deployment was computed with.
    pub order: Vec<String>,
    /// Plan id → provisioned resource, in execution order.
    pub provisioned: Vec<(String, ProvisionedResource)>,
}

/// Plan hook that provisions each deployment resource via the facade.
pub struct ProvisioningExecutor {
    api: DockAdapterApi,
    ctx: CallerContext,
    provisioned: Mutex<Vec<(String, ProvisionedResource)>>,
}

impl ProvisioningExecutor {
    pub fn new(api: DockAdapterApi, ctx: CallerContext) -> Self {
        Self {
            api,
            ctx,
            provisioned: Mutex::new(Vec::new()),
        }
    }

    /// Resources provisioned so far, keyed by plan id.
    pub fn provisioned(&self) -> Vec<(String, ProvisionedResource)> {
        self.provisioned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ResourceExecutor for ProvisioningExecutor {
    async fn execute(
        &self,
        resource: &DeploymentResource,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let declaration = ResourceDeclaration {
            resource_type: resource.resource_type.clone(),
            provider: resource.provider.clone(),
            configuration: Some(resource.configuration.clone()),
        };
        let provisioned = self.api.provision(&self.ctx, &declaration, cancel).await?;
        self.provisioned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((resource.id.clone(), provisioned));
        Ok(())
    }
}

impl DockAdapterApi {
    /// Plan a resource set and provision it in dependency order.
    ///
    /// Fail-fast: on the first failure the rest of the plan is skipped and
    /// whatever was provisioned before it stays provisioned.
    pub async fn deploy(
        &self,
        ctx: &CallerContext,
        resources: Vec<DeploymentResource>,
        cancel: &CancellationToken,
    ) -> DockResult<DeploymentOutcome> {
        require_write(ctx, "deploy")?;
        let plan = create_plan(resources)?;

        let executor = Arc::new(ProvisioningExecutor::new(self.clone(), ctx.clone()));
        let runner = PlanRunner::from_config(self.engine());
        let report = runner.run(&plan, executor.clone(), cancel).await?;

        let mut provisioned = executor.provisioned();
        provisioned.sort_by_key(|(id, _)| {
            report
                .executed
                .iter()
                .position(|e| e == id)
                .unwrap_or(usize::MAX)
        });
        info!(resources = provisioned.len(), "deployment complete");

        Ok(DeploymentOutcome {
            order: plan.order().to_vec(),
            provisioned,
        })
    }
}
