//! Deployment scenarios.
//!
//! Plans a resource set and provisions it through the facade, in both
//! execution modes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dockyard_api::{DockAdapterApi, ErrorKind};
use dockyard_core::*;
use dockyard_orchestrator::DeploymentResource;
use dockyard_providers::*;
use dockyard_state::RedbRecordStore;

/// Adapter that records provisioned resource types and fails on one of them.
#[derive(Default)]
struct VendorStub {
    provisioned: Mutex<Vec<String>>,
    fail_type: Option<String>,
}

impl VendorStub {
    fn provisioned(&self) -> Vec<String> {
        self.provisioned.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProvisioningBackend for VendorStub {
    async fn provision(
        &self,
        request: &ProvisionRequest,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport> {
        if self.fail_type.as_deref() == Some(request.resource_type.as_str()) {
            anyhow::bail!("{} quota exhausted", request.resource_type);
        }
        self.provisioned
            .lock()
            .unwrap()
            .push(request.configuration["name"].as_str().unwrap_or_default().to_string());
        Ok(ProviderReport {
            vendor_resource_id: format!("stub-{}", request.resource_id),
            status: ReportedStatus::Ready,
            fields: request.configuration.clone(),
            observed_at: epoch_millis(),
        })
    }

    async fn update(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport> {
        self.provision(request, cancel).await
    }

    async fn deprovision(
        &self,
        _request: &ProvisionRequest,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn status(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProviderReport> {
        self.provision(request, cancel).await
    }
}

async fn dock_api(execution: ExecutionMode, stub: Arc<VendorStub>) -> DockAdapterApi {
    let backends = BackendRegistry::new();
    backends.register_adapter("vendor", stub).await;
    let mut config = DockyardConfig::default();
    config.engine.execution = execution;
    config.engine.max_parallel = 2;
    DockAdapterApi::bootstrap(
        &config,
        Arc::new(RedbRecordStore::open_in_memory().unwrap()),
        backends,
    )
    .await
    .unwrap()
}

fn admin() -> CallerContext {
    CallerContext::new("org-1", "deployer", Permission::Full)
}

fn res(id: &str, resource_type: &str, deps: &[&str]) -> DeploymentResource {
    let mut resource = DeploymentResource::new(id, resource_type, "vendor", deps);
    resource
        .configuration
        .insert("name".to_string(), id.into());
    resource
}

#[tokio::test]
async fn dependency_is_provisioned_first() {
    let stub = Arc::new(VendorStub::default());
    let api = dock_api(ExecutionMode::Sequential, stub.clone()).await;

    let outcome = api
        .deploy(
            &admin(),
            vec![res("web", "web-service", &["db"]), res("db", "database", &[])],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.order, ["db", "web"]);
    assert_eq!(stub.provisioned(), ["db", "web"]);
    let plan_ids: Vec<&str> = outcome.provisioned.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(plan_ids, ["db", "web"]);
    assert_eq!(outcome.provisioned[0].1.category, Category::Databases);
    assert_eq!(outcome.provisioned[1].1.category, Category::WebServices);
    assert!(
        outcome
            .provisioned
            .iter()
            .all(|(_, r)| r.state == ResourceState::Provisioned)
    );
}

#[tokio::test]
async fn cycle_is_rejected_before_anything_runs() {
    let stub = Arc::new(VendorStub::default());
    let api = dock_api(ExecutionMode::Sequential, stub.clone()).await;

    let err = api
        .deploy(
            &admin(),
            vec![res("a", "server", &["b"]), res("b", "server", &["a"])],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CircularDependency);
    assert!(stub.provisioned().is_empty());
    assert!(api.list_resources(&admin()).await.unwrap().is_empty());
}

#[tokio::test]
async fn failure_stops_the_plan_without_rollback() {
    let stub = Arc::new(VendorStub {
        fail_type: Some("database".to_string()),
        ..Default::default()
    });
    let api = dock_api(ExecutionMode::Sequential, stub.clone()).await;

    let err = api
        .deploy(
            &admin(),
            vec![
                res("dns", "domain", &[]),
                res("db", "database", &[]),
                res("web", "web-service", &[]),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderCallFailed);
    assert_eq!(err.resource_id(), Some("db"));
    assert_eq!(err.provider(), Some("vendor"));
    assert!(err.to_string().contains("database quota exhausted"));

    // The first resource stays provisioned, the third was never attempted.
    assert_eq!(stub.provisioned(), ["dns"]);
    let tracked = api.list_resources(&admin()).await.unwrap();
    assert_eq!(tracked.len(), 2);
    let state_of = |resource_type: &str| {
        tracked
            .iter()
            .find(|r| r.resource_type == resource_type)
            .map(|r| r.state.clone())
            .unwrap()
    };
    assert_eq!(state_of("domain"), ResourceState::Provisioned);
    assert!(matches!(state_of("database"), ResourceState::Failed { .. }));
}

#[tokio::test]
async fn unmappable_type_mid_plan_aborts() {
    let stub = Arc::new(VendorStub::default());
    let api = dock_api(ExecutionMode::Sequential, stub.clone()).await;

    let err = api
        .deploy(
            &admin(),
            vec![res("db", "database", &[]), res("q", "quantum-annealer", &["db"])],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnmappableResourceType);
    assert_eq!(err.resource_id(), Some("q"));
    assert_eq!(stub.provisioned(), ["db"]);
}

#[tokio::test]
async fn parallel_mode_provisions_every_tier() {
    let stub = Arc::new(VendorStub::default());
    let api = dock_api(ExecutionMode::Parallel, stub.clone()).await;

    let outcome = api
        .deploy(
            &admin(),
            vec![
                res("db", "database", &[]),
                res("cache", "redis", &[]),
                res("dns", "domain", &[]),
                res("api", "server", &["db", "cache"]),
                res("web", "web-service", &["api", "dns"]),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let plan_ids: Vec<&str> = outcome.provisioned.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(plan_ids, ["db", "cache", "dns", "api", "web"]);

    let provisioned = stub.provisioned();
    let pos = |id: &str| provisioned.iter().position(|p| p == id).unwrap();
    assert!(pos("api") > pos("db") && pos("api") > pos("cache"));
    assert_eq!(pos("web"), 4);
}

#[tokio::test]
async fn deploy_requires_write_permission() {
    let stub = Arc::new(VendorStub::default());
    let api = dock_api(ExecutionMode::Sequential, stub).await;
    let reader = CallerContext::new("org-1", "viewer", Permission::Read);

    let err = api
        .deploy(&reader, vec![res("a", "server", &["a"])], &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn cancelled_deployment_runs_nothing() {
    let stub = Arc::new(VendorStub::default());
    let api = dock_api(ExecutionMode::Sequential, stub.clone()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = api
        .deploy(&admin(), vec![res("db", "database", &[])], &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(err.resource_id(), Some("db"));
    assert!(stub.provisioned().is_empty());
}
