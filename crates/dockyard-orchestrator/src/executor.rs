//! Plan execution.
//!
//! Sequential execution walks `plan.order()` one resource at a time. The
//! parallel executor fans out one dependency tier at a time and waits for
//! the whole tier before starting the next. Both are fail-fast: the first
//! failure stops the plan, and resources already executed stay executed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dockyard_core::{EngineConfig, ExecutionMode};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::plan::{DeploymentResource, Plan};

/// Per-resource hook the orchestrator drives over a plan.
#[async_trait]
pub trait ResourceExecutor: Send + Sync {
    async fn execute(
        &self,
        resource: &DeploymentResource,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;
}

/// Resources executed by a completed plan, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub executed: Vec<String>,
}

/// Execute a plan strictly in order.
pub async fn execute_plan(
    plan: &Plan,
    executor: &dyn ResourceExecutor,
    cancel: &CancellationToken,
) -> OrchestratorResult<ExecutionReport> {
    let mut report = ExecutionReport::default();
    for id in plan.order() {
        if cancel.is_cancelled() {
            warn!(resource_id = %id, executed = report.executed.len(), "plan cancelled");
            return Err(OrchestratorError::Cancelled {
                resource_id: id.clone(),
            });
        }
        let resource = plan
            .resource(id)
            .ok_or_else(|| OrchestratorError::ResourceNotFoundInPlan(id.clone()))?;

        debug!(resource_id = %id, provider = %resource.provider, "executing resource");
        if let Err(source) = executor.execute(resource, cancel).await {
            warn!(
                resource_id = %id,
                executed = report.executed.len(),
                error = %source,
                "plan aborted"
            );
            return Err(OrchestratorError::ExecutionFailed {
                resource_id: id.clone(),
                source,
            });
        }
        report.executed.push(id.clone());
    }
    info!(executed = report.executed.len(), "plan executed");
    Ok(report)
}

enum StepFailure {
    Cancelled,
    Failed(anyhow::Error),
}

/// Execute a plan tier by tier, running each tier's resources concurrently.
///
/// `max_parallel` bounds in-flight resources across the whole plan. When a
/// tier has failures, its other tasks still run to completion, the next tier
/// is never started, and the error names the failure with the lowest plan
/// position.
pub async fn execute_plan_parallel(
    plan: &Plan,
    executor: Arc<dyn ResourceExecutor>,
    max_parallel: usize,
    cancel: &CancellationToken,
) -> OrchestratorResult<ExecutionReport> {
    let permits = Arc::new(Semaphore::new(max_parallel.max(1)));
    let position: HashMap<&str, usize> = plan
        .order()
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut report = ExecutionReport::default();

    for (tier_index, tier) in plan.tiers().into_iter().enumerate() {
        if cancel.is_cancelled() {
            let first = tier.first().cloned().unwrap_or_default();
            warn!(resource_id = %first, tier = tier_index, "plan cancelled");
            return Err(OrchestratorError::Cancelled { resource_id: first });
        }
        debug!(tier = tier_index, resources = tier.len(), "starting tier");

        let mut tasks = JoinSet::new();
        let mut task_ids = HashMap::new();
        for id in &tier {
            let resource = plan
                .resource(id)
                .cloned()
                .ok_or_else(|| OrchestratorError::ResourceNotFoundInPlan(id.clone()))?;
            let executor = executor.clone();
            let permits = permits.clone();
            let cancel = cancel.clone();
            let handle = tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return Err(StepFailure::Failed(e.into())),
                };
                if cancel.is_cancelled() {
                    return Err(StepFailure::Cancelled);
                }
                executor
                    .execute(&resource, &cancel)
                    .await
                    .map_err(StepFailure::Failed)
            });
            task_ids.insert(handle.id(), id.clone());
        }

        let mut succeeded = Vec::new();
        let mut failures: Vec<(usize, OrchestratorError)> = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, outcome) = match joined {
                Ok((task_id, outcome)) => (task_id, outcome),
                Err(e) => {
                    let task_id = e.id();
                    (task_id, Err(StepFailure::Failed(anyhow::anyhow!("task failed: {e}"))))
                }
            };
            let Some(resource_id) = task_ids.remove(&task_id) else {
                continue;
            };
            let pos = position.get(resource_id.as_str()).copied().unwrap_or(usize::MAX);
            match outcome {
                Ok(()) => succeeded.push((pos, resource_id)),
                Err(StepFailure::Cancelled) => {
                    failures.push((pos, OrchestratorError::Cancelled { resource_id }))
                }
                Err(StepFailure::Failed(source)) => failures.push((
                    pos,
                    OrchestratorError::ExecutionFailed {
                        resource_id,
                        source,
                    },
                )),
            }
        }

        succeeded.sort_by_key(|(pos, _)| *pos);
        report
            .executed
            .extend(succeeded.into_iter().map(|(_, id)| id));

        if let Some((_, err)) = failures.into_iter().min_by_key(|(pos, _)| *pos) {
            warn!(
                tier = tier_index,
                executed = report.executed.len(),
                error = %err,
                "plan aborted"
            );
            return Err(err);
        }
    }

    info!(executed = report.executed.len(), "plan executed");
    Ok(report)
}

/// Runs plans in the configured execution mode.
#[derive(Debug, Clone, Copy)]
pub struct PlanRunner {
    mode: ExecutionMode,
    max_parallel: usize,
}

impl PlanRunner {
    pub fn new(mode: ExecutionMode, max_parallel: usize) -> Self {
        Self { mode, max_parallel }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.execution, config.max_parallel)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub async fn run(
        &self,
        plan: &Plan,
        executor: Arc<dyn ResourceExecutor>,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<ExecutionReport> {
        info!(mode = ?self.mode, resources = plan.len(), "executing plan");
        match self.mode {
            ExecutionMode::Sequential => execute_plan(plan, executor.as_ref(), cancel).await,
            ExecutionMode::Parallel => {
                execute_plan_parallel(plan, executor, self.max_parallel, cancel).await
            }
        }
    }
}
