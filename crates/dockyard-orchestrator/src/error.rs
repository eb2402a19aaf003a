//! Orchestrator error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("circular dependency detected at resource `{0}`")]
    CircularDependency(String),

    #[error("duplicate resource id in deployment: {0}")]
    DuplicateResource(String),

    #[error("resource `{resource_id}` depends on `{dependency}`, which is not in the deployment")]
    UnknownDependency {
        resource_id: String,
        dependency: String,
    },

    /// The plan's order names an id with no resource node. Never retryable.
    #[error("resource `{0}` is in the plan order but not in the plan")]
    ResourceNotFoundInPlan(String),

    #[error("execution failed for resource `{resource_id}`: {source:#}")]
    ExecutionFailed {
        resource_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("deployment cancelled before resource `{resource_id}`")]
    Cancelled { resource_id: String },
}

impl OrchestratorError {
    /// The resource the error is about, when there is one.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            OrchestratorError::CircularDependency(id)
            | OrchestratorError::DuplicateResource(id)
            | OrchestratorError::ResourceNotFoundInPlan(id) => Some(id),
            OrchestratorError::UnknownDependency { resource_id, .. }
            | OrchestratorError::ExecutionFailed { resource_id, .. }
            | OrchestratorError::Cancelled { resource_id } => Some(resource_id),
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
