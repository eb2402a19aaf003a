//! Facade error types.
//!
//! Lower-layer errors are folded into one enum so callers can branch on
//! [`ErrorKind`] and render the resource id and provider without parsing
//! messages.

use serde::Serialize;
use thiserror::Error;

use dockyard_core::{Category, ValidationError};
use dockyard_orchestrator::OrchestratorError;
use dockyard_providers::ProviderError;
use dockyard_registry::RegistryError;
use dockyard_state::StateError;

/// Closed error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    Validation,
    NotFound,
    NoProviderAvailable,
    UnmappableResourceType,
    CircularDependency,
    InvalidPlan,
    ResourceNotFoundInPlan,
    CannotSaveUnknownResource,
    ResourceStateNotFound,
    ProviderCallFailed,
    Cancelled,
    Configuration,
    Storage,
}

#[derive(Debug, Error)]
pub enum DockError {
    #[error("permission denied: {operation} requires {required} access")]
    PermissionDenied {
        operation: &'static str,
        required: &'static str,
    },

    #[error("invalid declaration: {0}")]
    Validation(#[from] ValidationError),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("no provider available for resource type `{resource_type}` from `{provider}`")]
    NoProviderAvailable {
        resource_type: String,
        provider: String,
    },

    #[error("resource type `{0}` has no category mapping")]
    UnmappableResourceType(String),

    #[error("cannot save state for unknown resource {resource_id} in {category}")]
    CannotSaveUnknownResource {
        resource_id: String,
        category: Category,
    },

    #[error("no stored state for resource {0}")]
    ResourceStateNotFound(String),

    #[error("provider `{provider}` failed for resource `{resource_id}`: {source:#}")]
    ProviderCallFailed {
        resource_id: String,
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("operation on `{resource_id}` cancelled")]
    Cancelled { resource_id: String },

    /// Provider catalog or backend wiring problems.
    #[error(transparent)]
    Provider(ProviderError),

    #[error(transparent)]
    Plan(OrchestratorError),

    #[error(transparent)]
    State(StateError),
}

impl DockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DockError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            DockError::Validation(_) => ErrorKind::Validation,
            DockError::NotFound(_) => ErrorKind::NotFound,
            DockError::NoProviderAvailable { .. } => ErrorKind::NoProviderAvailable,
            DockError::UnmappableResourceType(_) => ErrorKind::UnmappableResourceType,
            DockError::CannotSaveUnknownResource { .. } => ErrorKind::CannotSaveUnknownResource,
            DockError::ResourceStateNotFound(_) => ErrorKind::ResourceStateNotFound,
            DockError::ProviderCallFailed { .. } => ErrorKind::ProviderCallFailed,
            DockError::Cancelled { .. } => ErrorKind::Cancelled,
            DockError::Provider(ProviderError::Invalid(_)) => ErrorKind::Validation,
            DockError::Provider(_) => ErrorKind::Configuration,
            DockError::Plan(err) => match err {
                OrchestratorError::CircularDependency(_) => ErrorKind::CircularDependency,
                OrchestratorError::DuplicateResource(_)
                | OrchestratorError::UnknownDependency { .. } => ErrorKind::InvalidPlan,
                OrchestratorError::ResourceNotFoundInPlan(_) => ErrorKind::ResourceNotFoundInPlan,
                OrchestratorError::Cancelled { .. } => ErrorKind::Cancelled,
                OrchestratorError::ExecutionFailed { source, .. } => source
                    .downcast_ref::<DockError>()
                    .map(DockError::kind)
                    .unwrap_or(ErrorKind::ProviderCallFailed),
            },
            DockError::State(_) => ErrorKind::Storage,
        }
    }

    /// The resource the error is about, when there is one.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            DockError::NotFound(id) | DockError::ResourceStateNotFound(id) => Some(id),
            DockError::CannotSaveUnknownResource { resource_id, .. }
            | DockError::ProviderCallFailed { resource_id, .. }
            | DockError::Cancelled { resource_id } => Some(resource_id),
            DockError::Plan(err) => err.resource_id(),
            _ => None,
        }
    }

    /// The vendor or provider name involved, when there is one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            DockError::NoProviderAvailable { provider, .. }
            | DockError::ProviderCallFailed { provider, .. } => Some(provider),
            DockError::Provider(ProviderError::AlreadyRegistered(name))
            | DockError::Provider(ProviderError::BackendMissing { provider: name, .. }) => {
                Some(name)
            }
            DockError::Plan(OrchestratorError::ExecutionFailed { source, .. }) => source
                .downcast_ref::<DockError>()
                .and_then(DockError::provider),
            _ => None,
        }
    }
}

impl From<ProviderError> for DockError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NoProviderAvailable {
                resource_type,
                provider,
            } => DockError::NoProviderAvailable {
                resource_type,
                provider,
            },
            other => DockError::Provider(other),
        }
    }
}

impl From<RegistryError> for DockError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => DockError::NotFound(id),
            RegistryError::Validation(e) => DockError::Validation(e),
        }
    }
}

impl From<StateError> for DockError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::UnmappableResourceType(t) => DockError::UnmappableResourceType(t),
            StateError::CannotSaveUnknownResource {
                provider_resource_id,
                category,
            } => DockError::CannotSaveUnknownResource {
                resource_id: provider_resource_id,
                category,
            },
            other => DockError::State(other),
        }
    }
}

impl From<OrchestratorError> for DockError {
    fn from(err: OrchestratorError) -> Self {
        DockError::Plan(err)
    }
}

pub type DockResult<T> = Result<T, DockError>;
