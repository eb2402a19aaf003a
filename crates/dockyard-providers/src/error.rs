//! Provider error types.

use dockyard_core::{ProviderKind, ValidationError};
use thiserror::Error;

/// Errors that can occur during provider registration and selection.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no provider available for resource type `{resource_type}` from `{provider}`")]
    NoProviderAvailable {
        resource_type: String,
        provider: String,
    },

    #[error("invalid provider: {0}")]
    Invalid(#[from] ValidationError),

    #[error("provider already registered: {0}")]
    AlreadyRegistered(String),

    #[error("no {kind} backend registered for `{provider}`")]
    BackendMissing { provider: String, kind: ProviderKind },
}

pub type ProviderResult<T> = Result<T, ProviderError>;
