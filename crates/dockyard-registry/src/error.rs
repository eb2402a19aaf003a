//! Resource registry error types.

use dockyard_core::ValidationError;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid declaration: {0}")]
    Validation(#[from] ValidationError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
