//! Provider catalog types.

use serde::{Deserialize, Serialize};

use dockyard_core::{ProviderConfig, ProviderKind, ValidationError};

/// A provisioning backend known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub kind: ProviderKind,
    /// Resource types this provider can provision.
    pub resource_types: Vec<String>,
    pub available: bool,
}

impl Provider {
    pub fn native(name: &str, resource_types: &[&str]) -> Self {
        Self::new(name, ProviderKind::Native, resource_types)
    }

    pub fn adapter(name: &str, resource_types: &[&str]) -> Self {
        Self::new(name, ProviderKind::Adapter, resource_types)
    }

    fn new(name: &str, kind: ProviderKind, resource_types: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            resource_types: resource_types.iter().map(|t| t.to_string()).collect(),
            available: true,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn supports(&self, resource_type: &str) -> bool {
        self.resource_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(resource_type))
    }

    pub fn is_native(&self) -> bool {
        self.kind == ProviderKind::Native
    }

    /// Name and at least one non-empty resource type are required.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if self.resource_types.is_empty() || self.resource_types.iter().any(|t| t.trim().is_empty())
        {
            return Err(ValidationError::EmptyField("resource_types"));
        }
        Ok(())
    }
}

impl From<&ProviderConfig> for Provider {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            kind: config.kind,
            resource_types: config.resource_types.clone(),
            available: config.available,
        }
    }
}

/// Outcome of provider selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub method: ProviderKind,
    pub provider: String,
    /// Set when `method` is `Adapter`.
    pub adapter_name: Option<String>,
}
