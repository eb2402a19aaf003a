//! Shared types used across Dockyard crates.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-issued identifier of a provisioned resource (`type-provider-timestamp`).
pub type ResourceId = String;

/// Opaque key-value configuration attached to a declaration.
pub type Configuration = serde_json::Map<String, serde_json::Value>;

// ── Category ───────────────────────────────────────────────────────

/// One of the four universal partitions every vendor resource is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Servers,
    WebServices,
    Domains,
    Databases,
}

impl Category {
    /// Fixed probe order used when the caller does not know the category.
    pub const ALL: [Category; 4] = [
        Category::Servers,
        Category::WebServices,
        Category::Domains,
        Category::Databases,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Servers => "servers",
            Category::WebServices => "web-services",
            Category::Domains => "domains",
            Category::Databases => "databases",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Providers ──────────────────────────────────────────────────────

/// Whether a provider is built into the engine or reached through a dock adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Native,
    Adapter,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Native => f.write_str("native"),
            ProviderKind::Adapter => f.write_str("adapter"),
        }
    }
}

// ── Declarations ───────────────────────────────────────────────────

/// Caller-supplied request to provision a piece of infrastructure.
///
/// Missing fields deserialize to empty values so that [`validate`](Self::validate)
/// can name exactly which one is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub configuration: Option<Configuration>,
}

impl ResourceDeclaration {
    pub fn new(resource_type: &str, provider: &str, configuration: Configuration) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            provider: provider.to_string(),
            configuration: Some(configuration),
        }
    }

    /// Check that type, provider and configuration are all present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.resource_type.trim().is_empty() {
            return Err(ValidationError::MissingField("type"));
        }
        if self.provider.trim().is_empty() {
            return Err(ValidationError::MissingField("provider"));
        }
        if self.configuration.is_none() {
            return Err(ValidationError::MissingField("configuration"));
        }
        Ok(())
    }
}

/// Fields an update may change. Configuration keys are merged over the
/// existing ones; the resource type is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialDeclaration {
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub configuration: Option<Configuration>,
}

/// Declaration shape errors. Each names the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("declaration is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("resource type cannot change from `{from}` to `{to}`")]
    ImmutableType { from: String, to: String },
}

// ── Lifecycle ──────────────────────────────────────────────────────

/// Lifecycle of a provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResourceState {
    Provisioning,
    Provisioned,
    Failed { reason: String },
    Deprovisioning,
    Deleted,
}

impl ResourceState {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceState::Provisioning => "provisioning",
            ResourceState::Provisioned => "provisioned",
            ResourceState::Failed { .. } => "failed",
            ResourceState::Deprovisioning => "deprovisioning",
            ResourceState::Deleted => "deleted",
        }
    }

    /// `Deleted` is the only state a resource never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceState::Deleted)
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// The tracked runtime record of a declaration's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionedResource {
    pub id: ResourceId,
    /// Organization that owns the resource.
    pub organization_id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub provider: String,
    /// Partition of the state store holding this resource.
    pub category: Category,
    /// Set only when the native backend provisioned the resource.
    pub native_resource_id: Option<String>,
    pub state: ResourceState,
    pub configuration: Configuration,
    /// Unix timestamp (millis) of creation.
    pub created_at: u64,
    /// Unix timestamp (millis) of the last state change.
    pub updated_at: u64,
}

/// Current Unix epoch in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        let mut c = Configuration::new();
        c.insert("region".to_string(), "fra1".into());
        c
    }

    #[test]
    fn valid_declaration_passes() {
        let decl = ResourceDeclaration::new("server", "dry-run", config());
        assert!(decl.validate().is_ok());
    }

    #[test]
    fn each_missing_field_is_named() {
        let mut decl = ResourceDeclaration::new("server", "dry-run", config());
        decl.resource_type.clear();
        assert_eq!(decl.validate(), Err(ValidationError::MissingField("type")));

        let mut decl = ResourceDeclaration::new("server", "dry-run", config());
        decl.provider = "  ".to_string();
        assert_eq!(decl.validate(), Err(ValidationError::MissingField("provider")));

        let mut decl = ResourceDeclaration::new("server", "dry-run", config());
        decl.configuration = None;
        assert_eq!(
            decl.validate(),
            Err(ValidationError::MissingField("configuration"))
        );
    }

    #[test]
    fn declaration_deserializes_with_missing_fields() {
        let decl: ResourceDeclaration = serde_json::from_str(r#"{"type": "domain"}"#).unwrap();
        assert_eq!(decl.resource_type, "domain");
        assert_eq!(decl.validate(), Err(ValidationError::MissingField("provider")));
    }

    #[test]
    fn resource_state_serializes_tagged() {
        let failed = ResourceState::Failed {
            reason: "quota".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "quota");

        let back: ResourceState = serde_json::from_value(json).unwrap();
        assert_eq!(back, failed);
        assert_eq!(failed.to_string(), "failed: quota");
    }

    #[test]
    fn deprovisioning_is_distinct_from_failure() {
        assert_ne!(ResourceState::Deprovisioning.label(), "failed");
        assert!(!ResourceState::Deprovisioning.is_terminal());
        assert!(ResourceState::Deleted.is_terminal());
    }

    #[test]
    fn category_probe_order_is_fixed() {
        let names: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
        assert_eq!(names, ["servers", "web-services", "domains", "databases"]);
    }
}
