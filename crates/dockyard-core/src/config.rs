//! dockyard.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::types::{Category, ProviderKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockyardConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Extra resource type → category entries on top of the built-in table.
    #[serde(default)]
    pub categories: BTreeMap<String, Category>,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub reconcile_policy: ReconcilePolicy,
    #[serde(default)]
    pub execution: ExecutionMode,
    /// Upper bound on concurrent provider calls in parallel execution.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconcile_policy: ReconcilePolicy::default(),
            execution: ExecutionMode::default(),
            max_parallel: default_max_parallel(),
        }
    }
}

fn default_max_parallel() -> usize {
    4
}

/// How `sync` resolves differences between the stored record and the vendor report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcilePolicy {
    /// Vendor-reported fields always overwrite stored ones.
    #[default]
    VendorWins,
    /// The vendor report only applies if it is not older than the stored record.
    LastWriterWins,
}

/// How a deployment plan is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// Fan out per dependency tier.
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl DockyardConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DockyardConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Every resource type declared by a configured provider, deduplicated.
    pub fn declared_resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .providers
            .iter()
            .flat_map(|p| p.resource_types.iter().cloned())
            .collect();
        types.sort();
        types.dedup();
        types
    }
}
