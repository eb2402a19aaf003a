//! Provider registry — catalog of provisioning backends.
//!
//! Read-mostly after startup: register/unregister take the write lock,
//! lookups share the read lock. Registration order is preserved and is the
//! tie-break for lookups within the native and adapter groups.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use dockyard_core::ProviderConfig;

use crate::error::{ProviderError, ProviderResult};
use crate::types::Provider;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<Vec<Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `[[providers]]` config entries.
    pub async fn from_config(configs: &[ProviderConfig]) -> ProviderResult<Self> {
        let registry = Self::new();
        for config in configs {
            registry.register(Provider::from(config)).await?;
        }
        Ok(registry)
    }

    pub async fn register(&self, provider: Provider) -> ProviderResult<()> {
        provider.validate()?;
        let mut providers = self.providers.write().await;
        if providers.iter().any(|p| p.name == provider.name) {
            return Err(ProviderError::AlreadyRegistered(provider.name));
        }
        info!(
            provider = %provider.name,
            kind = %provider.kind,
            resource_types = ?provider.resource_types,
            "provider registered"
        );
        providers.push(provider);
        Ok(())
    }

    /// Remove a provider. Unknown names are a no-op.
    pub async fn unregister(&self, name: &str) -> bool {
        let mut providers = self.providers.write().await;
        let before = providers.len();
        providers.retain(|p| p.name != name);
        let removed = providers.len() != before;
        if removed {
            info!(provider = %name, "provider unregistered");
        } else {
            debug!(provider = %name, "unregister of unknown provider ignored");
        }
        removed
    }

    /// Find a provider for a resource type.
    ///
    /// With a name, returns that provider only if it supports the type.
    /// Without one, returns the first available native provider supporting
    /// the type, falling back to the first available adapter.
    pub async fn get_provider(
        &self,
        resource_type: &str,
        provider_name: Option<&str>,
    ) -> Option<Provider> {
        let providers = self.providers.read().await;
        if let Some(name) = provider_name {
            return providers
                .iter()
                .find(|p| p.name == name && p.supports(resource_type))
                .cloned();
        }
        let mut first_adapter = None;
        for provider in providers
            .iter()
            .filter(|p| p.available && p.supports(resource_type))
        {
            if provider.is_native() {
                return Some(provider.clone());
            }
            first_adapter.get_or_insert(provider);
        }
        first_adapter.cloned()
    }

    /// Every provider supporting the type, natives before adapters.
    pub async fn list_providers(&self, resource_type: &str) -> Vec<Provider> {
        let providers = self.providers.read().await;
        let mut matches: Vec<Provider> = providers
            .iter()
            .filter(|p| p.supports(resource_type))
            .cloned()
            .collect();
        // Stable sort keeps registration order within each group.
        matches.sort_by_key(|p| !p.is_native());
        matches
    }

    pub async fn is_provider_available(&self, name: &str) -> bool {
        self.providers
            .read()
            .await
            .iter()
            .any(|p| p.name == name && p.available)
    }

    /// Snapshot of the native providers, in registration order.
    pub async fn native_providers(&self) -> Vec<Provider> {
        self.providers
            .read()
            .await
            .iter()
            .filter(|p| p.is_native())
            .cloned()
            .collect()
    }

    /// Every resource type any registered provider declares.
    pub async fn resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .providers
            .read()
            .await
            .iter()
            .flat_map(|p| p.resource_types.iter().cloned())
            .collect();
        types.sort();
        types.dedup();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockyard_core::{ProviderKind, ValidationError};

    async fn seeded() -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        registry
            .register(Provider::adapter("hetzner", &["server"]))
            .await
            .unwrap();
        registry
            .register(Provider::native("dockyard-vm", &["server", "database"]).unavailable())
            .await
            .unwrap();
        registry
            .register(Provider::native("dockyard-db", &["database"]))
            .await
            .unwrap();
        registry
            .register(Provider::adapter("neon", &["database"]))
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let registry = ProviderRegistry::new();

        let err = registry
            .register(Provider::native("", &["server"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Invalid(ValidationError::EmptyField("name"))));

        let err = registry
            .register(Provider::native("x", &[]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Invalid(ValidationError::EmptyField("resource_types"))
        ));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let registry = seeded().await;
        let err = registry
            .register(Provider::adapter("neon", &["database"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyRegistered(ref n) if n == "neon"));
    }

    #[tokio::test]
    async fn get_provider_by_name_requires_support() {
        let registry = seeded().await;
        let found = registry.get_provider("database", Some("neon")).await.unwrap();
        assert_eq!(found.name, "neon");
        assert!(registry.get_provider("server", Some("neon")).await.is_none());
    }

    #[tokio::test]
    async fn get_provider_prefers_available_native() {
        let registry = seeded().await;
        // dockyard-vm supports database but is unavailable.
        let found = registry.get_provider("database", None).await.unwrap();
        assert_eq!(found.name, "dockyard-db");
        assert_eq!(found.kind, ProviderKind::Native);
    }

    #[tokio::test]
    async fn get_provider_falls_back_to_adapter() {
        let registry = seeded().await;
        let found = registry.get_provider("server", None).await.unwrap();
        assert_eq!(found.name, "hetzner");
        assert!(registry.get_provider("domain", None).await.is_none());
    }

    #[tokio::test]
    async fn list_providers_orders_natives_first() {
        let registry = seeded().await;
        let names: Vec<String> = registry
            .list_providers("database")
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["dockyard-vm", "dockyard-db", "neon"]);
    }

    #[tokio::test]
    async fn availability_and_unregister() {
        let registry = seeded().await;
        assert!(registry.is_provider_available("neon").await);
        assert!(!registry.is_provider_available("dockyard-vm").await);
        assert!(!registry.is_provider_available("aws").await);

        assert!(registry.unregister("neon").await);
        assert!(!registry.unregister("neon").await);
        assert!(!registry.is_provider_available("neon").await);
    }

    #[tokio::test]
    async fn from_config_registers_all() {
        let configs = vec![ProviderConfig {
            name: "dry-run".to_string(),
            kind: ProviderKind::Native,
            resource_types: vec!["server".to_string(), "domain".to_string()],
            available: true,
        }];
        let registry = ProviderRegistry::from_config(&configs).await.unwrap();
        assert_eq!(registry.native_providers().await.len(), 1);
        assert_eq!(registry.resource_types().await, ["domain", "server"]);
    }
}
