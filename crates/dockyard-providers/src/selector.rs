//! Provider selection — decides between the native backend and a dock adapter.
//!
//! Priority is strict and total per (resource type, provider name):
//! 1. A native provider with that name that supports the type and is available
//! 2. A dock adapter with that name
//! 3. Otherwise `NoProviderAvailable`
//!
//! There is no substitution of a different vendor.

use tracing::debug;

use dockyard_core::ProviderKind;

use crate::error::{ProviderError, ProviderResult};
use crate::types::{Provider, Selection};

pub fn select_provider(
    resource_type: &str,
    provider_name: &str,
    native_providers: &[Provider],
    adapter_names: &[String],
) -> ProviderResult<Selection> {
    let native = native_providers.iter().find(|p| {
        p.is_native() && p.name == provider_name && p.available && p.supports(resource_type)
    });
    if let Some(native) = native {
        debug!(%resource_type, provider = %native.name, "selected native provider");
        return Ok(Selection {
            method: ProviderKind::Native,
            provider: native.name.clone(),
            adapter_name: None,
        });
    }

    if adapter_names.iter().any(|a| a == provider_name) {
        debug!(%resource_type, provider = %provider_name, "selected dock adapter");
        return Ok(Selection {
            method: ProviderKind::Adapter,
            provider: provider_name.to_string(),
            adapter_name: Some(provider_name.to_string()),
        });
    }

    Err(ProviderError::NoProviderAvailable {
        resource_type: resource_type.to_string(),
        provider: provider_name.to_string(),
    })
}
