//! Persisted state record types.
//!
//! A `StateRecord` is the reconciled view of one resource in one category.
//! Vendor-reported data is split into a closed set of known fields per
//! category (`CategoryFields`) and an opaque `extra` bag for everything else.

use serde::{Deserialize, Serialize};

use dockyard_core::{Category, Configuration, ProviderKind, ResourceState};

/// Identifier the persistence layer assigns to a stored record.
pub type RecordId = String;

// ── Category fields ────────────────────────────────────────────────

/// Known fields for each category. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CategoryFields {
    Server {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hostname: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ip_address: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<String>,
    },
    WebService {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runtime: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
    },
    Domain {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        registrar: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<String>,
    },
    Database {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        engine: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
    },
}

impl CategoryFields {
    /// All-empty field set for a category.
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Servers => CategoryFields::Server {
                hostname: None,
                ip_address: None,
                region: None,
                size: None,
            },
            Category::WebServices => CategoryFields::WebService {
                url: None,
                runtime: None,
                region: None,
            },
            Category::Domains => CategoryFields::Domain {
                name: None,
                registrar: None,
                expires_at: None,
            },
            Category::Databases => CategoryFields::Database {
                engine: None,
                version: None,
                endpoint: None,
                region: None,
            },
        }
    }

    pub fn category(&self) -> Category {
        match self {
            CategoryFields::Server { .. } => Category::Servers,
            CategoryFields::WebService { .. } => Category::WebServices,
            CategoryFields::Domain { .. } => Category::Domains,
            CategoryFields::Database { .. } => Category::Databases,
        }
    }

    /// Look up a known field by its snake_case name.
    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        match self {
            CategoryFields::Server {
                hostname,
                ip_address,
                region,
                size,
            } => match key {
                "hostname" => Some(hostname),
                "ip_address" => Some(ip_address),
                "region" => Some(region),
                "size" => Some(size),
                _ => None,
            },
            CategoryFields::WebService { url, runtime, region } => match key {
                "url" => Some(url),
                "runtime" => Some(runtime),
                "region" => Some(region),
                _ => None,
            },
            CategoryFields::Domain {
                name,
                registrar,
                expires_at,
            } => match key {
                "name" => Some(name),
                "registrar" => Some(registrar),
                "expires_at" => Some(expires_at),
                _ => None,
            },
            CategoryFields::Database {
                engine,
                version,
                endpoint,
                region,
            } => match key {
                "engine" => Some(engine),
                "version" => Some(version),
                "endpoint" => Some(endpoint),
                "region" => Some(region),
                _ => None,
            },
        }
    }

    /// Names of the known fields for this category, in declaration order.
    pub fn known_keys(&self) -> &'static [&'static str] {
        match self {
            CategoryFields::Server { .. } => &["hostname", "ip_address", "region", "size"],
            CategoryFields::WebService { .. } => &["url", "runtime", "region"],
            CategoryFields::Domain { .. } => &["name", "registrar", "expires_at"],
            CategoryFields::Database { .. } => &["engine", "version", "endpoint", "region"],
        }
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match self {
            CategoryFields::Server {
                hostname,
                ip_address,
                region,
                size,
            } => match key {
                "hostname" => Some(hostname),
                "ip_address" => Some(ip_address),
                "region" => Some(region),
                "size" => Some(size),
                _ => None,
            },
            CategoryFields::WebService { url, runtime, region } => match key {
                "url" => Some(url),
                "runtime" => Some(runtime),
                "region" => Some(region),
                _ => None,
            },
            CategoryFields::Domain {
                name,
                registrar,
                expires_at,
            } => match key {
                "name" => Some(name),
                "registrar" => Some(registrar),
                "expires_at" => Some(expires_at),
                _ => None,
            },
            CategoryFields::Database {
                engine,
                version,
                endpoint,
                region,
            } => match key {
                "engine" => Some(engine),
                "version" => Some(version),
                "endpoint" => Some(endpoint),
                "region" => Some(region),
                _ => None,
            },
        }
    }
}

// ── Record state ───────────────────────────────────────────────────

/// Provisioning bookkeeping plus vendor-reported fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordState {
    /// Which path provisioned the resource.
    pub source: ProviderKind,
    /// Native engine identifier (native path only).
    #[serde(default)]
    pub native_resource_id: Option<String>,
    /// The id the vendor itself uses for the resource.
    #[serde(default)]
    pub vendor_resource_id: Option<String>,
    pub status: ResourceState,
    /// Unix timestamp (millis) of the last successful provisioning call.
    #[serde(default)]
    pub last_provisioned_at: Option<u64>,
    pub fields: CategoryFields,
    /// Vendor-specific passthrough data.
    #[serde(default)]
    pub extra: Configuration,
}

impl RecordState {
    pub fn new(category: Category, source: ProviderKind, status: ResourceState) -> Self {
        Self {
            source,
            native_resource_id: None,
            vendor_resource_id: None,
            status,
            last_provisioned_at: None,
            fields: CategoryFields::empty(category),
            extra: Configuration::new(),
        }
    }

    /// Set known fields plus `extra`, flattened back into one configuration map.
    pub fn reported(&self) -> Configuration {
        let mut out = self.extra.clone();
        for key in self.fields.known_keys() {
            if let Some(Some(value)) = self.fields.get(key) {
                out.insert(key.to_string(), value.clone().into());
            }
        }
        out
    }

    /// Merge reported key-values into known fields or `extra`.
    ///
    /// JSON `null` clears a value. Returns the (normalized) names of the
    /// fields whose value changed, in input order.
    pub fn merge_reported(&mut self, reported: &Configuration) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in reported {
            let normalized = normalize_key(key);
            if let Some(slot) = self.fields.slot_mut(&normalized) {
                let next = value_to_string(value);
                if *slot != next {
                    *slot = next;
                    changed.push(normalized);
                }
                continue;
            }
            if value.is_null() {
                if self.extra.remove(key).is_some() {
                    changed.push(key.clone());
                }
            } else if self.extra.get(key) != Some(value) {
                self.extra.insert(key.clone(), value.clone());
                changed.push(key.clone());
            }
        }
        changed
    }
}

/// `ipAddress` / `ip-address` / `ip_address` all name the same field.
fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c == '-' {
            out.push('_');
        } else if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ── Records ────────────────────────────────────────────────────────

/// Persisted form of a resource's reconciled state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub resource_id: String,
    /// Declared resource type, as submitted by the caller.
    pub resource_type: String,
    pub provider: String,
    /// Record key within the category; the id handed to the provider.
    pub provider_resource_id: String,
    pub category: Category,
    pub state: RecordState,
    /// Unix timestamp (millis) of the last write.
    pub last_updated: u64,
}

impl StateRecord {
    /// Merge an update into this record. Returns changed field names;
    /// `last_updated` is left to the caller.
    pub fn merge(&mut self, update: &StateUpdate) -> Vec<String> {
        let mut changed = Vec::new();
        if let Some(provider) = &update.provider {
            if *provider != self.provider {
                self.provider = provider.clone();
                changed.push("provider".to_string());
            }
        }
        if let Some(source) = update.source {
            if source != self.state.source {
                self.state.source = source;
                changed.push("source".to_string());
            }
        }
        if let Some(status) = &update.status {
            if *status != self.state.status {
                self.state.status = status.clone();
                changed.push("status".to_string());
            }
        }
        if update.native_resource_id.is_some()
            && update.native_resource_id != self.state.native_resource_id
        {
            self.state.native_resource_id = update.native_resource_id.clone();
            changed.push("native_resource_id".to_string());
        }
        if update.vendor_resource_id.is_some()
            && update.vendor_resource_id != self.state.vendor_resource_id
        {
            self.state.vendor_resource_id = update.vendor_resource_id.clone();
            changed.push("vendor_resource_id".to_string());
        }
        if update.last_provisioned_at.is_some() {
            self.state.last_provisioned_at = update.last_provisioned_at;
        }
        changed.extend(self.state.merge_reported(&update.reported));
        changed
    }
}

/// A record together with the id the persistence layer assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub record: StateRecord,
}

/// Field-level patch applied by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub provider: Option<String>,
    pub state: Option<RecordState>,
    pub last_updated: u64,
}

impl RecordPatch {
    pub fn apply(&self, record: &mut StateRecord) {
        if let Some(provider) = &self.provider {
            record.provider = provider.clone();
        }
        if let Some(state) = &self.state {
            record.state = state.clone();
        }
        record.last_updated = self.last_updated;
    }
}

/// Changes to merge into an existing record via `StateStoreAdapter::save_state`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub provider_resource_id: String,
    pub provider: Option<String>,
    pub source: Option<ProviderKind>,
    pub status: Option<ResourceState>,
    pub native_resource_id: Option<String>,
    pub vendor_resource_id: Option<String>,
    pub last_provisioned_at: Option<u64>,
    /// Vendor-reported or configuration fields.
    pub reported: Configuration,
}

impl StateUpdate {
    pub fn new(provider_resource_id: &str) -> Self {
        Self {
            provider_resource_id: provider_resource_id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ResourceState) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_reported(mut self, reported: Configuration) -> Self {
        self.reported = reported;
        self
    }
}

/// A record located by probing the category partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMapping {
    pub category: Category,
    pub mapping: StateRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reported(value: serde_json::Value) -> Configuration {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn known_fields_fill_category_slots() {
        let mut state = RecordState::new(
            Category::Servers,
            ProviderKind::Native,
            ResourceState::Provisioning,
        );
        let changed = state.merge_reported(&reported(json!({
            "hostname": "web-1",
            "ipAddress": "10.0.0.4",
            "image": "ubuntu-24.04",
        })));

        // Map iteration is key-sorted.
        assert_eq!(changed, ["hostname", "image", "ip_address"]);
        assert_eq!(state.fields.get("hostname"), Some(&Some("web-1".to_string())));
        assert_eq!(state.fields.get("ip_address"), Some(&Some("10.0.0.4".to_string())));
        assert_eq!(state.extra["image"], "ubuntu-24.04");
    }

    #[test]
    fn unchanged_values_are_not_reported() {
        let mut state = RecordState::new(
            Category::Databases,
            ProviderKind::Adapter,
            ResourceState::Provisioned,
        );
        state.merge_reported(&reported(json!({"engine": "postgres", "tier": "small"})));
        let changed =
            state.merge_reported(&reported(json!({"engine": "postgres", "tier": "small"})));
        assert!(changed.is_empty());
    }

    #[test]
    fn null_clears_values() {
        let mut state = RecordState::new(
            Category::Domains,
            ProviderKind::Adapter,
            ResourceState::Provisioned,
        );
        state.merge_reported(&reported(json!({"registrar": "gandi", "dnssec": true})));
        let changed = state.merge_reported(&reported(json!({"registrar": null, "dnssec": null})));

        assert_eq!(changed, ["dnssec", "registrar"]);
        assert_eq!(state.fields.get("registrar"), Some(&None));
        assert!(state.extra.is_empty());
    }

    #[test]
    fn non_string_known_values_are_stringified() {
        let mut state = RecordState::new(
            Category::Databases,
            ProviderKind::Native,
            ResourceState::Provisioning,
        );
        state.merge_reported(&reported(json!({"version": 16})));
        assert_eq!(state.fields.get("version"), Some(&Some("16".to_string())));
    }

    #[test]
    fn reported_flattens_fields_and_extra() {
        let mut state = RecordState::new(
            Category::Databases,
            ProviderKind::Adapter,
            ResourceState::Provisioned,
        );
        state.merge_reported(&reported(json!({"engine": "postgres", "plan": "hobby"})));

        let flat = state.reported();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat["engine"], "postgres");
        assert_eq!(flat["plan"], "hobby");
        assert!(!flat.contains_key("region"));
    }

    #[test]
    fn category_fields_serialize_with_kind_tag() {
        let fields = CategoryFields::empty(Category::WebServices);
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json, json!({"kind": "web-service"}));
        assert_eq!(fields.category(), Category::WebServices);
    }

    #[test]
    fn record_merge_tracks_bookkeeping_changes() {
        let mut record = StateRecord {
            resource_id: "server-dry-run-1".to_string(),
            resource_type: "server".to_string(),
            provider: "dry-run".to_string(),
            provider_resource_id: "server-dry-run-1".to_string(),
            category: Category::Servers,
            state: RecordState::new(
                Category::Servers,
                ProviderKind::Native,
                ResourceState::Provisioning,
            ),
            last_updated: 1,
        };

        let mut update = StateUpdate::new("server-dry-run-1")
            .with_status(ResourceState::Provisioned)
            .with_reported(reported(json!({"region": "fra1"})));
        update.vendor_resource_id = Some("vm-42".to_string());
        update.last_provisioned_at = Some(10);

        let changed = record.merge(&update);
        assert_eq!(changed, ["status", "vendor_resource_id", "region"]);
        assert_eq!(record.state.status, ResourceState::Provisioned);
        assert_eq!(record.state.last_provisioned_at, Some(10));
        assert_eq!(record.last_updated, 1);
    }
}
