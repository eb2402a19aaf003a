//! redb table definitions for the Dockyard state store.
//!
//! One table per category. Keys are `{organization_id}/{provider_resource_id}`,
//! values are JSON-serialized `StateRecord`s.

use dockyard_core::Category;
use redb::TableDefinition;

pub const SERVERS: TableDefinition<&str, &[u8]> = TableDefinition::new("servers");

pub const WEB_SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("web_services");

pub const DOMAINS: TableDefinition<&str, &[u8]> = TableDefinition::new("domains");

pub const DATABASES: TableDefinition<&str, &[u8]> = TableDefinition::new("databases");

/// Table backing the given category.
pub fn table_for(category: Category) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match category {
        Category::Servers => SERVERS,
        Category::WebServices => WEB_SERVICES,
        Category::Domains => DOMAINS,
        Category::Databases => DATABASES,
    }
}

/// Composite key for a record within an organization.
pub fn record_key(organization_id: &str, provider_resource_id: &str) -> String {
    format!("{organization_id}/{provider_resource_id}")
}
