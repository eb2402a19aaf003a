//! Record store — the organization-scoped persistence collaborator.
//!
//! `RecordStore` is the seam the engine persists through; any document or
//! key-value database can sit behind it. `RedbRecordStore` is the bundled
//! implementation: one redb table per category, JSON values, on-disk or
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dockyard_core::Category;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{record_key, table_for};
use crate::types::*;

/// Persistence operations the state store adapter needs, per category table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find the record whose `provider_resource_id` matches, if any.
    async fn query_by_provider_resource_id(
        &self,
        organization_id: &str,
        category: Category,
        provider_resource_id: &str,
    ) -> StateResult<Option<StoredRecord>>;

    /// Insert a new record. Fails with `Conflict` if the
    /// `(provider_resource_id, category)` key is taken.
    async fn insert(
        &self,
        organization_id: &str,
        category: Category,
        record: &StateRecord,
    ) -> StateResult<RecordId>;

    /// Apply a field-level patch to an existing record.
    async fn patch(
        &self,
        organization_id: &str,
        category: Category,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> StateResult<()>;

    /// Remove a record. Returns true if it existed.
    async fn delete(
        &self,
        organization_id: &str,
        category: Category,
        id: &RecordId,
    ) -> StateResult<bool>;
}

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe record store backed by redb.
#[derive(Clone)]
pub struct RedbRecordStore {
    db: Arc<Database>,
}

impl RedbRecordStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "record store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory record store opened");
        Ok(store)
    }

    /// Create all category tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for category in Category::ALL {
            txn.open_table(table_for(category)).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn read(&self, category: Category, key: &str) -> StateResult<Option<StateRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_for(category)).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: StateRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn write(&self, category: Category, key: &str, record: &StateRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table_for(category)).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Record ids are the table keys; reject ids from another organization.
    fn owned_key<'a>(organization_id: &str, id: &'a RecordId) -> Option<&'a str> {
        let prefix = format!("{organization_id}/");
        id.starts_with(&prefix).then_some(id.as_str())
    }
}

#[async_trait]
impl RecordStore for RedbRecordStore {
    async fn query_by_provider_resource_id(
        &self,
        organization_id: &str,
        category: Category,
        provider_resource_id: &str,
    ) -> StateResult<Option<StoredRecord>> {
        let key = record_key(organization_id, provider_resource_id);
        Ok(self
            .read(category, &key)?
            .map(|record| StoredRecord { id: key, record }))
    }

    async fn insert(
        &self,
        organization_id: &str,
        category: Category,
        record: &StateRecord,
    ) -> StateResult<RecordId> {
        let key = record_key(organization_id, &record.provider_resource_id);
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table_for(category)).map_err(map_err!(Table))?;
            // Check and insert inside one write transaction.
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::Conflict {
                    provider_resource_id: record.provider_resource_id.clone(),
                    category,
                });
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, %category, "state record inserted");
        Ok(key)
    }

    async fn patch(
        &self,
        organization_id: &str,
        category: Category,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> StateResult<()> {
        let key = Self::owned_key(organization_id, id)
            .ok_or_else(|| StateError::NotFound(id.clone()))?;
        let mut record = self
            .read(category, key)?
            .ok_or_else(|| StateError::NotFound(id.clone()))?;
        patch.apply(&mut record);
        self.write(category, key, &record)?;
        debug!(%key, %category, "state record patched");
        Ok(())
    }

    async fn delete(
        &self,
        organization_id: &str,
        category: Category,
        id: &RecordId,
    ) -> StateResult<bool> {
        let Some(key) = Self::owned_key(organization_id, id) else {
            return Ok(false);
        };
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table_for(category)).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, %category, existed, "state record deleted");
        Ok(existed)
    }
}
