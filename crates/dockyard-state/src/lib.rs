//! dockyard-state — persisted, reconciled state of provisioned resources.
//!
//! Records live in one of four category partitions (servers, web services,
//! domains, databases). The crate has three layers:
//!
//! - [`RecordStore`] — the organization-scoped persistence collaborator
//!   (query / insert / patch / delete per category table). [`RedbRecordStore`]
//!   implements it on [redb](https://docs.rs/redb), on disk or in memory.
//! - [`CategoryMap`] — static lookup from resource type strings to categories.
//! - [`StateStoreAdapter`] — the mapping layer the engine talks to
//!   (get / save / delete state, initial writes).
//!
//! Values are JSON-serialized into redb `&[u8]` columns under
//! `{organization_id}/{provider_resource_id}` keys.

pub mod adapter;
pub mod category;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use adapter::{SavedState, StateStoreAdapter};
pub use category::CategoryMap;
pub use error::{StateError, StateResult};
pub use store::{RecordStore, RedbRecordStore};
pub use types::*;
