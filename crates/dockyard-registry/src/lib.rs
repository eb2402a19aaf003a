//! dockyard-registry — tracking of provisioned resources.
//!
//! The `ResourceRegistry` owns every `ProvisionedResource` from creation
//! until its state is mapped into the state store, after which it acts as
//! a cache in front of the store.
//!
//! # Architecture
//!
//! ```text
//! ResourceRegistry
//!   ├── slots: (organization_id, resource_id) → ProvisionedResource (RwLock)
//!   └── IdGenerator (type-provider-timestamp, unique per process)
//!
//! IdLocks
//!   └── resource_id → Mutex (single writer per id, no global lock)
//! ```

pub mod error;
pub mod locks;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use locks::IdLocks;
pub use registry::ResourceRegistry;
