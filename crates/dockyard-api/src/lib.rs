//! dockyard-api — the dock adapter API facade.
//!
//! Composes the provider catalog, resource registry, state store adapter,
//! and deployment orchestrator into the operations callers use:
//! provision, update, delete, get-state, sync-state, and deploy.
//!
//! # Flow
//!
//! ```text
//! caller ─► DockAdapterApi ─► select_provider ─► ResourceRegistry
//!                 │                                   │
//!                 │                                   ▼
//!                 │                          StateStoreAdapter (initial write)
//!                 ▼
//!        ProvisioningBackend (native or dock adapter)
//!                 │
//!                 ▼
//!        StateStoreAdapter (merge report) ─► ResourceRegistry (cache)
//! ```

pub mod deploy;
pub mod dock;
pub mod error;
pub mod reconcile;

pub use deploy::{DeploymentOutcome, ProvisioningExecutor};
pub use dock::DockAdapterApi;
pub use error::{DockError, DockResult, ErrorKind};
pub use reconcile::SyncReport;
