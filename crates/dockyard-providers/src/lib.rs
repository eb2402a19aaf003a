//! dockyard-providers — where provisioning requests are sent.
//!
//! A resource is provisioned either by a native backend built into the
//! engine or by a per-vendor dock adapter. This crate holds the catalog of
//! both and the deterministic rule for choosing between them.
//!
//! # Components
//!
//! - **`registry`** — `ProviderRegistry`, the priority-ordered provider catalog
//! - **`selector`** — `select_provider`, native-first selection per (type, vendor)
//! - **`backend`** — `ProvisioningBackend` call surface and `BackendRegistry`
//! - **`dry_run`** — `DryRunBackend`, a side-effect-free backend

pub mod backend;
pub mod dry_run;
pub mod error;
pub mod registry;
pub mod selector;
pub mod types;

pub use backend::{BackendRegistry, ProviderReport, ProvisionRequest, ProvisioningBackend, ReportedStatus};
pub use dry_run::DryRunBackend;
pub use error::{ProviderError, ProviderResult};
pub use registry::ProviderRegistry;
pub use selector::select_provider;
pub use types::{Provider, Selection};
