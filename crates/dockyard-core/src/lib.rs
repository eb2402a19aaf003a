pub mod config;
pub mod context;
pub mod types;

pub use config::{DockyardConfig, EngineConfig, ExecutionMode, ProviderConfig, ReconcilePolicy};
pub use context::{CallerContext, Permission};
pub use types::*;
