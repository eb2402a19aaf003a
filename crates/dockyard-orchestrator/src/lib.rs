//! dockyard-orchestrator — dependency-aware deployment of resource sets.
//!
//! A deployment is a list of resources with `depends_on` edges. The
//! orchestrator turns it into an immutable [`Plan`] (cycle-checked,
//! topologically ordered) and then drives a [`ResourceExecutor`] hook over
//! the plan, fail-fast and without compensation.
//!
//! # Components
//!
//! - **`plan`** — `create_plan`, `Plan`, `DependencyGraph`
//! - **`executor`** — sequential `execute_plan`, tiered `execute_plan_parallel`

pub mod error;
pub mod executor;
pub mod plan;

pub use error::{OrchestratorError, OrchestratorResult};
pub use executor::{
    ExecutionReport, PlanRunner, ResourceExecutor, execute_plan, execute_plan_parallel,
};
pub use plan::{DependencyGraph, DeploymentResource, Plan, create_plan};
