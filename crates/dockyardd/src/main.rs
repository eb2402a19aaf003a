//! dockyardd — drive the Dockyard provisioning engine from the command line.
//!
//! Assembles the engine from `dockyard.toml`:
//! - State store (redb)
//! - Provider catalog + backends (dry-run)
//! - Dock adapter API
//!
//! # Usage
//!
//! ```text
//! dockyardd check-config --config dockyard.toml
//! dockyardd plan --manifest deploy.toml
//! dockyardd apply --config dockyard.toml --manifest deploy.toml --data-dir ./.dockyard
//! dockyardd state --config dockyard.toml --data-dir ./.dockyard server-dry-run-1712345678901
//! ```

mod manifest;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dockyard_api::DockAdapterApi;
use dockyard_core::{CallerContext, DockyardConfig, Permission, ProviderKind};
use dockyard_orchestrator::create_plan;
use dockyard_providers::{BackendRegistry, DryRunBackend};
use dockyard_state::{RecordStore, RedbRecordStore};

use crate::manifest::Manifest;

#[derive(Parser)]
#[command(name = "dockyardd", about = "Dockyard provisioning engine")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a config file: provider entries and category mappings.
    CheckConfig {
        #[arg(long, default_value = "dockyard.toml")]
        config: PathBuf,
    },

    /// Compute and print the execution plan for a manifest.
    Plan {
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Provision every resource in a manifest, in dependency order.
    Apply {
        #[arg(long, default_value = "dockyard.toml")]
        config: PathBuf,

        #[arg(long)]
        manifest: PathBuf,

        /// Directory holding the state database.
        #[arg(long, default_value = ".dockyard")]
        data_dir: PathBuf,

        #[arg(long, default_value = "default")]
        org: String,

        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Print the stored state of a resource.
    State {
        #[arg(long, default_value = "dockyard.toml")]
        config: PathBuf,

        #[arg(long, default_value = ".dockyard")]
        data_dir: PathBuf,

        #[arg(long, default_value = "default")]
        org: String,

        resource_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::CheckConfig { config } => check_config(&config).await,
        Command::Plan { manifest } => plan(&manifest),
        Command::Apply {
            config,
            manifest,
            data_dir,
            org,
            user,
        } => apply(&config, &manifest, &data_dir, &org, &user).await,
        Command::State {
            config,
            data_dir,
            org,
            resource_id,
        } => state(&config, &data_dir, &org, &resource_id).await,
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dockyard=debug"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<DockyardConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(DockyardConfig::default());
    }
    DockyardConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

/// A dry-run backend for every configured provider.
async fn dry_run_backends(config: &DockyardConfig) -> BackendRegistry {
    let backends = BackendRegistry::new();
    for provider in &config.providers {
        let backend = Arc::new(DryRunBackend::new());
        match provider.kind {
            ProviderKind::Native => backends.register_native(&provider.name, backend).await,
            ProviderKind::Adapter => backends.register_adapter(&provider.name, backend).await,
        }
    }
    backends
}

async fn open_engine(config: &DockyardConfig, data_dir: &Path) -> anyhow::Result<DockAdapterApi> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("dockyard.redb");
    let store: Arc<dyn RecordStore> = Arc::new(RedbRecordStore::open(&db_path)?);
    info!(path = %db_path.display(), "state store opened");

    let backends = dry_run_backends(config).await;
    Ok(DockAdapterApi::bootstrap(config, store, backends).await?)
}

async fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let store: Arc<dyn RecordStore> = Arc::new(RedbRecordStore::open_in_memory()?);
    let backends = dry_run_backends(&config).await;
    DockAdapterApi::bootstrap(&config, store, backends).await?;

    println!(
        "config ok: {} provider(s), {} resource type(s), reconcile policy {:?}, {:?} execution",
        config.providers.len(),
        config.declared_resource_types().len(),
        config.engine.reconcile_policy,
        config.engine.execution,
    );
    Ok(())
}

fn plan(manifest_path: &Path) -> anyhow::Result<()> {
    let manifest = Manifest::from_file(manifest_path)?;
    let plan = create_plan(manifest.resources)?;

    for (i, tier) in plan.tiers().iter().enumerate() {
        println!("tier {i}: {}", tier.join(", "));
    }
    println!("order: {}", plan.order().join(" -> "));
    Ok(())
}

async fn apply(
    config_path: &Path,
    manifest_path: &Path,
    data_dir: &Path,
    org: &str,
    user: &str,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let manifest = Manifest::from_file(manifest_path)?;
    let engine = open_engine(&config, data_dir).await?;
    let ctx = CallerContext::new(org, user, Permission::Full);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current resource");
            on_signal.cancel();
        }
    });

    let outcome = engine.deploy(&ctx, manifest.resources, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn state(config_path: &Path, data_dir: &Path, org: &str, resource_id: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = open_engine(&config, data_dir).await?;
    let ctx = CallerContext::new(org, "cli", Permission::Read);

    match engine.get_resource_state(&ctx, resource_id).await? {
        Some(mapping) => println!("{}", serde_json::to_string_pretty(&mapping)?),
        None => anyhow::bail!("no stored state for {resource_id}"),
    }
    Ok(())
}
