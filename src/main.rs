mod cli;

use batchflow::audit::{AuditStore, HttpAuditStore, MemoryAuditStore, SqliteAuditStore};
use batchflow::config::{self, AuditBackend, Config};
use batchflow::context::RuntimeContext;
use batchflow::dispatch::Dispatcher;
use batchflow::queue::{HttpJobQueue, JobQueue, MemoryJobQueue};
use batchflow::stages::{StageOutcome, StageStatus};
use batchflow_common::Stage;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "batchflow=trace,batchflow_store=debug,batchflow_common=debug".to_string()
        } else {
            "batchflow=info,batchflow_store=info".to_string()
        }
    });

    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        None => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(run_stage(cli.config.as_deref(), cli.dry_run))
        }
        Some(Commands::Describe) => describe(),
        Some(Commands::Validate {
            config: config_path,
        }) => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Some(Commands::Version) => {
            println!("batchflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_stage(config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let ctx = RuntimeContext::from_env().context("Invalid runtime environment")?;
    tracing::info!("Job request details: {}", ctx.describe());

    let outcome = if dry_run {
        let queue = Arc::new(MemoryJobQueue::new());
        let store = Arc::new(MemoryAuditStore::new());
        let dispatcher = Dispatcher::new(config.clone(), queue.clone(), store.clone());
        let outcome = dispatcher.dispatch(&ctx).await?;

        for (job_id, request) in queue.accepted() {
            println!("[DRY RUN] Would submit {} (as {})", request.job_name, job_id);
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        for record in store.records() {
            println!(
                "[DRY RUN] Would record {} at {}/{}",
                record.event.kind(),
                record.partition_key,
                record.sort_key
            );
        }
        outcome
    } else {
        let backend = config::audit_backend(&config.audit, &ctx.audit_store_ref)?;
        let queue = job_queue(&config, ctx.stage)?;
        let store = audit_store(&config, backend, &ctx.audit_store_ref)?;
        Dispatcher::new(config.clone(), queue, store)
            .dispatch(&ctx)
            .await?
    };

    finish(&outcome, config.audit.strict)
}

/// Only the plan stage submits jobs, so the other stages run without a
/// configured queue endpoint.
fn job_queue(config: &Config, stage: Stage) -> Result<Arc<dyn JobQueue>> {
    match stage {
        Stage::Plan => {
            let queue = HttpJobQueue::new(&config.queue)
                .context("The plan stage needs a job queue endpoint")?;
            Ok(Arc::new(queue))
        }
        Stage::Render | Stage::Encode => Ok(Arc::new(MemoryJobQueue::new())),
    }
}

fn audit_store(
    config: &Config,
    backend: AuditBackend,
    table: &str,
) -> Result<Arc<dyn AuditStore>> {
    let store: Arc<dyn AuditStore> = match backend {
        AuditBackend::Sqlite => match SqliteAuditStore::open(table) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!("Cannot open audit database {}: {}", table, e);
                Arc::new(MemoryAuditStore::unavailable(e.to_string()))
            }
        },
        AuditBackend::Http => {
            let store = HttpAuditStore::new(&config.audit, table)
                .context("The http audit backend needs audit.endpoint")?;
            Arc::new(store)
        }
        AuditBackend::Memory => Arc::new(MemoryAuditStore::new()),
    };
    tracing::debug!("Audit backend: {} ({})", backend, table);
    Ok(store)
}

/// `(not set)` when the config leaves the backend unchosen.
fn backend_label(backend: Option<AuditBackend>) -> String {
    backend.map_or_else(|| "(not set)".to_string(), |b| b.to_string())
}

fn finish(outcome: &StageOutcome, strict: bool) -> Result<()> {
    if outcome.status() == StageStatus::CompletedWithAuditGaps {
        for failure in &outcome.audit_failures {
            tracing::warn!("Missing audit record: {}", failure);
        }
        if strict {
            anyhow::bail!(
                "{} stage completed but {} audit record(s) could not be written",
                outcome.stage,
                outcome.audit_failures.len()
            );
        }
    }
    Ok(())
}

fn describe() -> Result<()> {
    let ctx = RuntimeContext::from_env().context("Invalid runtime environment")?;
    println!("{}", ctx.describe());
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!(
                "  Queue endpoint: {}",
                config.queue.endpoint.as_deref().unwrap_or("(not set)")
            );
            println!("  Audit backend: {}", backend_label(config.audit.backend));
            println!("  Audit strict: {}", config.audit.strict);
            for (name, target) in [
                ("render", &config.stages.render),
                ("encode", &config.stages.encode),
            ] {
                let target = config.stages.defaults.merge(target);
                println!(
                    "  Stage {}: queue={} definition={}",
                    name,
                    target.queue.as_deref().unwrap_or("(from environment)"),
                    target.definition.as_deref().unwrap_or("(from environment)")
                );
            }
            println!("  Render numbering: {:?}", config.render.numbering);
            println!("  Encode artifact: {}", config.encode.artifact_name);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Audit backend: {}", backend_label(config.audit.backend));
        }
    }

    Ok(())
}
