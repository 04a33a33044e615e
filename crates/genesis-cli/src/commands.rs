use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use genesis_agent::{Agent, AgentConfig};
use genesis_config::Config;
use genesis_domain::{EntityId, EntityKind};
use genesis_driver::{CertificateDriver, DriverRegistry, DummyComputeDriver, PasswordDriver};
use genesis_events::{Dispatcher, EventBus};
use genesis_iam::IamKernel;
use genesis_reconciler::ReconcileWorker;
use genesis_scheduler::{AgentHandle, AgentId, CapabilityLabel, Scheduler};
use genesis_store::{InMemoryResourceStore, RedbResourceStore, ResourceStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs one tick's future to completion, catching a panic at the loop
/// boundary instead of letting it take the whole worker task down, so a
/// single bad tick doesn't permanently stop reconciliation or dispatch.
async fn catch_tick_panic<T>(fut: impl std::future::Future<Output = T>) -> Option<T> {
    match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!("worker tick panicked, continuing after short delay");
            None
        }
    }
}

fn load_config(config_file: &Path) -> Result<Config> {
    genesis_config::load(config_file)
        .with_context(|| format!("failed to load config from {}", config_file.display()))
}

fn open_store(config: &Config) -> Result<Arc<dyn ResourceStore>> {
    if let Some(path) = config.db.connection_url.strip_prefix("redb://") {
        let store = RedbResourceStore::open(Path::new(path))
            .with_context(|| format!("failed to open redb store at {path}"))?;
        Ok(Arc::new(store))
    } else {
        info!(url = %config.db.connection_url, "no redb:// scheme recognised, using an in-memory store");
        Ok(Arc::new(InMemoryResourceStore::new()))
    }
}

fn build_registry(config: &Config) -> Arc<DriverRegistry> {
    let mut registry = DriverRegistry::new();
    for name in &config.universal_agent.caps_drivers {
        match name.as_str() {
            "dummy_compute" => registry.register(Arc::new(DummyComputeDriver::new())),
            "password" => registry.register(Arc::new(PasswordDriver::new())),
            "certificate" => registry.register(Arc::new(CertificateDriver::new())),
            other => {
                tracing::warn!(driver = other, "unknown capability driver in config, skipping");
                &mut registry
            }
        };
    }
    Arc::new(registry)
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub async fn run_orchestrator(config_file: PathBuf) -> Result<()> {
    let config = load_config(&config_file)?;
    let store = open_store(&config)?;
    let bootstrap_admin_id = EntityId::parse(&config.iam.bootstrap_admin_user_id)
        .context("iam.bootstrap_admin_user_id must be a valid UUID")?;
    let iam = Arc::new(IamKernel::new(store.clone(), bootstrap_admin_id, config.iam.memoization_ttl_ms));

    let scheduler = Arc::new(Scheduler::new(Duration::from_secs(config.universal_agent_scheduler.staleness_bound_secs)));
    // A single local agent registers under every advertised capability label
    // so the in-process illustrative deployment has somewhere to place work.
    scheduler.register(AgentHandle {
        id: AgentId("agent-local".to_string()),
        capability_labels: config.universal_agent_scheduler.capabilities.iter().map(|c| CapabilityLabel(c.clone())).collect(),
        last_heartbeat: chrono::Utc::now(),
        outstanding_load: 0,
    });

    let bus = EventBus::new();
    let dispatcher = Dispatcher::new(store.clone(), bus, config.events.max_attempts);

    let cancellation = CancellationToken::new();

    let mut workers = Vec::new();
    for kind in reconciled_kinds() {
        let worker = ReconcileWorker::new(kind, store.clone(), scheduler.clone(), Duration::from_secs(30), 5);
        let token = cancellation.clone();
        workers.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    result = catch_tick_panic(worker.run_once(50)) => {
                        match result {
                            Some(Ok(report)) if !report.changes.is_empty() || !report.errors.is_empty() => {
                                info!(kind = ?kind, changes = report.changes.len(), errors = report.errors.len(), "reconcile tick");
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => tracing::error!(kind = ?kind, error = %err, "reconcile tick failed"),
                            None => {}
                        }
                    }
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(2)) => {}
                }
            }
        }));
    }

    let dispatcher_token = cancellation.clone();
    workers.push(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = dispatcher_token.cancelled() => break,
                result = catch_tick_panic(dispatcher.drain_once(100)) => {
                    if let Some(Err(err)) = result {
                        tracing::error!(error = %err, "event dispatch tick failed");
                    }
                }
            }
            tokio::select! {
                _ = dispatcher_token.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
    }));

    let registry = build_registry(&config);
    // Single static token mapped to the bootstrap admin for this illustrative
    // deployment — real callers are provisioned their own token/subject pair
    // by whatever issues credentials in front of this surface.
    let mut auth_tokens = std::collections::HashMap::new();
    auth_tokens.insert("orchestrator-local-token".to_string(), bootstrap_admin_id);
    let app = genesis_api::build_app(store, registry, iam, Arc::new(auth_tokens));
    let addr = "127.0.0.1:8080";
    info!(addr, "orchestrator HTTP surface listening");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;

    tokio::select! {
        result = axum::serve(listener, app) => { result.context("HTTP server error")?; }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    cancellation.cancel();
    for worker in workers {
        let _ = worker.await;
    }
    Ok(())
}

fn reconciled_kinds() -> Vec<EntityKind> {
    [
        EntityKind::Node,
        EntityKind::MachinePool,
        EntityKind::Network,
        EntityKind::Subnet,
        EntityKind::Interface,
        EntityKind::Service,
        EntityKind::ServiceNode,
        EntityKind::LoadBalancer,
        EntityKind::Vhost,
        EntityKind::Route,
        EntityKind::BackendPool,
        EntityKind::Password,
        EntityKind::Certificate,
    ]
    .to_vec()
}

// ── Agent ─────────────────────────────────────────────────────────────────────

pub async fn run_agent(config_file: PathBuf, agent_id: String) -> Result<()> {
    let config = load_config(&config_file)?;
    let store = open_store(&config)?;
    let registry = build_registry(&config);
    let agent_config = AgentConfig::from_config(&config, agent_id, "genesis-agent".to_string());

    let agent = Agent::new(agent_config, store, registry);
    let cancellation = CancellationToken::new();
    let run_token = cancellation.clone();

    tokio::select! {
        _ = agent.run(run_token) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            cancellation.cancel();
        }
    }
    Ok(())
}
