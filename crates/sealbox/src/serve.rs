// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sealbox serve` command implementation.
//!
//! Wires the full node: SQLite storage, identity directory, the
//! challenge/response handshake, delivery engine with live push,
//! change-log replication, optional seal tracking, the scheduled
//! maintenance jobs, and the HTTP/WebSocket gateway. Supports graceful
//! shutdown via ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sealbox_auth::{AuthProtocol, LocalCredentialIssuer};
use sealbox_bus::EventBus;
use sealbox_config::SealboxConfig;
use sealbox_core::{PluginAdapter, SealboxError, StorageAdapter};
use sealbox_delivery::{DeliveryEngine, LivePushRegistry};
use sealbox_gateway::GatewayState;
use sealbox_identity::IdentityDirectory;
use sealbox_jobs::{Job, JobRunner, Scheduler, TimeBudget};
use sealbox_replicator::Replicator;
use sealbox_seals::{HttpLedger, SealTracker};
use sealbox_storage::SqliteStorage;
use sealbox_storage::queries::sessions;

/// Runs the `sealbox serve` command.
pub async fn run_serve(config: SealboxConfig) -> Result<(), SealboxError> {
    init_tracing(&config.node.log_level);

    info!(node = %config.node.name, "starting sealbox serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    let db = storage.database()?.clone();

    // Crash recovery: sessions left connected by a previous process are
    // stale until the client reconnects.
    let stale = sessions::mark_all_disconnected(&db).await?;
    if stale > 0 {
        info!(count = stale, "marked stale sessions as disconnected");
    }

    let directory = IdentityDirectory::new(db.clone());
    let issuer = Arc::new(LocalCredentialIssuer::new(config.auth.clone()));
    let auth = AuthProtocol::new(
        db.clone(),
        directory.clone(),
        issuer.clone(),
        config.auth.clone(),
    );
    let push = Arc::new(LivePushRegistry::new());
    let delivery = DeliveryEngine::new(
        db.clone(),
        directory.clone(),
        push.clone(),
        config.delivery.clone(),
    )?;
    let bus = EventBus::new();
    let replicator = Replicator::new(db.clone(), bus.clone());

    let seals = match config.seal.ledger_url.as_deref() {
        Some(url) => {
            let ledger = Arc::new(HttpLedger::new(url, &config.seal)?);
            info!(url, "seal tracking enabled");
            Some(SealTracker::new(db.clone(), ledger, config.seal.clone()))
        }
        None => {
            info!("no ledger configured, seal tracking disabled");
            None
        }
    };

    let runner = JobRunner::new(db.clone(), delivery.clone(), replicator, seals);

    // Warmup before the trigger loops start.
    let warmup_budget = TimeBudget::new(
        Duration::from_secs(60),
        Duration::from_secs(config.jobs.safety_margin_secs),
    );
    runner.run(Job::Warmup, &warmup_budget).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                cancel.cancel();
            }
        });
    }

    let scheduler = Scheduler::new(runner, config.jobs.clone());
    let job_handles = scheduler.spawn(cancel.clone());

    let adapters: Arc<Vec<Arc<dyn PluginAdapter>>> =
        Arc::new(vec![storage.clone(), push.clone(), issuer]);
    let state = GatewayState {
        db: db.clone(),
        directory,
        auth,
        delivery,
        push,
        adapters,
    };
    tokio::select! {
        result = sealbox_gateway::start_server(&config.gateway, state) => {
            if let Err(ref e) = result {
                error!(error = %e, "gateway exited");
            }
            cancel.cancel();
            result?;
        }
        _ = cancel.cancelled() => {}
    }

    for handle in job_handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "job loop panicked");
        }
    }
    storage.shutdown().await?;

    info!("sealbox serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sealbox={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
