use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use ftwallet::config::{AppConfig, Role};
use ftwallet::engine::WalletEngine;
use ftwallet::failover::{FailoverState, spawn_health_monitor};
use ftwallet::gateway::{self, AppState};
use ftwallet::logging;
use ftwallet::primary::PrimaryService;
use ftwallet::replication::{ReplicationClient, ReplicationServer};

#[tokio::main]
async fn main() -> Result<()> {
    let role: Role = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "primary".to_string())
        .parse()?;

    let env_name = std::env::var("FTWALLET_ENV").unwrap_or_else(|_| "default".to_string());
    let config = AppConfig::load(&env_name)?;
    let _log_guard = logging::init_logging(&config.log);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        role = role.as_str(),
        "ftwallet starting"
    );

    match role {
        Role::Primary => run_primary(config).await,
        Role::Backup => run_backup(config).await,
    }
}

fn open_engine(config: &AppConfig, role: Role) -> Result<Arc<Mutex<WalletEngine>>> {
    let data_dir = config.state_dir(role);
    let mut engine =
        WalletEngine::open_with_snapshot_interval(&data_dir, config.storage.snapshot_interval_ops)
            .with_context(|| format!("open wallet engine at {}", data_dir.display()))?;
    engine.recover().context("recover wallet engine")?;
    Ok(Arc::new(Mutex::new(engine)))
}

async fn run_backup(config: AppConfig) -> Result<()> {
    let engine = open_engine(&config, Role::Backup)?;

    let rpc_addr = config.rpc_bind_addr(Role::Backup);
    let listener = TcpListener::bind(&rpc_addr)
        .await
        .with_context(|| format!("bind replication server on {}", rpc_addr))?;

    ReplicationServer::new(engine)
        .run(listener)
        .await
        .context("replication server failed")?;
    Ok(())
}

async fn run_primary(config: AppConfig) -> Result<()> {
    let engine = open_engine(&config, Role::Primary)?;

    // RPC endpoint on the primary too, for future failover ingress
    let rpc_addr = config.rpc_bind_addr(Role::Primary);
    let rpc_listener = TcpListener::bind(&rpc_addr)
        .await
        .with_context(|| format!("bind replication server on {}", rpc_addr))?;
    tokio::spawn(ReplicationServer::new(engine.clone()).run(rpc_listener));

    let failover = Arc::new(FailoverState::new());
    let monitor_client = ReplicationClient::new(
        config.backup_rpc_addr(),
        config.replicate_timeout(),
        config.ping_timeout(),
    );
    spawn_health_monitor(failover.clone(), monitor_client, config.health_interval());

    let backup_client = ReplicationClient::new(
        config.backup_rpc_addr(),
        config.replicate_timeout(),
        config.ping_timeout(),
    );
    let primary = Arc::new(PrimaryService::new(engine, backup_client, failover));

    let state = AppState::new(primary);
    state.mark_ready();

    let http_addr = config.http_bind_addr();
    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("bind HTTP gateway on {}", http_addr))?;

    gateway::run_server(listener, state)
        .await
        .context("HTTP gateway failed")?;
    Ok(())
}
