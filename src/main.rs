//! Wallet Session Monitor
//!
//! Watches a running wallet engine and keeps its session state current:
//! - Base node connectivity and sync state, with automatic rotation
//!   to another base node when the current one fails
//! - Staged security prompts as the wallet balance grows
//! - A REST API for the connection state, base node lists and security settings

mod api;
mod base_node;
mod config;
mod db;
mod engine;
mod models;
mod monitor;
mod security;
mod session;

use api::ApiState;
use base_node::{parse_base_node_list, BaseNodeRegistry};
use config::Config;
use db::Database;
use engine::{tari::TariWalletRpc, WalletEngine};
use monitor::EngineMonitor;
use security::StagedSecurityPolicy;
use session::WalletSession;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line args
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/opt/wallet-monitor/config.toml".to_string());

    // Load configuration
    let config = Config::load_with_env(&config_path)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting Wallet Session Monitor");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    info!("Database initialized at {:?}", config.database.path);

    let seed_nodes = parse_base_node_list(&config.seed_list()?);
    info!(count = seed_nodes.len(), network = %config.base_nodes.network, "Loaded seed base nodes");

    let engine: Arc<dyn WalletEngine> = Arc::new(TariWalletRpc::new(
        &config.engine.wallet_rpc_url,
        config.engine.rpc_timeout_secs,
    )?);

    let registry = BaseNodeRegistry::new(db.clone(), seed_nodes);
    let policy = StagedSecurityPolicy::new(db.clone(), config.security.cold_wallet_stage_enabled);
    let session = Arc::new(WalletSession::new(
        &config.base_nodes.network,
        engine.clone(),
        registry,
        policy,
    ));
    info!(session = %session.id(), "Wallet session created");

    if let Err(e) = session.sync_base_node().await {
        error!(session = %session.id(), error = %e, "Initial base node sync failed");
    }

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut handles = vec![];

    // Engine monitor
    let monitor_shutdown = shutdown_tx.subscribe();
    let poll_interval = config.service.poll_interval_secs;
    let monitor_session = session.clone();
    handles.push(tokio::spawn(async move {
        run_monitor_loop(monitor_session, engine, poll_interval, monitor_shutdown).await;
    }));

    // Connection state logging
    let state_shutdown = shutdown_tx.subscribe();
    let state_session = session.clone();
    handles.push(tokio::spawn(async move {
        run_state_logger(state_session, state_shutdown).await;
    }));

    // Security prompts
    let prompt_shutdown = shutdown_tx.subscribe();
    let prompt_session = session.clone();
    handles.push(tokio::spawn(async move {
        run_prompt_logger(prompt_session, prompt_shutdown).await;
    }));

    // Start API server
    if config.api.enabled {
        let api_state = ApiState {
            session: session.clone(),
            api_token: config.api.token.clone(),
        };
        let api_router = api::create_router(api_state);
        let api_addr: SocketAddr =
            format!("{}:{}", config.api.listen, config.api.port).parse()?;
        let listener = tokio::net::TcpListener::bind(api_addr).await?;

        let api_shutdown = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            info!("API server listening on {}", api_addr);

            if let Err(e) = axum::serve(listener, api_router)
                .with_graceful_shutdown(shutdown_signal(api_shutdown))
                .await
            {
                error!("API server error: {}", e);
            }
        }));
    }

    info!("Wallet session monitor ready");

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    // Send shutdown signal
    let _ = shutdown_tx.send(());

    // Wait for all tasks to complete
    for handle in handles {
        let _ = handle.await;
    }

    info!("Wallet session monitor shut down");
    Ok(())
}

/// Poll the engine and feed events to the session
async fn run_monitor_loop(
    session: Arc<WalletSession>,
    engine: Arc<dyn WalletEngine>,
    interval_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut monitor = EngineMonitor::new(engine);
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let count = monitor.run_cycle(&session).await;
                if count > 0 {
                    debug!(session = %session.id(), events = count, "Monitor cycle complete");
                }
            }
            _ = shutdown.recv() => {
                info!("Monitor loop shutting down");
                break;
            }
        }
    }
}

/// Log base node state transitions and the first time the wallet comes online
async fn run_state_logger(session: Arc<WalletSession>, mut shutdown: broadcast::Receiver<()>) {
    let connectivity = session.connectivity();
    let mut state = connectivity.subscribe_state();
    let mut sync_state = connectivity.subscribe_sync_state();

    let first_online = connectivity.await_online(|| {
        info!(session = %session.id(), "Wallet reached its base node");
    });
    tokio::pin!(first_online);
    let mut waiting_online = true;

    loop {
        tokio::select! {
            result = &mut first_online, if waiting_online => {
                waiting_online = false;
                if let Err(e) = result {
                    warn!(session = %session.id(), error = %e, "Stopped waiting for base node");
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *state.borrow_and_update();
                debug!(session = %session.id(), state = %value, "Base node state changed");
            }
            changed = sync_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *sync_state.borrow_and_update();
                debug!(session = %session.id(), sync_state = %value, "Base node sync state changed");
            }
            _ = shutdown.recv() => {
                break;
            }
        }
    }
}

/// Log security prompts as the session publishes them
async fn run_prompt_logger(session: Arc<WalletSession>, mut shutdown: broadcast::Receiver<()>) {
    let mut prompts = session.subscribe_prompts();

    loop {
        tokio::select! {
            prompt = prompts.recv() => match prompt {
                Ok(prompt) => {
                    info!(
                        session = %prompt.session_id,
                        stage = %prompt.stage,
                        balance = %prompt.balance.available,
                        "Security prompt: {}",
                        prompt.recommendation
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Security prompt logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.recv() => {
                break;
            }
        }
    }
}

/// Wait for shutdown signal
async fn shutdown_signal(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
}
