//! Wallet session
//!
//! One session exists per running wallet. It is created when the wallet
//! starts, shared by `Arc` with the monitor loop and the API, and dropped
//! when the wallet stops.
//!
//! Handles:
//! - Applying engine events to the base node state
//! - Rotating to another base node when the current one fails
//! - Running the staged security policy on balance changes

use crate::base_node::{
    BaseNode, BaseNodeConnectivity, BaseNodeRegistry, BaseNodeState, BaseNodeSyncState,
    ConnectionIndicator, RegistryError, ValidationTracker,
};
use crate::db::Database;
use crate::engine::{ConnectivityStatus, EngineEvent, WalletEngine};
use crate::models::BalanceInfo;
use crate::security::{SecurityDecision, SecurityResult, StagedSecurityPolicy, WalletSecurityStage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A security prompt that should be shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct SecurityPrompt {
    pub session_id: Uuid,
    pub stage: WalletSecurityStage,
    pub recommendation: &'static str,
    pub balance: BalanceInfo,
    pub created_at: DateTime<Utc>,
}

/// Connection status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub session_id: Uuid,
    pub base_node_state: BaseNodeState,
    pub sync_state: BaseNodeSyncState,
    pub indicator: ConnectionIndicator,
    pub current_base_node: Option<BaseNode>,
    pub last_sync_result: Option<bool>,
    pub chain_tip: u64,
}

pub struct WalletSession {
    id: Uuid,
    network: String,
    engine: Arc<dyn WalletEngine>,
    connectivity: BaseNodeConnectivity,
    validation: Mutex<ValidationTracker>,
    registry: BaseNodeRegistry,
    policy: StagedSecurityPolicy<Database>,
    prompts: broadcast::Sender<SecurityPrompt>,
}

impl WalletSession {
    pub fn new(
        network: &str,
        engine: Arc<dyn WalletEngine>,
        registry: BaseNodeRegistry,
        policy: StagedSecurityPolicy<Database>,
    ) -> Self {
        let (prompts, _) = broadcast::channel(16);

        Self {
            id: Uuid::new_v4(),
            network: network.to_string(),
            engine,
            connectivity: BaseNodeConnectivity::new(),
            validation: Mutex::new(ValidationTracker::new()),
            registry,
            policy,
            prompts,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connectivity(&self) -> &BaseNodeConnectivity {
        &self.connectivity
    }

    pub fn registry(&self) -> &BaseNodeRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Database {
        self.policy.settings()
    }

    /// Security prompts, as they become due
    pub fn subscribe_prompts(&self) -> broadcast::Receiver<SecurityPrompt> {
        self.prompts.subscribe()
    }

    pub async fn connection_snapshot(&self) -> Result<ConnectionSnapshot, RegistryError> {
        let base_node_state = self.connectivity.state();
        let sync_state = self.connectivity.sync_state();

        Ok(ConnectionSnapshot {
            session_id: self.id,
            base_node_state,
            sync_state,
            indicator: ConnectionIndicator::from_states(base_node_state, sync_state),
            current_base_node: self.registry.current().await?,
            last_sync_result: self.registry.last_sync_result().await?,
            chain_tip: self.registry.chain_tip().await?,
        })
    }

    /// Apply one engine event
    pub async fn handle_event(&self, event: EngineEvent) -> anyhow::Result<()> {
        match event {
            EngineEvent::Connectivity(status) => self.handle_connectivity(status).await?,
            EngineEvent::ValidationStarted(request_id) => {
                let sync_state = {
                    let mut tracker = self.validation.lock().await;
                    tracker.begin(request_id);
                    tracker.evaluate()
                };
                self.apply_sync_state(sync_state).await?;
            }
            EngineEvent::ValidationCompleted { request_id, success } => {
                let sync_state = {
                    let mut tracker = self.validation.lock().await;
                    if !tracker.complete(request_id, success) {
                        debug!(session = %self.id, request_id, "Ignoring stale validation result");
                        return Ok(());
                    }
                    tracker.evaluate()
                };
                self.apply_sync_state(sync_state).await?;
            }
            EngineEvent::BalanceUpdated(balance) => {
                self.handle_balance_change(&balance).await?;
            }
            EngineEvent::ChainTip(height) => {
                self.registry.save_chain_tip(height).await?;
            }
        }

        Ok(())
    }

    /// Run the security policy and publish a prompt if one is due
    pub async fn handle_balance_change(
        &self,
        balance: &BalanceInfo,
    ) -> SecurityResult<SecurityDecision> {
        let decision = self.policy.handle_balance_change(balance).await?;

        if let SecurityDecision::ShowPopup(stage) = decision {
            let prompt = SecurityPrompt {
                session_id: self.id,
                stage,
                recommendation: stage.recommendation(),
                balance: *balance,
                created_at: Utc::now(),
            };
            // No subscribers is fine, the prompt is still recorded
            let _ = self.prompts.send(prompt);
        }

        Ok(decision)
    }

    async fn handle_connectivity(&self, status: ConnectivityStatus) -> anyhow::Result<()> {
        let current = self.registry.current().await?;
        let public_key = current
            .as_ref()
            .map(|n| n.public_key_hex.as_str())
            .unwrap_or("none");

        let changed = self.connectivity.apply_connectivity_status(status);

        match status {
            ConnectivityStatus::Connecting => {
                if changed {
                    info!(session = %self.id, base_node = %public_key, "Connecting to base node");
                }
            }
            ConnectivityStatus::Online => {
                if changed {
                    info!(session = %self.id, base_node = %public_key, "Base node connected [ONLINE]");
                }
                if let Err(e) = self.refresh_base_node_list().await {
                    warn!(session = %self.id, error = %e, "Failed to refresh base node list");
                }
            }
            ConnectivityStatus::Offline => {
                if changed {
                    info!(session = %self.id, base_node = %public_key, "Base node disconnected [OFFLINE]");
                }
                if !is_custom(current.as_ref()) {
                    self.rotate_base_node().await?;
                }
            }
        }

        Ok(())
    }

    async fn apply_sync_state(&self, sync_state: Option<BaseNodeSyncState>) -> anyhow::Result<()> {
        let Some(sync_state) = sync_state else {
            return Ok(());
        };

        match sync_state {
            BaseNodeSyncState::Failed => {
                self.registry.set_last_sync_result(Some(false)).await?;
                self.connectivity.update_sync_state(sync_state);
                warn!(session = %self.id, "Wallet validation failed");

                let current = self.registry.current().await?;
                if !is_custom(current.as_ref()) {
                    self.rotate_base_node().await?;
                }
            }
            BaseNodeSyncState::Online => {
                self.registry.set_last_sync_result(Some(true)).await?;
                self.connectivity.update_sync_state(sync_state);
                info!(session = %self.id, "Wallet validation complete");
            }
            BaseNodeSyncState::Syncing | BaseNodeSyncState::NotStarted => {
                self.connectivity.update_sync_state(sync_state);
            }
        }

        Ok(())
    }

    /// Point the engine at the current base node and start validation.
    /// Selects the first known node if none is selected yet.
    pub async fn sync_base_node(&self) -> anyhow::Result<()> {
        let node = match self.registry.current().await? {
            Some(node) => node,
            None => match self.registry.set_next_base_node().await {
                Ok(node) => node,
                Err(RegistryError::Empty) => {
                    warn!(session = %self.id, "No base nodes known, sync skipped");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            },
        };

        info!(
            session = %self.id,
            name = %node.name,
            public_key = %node.public_key_hex,
            address = %node.address,
            "Starting base node sync"
        );

        self.validation.lock().await.clear();
        self.engine.set_base_node(&node).await?;
        self.engine.start_validation().await?;
        Ok(())
    }

    /// Select a base node chosen by the user and sync against it
    pub async fn select_base_node(&self, node: &BaseNode) -> anyhow::Result<()> {
        self.registry.set_current(node).await?;
        self.sync_base_node().await
    }

    async fn rotate_base_node(&self) -> anyhow::Result<()> {
        match self.registry.set_next_base_node().await {
            Ok(node) => {
                info!(session = %self.id, name = %node.name, "Switching to next base node");
                if let Err(e) = self.sync_base_node().await {
                    error!(session = %self.id, error = %e, "Failed to sync with next base node");
                }
                Ok(())
            }
            Err(RegistryError::Empty) => {
                warn!(session = %self.id, "No other base node to switch to");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_base_node_list(&self) -> anyhow::Result<()> {
        let peers = self.engine.get_base_node_peers().await?;
        if !peers.is_empty() {
            self.registry
                .refresh_engine_base_nodes(&peers, &self.network)
                .await?;
        }
        Ok(())
    }
}

fn is_custom(node: Option<&BaseNode>) -> bool {
    node.map(|n| n.is_custom).unwrap_or(false)
}
