//! Wallet engine integration
//!
//! The wallet engine owns keys, transactions and base node networking.
//! This module only covers what the session needs from it:
//! - Balance queries
//! - Base node connectivity and validation status
//! - Base node selection

#[cfg(test)]
pub mod mock;
pub mod tari;

use crate::base_node::{BaseNode, BaseNodeState};
use crate::models::BalanceInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("RPC connection failed: {0}")]
    ConnectionFailed(String),

    #[error("RPC request failed: {0}")]
    RpcError(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Wallet not running")]
    NotRunning,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Raw connectivity status reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Connecting,
    Online,
    Offline,
}

impl ConnectivityStatus {
    /// Engines report the status as an ordinal
    pub fn from_ordinal(value: u8) -> EngineResult<Self> {
        match value {
            0 => Ok(ConnectivityStatus::Connecting),
            1 => Ok(ConnectivityStatus::Online),
            2 => Ok(ConnectivityStatus::Offline),
            other => Err(EngineError::InvalidResponse(format!(
                "unknown connectivity status {}",
                other
            ))),
        }
    }
}

impl From<ConnectivityStatus> for BaseNodeState {
    fn from(status: ConnectivityStatus) -> Self {
        match status {
            ConnectivityStatus::Connecting => BaseNodeState::Syncing,
            ConnectivityStatus::Online => BaseNodeState::Online,
            ConnectivityStatus::Offline => BaseNodeState::Offline,
        }
    }
}

/// Status of one validation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ValidationStatus {
    pub request_id: u64,
    /// `None` while the request is still running
    pub success: Option<bool>,
}

/// Discrete events delivered by the engine to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Connectivity(ConnectivityStatus),
    ValidationStarted(u64),
    ValidationCompleted { request_id: u64, success: bool },
    BalanceUpdated(BalanceInfo),
    ChainTip(u64),
}

/// Operations the session needs from the wallet engine
#[async_trait]
pub trait WalletEngine: Send + Sync {
    /// Current wallet balance
    async fn get_balance(&self) -> EngineResult<BalanceInfo>;

    /// Current base node connectivity
    async fn get_connectivity(&self) -> EngineResult<ConnectivityStatus>;

    /// Status of the validation requests of the current sync
    async fn get_validation_status(&self) -> EngineResult<Vec<ValidationStatus>>;

    /// Height of the longest chain known to the base node
    async fn get_chain_tip(&self) -> EngineResult<u64>;

    /// Public keys of the base node peers the engine knows about
    async fn get_base_node_peers(&self) -> EngineResult<Vec<String>>;

    /// Point the engine at a base node
    async fn set_base_node(&self, node: &BaseNode) -> EngineResult<()>;

    /// Start validating the wallet against the current base node
    async fn start_validation(&self) -> EngineResult<()>;
}
