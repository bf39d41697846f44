//! Base node connection and sync state
//!
//! Two independent axes, each held in a `watch` channel so every observer
//! sees the most recent value:
//! - `BaseNodeState`: raw connectivity reported by the wallet engine
//! - `BaseNodeSyncState`: wallet validation status after connecting
//!
//! There is a single writer (the engine event path) and any number of readers.

use crate::engine::ConnectivityStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Connectivity of the wallet to its base node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseNodeState {
    #[default]
    Syncing,
    Online,
    Offline,
}

impl std::fmt::Display for BaseNodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaseNodeState::Syncing => write!(f, "syncing"),
            BaseNodeState::Online => write!(f, "online"),
            BaseNodeState::Offline => write!(f, "offline"),
        }
    }
}

/// Wallet validation status against the connected base node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseNodeSyncState {
    #[default]
    NotStarted,
    Syncing,
    Online,
    Failed,
}

impl std::fmt::Display for BaseNodeSyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaseNodeSyncState::NotStarted => write!(f, "not_started"),
            BaseNodeSyncState::Syncing => write!(f, "syncing"),
            BaseNodeSyncState::Online => write!(f, "online"),
            BaseNodeSyncState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("Base node state channel closed")]
    Closed,
}

/// Observable holder for both base node state axes
#[derive(Debug)]
pub struct BaseNodeConnectivity {
    state: watch::Sender<BaseNodeState>,
    sync_state: watch::Sender<BaseNodeSyncState>,
}

impl BaseNodeConnectivity {
    pub fn new() -> Self {
        let (state, _) = watch::channel(BaseNodeState::default());
        let (sync_state, _) = watch::channel(BaseNodeSyncState::default());

        Self { state, sync_state }
    }

    /// Current connectivity state
    pub fn state(&self) -> BaseNodeState {
        *self.state.borrow()
    }

    /// Current sync state
    pub fn sync_state(&self) -> BaseNodeSyncState {
        *self.sync_state.borrow()
    }

    /// Replace the connectivity state.
    ///
    /// Returns whether the value changed. Subscribers are only notified on change.
    pub fn update_state(&self, new_state: BaseNodeState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == new_state {
                return false;
            }
            *current = new_state;
            true
        })
    }

    /// Publish the state matching a connectivity status reported by the engine.
    /// Returns `true` if the state changed.
    pub fn apply_connectivity_status(&self, status: ConnectivityStatus) -> bool {
        self.update_state(BaseNodeState::from(status))
    }

    /// Replace the sync state. Subscribers are notified even if the value is unchanged.
    pub fn update_sync_state(&self, new_state: BaseNodeSyncState) {
        self.sync_state.send_replace(new_state);
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BaseNodeState> {
        self.state.subscribe()
    }

    pub fn subscribe_sync_state(&self) -> watch::Receiver<BaseNodeSyncState> {
        self.sync_state.subscribe()
    }

    /// Wait for the next transition to `Online`, then run `action`.
    ///
    /// Only values published after this call count: being online already
    /// does not trigger the action. Dropping the returned future drops the
    /// subscription and the action never runs.
    pub async fn await_online<F, T>(&self, action: F) -> Result<T, ConnectivityError>
    where
        F: FnOnce() -> T,
    {
        let mut rx = self.state.subscribe();

        loop {
            rx.changed().await.map_err(|_| ConnectivityError::Closed)?;
            if *rx.borrow_and_update() == BaseNodeState::Online {
                return Ok(action());
            }
        }
    }
}

impl Default for BaseNodeConnectivity {
    fn default() -> Self {
        Self::new()
    }
}
