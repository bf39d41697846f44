//! Combined connection status shown to the user

use super::state::{BaseNodeState, BaseNodeSyncState};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionIndicator {
    Connected,
    ConnectedWithIssues,
    Disconnected,
}

impl ConnectionIndicator {
    pub fn from_states(state: BaseNodeState, sync_state: BaseNodeSyncState) -> Self {
        match state {
            BaseNodeState::Online | BaseNodeState::Syncing => match sync_state {
                BaseNodeSyncState::Online | BaseNodeSyncState::Syncing => {
                    ConnectionIndicator::Connected
                }
                BaseNodeSyncState::NotStarted | BaseNodeSyncState::Failed => {
                    ConnectionIndicator::ConnectedWithIssues
                }
            },
            BaseNodeState::Offline => ConnectionIndicator::Disconnected,
        }
    }
}
