//! Engine monitor
//!
//! Polls the wallet engine and turns differences between consecutive
//! readings into `EngineEvent`s for the session:
//! - Connectivity changes
//! - Validation requests starting and completing
//! - Balance changes
//! - Chain tip changes

use crate::engine::{ConnectivityStatus, EngineEvent, WalletEngine};
use crate::models::BalanceInfo;
use crate::session::WalletSession;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct EngineMonitor {
    engine: Arc<dyn WalletEngine>,
    last_connectivity: Option<ConnectivityStatus>,
    /// Request id -> last seen result
    validation: HashMap<u64, Option<bool>>,
    last_balance: Option<BalanceInfo>,
    last_chain_tip: Option<u64>,
}

impl EngineMonitor {
    pub fn new(engine: Arc<dyn WalletEngine>) -> Self {
        Self {
            engine,
            last_connectivity: None,
            validation: HashMap::new(),
            last_balance: None,
            last_chain_tip: None,
        }
    }

    /// Read the engine once and return what changed since the last poll
    pub async fn poll(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        match self.engine.get_connectivity().await {
            Ok(status) => {
                if self.last_connectivity != Some(status) {
                    self.last_connectivity = Some(status);
                    events.push(EngineEvent::Connectivity(status));
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read engine connectivity");
                // An unreachable engine is treated as offline
                if self.last_connectivity != Some(ConnectivityStatus::Offline) {
                    self.last_connectivity = Some(ConnectivityStatus::Offline);
                    events.push(EngineEvent::Connectivity(ConnectivityStatus::Offline));
                }
                return events;
            }
        }

        match self.engine.get_validation_status().await {
            Ok(requests) => {
                // Forget requests the engine no longer reports
                self.validation
                    .retain(|id, _| requests.iter().any(|r| r.request_id == *id));

                for request in requests {
                    let previous = self.validation.insert(request.request_id, request.success);
                    match (previous, request.success) {
                        (None, None) => {
                            events.push(EngineEvent::ValidationStarted(request.request_id))
                        }
                        (None | Some(None), Some(success)) => {
                            events.push(EngineEvent::ValidationCompleted {
                                request_id: request.request_id,
                                success,
                            })
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to read validation status"),
        }

        match self.engine.get_balance().await {
            Ok(balance) => {
                if self.last_balance != Some(balance) {
                    self.last_balance = Some(balance);
                    events.push(EngineEvent::BalanceUpdated(balance));
                }
            }
            Err(e) => warn!(error = %e, "Failed to read balance"),
        }

        match self.engine.get_chain_tip().await {
            Ok(height) => {
                if self.last_chain_tip != Some(height) {
                    self.last_chain_tip = Some(height);
                    events.push(EngineEvent::ChainTip(height));
                }
            }
            Err(e) => debug!(error = %e, "Failed to read chain tip"),
        }

        events
    }

    /// Poll once and apply every event to the session
    pub async fn run_cycle(&mut self, session: &WalletSession) -> usize {
        let events = self.poll().await;
        let count = events.len();

        for event in events {
            debug!(session = %session.id(), event = ?event, "Engine event");
            if let Err(e) = session.handle_event(event).await {
                error!(session = %session.id(), error = %e, "Failed to handle engine event");
            }
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::engine::ValidationStatus;
    use crate::models::MicroTari;

    #[tokio::test]
    async fn test_poll_reports_only_changes() {
        let engine = Arc::new(MockEngine::new());
        let mut monitor = EngineMonitor::new(engine.clone());

        let events = monitor.poll().await;
        assert_eq!(
            events,
            vec![
                EngineEvent::Connectivity(ConnectivityStatus::Connecting),
                EngineEvent::BalanceUpdated(BalanceInfo::default()),
                EngineEvent::ChainTip(0),
            ]
        );

        assert!(monitor.poll().await.is_empty());

        *engine.connectivity.lock().unwrap() = Some(ConnectivityStatus::Online);
        *engine.balance.lock().unwrap() = BalanceInfo::available(MicroTari(500));
        let events = monitor.poll().await;
        assert_eq!(
            events,
            vec![
                EngineEvent::Connectivity(ConnectivityStatus::Online),
                EngineEvent::BalanceUpdated(BalanceInfo::available(MicroTari(500))),
            ]
        );
    }

    #[tokio::test]
    async fn test_poll_tracks_validation_requests() {
        let engine = Arc::new(MockEngine::new());
        let mut monitor = EngineMonitor::new(engine.clone());
        monitor.poll().await;

        *engine.validation.lock().unwrap() = vec![
            ValidationStatus { request_id: 1, success: None },
            ValidationStatus { request_id: 2, success: Some(true) },
        ];
        let events = monitor.poll().await;
        assert_eq!(
            events,
            vec![
                EngineEvent::ValidationStarted(1),
                EngineEvent::ValidationCompleted { request_id: 2, success: true },
            ]
        );

        *engine.validation.lock().unwrap() = vec![
            ValidationStatus { request_id: 1, success: Some(false) },
            ValidationStatus { request_id: 2, success: Some(true) },
        ];
        let events = monitor.poll().await;
        assert_eq!(
            events,
            vec![EngineEvent::ValidationCompleted { request_id: 1, success: false }]
        );
    }

    #[tokio::test]
    async fn test_unreachable_engine_reports_offline_once() {
        let engine = Arc::new(MockEngine::new());
        *engine.connectivity.lock().unwrap() = None;
        let mut monitor = EngineMonitor::new(engine.clone());

        assert_eq!(
            monitor.poll().await,
            vec![EngineEvent::Connectivity(ConnectivityStatus::Offline)]
        );
        assert!(monitor.poll().await.is_empty());
    }
}
