//! Scriptable engine for tests

use super::{ConnectivityStatus, EngineError, EngineResult, ValidationStatus, WalletEngine};
use crate::base_node::BaseNode;
use crate::models::BalanceInfo;
use async_trait::async_trait;
use std::sync::Mutex;

pub struct MockEngine {
    pub balance: Mutex<BalanceInfo>,
    pub connectivity: Mutex<Option<ConnectivityStatus>>,
    pub validation: Mutex<Vec<ValidationStatus>>,
    pub chain_tip: Mutex<u64>,
    pub peers: Mutex<Vec<String>>,
    pub selected: Mutex<Vec<BaseNode>>,
    pub validations_started: Mutex<u32>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            balance: Mutex::new(BalanceInfo::default()),
            connectivity: Mutex::new(Some(ConnectivityStatus::Connecting)),
            validation: Mutex::new(Vec::new()),
            chain_tip: Mutex::new(0),
            peers: Mutex::new(Vec::new()),
            selected: Mutex::new(Vec::new()),
            validations_started: Mutex::new(0),
        }
    }

    pub fn selected_keys(&self) -> Vec<String> {
        self.selected
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.public_key_hex.clone())
            .collect()
    }
}

#[async_trait]
impl WalletEngine for MockEngine {
    async fn get_balance(&self) -> EngineResult<BalanceInfo> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_connectivity(&self) -> EngineResult<ConnectivityStatus> {
        (*self.connectivity.lock().unwrap())
            .ok_or_else(|| EngineError::ConnectionFailed("engine unreachable".to_string()))
    }

    async fn get_validation_status(&self) -> EngineResult<Vec<ValidationStatus>> {
        Ok(self.validation.lock().unwrap().clone())
    }

    async fn get_chain_tip(&self) -> EngineResult<u64> {
        Ok(*self.chain_tip.lock().unwrap())
    }

    async fn get_base_node_peers(&self) -> EngineResult<Vec<String>> {
        Ok(self.peers.lock().unwrap().clone())
    }

    async fn set_base_node(&self, node: &BaseNode) -> EngineResult<()> {
        self.selected.lock().unwrap().push(node.clone());
        Ok(())
    }

    async fn start_validation(&self) -> EngineResult<()> {
        *self.validations_started.lock().unwrap() += 1;
        Ok(())
    }
}
