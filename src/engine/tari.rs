//! Tari wallet integration
//!
//! Uses the wallet's JSON-RPC API for:
//! - Balance queries
//! - Connectivity and validation status
//! - Base node selection

use super::{ConnectivityStatus, EngineError, EngineResult, ValidationStatus, WalletEngine};
use crate::base_node::BaseNode;
use crate::models::{BalanceInfo, MicroTari};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tari wallet client
pub struct TariWalletRpc {
    rpc_url: String,
    client: reqwest::Client,
}

impl TariWalletRpc {
    /// Create a new Tari wallet client
    pub fn new(rpc_url: &str, timeout_secs: u64) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EngineError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            client,
        })
    }

    /// Make a JSON-RPC call to the wallet
    async fn rpc_call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> EngineResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: 1,
            method: method.to_string(),
            params,
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::ConnectionFailed(e.to_string()))?;

        let rpc_response: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| EngineError::RpcError(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(EngineError::RpcError(error.message));
        }

        rpc_response
            .result
            .ok_or_else(|| EngineError::RpcError("No result in response".to_string()))
    }
}

#[async_trait]
impl WalletEngine for TariWalletRpc {
    async fn get_balance(&self) -> EngineResult<BalanceInfo> {
        let result: GetBalanceResponse = self
            .rpc_call("get_balance", serde_json::json!({}))
            .await?;

        Ok(result.into())
    }

    async fn get_connectivity(&self) -> EngineResult<ConnectivityStatus> {
        let result: GetNetworkStatusResponse = self
            .rpc_call("get_network_status", serde_json::json!({}))
            .await?;

        ConnectivityStatus::from_ordinal(result.status)
    }

    async fn get_validation_status(&self) -> EngineResult<Vec<ValidationStatus>> {
        let result: GetValidationStatusResponse = self
            .rpc_call("get_validation_status", serde_json::json!({}))
            .await?;

        Ok(result.requests)
    }

    async fn get_chain_tip(&self) -> EngineResult<u64> {
        let result: GetTipInfoResponse = self
            .rpc_call("get_tip_info", serde_json::json!({}))
            .await?;

        Ok(result.height_of_longest_chain)
    }

    async fn get_base_node_peers(&self) -> EngineResult<Vec<String>> {
        let result: GetPeersResponse = self
            .rpc_call("get_base_node_peers", serde_json::json!({}))
            .await?;

        Ok(result.public_keys)
    }

    async fn set_base_node(&self, node: &BaseNode) -> EngineResult<()> {
        let params = serde_json::json!({
            "public_key": node.public_key_hex,
            "address": node.address,
        });

        let result: AckResponse = self.rpc_call("set_base_node", params).await?;
        if !result.is_success {
            return Err(EngineError::RpcError(format!(
                "base node {} rejected",
                node.public_key_hex
            )));
        }
        Ok(())
    }

    async fn start_validation(&self) -> EngineResult<()> {
        let result: AckResponse = self
            .rpc_call("start_validation", serde_json::json!({}))
            .await?;

        if !result.is_success {
            return Err(EngineError::NotRunning);
        }
        Ok(())
    }
}

// JSON-RPC types

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: u64,
    method: String,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Deserialize)]
struct GetBalanceResponse {
    available_balance: u64,
    #[serde(default)]
    pending_incoming_balance: u64,
    #[serde(default)]
    pending_outgoing_balance: u64,
    #[serde(default)]
    timelocked_balance: u64,
}

impl From<GetBalanceResponse> for BalanceInfo {
    fn from(r: GetBalanceResponse) -> Self {
        Self {
            available: MicroTari(r.available_balance),
            pending_incoming: MicroTari(r.pending_incoming_balance),
            pending_outgoing: MicroTari(r.pending_outgoing_balance),
            time_locked: MicroTari(r.timelocked_balance),
        }
    }
}

#[derive(Deserialize)]
struct GetNetworkStatusResponse {
    status: u8,
}

#[derive(Deserialize)]
struct GetValidationStatusResponse {
    #[serde(default)]
    requests: Vec<ValidationStatus>,
}

#[derive(Deserialize)]
struct GetTipInfoResponse {
    height_of_longest_chain: u64,
}

#[derive(Deserialize)]
struct GetPeersResponse {
    #[serde(default)]
    public_keys: Vec<String>,
}

#[derive(Deserialize)]
struct AckResponse {
    #[serde(default)]
    is_success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_response_parsing() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "available_balance": 10000000000,
                "pending_incoming_balance": 5,
                "pending_outgoing_balance": 0
            }
        }"#;

        let response: JsonRpcResponse<GetBalanceResponse> = serde_json::from_str(json).unwrap();
        let balance: BalanceInfo = response.result.unwrap().into();
        assert_eq!(balance.available, MicroTari::from_tari(10_000));
        assert_eq!(balance.pending_incoming, MicroTari(5));
        assert_eq!(balance.time_locked, MicroTari(0));
    }

    #[test]
    fn test_validation_status_parsing() {
        let json = r#"{
            "result": {
                "requests": [
                    {"request_id": 7, "success": true},
                    {"request_id": 8, "success": null}
                ]
            }
        }"#;

        let response: JsonRpcResponse<GetValidationStatusResponse> = serde_json::from_str(json).unwrap();
        let requests = response.result.unwrap().requests;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].success, Some(true));
        assert_eq!(requests[1].success, None);
    }

    #[test]
    fn test_error_response_parsing() {
        let json = r#"{"error": {"code": -32601, "message": "Method not found"}}"#;
        let response: JsonRpcResponse<AckResponse> = serde_json::from_str(json).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().message, "Method not found");
    }
}
