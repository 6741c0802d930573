use crate::domain::chain::{ChainLog, LogFilter, TransactionReceipt, TransactionRequest};
use crate::domain::ports::ChainClient;
use crate::utils::error::{DonlyError, Result};
use alloy_primitives::{Address, Bytes, B256, U64};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// 以 HTTP 呼叫節點的 JSON-RPC 2.0 客戶端
pub struct JsonRpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// `result` 為 null 時只有 `T = Option<_>` 能成功解析
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("→ {} (id={})", method, id);

        let response = self
            .client
            .post(&self.url)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DonlyError::RpcError {
                code: i64::from(status.as_u16()),
                message: format!("HTTP {} from node: {}", status, body),
            });
        }

        let envelope: RpcResponse = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(DonlyError::RpcError {
                code: err.code,
                message: err.message,
            });
        }

        serde_json::from_value(envelope.result).map_err(|e| DonlyError::RpcError {
            code: -32603,
            message: format!("unexpected result for {}: {}", method, e),
        })
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.call("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    async fn block_number(&self) -> Result<u64> {
        let number: U64 = self.call("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.call("eth_getCode", json!([address, "latest"])).await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<ChainLog>> {
        self.call("eth_getLogs", json!([filter])).await
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        self.call("eth_accounts", json!([])).await
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        let gas: U64 = self.call("eth_estimateGas", json!([tx])).await?;
        Ok(gas.to::<u64>())
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256> {
        self.call("eth_sendTransaction", json!([tx])).await
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", json!([hash])).await
    }
}
