// Ethereum JSON-RPC transport over HTTP

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::abi::decode_revert_reason;
use super::types::{Address, TxHash, Wei};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("RPC error: {message} ({code})")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Vec<u8>>,
    },
    #[error("no result in RPC response")]
    MissingResult,
    #[error("malformed RPC payload: {0}")]
    Decode(String),
}

impl ChainError {
    /// Best-effort human readable revert reason for a failed call
    pub fn revert_reason(&self) -> Option<String> {
        match self {
            ChainError::Rpc { message, data, .. } => Some(
                data.as_deref()
                    .and_then(decode_revert_reason)
                    .unwrap_or_else(|| message.clone()),
            ),
            _ => None,
        }
    }

    /// The node executed the call and the contract reverted it, as opposed to
    /// the node itself failing (rate limits, missing state, internal errors)
    pub fn is_revert(&self) -> bool {
        match self {
            ChainError::Rpc { code, message, .. } => {
                *code == 3 || message.to_ascii_lowercase().contains("revert")
            }
            _ => false,
        }
    }

    fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transport(e) if e.is_timeout() || e.is_connect())
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcError {
    /// Nodes put revert data either directly in `data` or under `data.data`
    fn revert_data(&self) -> Option<Vec<u8>> {
        let raw = match &self.data {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Object(map)) => map.get("data")?.as_str()?,
            _ => return None,
        };
        decode_hex_bytes(raw).ok()
    }
}

/// Whether a failed request may be sent a second time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Reads: one extra attempt after a connect/timeout failure
    OnceOnTransient,
    /// Writes: a resent transaction is not idempotent
    Never,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Pre-byzantium receipts carry no status; treat them as successful
    pub fn succeeded(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => parse_quantity(status).map(|s| s == 1).unwrap_or(false),
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: String,
}

/// Transaction sent through a node-managed (unlocked) account
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub value: Wei,
    pub data: Vec<u8>,
}

pub fn parse_quantity(raw: &str) -> Result<u64, ChainError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode(format!("quantity without 0x prefix: {}", raw)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| ChainError::Decode(format!("{}: {}", raw, e)))
}

pub fn decode_hex_bytes(raw: &str) -> Result<Vec<u8>, ChainError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| ChainError::Decode(format!("bad hex data: {}", e)))
}

fn encode_hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub struct JsonRpcClient {
    http_client: HttpClient,
    rpc_url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(rpc_url: String, timeout: Duration) -> Result<Self, ChainError> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            rpc_url,
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        retry: Retry,
    ) -> Result<T, ChainError> {
        match self.send_once(method, &params).await {
            Err(e) if retry == Retry::OnceOnTransient && e.is_transient() => {
                warn!("{} failed with transient error, retrying once: {}", method, e);
                self.send_once(method, &params).await
            }
            other => other,
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
    ) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });
        debug!("RPC {} (id {})", method, id);

        let resp = self
            .http_client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await?;

        let rpc_resp: RpcResponse<T> = resp.json().await?;

        if let Some(error) = rpc_resp.error {
            let data = error.revert_data();
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
                data,
            });
        }

        rpc_resp.result.ok_or(ChainError::MissingResult)
    }

    pub async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let raw: String = self
            .request(
                "eth_call",
                json!([{ "to": to.to_rpc(), "data": encode_hex_bytes(data) }, "latest"]),
                Retry::OnceOnTransient,
            )
            .await?;
        decode_hex_bytes(&raw)
    }

    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<TxHash, ChainError> {
        let mut params = json!({
            "from": tx.from.to_rpc(),
            "to": tx.to.to_rpc(),
            "data": encode_hex_bytes(&tx.data),
        });
        if !tx.value.is_zero() {
            params["value"] = json!(tx.value.to_rpc());
        }
        self.request("eth_sendTransaction", json!([params]), Retry::Never)
            .await
    }

    /// `None` while the transaction is still pending
    pub async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, ChainError> {
        let value: Value = match self
            .request(
                "eth_getTransactionReceipt",
                json!([hash.to_string()]),
                Retry::OnceOnTransient,
            )
            .await
        {
            Ok(value) => value,
            Err(ChainError::MissingResult) => return Ok(None),
            Err(e) => return Err(e),
        };
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ChainError::Decode(format!("receipt: {}", e)))
    }

    pub async fn get_code(&self, address: &Address) -> Result<Vec<u8>, ChainError> {
        let raw: String = self
            .request(
                "eth_getCode",
                json!([address.to_rpc(), "latest"]),
                Retry::OnceOnTransient,
            )
            .await?;
        decode_hex_bytes(&raw)
    }

    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let raw: String = self
            .request("eth_blockNumber", json!([]), Retry::OnceOnTransient)
            .await?;
        parse_quantity(&raw)
    }

    pub async fn block_timestamp(&self, number: u64) -> Result<DateTime<Utc>, ChainError> {
        let header: BlockHeader = self
            .request(
                "eth_getBlockByNumber",
                json!([format!("{:#x}", number), false]),
                Retry::OnceOnTransient,
            )
            .await?;
        let seconds = parse_quantity(&header.timestamp)?;
        Utc.timestamp_opt(seconds as i64, 0)
            .single()
            .ok_or_else(|| ChainError::Decode(format!("block timestamp {} out of range", seconds)))
    }

    pub async fn get_logs(
        &self,
        address: &Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, ChainError> {
        self.request(
            "eth_getLogs",
            json!([{
                "address": address.to_rpc(),
                "fromBlock": format!("{:#x}", from_block),
                "toBlock": format!("{:#x}", to_block),
            }]),
            Retry::OnceOnTransient,
        )
        .await
    }
}
