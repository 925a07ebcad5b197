// Contract bootstrap: resolve the deployed escrow and keep a live handle

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::{EscrowClient, EscrowContract, EscrowError};
use crate::chain::{Address, JsonRpcClient};

/// Deployment manifest written by the contract deploy script
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManifest {
    pub address: String,
    #[serde(default)]
    pub network: Option<String>,
}

/// Explicit configuration first, then the deployment manifest
pub fn resolve_contract_address(
    configured: Option<&str>,
    manifest_path: &Path,
) -> Result<Address, EscrowError> {
    if let Some(raw) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        return raw.parse().map_err(|e| {
            EscrowError::unavailable(format!("invalid configured contract address: {}", e))
        });
    }

    if !manifest_path.exists() {
        return Err(EscrowError::unavailable(format!(
            "Contract address not found in environment or deployment file ({})",
            manifest_path.display()
        )));
    }

    let contents = std::fs::read_to_string(manifest_path).map_err(|e| {
        EscrowError::unavailable(format!(
            "failed to read {}: {}",
            manifest_path.display(),
            e
        ))
    })?;
    let manifest: DeploymentManifest = serde_json::from_str(&contents).map_err(|e| {
        EscrowError::unavailable(format!(
            "malformed deployment manifest {}: {}",
            manifest_path.display(),
            e
        ))
    })?;
    if let Some(network) = &manifest.network {
        info!("Deployment manifest network: {}", network);
    }
    manifest.address.parse().map_err(|e| {
        EscrowError::unavailable(format!("invalid address in deployment manifest: {}", e))
    })
}

/// Produces a live contract handle, or explains why it cannot
#[async_trait]
pub trait ContractConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn EscrowContract>, EscrowError>;
}

pub struct RpcConnector {
    rpc: Arc<JsonRpcClient>,
    configured_address: Option<String>,
    manifest_path: PathBuf,
    confirm_timeout: Duration,
}

impl RpcConnector {
    pub fn new(
        rpc: Arc<JsonRpcClient>,
        configured_address: Option<String>,
        manifest_path: PathBuf,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            configured_address,
            manifest_path,
            confirm_timeout,
        }
    }
}

#[async_trait]
impl ContractConnector for RpcConnector {
    async fn connect(&self) -> Result<Arc<dyn EscrowContract>, EscrowError> {
        let address =
            resolve_contract_address(self.configured_address.as_deref(), &self.manifest_path)?;
        info!("Initializing contract at address: {}", address);

        let code = self
            .rpc
            .get_code(&address)
            .await
            .map_err(|e| EscrowError::unavailable(format!("failed to fetch contract code: {}", e)))?;
        if code.is_empty() {
            return Err(EscrowError::unavailable(format!(
                "No contract deployed at {}",
                address
            )));
        }

        Ok(Arc::new(EscrowClient::new(
            self.rpc.clone(),
            address,
            self.confirm_timeout,
        )))
    }
}

#[derive(Clone)]
pub enum ContractState {
    Uninitialized,
    Initializing,
    Ready(Arc<dyn EscrowContract>),
    Failed(String),
}

impl ContractState {
    pub fn label(&self) -> &'static str {
        match self {
            ContractState::Uninitialized => "uninitialized",
            ContractState::Initializing => "initializing",
            ContractState::Ready(_) => "ready",
            ContractState::Failed(_) => "failed",
        }
    }

    /// Why the last attempt failed, while in the `Failed` state
    pub fn failure(&self) -> Option<&str> {
        match self {
            ContractState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Owns the contract handle for the lifetime of the process.
///
/// A failed attempt is retried on the next call to [`ensure_ready`]; there is
/// no backoff. Two concurrent attempts both run the connector; a failing
/// attempt never replaces a handle installed by a successful one.
///
/// [`ensure_ready`]: ContractBootstrap::ensure_ready
pub struct ContractBootstrap {
    connector: Box<dyn ContractConnector>,
    state: RwLock<ContractState>,
}

impl ContractBootstrap {
    pub fn new(connector: Box<dyn ContractConnector>) -> Self {
        Self {
            connector,
            state: RwLock::new(ContractState::Uninitialized),
        }
    }

    pub fn state(&self) -> ContractState {
        self.state.read().clone()
    }

    pub async fn ensure_ready(&self) -> Result<Arc<dyn EscrowContract>, EscrowError> {
        {
            let mut state = self.state.write();
            if let ContractState::Ready(contract) = &*state {
                return Ok(contract.clone());
            }
            *state = ContractState::Initializing;
        }

        match self.connector.connect().await {
            Ok(contract) => {
                info!("Escrow contract initialized at {}", contract.address());
                *self.state.write() = ContractState::Ready(contract.clone());
                Ok(contract)
            }
            Err(e) => {
                let mut state = self.state.write();
                // a concurrent attempt may have succeeded meanwhile
                if let ContractState::Ready(contract) = &*state {
                    return Ok(contract.clone());
                }
                *state = ContractState::Failed(e.to_string());
                drop(state);

                error!("Error initializing contract: {}", e);
                Err(match e {
                    EscrowError::ContractUnavailable(_) => e,
                    other => EscrowError::unavailable(other.to_string()),
                })
            }
        }
    }
}
