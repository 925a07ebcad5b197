//! Escrow contract access: the client issuing chain calls and the bootstrap
//! that resolves and verifies the deployed contract.

mod bootstrap;
mod client;

pub use bootstrap::{
    resolve_contract_address, ContractBootstrap, ContractConnector, ContractState,
    DeploymentManifest, RpcConnector,
};
pub use client::EscrowClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::chain::abi::AbiError;
use crate::chain::{Address, ChainError, GameHash, TxHash, Wei};
use crate::models::CreatedWager;
use crate::wagers::WagerLedger;

#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("contract unavailable: {0}")]
    ContractUnavailable(String),

    #[error("transaction rejected: {reason}")]
    TransactionRejected { reason: String },

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },

    #[error("transaction {tx_hash} not confirmed in time")]
    ConfirmationTimeout { tx_hash: TxHash },

    #[error("wager {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("unexpected contract data: {0}")]
    Decode(String),
}

impl From<AbiError> for EscrowError {
    fn from(e: AbiError) -> Self {
        EscrowError::Decode(e.to_string())
    }
}

impl EscrowError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ContractUnavailable(msg.into())
    }

    /// Detail text to hand back to API callers
    pub fn details(&self) -> String {
        match self {
            EscrowError::TransactionRejected { reason } => reason.clone(),
            EscrowError::Chain(e) => e.revert_reason().unwrap_or_else(|| e.to_string()),
            other => other.to_string(),
        }
    }
}

/// Operations against a deployed escrow contract.
///
/// Stakes are sent as the transaction value from `from`, a node-managed
/// account belonging to the caller. Participant checks are left to the
/// contract; implementations only forward and surface revert reasons.
#[async_trait]
pub trait EscrowContract: WagerLedger {
    fn address(&self) -> Address;

    async fn create_wager(
        &self,
        from: Address,
        opponent: Address,
        game_hash: GameHash,
        stake: Wei,
    ) -> Result<CreatedWager, EscrowError>;

    async fn accept_wager(&self, from: Address, index: u64, stake: Wei)
        -> Result<TxHash, EscrowError>;

    async fn resolve_wager(
        &self,
        from: Address,
        index: u64,
        winner: Address,
    ) -> Result<TxHash, EscrowError>;

    /// Latest block number known to the node
    async fn latest_block(&self) -> Result<u64, EscrowError>;

    /// Wager indices referenced by contract logs in `[from_block, to_block]`
    async fn touched_wagers(&self, from_block: u64, to_block: u64)
        -> Result<Vec<u64>, EscrowError>;
}
