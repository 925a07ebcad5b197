// Escrow contract client over JSON-RPC

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{EscrowContract, EscrowError};
use crate::chain::abi::{self, Token};
use crate::chain::rpc::{decode_hex_bytes, Log, Receipt, TxRequest};
use crate::chain::{Address, ChainError, GameHash, JsonRpcClient, TxHash, Wei};
use crate::models::{CreatedWager, Wager};
use crate::wagers::WagerLedger;

const CREATE_WAGER: &str = "createWager(address,bytes32)";
const ACCEPT_WAGER: &str = "acceptWager(uint256)";
const RESOLVE_WAGER: &str = "resolveWager(uint256,address)";
const GET_WAGER: &str = "getWager(uint256)";
const GET_WAGER_COUNT: &str = "getWagerCount()";
const WAGER_CREATED_EVENT: &str = "WagerCreated(uint256,address,address,uint256)";

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct EscrowClient {
    rpc: Arc<JsonRpcClient>,
    address: Address,
    confirm_timeout: Duration,
}

impl EscrowClient {
    pub fn new(rpc: Arc<JsonRpcClient>, address: Address, confirm_timeout: Duration) -> Self {
        Self {
            rpc,
            address,
            confirm_timeout,
        }
    }

    async fn send(&self, from: Address, value: Wei, data: Vec<u8>) -> Result<Receipt, EscrowError> {
        let tx = TxRequest {
            from,
            to: self.address,
            value,
            data,
        };
        let tx_hash = self.rpc.send_transaction(&tx).await.map_err(rejected)?;
        debug!("Submitted transaction {}", tx_hash);

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(EscrowError::Reverted { tx_hash });
        }
        Ok(receipt)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, EscrowError> {
        let started = Instant::now();
        loop {
            if let Some(receipt) = self.rpc.transaction_receipt(&tx_hash).await? {
                return Ok(receipt);
            }
            if started.elapsed() >= self.confirm_timeout {
                return Err(EscrowError::ConfirmationTimeout { tx_hash });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    async fn read(&self, signature: &str, args: &[Token]) -> Result<Vec<u8>, ChainError> {
        self.rpc
            .call(&self.address, &abi::encode_call(signature, args))
            .await
    }

    fn is_own_log(&self, log: &Log) -> bool {
        log.address
            .parse::<Address>()
            .map(|a| a == self.address)
            .unwrap_or(false)
    }
}

/// A write refused by the node before inclusion carries the revert reason
fn rejected(err: ChainError) -> EscrowError {
    match err.revert_reason() {
        Some(reason) => EscrowError::TransactionRejected { reason },
        None => EscrowError::Chain(err),
    }
}

fn topic_word(topic: &str) -> Result<abi::Word, EscrowError> {
    let bytes = decode_hex_bytes(topic)?;
    bytes
        .try_into()
        .map_err(|_| EscrowError::Decode(format!("topic is not 32 bytes: {}", topic)))
}

/// Wager index carried by a log: first indexed argument, else first data word
fn log_wager_index(log: &Log) -> Result<u64, EscrowError> {
    if let Some(topic) = log.topics.get(1) {
        return Ok(abi::decode_u64(&topic_word(topic)?)?);
    }
    let data = decode_hex_bytes(&log.data)?;
    let words = abi::expect_words(&data, 1)?;
    Ok(abi::decode_u64(&words[0])?)
}

pub(crate) fn decode_wager(index: u64, data: &[u8]) -> Result<Wager, EscrowError> {
    let words = abi::expect_words(data, 8)?;
    let opponent = abi::decode_address(&words[1])?;
    let winner = abi::decode_address(&words[6])?;
    Ok(Wager {
        index,
        creator: abi::decode_address(&words[0])?,
        opponent: (!opponent.is_zero()).then_some(opponent),
        amount: Wei(abi::decode_u128(&words[2])?),
        game_hash: GameHash(words[3]),
        accepted: abi::decode_bool(&words[4])?,
        completed: abi::decode_bool(&words[5])?,
        winner: (!winner.is_zero()).then_some(winner),
        created_block: abi::decode_u64(&words[7])?,
    })
}

#[async_trait]
impl WagerLedger for EscrowClient {
    async fn wager_count(&self) -> Result<u64, EscrowError> {
        let data = self.read(GET_WAGER_COUNT, &[]).await?;
        let words = abi::expect_words(&data, 1)?;
        Ok(abi::decode_u64(&words[0])?)
    }

    async fn wager(&self, index: u64) -> Result<Wager, EscrowError> {
        let data = match self.read(GET_WAGER, &[Token::Uint(index as u128)]).await {
            Ok(data) => data,
            // getWager only reverts for an out-of-range index
            Err(e) if e.is_revert() => {
                debug!("getWager({}) reverted: {}", index, e);
                return Err(EscrowError::NotFound(index));
            }
            Err(e) => return Err(e.into()),
        };
        decode_wager(index, &data)
    }

    async fn created_at(&self, wager: &Wager) -> Result<DateTime<Utc>, EscrowError> {
        Ok(self.rpc.block_timestamp(wager.created_block).await?)
    }
}

#[async_trait]
impl EscrowContract for EscrowClient {
    fn address(&self) -> Address {
        self.address
    }

    async fn create_wager(
        &self,
        from: Address,
        opponent: Address,
        game_hash: GameHash,
        stake: Wei,
    ) -> Result<CreatedWager, EscrowError> {
        let data = abi::encode_call(
            CREATE_WAGER,
            &[Token::Address(opponent), Token::FixedBytes(game_hash)],
        );
        let receipt = self.send(from, stake, data).await?;

        let topic = format!("0x{}", hex::encode(abi::event_topic(WAGER_CREATED_EVENT)));
        let log = receipt
            .logs
            .iter()
            .find(|log| {
                self.is_own_log(log)
                    && log
                        .topics
                        .first()
                        .map(|t| t.eq_ignore_ascii_case(&topic))
                        .unwrap_or(false)
            })
            .ok_or_else(|| {
                EscrowError::Decode(format!(
                    "receipt {} has no WagerCreated event",
                    receipt.transaction_hash
                ))
            })?;
        let wager_index = log_wager_index(log)?;

        info!(
            "Wager {} created by {} against {} for {}",
            wager_index, from, opponent, stake
        );
        Ok(CreatedWager {
            wager_index,
            tx_hash: receipt.transaction_hash,
        })
    }

    async fn accept_wager(
        &self,
        from: Address,
        index: u64,
        stake: Wei,
    ) -> Result<TxHash, EscrowError> {
        let data = abi::encode_call(ACCEPT_WAGER, &[Token::Uint(index as u128)]);
        let receipt = self.send(from, stake, data).await?;
        info!("Wager {} accepted by {}", index, from);
        Ok(receipt.transaction_hash)
    }

    async fn resolve_wager(
        &self,
        from: Address,
        index: u64,
        winner: Address,
    ) -> Result<TxHash, EscrowError> {
        let data = abi::encode_call(
            RESOLVE_WAGER,
            &[Token::Uint(index as u128), Token::Address(winner)],
        );
        let receipt = self.send(from, Wei::ZERO, data).await?;
        info!("Wager {} resolved by {}, winner {}", index, from, winner);
        Ok(receipt.transaction_hash)
    }

    async fn latest_block(&self) -> Result<u64, EscrowError> {
        Ok(self.rpc.block_number().await?)
    }

    async fn touched_wagers(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<u64>, EscrowError> {
        let logs = self.rpc.get_logs(&self.address, from_block, to_block).await?;
        let mut touched = BTreeSet::new();
        for log in &logs {
            match log_wager_index(log) {
                Ok(index) => {
                    touched.insert(index);
                }
                Err(e) => warn!("Ignoring contract log without wager index: {}", e),
            }
        }
        Ok(touched.into_iter().collect())
    }
}
