// In-memory escrow contract used by unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::chain::{Address, ChainError, GameHash, TxHash, Wei};
use crate::escrow::{ContractConnector, EscrowContract, EscrowError};
use crate::models::{CreatedWager, Wager};
use crate::wagers::WagerLedger;

pub fn addr(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address(bytes)
}

pub fn ether(amount: &str) -> Wei {
    Wei::from_ether_str(amount).unwrap()
}

struct Entry {
    wager: Wager,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Chain {
    entries: Vec<Entry>,
    block: u64,
    tx_counter: u8,
    /// (block, wager index) for every state change
    logs: Vec<(u64, u64)>,
}

impl Chain {
    fn next_tx(&mut self, index: u64) -> TxHash {
        self.block += 1;
        self.tx_counter = self.tx_counter.wrapping_add(1);
        self.logs.push((self.block, index));
        TxHash([self.tx_counter; 32])
    }
}

/// Behaves like the escrow contract, including its revert rules
#[derive(Default)]
pub struct FakeEscrow {
    chain: Mutex<Chain>,
    failing: Mutex<HashSet<u64>>,
    count_fails: Mutex<bool>,
}

fn revert(reason: &str) -> EscrowError {
    EscrowError::TransactionRejected {
        reason: format!("execution reverted: {}", reason),
    }
}

impl FakeEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a wager directly, bypassing the write path
    pub fn seed(
        &self,
        creator: Address,
        opponent: Option<Address>,
        amount: Wei,
        completed: bool,
        created_at: DateTime<Utc>,
    ) -> u64 {
        let mut chain = self.chain.lock();
        let index = chain.entries.len() as u64;
        chain.next_tx(index);
        let created_block = chain.block;
        chain.entries.push(Entry {
            wager: Wager {
                index,
                creator,
                opponent,
                amount,
                game_hash: GameHash::from_input(&format!("seed-{}", index)).unwrap_or_default(),
                accepted: completed,
                completed,
                winner: if completed { Some(creator) } else { None },
                created_block,
            },
            created_at,
        });
        index
    }

    /// Make every fetch of `index` fail like a flaky node would
    pub fn fail_fetch(&self, index: u64) {
        self.failing.lock().insert(index);
    }

    pub fn heal_fetch(&self, index: u64) {
        self.failing.lock().remove(&index);
    }

    pub fn fail_count(&self, fail: bool) {
        *self.count_fails.lock() = fail;
    }

    fn node_error() -> EscrowError {
        EscrowError::Chain(ChainError::Decode("connection reset by peer".to_string()))
    }
}

#[async_trait]
impl WagerLedger for FakeEscrow {
    async fn wager_count(&self) -> Result<u64, EscrowError> {
        if *self.count_fails.lock() {
            return Err(Self::node_error());
        }
        Ok(self.chain.lock().entries.len() as u64)
    }

    async fn wager(&self, index: u64) -> Result<Wager, EscrowError> {
        if self.failing.lock().contains(&index) {
            return Err(Self::node_error());
        }
        self.chain
            .lock()
            .entries
            .get(index as usize)
            .map(|e| e.wager.clone())
            .ok_or(EscrowError::NotFound(index))
    }

    async fn created_at(&self, wager: &Wager) -> Result<DateTime<Utc>, EscrowError> {
        self.chain
            .lock()
            .entries
            .get(wager.index as usize)
            .map(|e| e.created_at)
            .ok_or(EscrowError::NotFound(wager.index))
    }
}

#[async_trait]
impl EscrowContract for FakeEscrow {
    fn address(&self) -> Address {
        addr(0xec)
    }

    async fn create_wager(
        &self,
        from: Address,
        opponent: Address,
        game_hash: GameHash,
        stake: Wei,
    ) -> Result<CreatedWager, EscrowError> {
        if stake.is_zero() {
            return Err(revert("Stake must be positive"));
        }
        if opponent == from || opponent.is_zero() {
            return Err(revert("Invalid opponent"));
        }
        let mut chain = self.chain.lock();
        let index = chain.entries.len() as u64;
        let tx_hash = chain.next_tx(index);
        let created_block = chain.block;
        chain.entries.push(Entry {
            wager: Wager {
                index,
                creator: from,
                opponent: Some(opponent),
                amount: stake,
                game_hash,
                accepted: false,
                completed: false,
                winner: None,
                created_block,
            },
            created_at: Utc::now(),
        });
        Ok(CreatedWager {
            wager_index: index,
            tx_hash,
        })
    }

    async fn accept_wager(
        &self,
        from: Address,
        index: u64,
        stake: Wei,
    ) -> Result<TxHash, EscrowError> {
        let mut chain = self.chain.lock();
        let wager = match chain.entries.get_mut(index as usize) {
            Some(entry) => &mut entry.wager,
            None => return Err(revert("Wager does not exist")),
        };
        if wager.accepted {
            return Err(revert("Wager already accepted"));
        }
        if wager.opponent.map(|o| o != from).unwrap_or(false) {
            return Err(revert("Not the invited opponent"));
        }
        if stake != wager.amount {
            return Err(revert("Incorrect stake"));
        }
        wager.opponent = Some(from);
        wager.accepted = true;
        Ok(chain.next_tx(index))
    }

    async fn resolve_wager(
        &self,
        from: Address,
        index: u64,
        winner: Address,
    ) -> Result<TxHash, EscrowError> {
        let mut chain = self.chain.lock();
        let wager = match chain.entries.get_mut(index as usize) {
            Some(entry) => &mut entry.wager,
            None => return Err(revert("Wager does not exist")),
        };
        if !wager.accepted {
            return Err(revert("Wager not accepted"));
        }
        if wager.completed {
            return Err(revert("Wager already resolved"));
        }
        if !wager.involves(&from) || !wager.involves(&winner) {
            return Err(revert("Not a participant"));
        }
        wager.completed = true;
        wager.winner = Some(winner);
        Ok(chain.next_tx(index))
    }

    async fn latest_block(&self) -> Result<u64, EscrowError> {
        Ok(self.chain.lock().block)
    }

    async fn touched_wagers(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<u64>, EscrowError> {
        let touched: BTreeSet<u64> = self
            .chain
            .lock()
            .logs
            .iter()
            .filter(|(block, _)| *block >= from_block && *block <= to_block)
            .map(|(_, index)| *index)
            .collect();
        Ok(touched.into_iter().collect())
    }
}

/// Always hands out the same contract
pub struct FixedConnector(pub Arc<FakeEscrow>);

#[async_trait]
impl ContractConnector for FixedConnector {
    async fn connect(&self) -> Result<Arc<dyn EscrowContract>, EscrowError> {
        Ok(self.0.clone())
    }
}

/// A node that never answers
pub struct DownConnector;

#[async_trait]
impl ContractConnector for DownConnector {
    async fn connect(&self) -> Result<Arc<dyn EscrowContract>, EscrowError> {
        Err(EscrowError::unavailable("connection refused"))
    }
}

/// What the stub node answers to one JSON-RPC request
pub enum Reply {
    Result(serde_json::Value),
    Error { code: i64, message: String },
    /// Answer only after any sane client timeout has expired
    Stall,
}

type Answer = dyn Fn(&str, &serde_json::Value, usize) -> Reply + Send + Sync;

struct StubState {
    answer: Box<Answer>,
    calls: Mutex<Vec<String>>,
}

/// In-process JSON-RPC node on a random local port.
///
/// `answer` receives the method, its params and how many times that method
/// was called before.
pub struct StubNode {
    pub url: String,
    state: Arc<StubState>,
}

impl StubNode {
    pub async fn spawn<F>(answer: F) -> Self
    where
        F: Fn(&str, &serde_json::Value, usize) -> Reply + Send + Sync + 'static,
    {
        let state = Arc::new(StubState {
            answer: Box::new(answer),
            calls: Mutex::new(Vec::new()),
        });
        let app = axum::Router::new()
            .route("/", axum::routing::post(stub_rpc))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { url, state }
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.calls.lock().iter().filter(|m| *m == method).count()
    }

    pub fn client(&self, timeout: std::time::Duration) -> Arc<crate::chain::JsonRpcClient> {
        Arc::new(crate::chain::JsonRpcClient::new(self.url.clone(), timeout).unwrap())
    }
}

async fn stub_rpc(
    axum::extract::State(state): axum::extract::State<Arc<StubState>>,
    axum::Json(request): axum::Json<serde_json::Value>,
) -> axum::Json<serde_json::Value> {
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let seen = {
        let mut calls = state.calls.lock();
        let seen = calls.iter().filter(|m| **m == method).count();
        calls.push(method.clone());
        seen
    };
    let id = request["id"].clone();

    match (state.answer)(&method, &request["params"], seen) {
        Reply::Result(result) => {
            axum::Json(serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result }))
        }
        Reply::Error { code, message } => axum::Json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message }
        })),
        Reply::Stall => {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            axum::Json(serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": null }))
        }
    }
}
