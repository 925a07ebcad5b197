// Wager models and API request/response payloads

use serde::{Deserialize, Serialize};

use crate::chain::{Address, EtherAmount, GameHash, TxHash, Wei};

/// Days covered by the activity histogram
pub const ACTIVITY_DAYS: usize = 7;

/// Wager record as stored by the escrow contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wager {
    pub index: u64,
    pub creator: Address,
    /// Unset (zero address on chain) until named or accepted
    pub opponent: Option<Address>,
    pub amount: Wei,
    pub game_hash: GameHash,
    pub accepted: bool,
    pub completed: bool,
    /// Only meaningful once `completed`
    pub winner: Option<Address>,
    /// Block the wager was created in
    pub created_block: u64,
}

impl Wager {
    pub fn involves(&self, user: &Address) -> bool {
        self.creator == *user || self.opponent.as_ref() == Some(user)
    }
}

/// Result of a successful `createWager` transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedWager {
    pub wager_index: u64,
    pub tx_hash: TxHash,
}

/// Aggregate activity, recomputed on every request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySnapshot {
    /// Per-day volume, index 0 = today
    pub daily: [Wei; ACTIVITY_DAYS],
    pub volume: Wei,
    pub total_wagers: u64,
    pub active_wagers: u64,
}

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Wager as returned to the browser client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WagerView {
    pub id: u64,
    pub creator: Address,
    pub opponent: Option<Address>,
    /// Decimal ether string
    pub amount: String,
    pub game_hash: GameHash,
    pub accepted: bool,
    pub completed: bool,
    pub winner: Option<Address>,
}

impl From<&Wager> for WagerView {
    fn from(wager: &Wager) -> Self {
        Self {
            id: wager.index,
            creator: wager.creator,
            opponent: wager.opponent,
            amount: wager.amount.to_ether_string(),
            game_hash: wager.game_hash,
            accepted: wager.accepted,
            completed: wager.completed,
            winner: if wager.completed { wager.winner } else { None },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub daily: [f64; ACTIVITY_DAYS],
    pub volume: f64,
    pub total_wagers: u64,
    pub active_wagers: u64,
}

impl From<&ActivitySnapshot> for ActivityResponse {
    fn from(snapshot: &ActivitySnapshot) -> Self {
        Self {
            daily: snapshot.daily.map(|w| w.to_ether_f64()),
            volume: snapshot.volume.to_ether_f64(),
            total_wagers: snapshot.total_wagers,
            active_wagers: snapshot.active_wagers,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWagerResponse {
    pub wager_id: u64,
    pub transaction_hash: TxHash,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub success: bool,
    pub transaction_hash: TxHash,
}

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Fields are optional so that missing values surface as a 400 with a
/// readable message instead of a JSON rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWagerRequest {
    pub opponent: Option<String>,
    pub amount: Option<EtherAmount>,
    pub game_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptWagerRequest {
    pub amount: Option<EtherAmount>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveWagerRequest {
    pub winner: Option<String>,
}
