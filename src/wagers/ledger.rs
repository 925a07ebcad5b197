// Read-side view of the contract's wager array

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::escrow::EscrowError;
use crate::models::Wager;

/// Anything that can answer "how many wagers, what is wager `i`, and when was
/// it created". Implemented by the live escrow client (every call hits the
/// chain) and by the in-memory event index.
#[async_trait]
pub trait WagerLedger: Send + Sync {
    async fn wager_count(&self) -> Result<u64, EscrowError>;

    async fn wager(&self, index: u64) -> Result<Wager, EscrowError>;

    /// Timestamp of the block the wager was created in
    async fn created_at(&self, wager: &Wager) -> Result<DateTime<Utc>, EscrowError>;
}
