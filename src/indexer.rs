// Event-driven wager index: backfill once, then follow contract logs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::escrow::{ContractBootstrap, EscrowContract, EscrowError};
use crate::models::Wager;
use crate::wagers::WagerLedger;

/// Most blocks requested from `eth_getLogs` per poll
const BLOCK_BATCH: u64 = 2_000;

#[derive(Debug, Clone)]
struct IndexedWager {
    wager: Wager,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Book {
    wagers: BTreeMap<u64, IndexedWager>,
    /// Contract-side wager count as of the last poll
    count: u64,
    /// Indices whose last refresh failed; retried on every poll
    pending: BTreeSet<u64>,
}

/// In-memory copy of the contract's wager array, keyed by index
#[derive(Default)]
pub struct WagerIndex {
    book: RwLock<Book>,
    backfilled: AtomicBool,
}

impl WagerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the initial backfill has completed and no refresh is
    /// outstanding, i.e. every entry matches the chain as of the last poll
    pub fn is_synced(&self) -> bool {
        self.backfilled.load(Ordering::Acquire) && self.book.read().pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.book.read().wagers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-read one wager from the contract. On failure the previous entry
    /// stays in place and the index is queued for the next poll.
    pub async fn refresh(
        &self,
        contract: &dyn EscrowContract,
        index: u64,
    ) -> Result<(), EscrowError> {
        let fetched = match contract.wager(index).await {
            Ok(wager) => contract
                .created_at(&wager)
                .await
                .map(|created_at| IndexedWager { wager, created_at }),
            Err(e) => Err(e),
        };

        let mut book = self.book.write();
        match fetched {
            Ok(entry) => {
                book.count = book.count.max(index + 1);
                book.wagers.insert(index, entry);
                book.pending.remove(&index);
                Ok(())
            }
            Err(e) => {
                warn!("Indexer: failed to refresh wager {}: {}", index, e);
                book.pending.insert(index);
                Err(e)
            }
        }
    }

    fn set_count(&self, count: u64) {
        let mut book = self.book.write();
        book.count = book.count.max(count);
    }

    fn count(&self) -> u64 {
        self.book.read().count
    }

    fn pending(&self) -> BTreeSet<u64> {
        self.book.read().pending.clone()
    }
}

#[async_trait]
impl WagerLedger for WagerIndex {
    async fn wager_count(&self) -> Result<u64, EscrowError> {
        Ok(self.count())
    }

    async fn wager(&self, index: u64) -> Result<Wager, EscrowError> {
        self.book
            .read()
            .wagers
            .get(&index)
            .map(|w| w.wager.clone())
            .ok_or(EscrowError::NotFound(index))
    }

    async fn created_at(&self, wager: &Wager) -> Result<DateTime<Utc>, EscrowError> {
        self.book
            .read()
            .wagers
            .get(&wager.index)
            .map(|w| w.created_at)
            .ok_or(EscrowError::NotFound(wager.index))
    }
}

pub struct Indexer {
    bootstrap: Arc<ContractBootstrap>,
    index: Arc<WagerIndex>,
    poll_interval: Duration,
}

impl Indexer {
    pub fn new(
        bootstrap: Arc<ContractBootstrap>,
        index: Arc<WagerIndex>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            bootstrap,
            index,
            poll_interval,
        }
    }

    pub async fn run(&self) {
        info!("Starting wager indexer (poll every {:?})", self.poll_interval);

        let mut cursor: Option<u64> = None;

        loop {
            match self.bootstrap.ensure_ready().await {
                Ok(contract) => {
                    if let Err(e) = sync_once(contract.as_ref(), &self.index, &mut cursor).await {
                        error!("Error processing wager events: {}", e);
                    }
                }
                Err(e) => warn!("Indexer waiting for contract: {}", e),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Refresh each index, returning how many failed
async fn refresh_all(
    contract: &dyn EscrowContract,
    index: &WagerIndex,
    wagers: impl IntoIterator<Item = u64>,
) -> usize {
    let mut failed = 0;
    for i in wagers {
        if index.refresh(contract, i).await.is_err() {
            failed += 1;
        }
    }
    failed
}

/// One indexer step. `cursor` is the last block already applied; `None`
/// means the index has not been backfilled yet. Wagers that fail to refresh
/// stay pending and are retried on the following steps, so the cursor can
/// move on without losing their updates.
pub async fn sync_once(
    contract: &dyn EscrowContract,
    index: &WagerIndex,
    cursor: &mut Option<u64>,
) -> Result<(), EscrowError> {
    let head = contract.latest_block().await?;

    let Some(last) = *cursor else {
        let count = contract.wager_count().await?;
        info!("Indexer: backfilling {} wagers up to block {}", count, head);
        let failed = refresh_all(contract, index, 0..count).await;
        index.set_count(count);
        index.backfilled.store(true, Ordering::Release);
        *cursor = Some(head);
        if failed > 0 {
            warn!("Indexer: {} wagers failed to load, retrying on next poll", failed);
        }
        info!("Indexer: loaded {} of {} wagers", index.len(), count);
        return Ok(());
    };

    let mut stale = index.pending();

    let to = head.min(last + BLOCK_BATCH);
    let known = index.count();
    let count = if head > last {
        let touched = contract.touched_wagers(last + 1, to).await?;
        let count = contract.wager_count().await?;
        if !touched.is_empty() || count > known {
            debug!(
                "Indexer: blocks {}..={} touched {:?}, count {} -> {}",
                last + 1,
                to,
                touched,
                known,
                count
            );
        }
        stale.extend(touched.into_iter().filter(|i| *i < known));
        stale.extend(known..count);
        count
    } else {
        known
    };

    let failed = refresh_all(contract, index, stale).await;
    if failed > 0 {
        warn!("Indexer: {} wagers still pending", failed);
    }
    index.set_count(count);

    *cursor = Some(to.max(last));
    Ok(())
}
