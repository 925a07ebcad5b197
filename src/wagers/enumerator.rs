// Active wager enumeration over the contract's wager array

use tracing::{debug, warn};

use super::WagerLedger;
use crate::chain::Address;
use crate::escrow::EscrowError;
use crate::models::Wager;

/// Unresolved wagers where `user` is creator or opponent, ascending by index.
///
/// Walks every index from 0 to the current count. A single failed fetch is
/// logged and skipped so one bad slot does not take down the listing; only a
/// failure to read the count itself is returned. Without a wallet nothing can
/// match, so the result is empty.
pub async fn list_active_wagers<L>(
    ledger: &L,
    user: Option<&Address>,
) -> Result<Vec<Wager>, EscrowError>
where
    L: WagerLedger + ?Sized,
{
    let Some(user) = user else {
        debug!("No wallet linked, no active wagers to list");
        return Ok(Vec::new());
    };

    let count = ledger.wager_count().await?;
    debug!("Scanning {} wagers for {}", count, user);

    let mut active = Vec::new();
    for index in 0..count {
        let wager = match ledger.wager(index).await {
            Ok(wager) => wager,
            Err(e) => {
                warn!("Error fetching wager {}: {}", index, e);
                continue;
            }
        };
        if !wager.completed && wager.involves(user) {
            active.push(wager);
        }
    }

    debug!("Active wagers found for {}: {}", user, active.len());
    Ok(active)
}
