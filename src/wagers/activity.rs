// Trailing seven-day wager activity

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::WagerLedger;
use crate::escrow::EscrowError;
use crate::models::{ActivitySnapshot, ACTIVITY_DAYS};

/// Which daily bucket a wager created at `created` falls into, if any.
///
/// Wagers stamped in the future (node clock ahead of ours) count as today.
/// Exactly seven days old or older falls outside the histogram.
pub fn day_bucket(now: DateTime<Utc>, created: DateTime<Utc>) -> Option<usize> {
    let age = now.signed_duration_since(created);
    if age < Duration::zero() {
        return Some(0);
    }
    let days = age.num_seconds().div_euclid(Duration::days(1).num_seconds());
    usize::try_from(days).ok().filter(|d| *d < ACTIVITY_DAYS)
}

/// Walk every wager and bucket its stake by creation day.
///
/// Amounts are summed in base units so that the daily buckets can never add up
/// to more than `volume`. Wagers whose record or creation block cannot be
/// fetched are logged and left out of every total.
pub async fn compute_activity<L>(
    ledger: &L,
    now: DateTime<Utc>,
) -> Result<ActivitySnapshot, EscrowError>
where
    L: WagerLedger + ?Sized,
{
    let count = ledger.wager_count().await?;
    let mut snapshot = ActivitySnapshot::default();

    for index in 0..count {
        let wager = match ledger.wager(index).await {
            Ok(wager) => wager,
            Err(e) => {
                warn!("Error processing wager {}: {}", index, e);
                continue;
            }
        };
        let created = match ledger.created_at(&wager).await {
            Ok(created) => created,
            Err(e) => {
                warn!(
                    "Error fetching creation block {} of wager {}: {}",
                    wager.created_block, index, e
                );
                continue;
            }
        };

        if let Some(day) = day_bucket(now, created) {
            snapshot.daily[day] = snapshot.daily[day].saturating_add(wager.amount);
        }
        snapshot.volume = snapshot.volume.saturating_add(wager.amount);
        snapshot.total_wagers += 1;
        if !wager.completed {
            snapshot.active_wagers += 1;
        }
    }

    debug!(
        "Activity: {} wagers ({} active), volume {}",
        snapshot.total_wagers, snapshot.active_wagers, snapshot.volume
    );
    Ok(snapshot)
}
