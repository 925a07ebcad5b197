//! Wager coordination: enumeration, activity aggregation and the HTTP
//! command handlers.
//!
//! ## Module Structure
//!
//! - `ledger`: read-side trait shared by the live contract and the event index
//! - `enumerator`: active wagers for a user
//! - `activity`: seven-day activity snapshot
//! - `handlers`: HTTP endpoint handlers

mod activity;
mod enumerator;
pub mod handlers;
mod ledger;

pub use activity::{compute_activity, day_bucket};
pub use enumerator::list_active_wagers;
pub use ledger::WagerLedger;
