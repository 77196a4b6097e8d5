//! vista core - reconciled wallet view over a remote node
//!
//! the node knows what happened on chain; the local store knows what this
//! wallet sent and why (fees, declared outputs, batch recipients). this crate
//! merges the two into one exact, idempotent view:
//! - history collapsed per block height and backfilled from local records
//! - seven-day income/expense buckets
//! - spendable outputs with exact selection totals
//! - pending sends as the mempool sees them
//!
//! all merging is pure; [`app::WalletCore`] decides when to re-pull and
//! [`executor`] does the pulling.

pub mod amount;
pub mod app;
pub mod daily;
pub mod error;
pub mod executor;
pub mod history;
pub mod pending;
pub mod record;
pub mod remote;
pub mod store;
pub mod sync;
pub mod utxo;

#[cfg(feature = "client")]
pub mod client;

pub use amount::{Amount, ArithmeticError};
pub use app::{Effect, Event, Fetched, NotificationLevel, Request, ViewModel, WalletCore, WalletId};
pub use daily::{aggregate_daily, DayBucket};
pub use error::{Result, VistaError};
pub use executor::EffectExecutor;
pub use history::{collapse_by_height, reconcile, HistoryFilter, MergedHistoryEntry, RemoteLedgerRow};
pub use pending::{pending_view, PendingEntry, PendingTxTracker};
pub use record::{BatchOutput, LocalHistoryRecord, StoredList};
pub use remote::{
    PendingTxStatus, RawBalance, RemoteLedgerSource, SendOutput, SendRequest, SendResponse,
    WalletBalance,
};
pub use store::{LocalHistoryStore, SledHistoryStore};
pub use sync::{ScanCursor, SyncState, SyncStateTracker, SyncUpdate};
pub use utxo::{UtxoCatalog, UtxoRecord, UtxoSort};

#[cfg(feature = "client")]
pub use client::RestLedgerClient;

/// default seconds between poll ticks
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// default per-request timeout against the node
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
