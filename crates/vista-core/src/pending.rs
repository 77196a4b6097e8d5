//! pending sends
//!
//! the view mirrors what the node's mempool holds right now, enriched with
//! the local record of each send. a mempool entry with no local record is
//! not shown: there is no fee or recipient to show for it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::amount::Amount;
use crate::error::Result;
use crate::record::{BatchOutput, LocalHistoryRecord};
use crate::remote::{PendingTxStatus, RemoteLedgerSource};
use crate::store::{records_or_empty, LocalHistoryStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub txid: String,
    pub status: String,
    pub timestamp: u64,
    pub height: u64,
    pub address: String,
    pub fee: Amount,
    pub priority_fee: Option<Amount>,
    pub outputs: Vec<String>,
    pub batch_output: Vec<BatchOutput>,
}

/// mempool entries that have a local record, in mempool order
pub fn pending_view(
    remote: &[PendingTxStatus],
    local: &[LocalHistoryRecord],
) -> Vec<PendingEntry> {
    if remote.is_empty() {
        return Vec::new();
    }
    let by_txid: HashMap<&str, &LocalHistoryRecord> =
        local.iter().map(|r| (r.txid.as_str(), r)).collect();

    remote
        .iter()
        .filter_map(|p| {
            let record = by_txid.get(p.txid.as_str())?;
            Some(PendingEntry {
                txid: p.txid.clone(),
                status: p.status.clone(),
                timestamp: record.timestamp,
                height: record.height,
                address: record.address.clone(),
                fee: record.fee.clone(),
                priority_fee: record.priority_fee.clone(),
                outputs: record.outputs.clone(),
                batch_output: record.batch_output.clone(),
            })
        })
        .collect()
}

/// store-backed pending tracker
///
/// writes for one wallet are serialized together with the recompute that
/// follows them.
pub struct PendingTxTracker<R: ?Sized, S: ?Sized> {
    remote: Arc<R>,
    store: Arc<S>,
    write_locks: Mutex<HashMap<u32, Arc<Mutex<()>>>>,
}

impl<R, S> PendingTxTracker<R, S>
where
    R: RemoteLedgerSource + ?Sized,
    S: LocalHistoryStore + ?Sized,
{
    pub fn new(remote: Arc<R>, store: Arc<S>) -> Self {
        Self {
            remote,
            store,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn wallet_lock(&self, address_id: u32) -> Arc<Mutex<()>> {
        self.write_locks
            .lock()
            .await
            .entry(address_id)
            .or_default()
            .clone()
    }

    /// pull both sources concurrently and merge
    ///
    /// a node failure is returned; a store failure reads as no records.
    pub async fn refresh(&self, address_id: u32, address: &str) -> Result<Vec<PendingEntry>> {
        let (remote, local) = tokio::join!(
            self.remote.pending_txs(address),
            records_or_empty(self.store.as_ref(), address_id),
        );
        Ok(pending_view(&remote?, &local))
    }

    /// persist a freshly submitted send, then recompute
    pub async fn add(&self, record: LocalHistoryRecord) -> Result<Vec<PendingEntry>> {
        let lock = self.wallet_lock(record.address_id).await;
        let _guard = lock.lock().await;

        self.store.insert(&record).await?;
        info!("recorded pending send {}", record.txid);
        self.refresh(record.address_id, &record.address).await
    }

    /// drop a send on the node and locally, then recompute
    ///
    /// forgetting a txid that was never recorded is not an error.
    pub async fn forget(
        &self,
        address_id: u32,
        address: &str,
        txid: &str,
    ) -> Result<Vec<PendingEntry>> {
        let lock = self.wallet_lock(address_id).await;
        let _guard = lock.lock().await;

        self.remote.forget_transaction(txid).await?;
        let existed = self.store.delete(txid).await?;
        debug!("forgot {} (had local record: {})", txid, existed);
        self.refresh(address_id, address).await
    }
}
