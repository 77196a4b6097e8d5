//! local history store using sled

use std::path::Path;

use async_trait::async_trait;
use sled::{Db, Tree};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::record::{LocalHistoryRecord, StoredRecord};

/// tree holding one row per submitted send, keyed by txid
pub const HISTORY_TREE: &str = "execution_history";

/// row operations the engine needs from local persistence
#[async_trait]
pub trait LocalHistoryStore: Send + Sync {
    /// every record of one wallet, newest first
    async fn records_for_address(&self, address_id: u32) -> Result<Vec<LocalHistoryRecord>>;

    async fn insert(&self, record: &LocalHistoryRecord) -> Result<()>;

    /// removes the row with `txid`; returns whether one existed
    async fn delete(&self, txid: &str) -> Result<bool>;
}

/// read side of the store degrades: a failing read is logged and yields no records
pub async fn records_or_empty<S>(store: &S, address_id: u32) -> Vec<LocalHistoryRecord>
where
    S: LocalHistoryStore + ?Sized,
{
    match store.records_for_address(address_id).await {
        Ok(records) => records,
        Err(e) => {
            warn!("local history unavailable for wallet {}: {}", address_id, e);
            Vec::new()
        }
    }
}

pub struct SledHistoryStore {
    db: Db,
    history: Tree,
}

impl SledHistoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening history store at {}", path.display());
        let db = sled::open(path)?;
        let history = db.open_tree(HISTORY_TREE)?;
        Ok(Self { db, history })
    }

    fn decode_row(bytes: &[u8]) -> Result<LocalHistoryRecord> {
        let row: StoredRecord = serde_json::from_slice(bytes)?;
        row.into_record()
    }
}

#[async_trait]
impl LocalHistoryStore for SledHistoryStore {
    async fn records_for_address(&self, address_id: u32) -> Result<Vec<LocalHistoryRecord>> {
        let mut records = Vec::new();
        for item in self.history.iter() {
            let (key, value) = item?;
            match Self::decode_row(&value) {
                Ok(record) if record.address_id == address_id => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(
                    "skipping unreadable history row {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ),
            }
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn insert(&self, record: &LocalHistoryRecord) -> Result<()> {
        let row = serde_json::to_vec(&StoredRecord::from(record))?;
        self.history.insert(record.txid.as_bytes(), row)?;
        self.db.flush_async().await?;
        debug!("recorded send {} for wallet {}", record.txid, record.address_id);
        Ok(())
    }

    async fn delete(&self, txid: &str) -> Result<bool> {
        let existed = self.history.remove(txid.as_bytes())?.is_some();
        self.db.flush_async().await?;
        debug!("forgot {} (present: {})", txid, existed);
        Ok(existed)
    }
}
