//! wallet node seam
//!
//! [`RemoteLedgerSource`] is everything the engine asks of the node. the
//! HTTP implementation lives in `client`; tests use an in-memory ledger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::Result;
use crate::history::RemoteLedgerRow;
use crate::sync::ScanCursor;
use crate::utxo::UtxoRecord;

/// an unconfirmed transaction as the node's mempool reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTxStatus {
    #[serde(rename = "tx_id")]
    pub txid: String,
    pub status: String,
}

/// balance in raw units (implicit 10^30 scale)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBalance {
    pub available_balance: Amount,
    pub total_balance: Amount,
}

/// balance in coins, truncated to whole units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub available: Amount,
    pub total: Amount,
}

impl From<RawBalance> for WalletBalance {
    fn from(raw: RawBalance) -> Self {
        Self {
            available: raw.available_balance.strip_implicit_scale(),
            total: raw.total_balance.strip_implicit_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutput {
    pub address: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub outputs: Vec<SendOutput>,
    pub fee: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_rule: Option<String>,
    #[serde(default)]
    pub inputs: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub txid: String,
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[async_trait]
pub trait RemoteLedgerSource: Send + Sync {
    async fn tip_height(&self) -> Result<u64>;

    async fn scan_cursor(&self) -> Result<ScanCursor>;

    async fn activity_rows(&self, address: &str) -> Result<Vec<RemoteLedgerRow>>;

    async fn pending_txs(&self, address: &str) -> Result<Vec<PendingTxStatus>>;

    async fn available_utxos(&self, address: &str) -> Result<Vec<UtxoRecord>>;

    async fn balance(&self, address: &str) -> Result<RawBalance>;

    async fn submit_transaction(&self, request: &SendRequest) -> Result<SendResponse>;

    async fn forget_transaction(&self, txid: &str) -> Result<()>;
}
