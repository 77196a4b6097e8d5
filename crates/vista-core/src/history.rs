//! history reconciliation
//!
//! the node reports one row per affected output; a send touching three
//! outputs shows up as three rows at one height. rows are collapsed per
//! height, enriched with whatever the local store remembers about the send,
//! then signed, filtered and ordered newest first.
//!
//! everything here is a pure function of `(rows, local records, filter)`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::record::{BatchOutput, LocalHistoryRecord};

/// one node ledger row: the effect of a block on a single output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLedgerRow {
    pub height: u64,
    pub index: u64,
    pub amount: Amount,
    /// unix millis of the block
    pub timestamp: u64,
    #[serde(default)]
    pub release_date: Option<u64>,
    #[serde(default)]
    pub txid: Option<String>,
}

impl RemoteLedgerRow {
    fn txid(&self) -> Option<&str> {
        self.txid.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryFilter {
    #[default]
    All,
    Send,
    Receive,
}

impl HistoryFilter {
    fn admits(self, is_positive: bool) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Send => !is_positive,
            HistoryFilter::Receive => is_positive,
        }
    }
}

impl FromStr for HistoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(HistoryFilter::All),
            "send" => Ok(HistoryFilter::Send),
            "receive" => Ok(HistoryFilter::Receive),
            other => Err(format!("unknown history filter: {}", other)),
        }
    }
}

impl fmt::Display for HistoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HistoryFilter::All => "all",
            HistoryFilter::Send => "send",
            HistoryFilter::Receive => "receive",
        };
        f.write_str(name)
    }
}

/// raw row sharing an entry's height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryUtxo {
    pub id: u64,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedHistoryEntry {
    pub txid: Option<String>,
    /// sending address, known only for sends made from this wallet
    pub from: Option<String>,
    pub fee: Option<Amount>,
    pub priority_fee: Option<Amount>,
    pub outputs: Vec<String>,
    pub batch_output: Vec<BatchOutput>,
    /// exact net change at this height
    pub amount: Amount,
    pub is_positive: bool,
    /// "+ 1.2345" / "- 1.2345"
    pub change_amount: String,
    /// "Received 1.2345" / "Sent 1.2345"
    pub message: String,
    pub timestamp: u64,
    pub height: u64,
    pub index: u64,
    pub release_date: Option<u64>,
    pub utxos: Vec<HistoryUtxo>,
}

/// merge rows sharing a height into one
///
/// amounts are summed exactly, the first row of a height supplies the other
/// fields, and the last non-empty txid wins. order of first appearance is
/// kept, so collapsing twice changes nothing.
pub fn collapse_by_height(rows: &[RemoteLedgerRow]) -> Vec<RemoteLedgerRow> {
    let mut collapsed: Vec<RemoteLedgerRow> = Vec::new();
    let mut position: HashMap<u64, usize> = HashMap::new();

    for row in rows {
        match position.get(&row.height) {
            Some(&i) => {
                let merged = &mut collapsed[i];
                merged.amount = &merged.amount + &row.amount;
                if let Some(txid) = row.txid() {
                    merged.txid = Some(txid.to_string());
                }
            }
            None => {
                position.insert(row.height, collapsed.len());
                collapsed.push(row.clone());
            }
        }
    }
    collapsed
}

/// reconciled, filtered history, newest first
pub fn reconcile(
    rows: &[RemoteLedgerRow],
    local: &[LocalHistoryRecord],
    filter: HistoryFilter,
) -> Vec<MergedHistoryEntry> {
    let by_txid: HashMap<&str, &LocalHistoryRecord> =
        local.iter().map(|r| (r.txid.as_str(), r)).collect();

    let mut entries: Vec<MergedHistoryEntry> = collapse_by_height(rows)
        .into_iter()
        .map(|row| merge_row(row, rows, &by_txid))
        .filter(|entry| filter.admits(entry.is_positive))
        .collect();

    // stable, so equal timestamps keep ledger order
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}

fn merge_row(
    row: RemoteLedgerRow,
    raw: &[RemoteLedgerRow],
    by_txid: &HashMap<&str, &LocalHistoryRecord>,
) -> MergedHistoryEntry {
    let is_positive = !row.amount.is_negative();
    let shown = row.amount.to_absolute_display();
    let (sign, verb) = if is_positive {
        ("+ ", "Received ")
    } else {
        ("- ", "Sent ")
    };

    let backfill = row.txid().and_then(|txid| by_txid.get(txid).copied());
    let utxos = raw
        .iter()
        .filter(|r| r.height == row.height)
        .map(|r| HistoryUtxo {
            id: r.index,
            amount: r.amount.clone(),
        })
        .collect();

    MergedHistoryEntry {
        txid: row.txid().map(str::to_string),
        from: backfill.map(|r| r.address.clone()),
        fee: backfill.map(|r| r.fee.clone()),
        priority_fee: backfill.and_then(|r| r.priority_fee.clone()),
        outputs: backfill.map(|r| r.outputs.clone()).unwrap_or_default(),
        batch_output: backfill.map(|r| r.batch_output.clone()).unwrap_or_default(),
        change_amount: format!("{}{}", sign, shown),
        message: format!("{}{}", verb, shown),
        amount: row.amount,
        is_positive,
        timestamp: row.timestamp,
        height: row.height,
        index: row.index,
        release_date: row.release_date,
        utxos,
    }
}
