//! locally persisted send records
//!
//! the node forgets fees, declared outputs and batch recipients once a
//! transaction is mined, so every send submitted from here is recorded with
//! that metadata. records are created on send or import, deleted on forget,
//! and never modified in between.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::amount::Amount;
use crate::error::{Result, VistaError};

/// one recipient of a (possibly batched) send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutput {
    #[serde(default)]
    pub index: u64,
    pub to_address: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalHistoryRecord {
    pub txid: String,
    /// unix millis at submission
    pub timestamp: u64,
    /// synced height at submission
    pub height: u64,
    pub address_id: u32,
    pub address: String,
    pub fee: Amount,
    pub priority_fee: Option<Amount>,
    pub status: Option<String>,
    pub outputs: Vec<String>,
    pub batch_output: Vec<BatchOutput>,
}

impl LocalHistoryRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new_send(
        txid: &str,
        timestamp: u64,
        height: u64,
        address_id: u32,
        address: &str,
        fee: Amount,
        outputs: Vec<String>,
        batch_output: Vec<BatchOutput>,
    ) -> Self {
        Self {
            txid: txid.to_string(),
            timestamp,
            height,
            address_id,
            address: address.to_string(),
            fee,
            priority_fee: None,
            status: None,
            outputs,
            batch_output,
        }
    }
}

/// list-valued column as persisted: a JSON array, or one of the legacy
/// "no data" spellings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredList<T> {
    Absent,
    Present(Vec<T>),
}

const ABSENT_SPELLINGS: [&str; 3] = ["", "[]", "undefined"];

impl<T: Serialize + DeserializeOwned> StoredList<T> {
    /// never fails: sentinels and undecodable JSON both read as absent
    pub fn decode(raw: &str) -> Self {
        if ABSENT_SPELLINGS.contains(&raw.trim()) {
            return StoredList::Absent;
        }
        match serde_json::from_str::<Vec<T>>(raw) {
            Ok(items) if !items.is_empty() => StoredList::Present(items),
            Ok(_) => StoredList::Absent,
            Err(e) => {
                debug!("treating undecodable list column as absent: {}", e);
                StoredList::Absent
            }
        }
    }

    pub fn encode(items: &[T]) -> String {
        if items.is_empty() {
            return String::new();
        }
        serde_json::to_string(items).unwrap_or_default()
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            StoredList::Absent => Vec::new(),
            StoredList::Present(items) => items,
        }
    }
}

/// row form of a record inside the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    pub txid: String,
    pub timestamp: u64,
    pub height: u64,
    pub address_id: u32,
    pub address: String,
    pub fee: String,
    #[serde(default)]
    pub priority_fee: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub outputs: String,
    #[serde(default)]
    pub batch_output: String,
}

impl From<&LocalHistoryRecord> for StoredRecord {
    fn from(r: &LocalHistoryRecord) -> Self {
        Self {
            txid: r.txid.clone(),
            timestamp: r.timestamp,
            height: r.height,
            address_id: r.address_id,
            address: r.address.clone(),
            fee: r.fee.to_string(),
            priority_fee: r.priority_fee.as_ref().map(|f| f.to_string()).unwrap_or_default(),
            status: r.status.clone().unwrap_or_default(),
            outputs: StoredList::encode(&r.outputs),
            batch_output: StoredList::encode(&r.batch_output),
        }
    }
}

impl StoredRecord {
    /// fee columns must parse; list columns degrade to empty
    pub fn into_record(self) -> Result<LocalHistoryRecord> {
        let fee = self.fee.parse::<Amount>().map_err(VistaError::from)?;
        let priority_fee = match self.priority_fee.as_str() {
            "" => None,
            raw => Some(raw.parse::<Amount>()?),
        };

        Ok(LocalHistoryRecord {
            txid: self.txid,
            timestamp: self.timestamp,
            height: self.height,
            address_id: self.address_id,
            address: self.address,
            fee,
            priority_fee,
            status: (!self.status.is_empty()).then_some(self.status),
            outputs: StoredList::<String>::decode(&self.outputs).into_vec(),
            batch_output: StoredList::<BatchOutput>::decode(&self.batch_output).into_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_absent() {
        for raw in ["", "[]", "undefined", "  "] {
            assert_eq!(StoredList::<String>::decode(raw), StoredList::Absent);
        }
    }

    #[test]
    fn test_malformed_json_is_absent() {
        assert_eq!(StoredList::<String>::decode("[\"a\","), StoredList::Absent);
        assert_eq!(StoredList::<String>::decode("{\"a\":1}"), StoredList::Absent);
        // amounts inside batch outputs are validated too
        let bad = r#"[{"to_address":"nolgam1x","amount":"lots"}]"#;
        assert_eq!(StoredList::<BatchOutput>::decode(bad), StoredList::Absent);
    }

    #[test]
    fn test_present_list() {
        let decoded = StoredList::<String>::decode(r#"["utxo-a","utxo-b"]"#);
        assert_eq!(
            decoded,
            StoredList::Present(vec!["utxo-a".to_string(), "utxo-b".to_string()])
        );
    }

    #[test]
    fn test_empty_encodes_as_absent_spelling() {
        assert_eq!(StoredList::<String>::encode(&[]), "");
    }

    #[test]
    fn test_stored_row_keeps_metadata() {
        let record = LocalHistoryRecord::new_send(
            "t1",
            1_700_000_000_000,
            420,
            3,
            "nolgam1sender",
            "0.05".parse().unwrap(),
            vec!["out-1".into()],
            vec![BatchOutput {
                index: 0,
                to_address: "nolgam1recipient".into(),
                amount: "12.5".parse().unwrap(),
            }],
        );
        let row = StoredRecord::from(&record);
        assert_eq!(row.priority_fee, "");
        assert_eq!(row.into_record().unwrap(), record);
    }

    #[test]
    fn test_corrupt_fee_is_an_error() {
        let row = StoredRecord {
            txid: "t1".into(),
            timestamp: 0,
            height: 0,
            address_id: 0,
            address: String::new(),
            fee: "undefined".into(),
            priority_fee: String::new(),
            status: String::new(),
            outputs: String::new(),
            batch_output: String::new(),
        };
        assert!(row.into_record().is_err());
    }
}
