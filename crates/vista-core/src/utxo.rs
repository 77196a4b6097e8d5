//! spendable output catalog

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub id: u64,
    pub hash: String,
    pub confirm_height: u64,
    /// unix millis
    pub confirm_timestamp: u64,
    #[serde(default)]
    pub confirmed_txid: Option<String>,
    pub locked: bool,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtxoSort {
    #[default]
    Amount,
    Id,
}

impl FromStr for UtxoSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "amount" => Ok(UtxoSort::Amount),
            "id" => Ok(UtxoSort::Id),
            other => Err(format!("unknown utxo sort: {}", other)),
        }
    }
}

impl fmt::Display for UtxoSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UtxoSort::Amount => "amount",
            UtxoSort::Id => "id",
        })
    }
}

/// sorted, filtered view over the node's available outputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoCatalog {
    records: Vec<UtxoRecord>,
}

impl UtxoCatalog {
    /// descending by the sort key; locked outputs dropped unless `contain_locked`
    pub fn new(mut records: Vec<UtxoRecord>, sort: UtxoSort, contain_locked: bool) -> Self {
        match sort {
            UtxoSort::Amount => records.sort_by(|a, b| b.amount.cmp(&a.amount)),
            UtxoSort::Id => records.sort_by(|a, b| b.id.cmp(&a.id)),
        }
        if !contain_locked {
            records.retain(|r| !r.locked);
        }
        Self { records }
    }

    pub fn records(&self) -> &[UtxoRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// exact sum of every listed output
    pub fn total(&self) -> Amount {
        self.records.iter().map(|r| &r.amount).sum()
    }

    /// exact sum of the outputs whose id is in `ids`; unknown ids add nothing
    pub fn select_total(&self, ids: &[u64]) -> Amount {
        self.records
            .iter()
            .filter(|r| ids.contains(&r.id))
            .map(|r| &r.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(id: u64, amount: &str, locked: bool) -> UtxoRecord {
        UtxoRecord {
            id,
            hash: format!("{:064x}", id),
            confirm_height: 100 + id,
            confirm_timestamp: 1_700_000_000_000,
            confirmed_txid: None,
            locked,
            amount: amount.parse().unwrap(),
        }
    }

    fn ids(catalog: &UtxoCatalog) -> Vec<u64> {
        catalog.records().iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_sort_by_amount() {
        let catalog = UtxoCatalog::new(
            vec![utxo(1, "5", false), utxo(2, "10", false)],
            UtxoSort::Amount,
            false,
        );
        assert_eq!(ids(&catalog), vec![2, 1]);
    }

    #[test]
    fn test_sort_by_amount_is_numeric() {
        // lexically "9" > "10.5" > "10"
        let catalog = UtxoCatalog::new(
            vec![utxo(1, "9", false), utxo(2, "10", false), utxo(3, "10.5", false)],
            UtxoSort::Amount,
            false,
        );
        assert_eq!(ids(&catalog), vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_by_id() {
        let catalog = UtxoCatalog::new(
            vec![utxo(3, "1", false), utxo(11, "1", false), utxo(7, "1", false)],
            UtxoSort::Id,
            false,
        );
        assert_eq!(ids(&catalog), vec![11, 7, 3]);
    }

    #[test]
    fn test_locked_filter() {
        let records = vec![utxo(1, "5", true), utxo(2, "10", false)];
        let unlocked = UtxoCatalog::new(records.clone(), UtxoSort::Amount, false);
        assert_eq!(ids(&unlocked), vec![2]);

        let all = UtxoCatalog::new(records, UtxoSort::Amount, true);
        assert_eq!(ids(&all), vec![2, 1]);
    }

    #[test]
    fn test_select_total_is_exact() {
        let catalog = UtxoCatalog::new(
            vec![
                utxo(1, "0.1", false),
                utxo(2, "0.2", false),
                utxo(3, "123456789012345678901234567890.000000000000000000000000000001", false),
            ],
            UtxoSort::Id,
            false,
        );
        assert_eq!(catalog.select_total(&[1, 2]).to_string(), "0.3");
        assert_eq!(
            catalog.select_total(&[1, 3]).to_string(),
            "123456789012345678901234567890.100000000000000000000000000001"
        );
        assert_eq!(catalog.select_total(&[42]), Amount::zero());
        assert_eq!(catalog.total().to_string(), "123456789012345678901234567890.300000000000000000000000000001");
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{"id":4,"hash":"ab","confirm_timestamp":1,"confirm_height":2,"amount":"12.5","locked":false}"#;
        let record: UtxoRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.confirmed_txid, None);
        assert_eq!(record.amount.to_string(), "12.5");
    }
}
