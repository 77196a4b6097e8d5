//! seven-day income/expense buckets for charting

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::amount::{Amount, DISPLAY_DIGITS};
use crate::history::MergedHistoryEntry;

/// number of calendar slots, today included
pub const DAY_SLOTS: i64 = 7;

pub const TODAY_LABEL: &str = "Today";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    /// lowest height seen that day, 0 while unset
    pub start_height: u64,
    pub end_height: u64,
    pub received: Amount,
    pub spent: Amount,
    /// unix millis of the slot's reference instant
    pub timestamp: i64,
    pub label: String,
}

impl DayBucket {
    fn record(&mut self, entry: &MergedHistoryEntry) {
        // charted values are the displayed ones
        let shown = entry.amount.abs().truncate(DISPLAY_DIGITS);
        if entry.is_positive {
            self.received = &self.received + &shown;
        } else {
            self.spent = &self.spent + &shown;
        }
        if self.start_height == 0 || entry.height < self.start_height {
            self.start_height = entry.height;
        }
        if entry.height > self.end_height {
            self.end_height = entry.height;
        }
    }
}

/// bucket entries into today and the six preceding days of `now`'s zone
///
/// oldest first; days without activity are left out.
pub fn aggregate_daily<Tz: TimeZone>(
    entries: &[MergedHistoryEntry],
    now: &DateTime<Tz>,
) -> Vec<DayBucket> {
    let zone = now.timezone();

    let mut slots: Vec<(NaiveDate, DayBucket)> = (0..DAY_SLOTS)
        .rev()
        .map(|i| {
            let at = now.clone() - Duration::hours(24 * i);
            let date = at.date_naive();
            let label = if i == 0 {
                TODAY_LABEL.to_string()
            } else {
                date.format("%Y-%m-%d").to_string()
            };
            let bucket = DayBucket {
                start_height: 0,
                end_height: 0,
                received: Amount::zero(),
                spent: Amount::zero(),
                timestamp: at.timestamp_millis(),
                label,
            };
            (date, bucket)
        })
        .collect();

    for entry in entries {
        let Some(date) = i64::try_from(entry.timestamp)
            .ok()
            .and_then(|ms| zone.timestamp_millis_opt(ms).single())
            .map(|at| at.date_naive())
        else {
            continue;
        };
        if let Some((_, bucket)) = slots.iter_mut().find(|(d, _)| *d == date) {
            bucket.record(entry);
        }
    }

    slots
        .into_iter()
        .map(|(_, bucket)| bucket)
        .filter(|bucket| bucket.end_height != 0)
        .collect()
}
