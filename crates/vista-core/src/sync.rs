//! sync state: remote tip height vs local scan cursor
//!
//! the tracker only folds observations into `{latest_block, synced_block}`.
//! what to re-pull is decided by the caller from the returned [`SyncUpdate`].

use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// node-side scan position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    pub height: u64,
    pub syncing: bool,
    pub updated_to_tip: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub latest_block: u64,
    pub synced_block: u64,
}

impl SyncState {
    pub fn is_caught_up(&self) -> bool {
        self.synced_block != 0 && self.synced_block >= self.latest_block
    }

    /// synced / latest in percent, capped at 100
    pub fn progress_percent(&self) -> f64 {
        if self.latest_block == 0 {
            return 0.0;
        }
        Amount::from(self.synced_block)
            .ratio(&Amount::from(self.latest_block))
            .map(|r| (r * 100.0).min(100.0))
            .unwrap_or(0.0)
    }
}

/// consequence of folding one observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncUpdate {
    /// `Some(true)` when the view just caught up, `Some(false)` when it fell behind
    pub caught_up: Option<bool>,
    /// synced height passed the cached tip, so the tip must be re-queried
    pub refresh_tip: bool,
    /// either height moved
    pub heights_changed: bool,
}

impl SyncUpdate {
    pub fn became_caught_up(&self) -> bool {
        self.caught_up == Some(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncStateTracker {
    state: SyncState,
    cursor: ScanCursor,
}

impl SyncStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn cursor(&self) -> ScanCursor {
        self.cursor
    }

    pub fn is_caught_up(&self) -> bool {
        self.state.is_caught_up()
    }

    /// tip height fetched from the node
    pub fn on_tip(&mut self, tip: u64) -> SyncUpdate {
        let mut update = self.apply(|s| s.latest_block = tip);
        // a tip below the cursor must not loop back into another tip query
        update.refresh_tip = false;
        update
    }

    /// periodic poll of the scan cursor
    pub fn on_poll(&mut self, cursor: ScanCursor) -> SyncUpdate {
        self.cursor = cursor;
        self.apply(|s| s.synced_block = cursor.height)
    }

    /// pushed height-progress event; last write wins
    pub fn on_height_progress(&mut self, height: u64) -> SyncUpdate {
        self.cursor.height = height;
        self.apply(|s| s.synced_block = height)
    }

    /// sync-finished push, after the tip was re-queried
    pub fn on_sync_finished(&mut self, tip: u64) -> SyncUpdate {
        self.cursor = ScanCursor {
            height: tip,
            syncing: false,
            updated_to_tip: true,
        };
        let mut update = self.apply(|s| {
            s.latest_block = tip;
            s.synced_block = tip;
        });
        update.refresh_tip = false;
        update
    }

    fn apply(&mut self, change: impl FnOnce(&mut SyncState)) -> SyncUpdate {
        let before = self.state;
        change(&mut self.state);
        let after = self.state;

        SyncUpdate {
            caught_up: (before.is_caught_up() != after.is_caught_up())
                .then_some(after.is_caught_up()),
            refresh_tip: after.synced_block > after.latest_block,
            heights_changed: before != after,
        }
    }
}
