//! wallet view core - pure business logic with no side effects
//!
//! every trigger (poll tick, node push, user action) goes through
//! [`WalletCore::update`], which folds it into the state container and
//! returns the effects the shell must run. fetch results come back as
//! events tagged with the generation that requested them; a wallet switch
//! bumps the generation so late results for the old wallet are dropped.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::debug;

use crate::amount::Amount;
use crate::daily::{aggregate_daily, DayBucket};
use crate::history::{reconcile, HistoryFilter, MergedHistoryEntry, RemoteLedgerRow};
use crate::pending::PendingEntry;
use crate::record::LocalHistoryRecord;
use crate::remote::{RawBalance, SendRequest, WalletBalance};
use crate::sync::{ScanCursor, SyncState, SyncStateTracker, SyncUpdate};
use crate::utxo::{UtxoCatalog, UtxoRecord, UtxoSort};

/// which wallet the view belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletId {
    pub address_id: u32,
    pub address: String,
}

/// work the shell performs against the node and the local store
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Tip,
    Cursor,
    /// tip re-query after a sync-finished push
    FinishedTip,
    History,
    Utxos,
    Balance,
    Pending,
    Submit { request: SendRequest, height: u64 },
    Forget { txid: String },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Tip | Request::FinishedTip => "tip height",
            Request::Cursor => "scan state",
            Request::History => "history",
            Request::Utxos => "utxos",
            Request::Balance => "balance",
            Request::Pending => "pending transactions",
            Request::Submit { .. } => "send",
            Request::Forget { .. } => "forget",
        }
    }

    fn is_user_action(&self) -> bool {
        matches!(self, Request::Submit { .. } | Request::Forget { .. })
    }

    /// reads that make up the wallet view once caught up
    fn is_ledger_read(&self) -> bool {
        matches!(
            self,
            Request::History | Request::Utxos | Request::Balance | Request::Pending
        )
    }
}

/// result of a [`Request`]
#[derive(Debug, Clone)]
pub enum Fetched {
    Tip(u64),
    Cursor(ScanCursor),
    FinishedTip(u64),
    /// both sources, fetched together
    History {
        rows: Vec<RemoteLedgerRow>,
        local: Vec<LocalHistoryRecord>,
        now: DateTime<FixedOffset>,
    },
    Utxos(Vec<UtxoRecord>),
    Balance(RawBalance),
    Pending(Vec<PendingEntry>),
    Sent { txid: String, pending: Vec<PendingEntry> },
    Forgotten { txid: String, pending: Vec<PendingEntry> },
}

#[derive(Debug, Clone)]
pub enum Event {
    // ===== triggers =====
    PollTick,
    HeightProgress(u64),
    SyncFinished,
    SendState(String),

    // ===== user actions =====
    SwitchWallet(WalletId),
    SetHistoryFilter(HistoryFilter),
    SetUtxoView { sort: UtxoSort, contain_locked: bool },
    SelectUtxos(Vec<u64>),
    Send(SendRequest),
    Forget { txid: String },

    // ===== results =====
    Fetched { generation: u64, result: Fetched },
    Failed {
        generation: u64,
        request: Request,
        error: String,
        network: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render(ViewModel),
    Perform {
        generation: u64,
        wallet: WalletId,
        request: Request,
    },
    Notify {
        message: String,
        level: NotificationLevel,
    },
}

impl Effect {
    pub fn success(message: impl Into<String>) -> Self {
        Effect::Notify {
            message: message.into(),
            level: NotificationLevel::Success,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Effect::Notify {
            message: message.into(),
            level: NotificationLevel::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Effect::Notify {
            message: message.into(),
            level: NotificationLevel::Error,
        }
    }
}

/// what the shell renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub wallet: WalletId,
    pub sync: SyncState,
    pub progress_percent: f64,
    pub caught_up: bool,
    pub syncing: bool,
    pub updated_to_tip: bool,
    pub balance: Option<WalletBalance>,
    pub history_filter: HistoryFilter,
    pub history: Vec<MergedHistoryEntry>,
    pub daily: Vec<DayBucket>,
    pub utxo_sort: UtxoSort,
    pub contain_locked: bool,
    pub utxos: Vec<UtxoRecord>,
    pub utxo_total: Amount,
    pub selected_utxos: Vec<u64>,
    pub selected_total: Amount,
    pub pending: Vec<PendingEntry>,
    pub send_state: Option<String>,
}

/// last complete fetch of both history sources
#[derive(Debug, Clone)]
struct HistorySnapshot {
    rows: Vec<RemoteLedgerRow>,
    local: Vec<LocalHistoryRecord>,
    now: DateTime<FixedOffset>,
}

pub struct WalletCore {
    wallet: WalletId,
    generation: u64,
    sync: SyncStateTracker,

    history_filter: HistoryFilter,
    snapshot: Option<HistorySnapshot>,
    history: Vec<MergedHistoryEntry>,
    daily: Vec<DayBucket>,

    utxo_sort: UtxoSort,
    contain_locked: bool,
    raw_utxos: Vec<UtxoRecord>,
    catalog: UtxoCatalog,
    selected_utxos: Vec<u64>,

    balance: Option<WalletBalance>,
    pending: Vec<PendingEntry>,
    send_state: Option<String>,

    /// ledger reads that failed in this generation, re-issued on the next tick
    retry: Vec<Request>,
}

impl WalletCore {
    pub fn new(wallet: WalletId) -> Self {
        Self {
            wallet,
            generation: 0,
            sync: SyncStateTracker::new(),
            history_filter: HistoryFilter::All,
            snapshot: None,
            history: Vec::new(),
            daily: Vec::new(),
            utxo_sort: UtxoSort::Amount,
            contain_locked: false,
            raw_utxos: Vec::new(),
            catalog: UtxoCatalog::default(),
            selected_utxos: Vec::new(),
            balance: None,
            pending: Vec::new(),
            send_state: None,
            retry: Vec::new(),
        }
    }

    pub fn wallet(&self) -> &WalletId {
        &self.wallet
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn update(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::PollTick => {
                let mut effects = vec![
                    self.perform(Request::Tip),
                    self.perform(Request::Cursor),
                    self.perform(Request::Pending),
                ];
                if self.sync.is_caught_up() {
                    let mut requests = vec![Request::Balance];
                    for request in &self.retry {
                        if !requests.contains(request) && *request != Request::Pending {
                            requests.push(request.clone());
                        }
                    }
                    effects.extend(requests.into_iter().map(|r| self.perform(r)));
                }
                effects
            }

            Event::HeightProgress(height) => {
                let update = self.sync.on_height_progress(height);
                self.after_sync(update, false)
            }

            Event::SyncFinished => vec![self.perform(Request::FinishedTip)],

            Event::SendState(state) => {
                self.send_state = Some(state);
                vec![self.perform(Request::Pending), self.render()]
            }

            Event::SwitchWallet(wallet) => {
                self.generation += 1;
                debug!("switching to wallet {} (generation {})", wallet.address_id, self.generation);
                self.wallet = wallet;
                self.clear_wallet_view();
                let mut effects = self.refresh_ledger();
                effects.push(self.render());
                effects
            }

            Event::SetHistoryFilter(filter) => {
                self.history_filter = filter;
                self.recompute_history();
                vec![self.render()]
            }

            Event::SetUtxoView { sort, contain_locked } => {
                self.utxo_sort = sort;
                self.contain_locked = contain_locked;
                self.recompute_catalog();
                vec![self.render()]
            }

            Event::SelectUtxos(ids) => {
                self.selected_utxos = ids;
                vec![self.render()]
            }

            Event::Send(request) => {
                let height = self.sync.state().synced_block;
                vec![self.perform(Request::Submit { request, height })]
            }

            Event::Forget { txid } => vec![self.perform(Request::Forget { txid })],

            Event::Fetched { generation, result } => {
                if generation != self.generation {
                    debug!("dropping result of generation {}", generation);
                    return match result {
                        Fetched::Sent { txid, .. } => vec![Effect::success(format!("sent {}", txid))],
                        _ => Vec::new(),
                    };
                }
                self.apply(result)
            }

            Event::Failed {
                generation,
                request,
                error,
                network,
            } => {
                // the last good view stays
                if generation != self.generation && !request.is_user_action() {
                    return Vec::new();
                }
                if generation == self.generation
                    && request.is_ledger_read()
                    && !self.retry.contains(&request)
                {
                    self.retry.push(request.clone());
                }
                let message = format!("{} failed: {}", request.name(), error);
                if network && !request.is_user_action() {
                    vec![Effect::warning(message)]
                } else {
                    vec![Effect::error(message)]
                }
            }
        }
    }

    fn apply(&mut self, result: Fetched) -> Vec<Effect> {
        match result {
            Fetched::Tip(tip) => {
                let update = self.sync.on_tip(tip);
                self.after_sync(update, false)
            }
            Fetched::Cursor(cursor) => {
                let update = self.sync.on_poll(cursor);
                self.after_sync(update, false)
            }
            Fetched::FinishedTip(tip) => {
                // the push announces newly scanned data even when heights match
                let update = self.sync.on_sync_finished(tip);
                self.after_sync(update, true)
            }
            Fetched::History { rows, local, now } => {
                self.succeeded(&Request::History);
                self.snapshot = Some(HistorySnapshot { rows, local, now });
                self.recompute_history();
                vec![self.render()]
            }
            Fetched::Utxos(utxos) => {
                self.succeeded(&Request::Utxos);
                self.raw_utxos = utxos;
                self.recompute_catalog();
                vec![self.render()]
            }
            Fetched::Balance(raw) => {
                self.succeeded(&Request::Balance);
                self.balance = Some(raw.into());
                vec![self.render()]
            }
            Fetched::Pending(pending) => {
                self.succeeded(&Request::Pending);
                self.pending = pending;
                vec![self.render()]
            }
            Fetched::Sent { txid, pending } => {
                self.pending = pending;
                vec![Effect::success(format!("sent {}", txid)), self.render()]
            }
            Fetched::Forgotten { txid, pending } => {
                self.pending = pending;
                vec![
                    Effect::success(format!("forgot {}", txid)),
                    self.render(),
                ]
            }
        }
    }

    /// a caught-up view re-pulls the ledger whenever either height moves;
    /// while the tip is being re-queried the pull waits for the fresh tip
    fn after_sync(&mut self, update: SyncUpdate, force: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        if update.refresh_tip {
            effects.push(self.perform(Request::Tip));
        }
        let moved = update.heights_changed && !update.refresh_tip;
        if self.sync.is_caught_up() && (update.became_caught_up() || moved || force) {
            effects.extend(self.refresh_ledger());
        }
        effects.push(self.render());
        effects
    }

    /// everything that depends on the ledger contents
    fn refresh_ledger(&self) -> Vec<Effect> {
        [
            Request::History,
            Request::Utxos,
            Request::Balance,
            Request::Pending,
        ]
        .into_iter()
        .map(|request| self.perform(request))
        .collect()
    }

    fn succeeded(&mut self, request: &Request) {
        self.retry.retain(|r| r != request);
    }

    fn perform(&self, request: Request) -> Effect {
        Effect::Perform {
            generation: self.generation,
            wallet: self.wallet.clone(),
            request,
        }
    }

    fn clear_wallet_view(&mut self) {
        self.snapshot = None;
        self.history.clear();
        self.daily.clear();
        self.raw_utxos.clear();
        self.catalog = UtxoCatalog::default();
        self.selected_utxos.clear();
        self.balance = None;
        self.pending.clear();
        self.send_state = None;
        self.retry.clear();
    }

    fn recompute_history(&mut self) {
        if let Some(snapshot) = &self.snapshot {
            self.history = reconcile(&snapshot.rows, &snapshot.local, self.history_filter);
            self.daily = aggregate_daily(&self.history, &snapshot.now);
        }
    }

    fn recompute_catalog(&mut self) {
        self.catalog = UtxoCatalog::new(self.raw_utxos.clone(), self.utxo_sort, self.contain_locked);
    }

    fn render(&self) -> Effect {
        Effect::Render(self.view_model())
    }

    pub fn view_model(&self) -> ViewModel {
        let state = self.sync.state();
        let cursor = self.sync.cursor();
        ViewModel {
            wallet: self.wallet.clone(),
            sync: state,
            progress_percent: state.progress_percent(),
            caught_up: state.is_caught_up(),
            syncing: cursor.syncing,
            updated_to_tip: cursor.updated_to_tip,
            balance: self.balance.clone(),
            history_filter: self.history_filter,
            history: self.history.clone(),
            daily: self.daily.clone(),
            utxo_sort: self.utxo_sort,
            contain_locked: self.contain_locked,
            utxos: self.catalog.records().to_vec(),
            utxo_total: self.catalog.total(),
            selected_utxos: self.selected_utxos.clone(),
            selected_total: self.catalog.select_total(&self.selected_utxos),
            pending: self.pending.clone(),
            send_state: self.send_state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(id: u32) -> WalletId {
        WalletId {
            address_id: id,
            address: format!("nolgam1wallet{}", id),
        }
    }

    fn requests(effects: &[Effect]) -> Vec<Request> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Perform { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn fetched(core: &mut WalletCore, result: Fetched) -> Vec<Effect> {
        let generation = core.generation();
        core.update(Event::Fetched { generation, result })
    }

    fn caught_up_core() -> WalletCore {
        let mut core = WalletCore::new(wallet(0));
        fetched(&mut core, Fetched::Tip(100));
        fetched(
            &mut core,
            Fetched::Cursor(ScanCursor { height: 100, syncing: false, updated_to_tip: true }),
        );
        core
    }

    fn history(rows: Vec<RemoteLedgerRow>) -> Fetched {
        Fetched::History {
            rows,
            local: Vec::new(),
            now: "2024-03-10T18:00:00+00:00".parse().unwrap(),
        }
    }

    fn row(height: u64, amount: &str) -> RemoteLedgerRow {
        RemoteLedgerRow {
            height,
            index: 0,
            amount: amount.parse().unwrap(),
            timestamp: 1_710_086_400_000 + height,
            release_date: None,
            txid: None,
        }
    }

    #[test]
    fn test_poll_tick_requests_sync_state() {
        let mut core = WalletCore::new(wallet(0));
        let effects = core.update(Event::PollTick);
        assert_eq!(requests(&effects), vec![Request::Tip, Request::Cursor, Request::Pending]);

        let mut core = caught_up_core();
        let effects = core.update(Event::PollTick);
        assert!(requests(&effects).contains(&Request::Balance));
    }

    #[test]
    fn test_catching_up_refreshes_ledger() {
        let mut core = WalletCore::new(wallet(0));
        fetched(&mut core, Fetched::Tip(100));
        let effects = core.update(Event::HeightProgress(100));
        assert_eq!(
            requests(&effects),
            vec![Request::History, Request::Utxos, Request::Balance, Request::Pending]
        );

        // duplicate push: no second refresh
        let effects = core.update(Event::HeightProgress(100));
        assert!(requests(&effects).is_empty());
    }

    #[test]
    fn test_synced_past_tip_requeries_tip() {
        let mut core = caught_up_core();
        let effects = core.update(Event::HeightProgress(101));
        assert_eq!(requests(&effects), vec![Request::Tip]);
    }

    #[test]
    fn test_new_block_while_caught_up_refreshes_ledger() {
        let mut core = caught_up_core();

        // cursor runs ahead of the cached tip: wait for the fresh tip
        let effects = fetched(
            &mut core,
            Fetched::Cursor(ScanCursor { height: 101, syncing: false, updated_to_tip: true }),
        );
        assert_eq!(requests(&effects), vec![Request::Tip]);

        let effects = fetched(&mut core, Fetched::Tip(101));
        assert_eq!(
            requests(&effects),
            vec![Request::History, Request::Utxos, Request::Balance, Request::Pending]
        );

        // same heights again: nothing to pull
        let effects = fetched(&mut core, Fetched::Tip(101));
        assert!(requests(&effects).is_empty());
    }

    #[test]
    fn test_tip_then_cursor_while_caught_up_refreshes_once_caught_up() {
        let mut core = caught_up_core();
        let effects = fetched(&mut core, Fetched::Tip(102));
        assert!(requests(&effects).is_empty());

        let effects = core.update(Event::HeightProgress(102));
        assert!(requests(&effects).contains(&Request::History));
    }

    #[test]
    fn test_sync_finished_while_caught_up_refreshes_ledger() {
        let mut core = caught_up_core();
        let effects = core.update(Event::SyncFinished);
        assert_eq!(requests(&effects), vec![Request::FinishedTip]);

        let effects = fetched(&mut core, Fetched::FinishedTip(105));
        assert!(requests(&effects).contains(&Request::History));
        assert!(requests(&effects).contains(&Request::Utxos));

        // a finished push at an unchanged tip still announces new data
        let effects = fetched(&mut core, Fetched::FinishedTip(105));
        assert!(requests(&effects).contains(&Request::History));
    }

    #[test]
    fn test_failed_history_retried_on_next_tick() {
        let mut core = caught_up_core();
        core.update(Event::Failed {
            generation: core.generation(),
            request: Request::History,
            error: "timed out".into(),
            network: true,
        });

        let effects = core.update(Event::PollTick);
        assert_eq!(
            requests(&effects),
            vec![
                Request::Tip,
                Request::Cursor,
                Request::Pending,
                Request::Balance,
                Request::History
            ]
        );
        // unchanged heights do not pull on their own
        fetched(&mut core, Fetched::Tip(100));
        fetched(
            &mut core,
            Fetched::Cursor(ScanCursor { height: 100, syncing: false, updated_to_tip: true }),
        );

        fetched(&mut core, history(vec![row(1, "5")]));
        let effects = core.update(Event::PollTick);
        assert!(!requests(&effects).contains(&Request::History));
    }

    #[test]
    fn test_retry_list_dropped_on_wallet_switch() {
        let mut core = caught_up_core();
        core.update(Event::Failed {
            generation: core.generation(),
            request: Request::Utxos,
            error: "connection refused".into(),
            network: true,
        });
        core.update(Event::SwitchWallet(wallet(3)));
        let effects = core.update(Event::PollTick);
        assert!(!requests(&effects).contains(&Request::Utxos));
    }

    #[test]
    fn test_sync_finished_flow() {
        let mut core = WalletCore::new(wallet(0));
        fetched(&mut core, Fetched::Tip(100));
        core.update(Event::HeightProgress(40));

        let effects = core.update(Event::SyncFinished);
        assert_eq!(requests(&effects), vec![Request::FinishedTip]);

        let effects = fetched(&mut core, Fetched::FinishedTip(120));
        assert!(requests(&effects).contains(&Request::History));
        assert_eq!(core.sync_state(), SyncState { latest_block: 120, synced_block: 120 });
    }

    #[test]
    fn test_history_filter_recomputes_from_snapshot() {
        let mut core = caught_up_core();
        fetched(&mut core, history(vec![row(1, "-2"), row(2, "3")]));
        assert_eq!(core.view_model().history.len(), 2);

        let effects = core.update(Event::SetHistoryFilter(HistoryFilter::Send));
        assert!(requests(&effects).is_empty());
        let view = core.view_model();
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.history[0].change_amount, "- 2.0000");
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut core = caught_up_core();
        let old = core.generation();
        core.update(Event::SwitchWallet(wallet(1)));

        let effects = core.update(Event::Fetched {
            generation: old,
            result: history(vec![row(1, "5")]),
        });
        assert!(effects.is_empty());
        assert!(core.view_model().history.is_empty());
        assert_eq!(core.view_model().wallet, wallet(1));
    }

    #[test]
    fn test_switch_wallet_clears_and_refetches() {
        let mut core = caught_up_core();
        fetched(&mut core, history(vec![row(1, "5")]));
        let effects = core.update(Event::SwitchWallet(wallet(2)));

        assert_eq!(requests(&effects).len(), 4);
        assert!(effects.iter().all(|e| match e {
            Effect::Perform { generation, wallet: w, .. } => *generation == 1 && w.address_id == 2,
            _ => true,
        }));
        assert!(core.view_model().history.is_empty());
    }

    #[test]
    fn test_failure_keeps_stale_view() {
        let mut core = caught_up_core();
        fetched(&mut core, history(vec![row(1, "5")]));

        let effects = core.update(Event::Failed {
            generation: core.generation(),
            request: Request::History,
            error: "connection refused".into(),
            network: true,
        });
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify { level: NotificationLevel::Warning, .. }]
        ));
        assert_eq!(core.view_model().history.len(), 1);
    }

    #[test]
    fn test_send_uses_synced_height() {
        let mut core = caught_up_core();
        let request = SendRequest {
            outputs: vec![],
            fee: "0.01".parse().unwrap(),
            input_rule: None,
            inputs: vec![],
        };
        let effects = core.update(Event::Send(request.clone()));
        assert_eq!(requests(&effects), vec![Request::Submit { request, height: 100 }]);

        let effects = fetched(&mut core, Fetched::Sent { txid: "t9".into(), pending: vec![] });
        assert!(matches!(
            &effects[0],
            Effect::Notify { level: NotificationLevel::Success, .. }
        ));
    }

    #[test]
    fn test_utxo_view_and_selection() {
        let mut core = caught_up_core();
        let utxo = |id: u64, amount: &str, locked: bool| UtxoRecord {
            id,
            hash: String::new(),
            confirm_height: 1,
            confirm_timestamp: 1,
            confirmed_txid: None,
            locked,
            amount: amount.parse().unwrap(),
        };
        fetched(
            &mut core,
            Fetched::Utxos(vec![utxo(1, "5", false), utxo(2, "10", false), utxo(3, "7", true)]),
        );
        let ids: Vec<u64> = core.view_model().utxos.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 1]);

        core.update(Event::SetUtxoView { sort: UtxoSort::Id, contain_locked: true });
        core.update(Event::SelectUtxos(vec![1, 3]));
        let view = core.view_model();
        assert_eq!(view.utxos.iter().map(|u| u.id).collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(view.selected_total.to_string(), "12");
        assert_eq!(view.utxo_total.to_string(), "22");
    }

    #[test]
    fn test_send_state_refreshes_pending() {
        let mut core = caught_up_core();
        let effects = core.update(Event::SendState("proving".into()));
        assert_eq!(requests(&effects), vec![Request::Pending]);
        assert_eq!(core.view_model().send_state.as_deref(), Some("proving"));
    }
}
