//! effect executor - runs core effects against the node and the local store

use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::{Effect, Event, Fetched, NotificationLevel, Request, ViewModel, WalletCore, WalletId};
use crate::error::Result;
use crate::pending::PendingTxTracker;
use crate::record::{BatchOutput, LocalHistoryRecord};
use crate::remote::RemoteLedgerSource;
use crate::store::{records_or_empty, LocalHistoryStore};

pub struct EffectExecutor<R: ?Sized, S: ?Sized> {
    remote: Arc<R>,
    store: Arc<S>,
    pending: PendingTxTracker<R, S>,
}

impl<R, S> EffectExecutor<R, S>
where
    R: RemoteLedgerSource + ?Sized,
    S: LocalHistoryStore + ?Sized,
{
    pub fn new(remote: Arc<R>, store: Arc<S>) -> Self {
        Self {
            pending: PendingTxTracker::new(remote.clone(), store.clone()),
            remote,
            store,
        }
    }

    /// run one request to completion
    pub async fn perform(&self, wallet: &WalletId, request: Request) -> Result<Fetched> {
        debug!("performing {} for wallet {}", request.name(), wallet.address_id);
        let address = wallet.address.as_str();

        let fetched = match request {
            Request::Tip => Fetched::Tip(self.remote.tip_height().await?),
            Request::Cursor => Fetched::Cursor(self.remote.scan_cursor().await?),
            Request::FinishedTip => Fetched::FinishedTip(self.remote.tip_height().await?),
            Request::History => {
                // both sources complete before anything is merged
                let (rows, local) = tokio::join!(
                    self.remote.activity_rows(address),
                    records_or_empty(self.store.as_ref(), wallet.address_id),
                );
                let now = Local::now();
                Fetched::History {
                    rows: rows?,
                    local,
                    now: now.with_timezone(now.offset()),
                }
            }
            Request::Utxos => Fetched::Utxos(self.remote.available_utxos(address).await?),
            Request::Balance => Fetched::Balance(self.remote.balance(address).await?),
            Request::Pending => {
                Fetched::Pending(self.pending.refresh(wallet.address_id, address).await?)
            }
            Request::Submit { request, height } => {
                let response = self.remote.submit_transaction(&request).await?;
                info!("node accepted send {}", response.txid);

                let batch_output = (0u64..)
                    .zip(&request.outputs)
                    .map(|(index, output)| BatchOutput {
                        index,
                        to_address: output.address.clone(),
                        amount: output.amount.clone(),
                    })
                    .collect();
                let record = LocalHistoryRecord::new_send(
                    &response.txid,
                    now_millis(),
                    height,
                    wallet.address_id,
                    address,
                    request.fee.clone(),
                    response.outputs,
                    batch_output,
                );
                let pending = self.pending.add(record).await?;
                Fetched::Sent {
                    txid: response.txid,
                    pending,
                }
            }
            Request::Forget { txid } => {
                let pending = self.pending.forget(wallet.address_id, address, &txid).await?;
                Fetched::Forgotten { txid, pending }
            }
        };
        Ok(fetched)
    }

    /// run one request and turn the outcome into the event the core expects
    pub async fn execute(&self, generation: u64, wallet: &WalletId, request: Request) -> Event {
        match self.perform(wallet, request.clone()).await {
            Ok(result) => Event::Fetched { generation, result },
            Err(e) => {
                warn!("{} failed: {}", request.name(), e);
                Event::Failed {
                    generation,
                    network: e.is_network(),
                    error: e.to_string(),
                    request,
                }
            }
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// feed events through the core, executing effects as they come out
///
/// each request runs on its own task and reports back through `events_tx`,
/// so fetches overlap and the latest completed result wins. returns when
/// every sender is gone.
pub async fn run<R, S, F>(
    core: &mut WalletCore,
    executor: Arc<EffectExecutor<R, S>>,
    events_tx: mpsc::UnboundedSender<Event>,
    mut events: mpsc::UnboundedReceiver<Event>,
    mut render: F,
) where
    R: RemoteLedgerSource + ?Sized + 'static,
    S: LocalHistoryStore + ?Sized + 'static,
    F: FnMut(&ViewModel),
{
    while let Some(event) = events.recv().await {
        for effect in core.update(event) {
            match effect {
                Effect::Render(view) => render(&view),
                Effect::Notify { message, level } => notify(&message, level),
                Effect::Perform {
                    generation,
                    wallet,
                    request,
                } => {
                    let executor = executor.clone();
                    let events_tx = events_tx.clone();
                    tokio::spawn(async move {
                        let event = executor.execute(generation, &wallet, request).await;
                        // receiver gone means we are shutting down
                        let _ = events_tx.send(event);
                    });
                }
            }
        }
    }
}

fn notify(message: &str, level: NotificationLevel) {
    match level {
        NotificationLevel::Info | NotificationLevel::Success => info!("{}", message),
        NotificationLevel::Warning => warn!("{}", message),
        NotificationLevel::Error => error!("{}", message),
    }
}
