use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use vista_core::executor::EffectExecutor;
use vista_core::{
    Event, HistoryFilter, Request, RestLedgerClient, SledHistoryStore, UtxoSort, ViewModel,
    WalletCore, WalletId,
};

mod config;

use config::{Config, ConfigArgs};

type Executor = EffectExecutor<RestLedgerClient, SledHistoryStore>;

#[derive(Parser, Debug)]
#[command(name = "vista")]
#[command(about = "reconciled light wallet view over a wallet node", long_about = None)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// follow the node, re-rendering on every change
    Watch,

    /// reconciled transaction history
    History {
        /// all, send or receive
        #[arg(long, default_value_t = HistoryFilter::All)]
        filter: HistoryFilter,
    },

    /// income and expense over the last seven days
    Daily,

    /// spendable outputs
    Utxos {
        /// amount or id, descending
        #[arg(long, default_value_t = UtxoSort::Amount)]
        sort: UtxoSort,

        /// include locked outputs
        #[arg(long)]
        contain_locked: bool,

        /// ids to total up
        #[arg(long, num_args = 1..)]
        select: Vec<u64>,
    },

    /// sends still in the mempool
    Pending,

    /// drop a pending send on the node and locally
    Forget { txid: String },

    /// available and total balance
    Balance,

    /// tip height vs scan cursor
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    // initialize tracing
    let default_filter = config.log_filter();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    info!("node: {}", config.server_url);
    info!("history store: {}", config.data_dir.display());

    let remote = RestLedgerClient::new(&config.server_url, config.request_timeout)?
        .with_auth_token(config.auth_token.clone());
    if let Some(parent) = config.data_dir.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = SledHistoryStore::open(&config.data_dir)?;
    let executor = Arc::new(EffectExecutor::new(Arc::new(remote), Arc::new(store)));

    let mut core = WalletCore::new(WalletId {
        address_id: config.address_id,
        address: config.address.clone(),
    });

    match args.command {
        Command::Watch => watch(core, executor, &config).await?,

        Command::History { filter } => {
            core.update(Event::SetHistoryFilter(filter));
            fetch(&mut core, &executor, &[Request::History]).await?;
            print_history(&core.view_model());
        }

        Command::Daily => {
            fetch(&mut core, &executor, &[Request::History]).await?;
            print_daily(&core.view_model());
        }

        Command::Utxos {
            sort,
            contain_locked,
            select,
        } => {
            core.update(Event::SetUtxoView { sort, contain_locked });
            core.update(Event::SelectUtxos(select));
            fetch(&mut core, &executor, &[Request::Utxos]).await?;
            print_utxos(&core.view_model());
        }

        Command::Pending => {
            fetch(&mut core, &executor, &[Request::Pending]).await?;
            print_pending(&core.view_model());
        }

        Command::Forget { txid } => {
            fetch(&mut core, &executor, &[Request::Forget { txid: txid.clone() }]).await?;
            println!("forgot {}", txid);
            print_pending(&core.view_model());
        }

        Command::Balance => {
            fetch(&mut core, &executor, &[Request::Balance]).await?;
            print_balance(&core.view_model());
        }

        Command::Sync => {
            fetch(&mut core, &executor, &[Request::Tip, Request::Cursor]).await?;
            print_sync(&core.view_model());
        }
    }

    Ok(())
}

/// run requests in order, folding each result into the core
async fn fetch(core: &mut WalletCore, executor: &Executor, requests: &[Request]) -> Result<()> {
    for request in requests {
        let result = executor.perform(core.wallet(), request.clone()).await?;
        let generation = core.generation();
        core.update(Event::Fetched { generation, result });
    }
    Ok(())
}

async fn watch(mut core: WalletCore, executor: Arc<Executor>, config: &Config) -> Result<()> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let ticker_tx = events_tx.clone();
    let interval = config.poll_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if ticker_tx.send(Event::PollTick).is_err() {
                break;
            }
        }
    });

    info!("watching every {:?}", interval);
    let mut last_summary = String::new();
    let render = move |view: &ViewModel| {
        let summary = summarize(view);
        if summary != last_summary {
            info!("{}", summary);
            last_summary = summary;
        }
    };

    tokio::select! {
        _ = vista_core::executor::run(&mut core, executor.clone(), events_tx, events_rx, render) => {
            warn!("event loop ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    Ok(())
}

fn summarize(view: &ViewModel) -> String {
    let balance = view
        .balance
        .as_ref()
        .map(|b| b.available.to_display())
        .unwrap_or_else(|| "-".into());
    format!(
        "synced {}/{} ({:.1}%{}) balance {} history {} pending {}",
        view.sync.synced_block,
        view.sync.latest_block,
        view.progress_percent,
        if view.caught_up { ", caught up" } else { "" },
        balance,
        view.history.len(),
        view.pending.len(),
    )
}

fn print_history(view: &ViewModel) {
    if view.history.is_empty() {
        println!("no history");
        return;
    }
    for entry in &view.history {
        let when = chrono::DateTime::from_timestamp_millis(entry.timestamp as i64)
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let fee = entry
            .fee
            .as_ref()
            .map(|f| format!(" fee {}", f.to_display()))
            .unwrap_or_default();
        println!(
            "{:>8}  {}  {:>20}  {}{}",
            entry.height,
            when,
            entry.change_amount,
            entry.txid.as_deref().unwrap_or("-"),
            fee
        );
    }
}

fn print_daily(view: &ViewModel) {
    if view.daily.is_empty() {
        println!("no activity in the last seven days");
        return;
    }
    for bucket in &view.daily {
        println!(
            "{:<10}  +{:>16}  -{:>16}  blocks {}..{}",
            bucket.label,
            bucket.received.to_display(),
            bucket.spent.to_display(),
            bucket.start_height,
            bucket.end_height
        );
    }
}

fn print_utxos(view: &ViewModel) {
    for utxo in &view.utxos {
        println!(
            "{:>6}  {:>20}  height {:>8}{}",
            utxo.id,
            utxo.amount.to_display(),
            utxo.confirm_height,
            if utxo.locked { "  locked" } else { "" }
        );
    }
    println!("{} outputs, total {}", view.utxos.len(), view.utxo_total.to_display());
    if !view.selected_utxos.is_empty() {
        println!("selected total {}", view.selected_total.to_display());
    }
}

fn print_pending(view: &ViewModel) {
    if view.pending.is_empty() {
        println!("no pending sends");
        return;
    }
    for entry in &view.pending {
        let sent: vista_core::Amount = entry.batch_output.iter().map(|o| &o.amount).sum();
        println!(
            "{}  {}  {}  fee {}",
            entry.txid,
            entry.status,
            sent.to_display(),
            entry.fee.to_display()
        );
    }
}

fn print_balance(view: &ViewModel) {
    match &view.balance {
        Some(balance) => {
            println!("available {}", balance.available.to_display());
            println!("total     {}", balance.total.to_display());
        }
        None => println!("balance unavailable"),
    }
}

fn print_sync(view: &ViewModel) {
    println!("tip        {}", view.sync.latest_block);
    println!("synced     {}", view.sync.synced_block);
    println!("progress   {:.2}%", view.progress_percent);
    println!("caught up  {}", view.caught_up);
    println!("syncing    {}", view.syncing);
}
