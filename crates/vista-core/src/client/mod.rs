//! HTTP client for the wallet node REST API

mod rest;

pub use rest::RestLedgerClient;

/// default node endpoint
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:9800";

// node REST paths
pub const TIP_HEIGHT_PATH: &str = "/rpc/block/tip_height";
pub const SCAN_STATE_PATH: &str = "/rpc/scan/state";
pub const HISTORY_PATH: &str = "/rpc/wallet/history";
pub const AVAILABLE_UTXOS_PATH: &str = "/rpc/wallet/available_utxos";
pub const BALANCE_PATH: &str = "/rpc/wallet/balance";
pub const PENDING_PATH: &str = "/rpc/mempool/pendingtx";
pub const FORGET_TX_PATH: &str = "/rpc/forget_tx/";
pub const SEND_PATH: &str = "/rpc/send";
