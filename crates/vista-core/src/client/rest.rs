//! wallet node REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{
    AVAILABLE_UTXOS_PATH, BALANCE_PATH, FORGET_TX_PATH, HISTORY_PATH, PENDING_PATH, SCAN_STATE_PATH,
    SEND_PATH, TIP_HEIGHT_PATH,
};
use crate::error::{Result, VistaError};
use crate::history::RemoteLedgerRow;
use crate::remote::{PendingTxStatus, RawBalance, RemoteLedgerSource, SendRequest, SendResponse};
use crate::sync::ScanCursor;
use crate::utxo::UtxoRecord;

/// the node serves a single wallet; `address` arguments only label logs
#[derive(Clone)]
pub struct RestLedgerClient {
    base_url: String,
    client: Client,
    timeout: Duration,
    auth_token: Option<String>,
}

impl RestLedgerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VistaError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
            auth_token: None,
        })
    }

    /// sent verbatim in the `authorization` header
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.call(self.client.get(self.url(path))).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.call(self.client.post(self.url(path)).json(body)).await
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.auth_token {
            Some(token) => request.header(AUTHORIZATION, token),
            None => request,
        };

        let exchange = async {
            let response = request.send().await.map_err(|e| self.transport_error(e))?;
            let status = response.status();
            let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

            if status.is_server_error() {
                return Err(VistaError::Network(format!(
                    "{}: {}",
                    status,
                    String::from_utf8_lossy(&body)
                )));
            }
            if !status.is_success() {
                return Err(VistaError::Rejected(format!(
                    "{}: {}",
                    status,
                    String::from_utf8_lossy(&body)
                )));
            }
            Ok::<T, VistaError>(serde_json::from_slice(&body)?)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| VistaError::Timeout(self.timeout))?
    }

    fn transport_error(&self, e: reqwest::Error) -> VistaError {
        if e.is_timeout() {
            VistaError::Timeout(self.timeout)
        } else {
            VistaError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl RemoteLedgerSource for RestLedgerClient {
    async fn tip_height(&self) -> Result<u64> {
        self.get(TIP_HEIGHT_PATH).await
    }

    async fn scan_cursor(&self) -> Result<ScanCursor> {
        self.get(SCAN_STATE_PATH).await
    }

    async fn activity_rows(&self, address: &str) -> Result<Vec<RemoteLedgerRow>> {
        let rows: Vec<RemoteLedgerRow> = self.get(HISTORY_PATH).await?;
        debug!("{} ledger rows for {}", rows.len(), address);
        Ok(rows)
    }

    async fn pending_txs(&self, address: &str) -> Result<Vec<PendingTxStatus>> {
        let pending: Vec<PendingTxStatus> = self.get(PENDING_PATH).await?;
        debug!("{} mempool entries for {}", pending.len(), address);
        Ok(pending)
    }

    async fn available_utxos(&self, address: &str) -> Result<Vec<UtxoRecord>> {
        let utxos: Vec<UtxoRecord> = self.get(AVAILABLE_UTXOS_PATH).await?;
        debug!("{} available utxos for {}", utxos.len(), address);
        Ok(utxos)
    }

    async fn balance(&self, _address: &str) -> Result<RawBalance> {
        self.get(BALANCE_PATH).await
    }

    async fn submit_transaction(&self, request: &SendRequest) -> Result<SendResponse> {
        self.post(SEND_PATH, request).await
    }

    async fn forget_transaction(&self, txid: &str) -> Result<()> {
        let forgotten: bool = self.get(&format!("{}{}", FORGET_TX_PATH, txid)).await?;
        if forgotten {
            Ok(())
        } else {
            Err(VistaError::Rejected(format!("node refused to forget {}", txid)))
        }
    }
}
