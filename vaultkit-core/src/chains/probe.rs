//! Chain state probes: does an address already have transaction history?

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChainError, ChainResult};
use crate::{
    config::{Network, ToncenterConfig},
    http_request::HttpClient,
};

/// Answers history queries for the primary chain.
#[async_trait]
pub trait ChainStateProbe: Send + Sync {
    /// Identifier of the latest transaction at `address`, or `None` for a
    /// pristine address.
    ///
    /// # Errors
    ///
    /// Returns an error if chain state cannot be fetched.
    async fn last_transaction_id(
        &self,
        network: Network,
        address: &str,
    ) -> ChainResult<Option<String>>;
}

/// Treats every address as pristine. For offline use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistoryProbe;

#[async_trait]
impl ChainStateProbe for NoHistoryProbe {
    async fn last_transaction_id(
        &self,
        _network: Network,
        _address: &str,
    ) -> ChainResult<Option<String>> {
        Ok(None)
    }
}

/// In-memory history, keyed by network and address.
#[derive(Debug, Default)]
pub struct MemoryProbe {
    history: Mutex<HashMap<(Network, String), String>>,
}

impl MemoryProbe {
    /// Creates an empty probe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `transaction_id` as the latest transaction at `address`.
    pub fn record(&self, network: Network, address: &str, transaction_id: &str) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((network, address.to_string()), transaction_id.to_string());
    }
}

#[async_trait]
impl ChainStateProbe for MemoryProbe {
    async fn last_transaction_id(
        &self,
        network: Network,
        address: &str,
    ) -> ChainResult<Option<String>> {
        Ok(self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(network, address.to_string()))
            .cloned())
    }
}

#[derive(Deserialize)]
struct AddressInformation {
    ok: bool,
    result: Option<AddressState>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct AddressState {
    last_transaction_id: Option<TransactionId>,
}

#[derive(Deserialize)]
struct TransactionId {
    lt: String,
    hash: String,
}

/// Queries a toncenter-compatible HTTP API.
///
/// Answers are only meaningful for on-chain contract addresses; see
/// [`super::ton::TonAddress::for_wallet`].
pub struct TonCenterProbe {
    config: ToncenterConfig,
    http: HttpClient,
}

impl TonCenterProbe {
    /// Creates a probe against the configured endpoints.
    #[must_use]
    pub fn new(config: ToncenterConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }
}

#[async_trait]
impl ChainStateProbe for TonCenterProbe {
    async fn last_transaction_id(
        &self,
        network: Network,
        address: &str,
    ) -> ChainResult<Option<String>> {
        let url = format!("{}/getAddressInformation", self.config.url(network));
        let (status, body): (_, AddressInformation) = self
            .http
            .get_json(&url, &[("address", address)])
            .await?;
        let status = status.as_u16();

        if !body.ok {
            return Err(ChainError::Network {
                url,
                status: Some(status),
                error: body.error.unwrap_or_else(|| "request rejected".to_string()),
            });
        }

        Ok(body
            .result
            .and_then(|state| state.last_transaction_id)
            .filter(|tx| tx.lt != "0")
            .map(|tx| format!("{}:{}", tx.lt, tx.hash)))
    }
}
