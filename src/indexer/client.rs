//! HTTP client for the ledger-indexing API: content-addressed response cache
//! with TTL, exponential-backoff retry honouring server rate-limit hints, and
//! typed per-endpoint wrappers.

use crate::cache::{init_hot_cache, FileCache, HotCache, RequestFingerprint};
use crate::config::Config;
use crate::indexer::models::{AddressBalances, TransactionsPage};
use crate::indexer::retry::{is_retryable_status, rate_limit_hint, RetryPolicy};
use async_trait::async_trait;
use backon::Retryable;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const TRANSACTIONS_PATH: &str = "/extended/v1/tx";
const USER_AGENT: &str = "wallet-metrics-service/0.1";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("retryable status {status} from {url}")]
    Retryable {
        status: u16,
        url: String,
        hint: Option<Duration>,
    },

    #[error("request failed with status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed payload from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache io error: {0}")]
    Cache(#[from] std::io::Error),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Retryable { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientError::Retryable { status: 429, .. })
    }

    /// Server-advertised wait attached to the failure, if any.
    pub fn retry_hint(&self) -> Option<Duration> {
        match self {
            ClientError::Retryable { hint, .. } => *hint,
            _ => None,
        }
    }
}

/// Parameters for one page of the transaction listing.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
    /// Exclusive upper bound on the anchoring timestamp (the sync cursor).
    pub end_time: Option<i64>,
    pub force_refresh: bool,
    /// Cache TTL for this page; `None` keeps cached entries forever.
    pub ttl: Option<Duration>,
}

/// Seam for the transaction listing so the sync engine can be driven by a
/// scripted source in tests.
#[async_trait]
pub trait TransactionsSource: Send + Sync {
    async fn fetch_transactions_page(
        &self,
        request: &PageRequest,
    ) -> Result<TransactionsPage, ClientError>;
}

/// Seam for address balance lookups, used by the balance-refresh fan-out.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_address_balances(&self, principal: &str)
        -> Result<AddressBalances, ClientError>;
}

pub struct LedgerClient {
    http: reqwest::Client,
    file_cache: FileCache,
    hot_cache: HotCache,
    base_url: String,
    retry: RetryPolicy,
    default_ttl: Duration,
}

impl LedgerClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        if let Some(key) = &config.api_key {
            match HeaderValue::from_str(key) {
                Ok(value) => {
                    headers.insert("x-api-key", value);
                }
                Err(_) => warn!("ignoring API key that is not a valid header value"),
            }
        }

        info!("Initializing ledger client for {}", config.api_base_url);

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            file_cache: FileCache::new(config.cache_dir.clone()),
            hot_cache: init_hot_cache(config),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from_config(config),
            default_ttl: config.cache_ttl,
        })
    }

    /// Fetch one page of the transaction listing, newest first, strictly
    /// before `end_time` when given.
    pub async fn transactions_page(
        &self,
        request: &PageRequest,
    ) -> Result<TransactionsPage, ClientError> {
        let mut params = vec![
            ("limit".to_string(), request.limit.to_string()),
            ("offset".to_string(), request.offset.to_string()),
            ("unanchored".to_string(), "false".to_string()),
        ];
        if let Some(end_time) = request.end_time {
            params.push(("end_time".to_string(), end_time.to_string()));
        }
        self.get_cached_json(
            "ledger_tx",
            TRANSACTIONS_PATH,
            &params,
            request.ttl,
            request.force_refresh,
        )
        .await
    }

    /// Current balances for an address principal.
    pub async fn address_balances(&self, principal: &str) -> Result<AddressBalances, ClientError> {
        let path = format!("/extended/v1/address/{}/balances", principal);
        self.get_cached_json("ledger_balance", &path, &[], Some(self.default_ttl), false)
            .await
    }

    async fn get_cached_json<T: DeserializeOwned>(
        &self,
        prefix: &str,
        path: &str,
        params: &[(String, String)],
        ttl: Option<Duration>,
        force_refresh: bool,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let key = RequestFingerprint::new(prefix, "GET", &url, params, None);
        let hot_key = key.to_string();

        if !force_refresh {
            if let Some(bytes) = self.hot_cache.get(&hot_key).await {
                return parse_payload(&url, &bytes);
            }
            // The hot layer has a single short TTL; the file cache enforces
            // the per-request one.
            if let Some(bytes) = self.file_cache.load(&key, ttl) {
                self.hot_cache
                    .insert(hot_key, Arc::new(bytes.clone()))
                    .await;
                return parse_payload(&url, &bytes);
            }
        }

        let bytes = self.fetch_with_retry(&url, params).await?;
        self.file_cache.store(&key, &bytes)?;
        self.hot_cache
            .insert(hot_key, Arc::new(bytes.clone()))
            .await;
        parse_payload(&url, &bytes)
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Vec<u8>, ClientError> {
        let policy = self.retry.clone();
        (|| async { self.fetch_once(url, params).await })
            .retry(self.retry.backoff())
            .when(ClientError::is_transient)
            .adjust(move |err: &ClientError, planned| {
                planned.map(|wait| policy.next_wait(err.retry_hint(), wait))
            })
            .notify(|err: &ClientError, wait: Duration| {
                warn!("retrying after {:?}: {}", wait, err);
            })
            .await
    }

    async fn fetch_once(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Vec<u8>, ClientError> {
        let response = self.http.get(url).query(params).send().await?;
        let status = response.status().as_u16();
        if is_retryable_status(status) {
            let hint = rate_limit_hint(response.headers(), Utc::now().timestamp());
            return Err(ClientError::Retryable {
                status,
                url: url.to_string(),
                hint,
            });
        }
        if !response.status().is_success() {
            return Err(ClientError::Status {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn parse_payload<T: DeserializeOwned>(url: &str, bytes: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(bytes).map_err(|source| ClientError::Malformed {
        url: url.to_string(),
        source,
    })
}

#[async_trait]
impl TransactionsSource for LedgerClient {
    async fn fetch_transactions_page(
        &self,
        request: &PageRequest,
    ) -> Result<TransactionsPage, ClientError> {
        self.transactions_page(request).await
    }
}

#[async_trait]
impl BalanceSource for LedgerClient {
    async fn fetch_address_balances(
        &self,
        principal: &str,
    ) -> Result<AddressBalances, ClientError> {
        self.address_balances(principal).await
    }
}
