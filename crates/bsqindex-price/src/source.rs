//! Trade sources for the reference price.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bsqindex_core::error::PriceError;

/// One trade as returned by the markets API. Only the price is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Quoted price as a decimal string (BTC per BSQ).
    pub price: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub trade_date: Option<i64>,
}

/// Something that can list recent trades.
#[async_trait]
pub trait TradeSource: Send + Sync {
    async fn fetch_trades(&self) -> Result<Vec<Trade>, PriceError>;
}

/// Trade source backed by an HTTP JSON endpoint.
pub struct HttpTradeSource {
    url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpTradeSource {
    /// Create a source for `url`; each request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PriceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PriceError::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TradeSource for HttpTradeSource {
    async fn fetch_trades(&self) -> Result<Vec<Trade>, PriceError> {
        let resp = self.http.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                PriceError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                }
            } else {
                PriceError::Http(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PriceError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<Vec<Trade>>()
            .await
            .map_err(|e| PriceError::Http(e.to_string()))
    }
}
