//! 汇率查询：按币种代码取得对本币的买入价
//!
//! HTTP 实现对接 AwesomeAPI：GET {base}/last/{CODE}-{QUOTE}，响应形如
//! `{"USDBRL": {"bid": "5.1234", ...}}`，bid 为十进制字符串。请求带固定超时。

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::ExchangeSection;

/// 支持查询的外币
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrencyCode {
    Usd,
    Eur,
    Gbp,
}

impl CurrencyCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyCode::Usd => "USD",
            CurrencyCode::Eur => "EUR",
            CurrencyCode::Gbp => "GBP",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateError {
    #[error("rate request failed: {0}")]
    Request(String),

    #[error("rate source returned HTTP {0}")]
    Status(u16),

    #[error("currency pair {0} missing from response")]
    MissingPair(String),

    #[error("invalid bid value: {0}")]
    InvalidBid(String),
}

/// 汇率来源接口
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn rate_for(&self, code: CurrencyCode) -> Result<f64, RateError>;
}

/// AwesomeAPI 汇率来源
pub struct AwesomeApiRateSource {
    client: Client,
    base_url: String,
    quote_currency: String,
}

impl AwesomeApiRateSource {
    pub fn new(base_url: &str, quote_currency: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            quote_currency: quote_currency.to_uppercase(),
        }
    }

    pub fn from_config(cfg: &ExchangeSection) -> Self {
        Self::new(&cfg.base_url, &cfg.quote_currency, cfg.timeout_secs)
    }

    fn pair_key(&self, code: CurrencyCode) -> String {
        format!("{}{}", code.as_str(), self.quote_currency)
    }
}

#[async_trait]
impl ExchangeRateSource for AwesomeApiRateSource {
    async fn rate_for(&self, code: CurrencyCode) -> Result<f64, RateError> {
        let url = format!("{}/last/{}-{}", self.base_url, code, self.quote_currency);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RateError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(RateError::Status(resp.status().as_u16()));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| RateError::Request(e.to_string()))?;

        parse_bid(&body, &self.pair_key(code))
    }
}

/// 从响应体读取 `{pair}.bid`；bid 可能是字符串或数字
pub(crate) fn parse_bid(body: &Value, pair: &str) -> Result<f64, RateError> {
    let bid = body
        .get(pair)
        .and_then(|quote| quote.get("bid"))
        .ok_or_else(|| RateError::MissingPair(pair.to_string()))?;

    let rate = match bid {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RateError::InvalidBid(s.clone()))?,
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| RateError::InvalidBid(n.to_string()))?,
        other => return Err(RateError::InvalidBid(other.to_string())),
    };
    if !rate.is_finite() {
        return Err(RateError::InvalidBid(rate.to_string()));
    }
    Ok(rate)
}

/// 固定汇率来源（测试与离线演示用）；未登记的币种返回 MissingPair
#[derive(Debug, Clone, Default)]
pub struct StaticRateSource {
    rates: HashMap<CurrencyCode, f64>,
}

impl StaticRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, code: CurrencyCode, rate: f64) -> Self {
        self.rates.insert(code, rate);
        self
    }
}

#[async_trait]
impl ExchangeRateSource for StaticRateSource {
    async fn rate_for(&self, code: CurrencyCode) -> Result<f64, RateError> {
        self.rates
            .get(&code)
            .copied()
            .ok_or_else(|| RateError::MissingPair(code.to_string()))
    }
}
