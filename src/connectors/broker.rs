//! Read-only broker quote provider for SHADOW mode

use crate::{
    config::BrokerConfig,
    connectors::traits::{MarketDataProvider, OptionQuotes},
    data::{decimal_from_f64, PriceSource},
    ArbitrageError, Result,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info};

/// HTTP JSON quote client.
///
/// Only GET requests against quote endpoints are issued.
pub struct BrokerQuoteProvider {
    name: String,
    base_url: String,
    underlying: String,
    spot_endpoint: String,
    futures_endpoint: String,
    options_endpoint: String,
    client: reqwest::Client,
}

impl BrokerQuoteProvider {
    /// Create a provider from broker configuration
    pub fn new(config: &BrokerConfig, underlying: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("X-API-KEY", header_value(&config.api_key, "api_key")?);
        headers.insert("X-API-SECRET", header_value(&config.api_secret, "api_secret")?);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| ArbitrageError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            underlying: underlying.to_string(),
            spot_endpoint: config.spot_endpoint.clone(),
            futures_endpoint: config.futures_endpoint.clone(),
            options_endpoint: config.options_endpoint.clone(),
            client,
        })
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("timestamp", chrono::Utc::now().timestamp_millis())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ArbitrageError::Timeout(format!("{} request to {} timed out", self.name, endpoint))
                } else {
                    ArbitrageError::Connection(format!("{} request to {} failed: {}", self.name, endpoint, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(ArbitrageError::Connection(format!(
                "{} request to {} failed with status: {}",
                self.name,
                endpoint,
                response.status()
            ))
            .into());
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ArbitrageError::DataParsing(format!("Invalid JSON from {}: {}", endpoint, e)))?;

        debug!(broker = %self.name, endpoint, "Quote received");
        Ok(body)
    }
}

fn header_value(value: &str, field: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ArbitrageError::Config(format!("broker.{} is not a valid header value", field)).into())
}

/// Extract a `last_price` at a JSON pointer. Brokers send it as a number or a
/// numeric string.
fn last_price(body: &Value, pointer: &str) -> Result<Decimal> {
    let value = body
        .pointer(pointer)
        .ok_or_else(|| ArbitrageError::DataParsing(format!("Unexpected response format: missing {}", pointer)))?;

    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ArbitrageError::DataParsing(format!("{} is not a number: {}", pointer, value)))?;

    Ok(decimal_from_f64(price, pointer)?)
}

#[async_trait]
impl MarketDataProvider for BrokerQuoteProvider {
    async fn connect(&self) -> Result<()> {
        info!(broker = %self.name, base_url = %self.base_url, "Connecting to broker quote API");
        self.get_spot().await?;
        Ok(())
    }

    async fn get_spot(&self) -> Result<Decimal> {
        let body = self
            .get_json(&self.spot_endpoint, &[("symbol", self.underlying.clone())])
            .await?;
        last_price(&body, &format!("/data/{}/last_price", self.underlying))
    }

    async fn get_futures(&self) -> Result<Decimal> {
        let body = self
            .get_json(
                &self.futures_endpoint,
                &[("symbol", self.underlying.clone()), ("expiry", "nearest".to_string())],
            )
            .await?;
        last_price(&body, "/data/futures/last_price")
    }

    async fn get_atm_options(&self, strike: Decimal) -> Result<OptionQuotes> {
        let body = self
            .get_json(
                &self.options_endpoint,
                &[
                    ("symbol", self.underlying.clone()),
                    ("strike", strike.normalize().to_string()),
                    ("expiry", "nearest".to_string()),
                ],
            )
            .await?;

        Ok(OptionQuotes {
            call: last_price(&body, "/data/options/call/last_price")?,
            put: last_price(&body, "/data/options/put/last_price")?,
        })
    }

    fn source(&self) -> PriceSource {
        PriceSource::Live
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
