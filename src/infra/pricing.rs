//! Thin asynchronous client for the batched market-price endpoint.
//!
//! - One `POST {base}/prices` per request, carrying every name at once.
//! - Accepts a bare quote array or the `{status, data, message}` envelope.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::domain::PriceQuote;
use crate::util::{config::PricingConfig, version::user_agent};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787/api/";
const DEFAULT_MARKET: &str = "jita";
/// Backstop for the HTTP layer; the resolver applies its own, shorter bound.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum PriceFetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {0}")]
    Api(String),
    #[error("malformed price payload: {0}")]
    Decode(String),
}

/// Source of market prices for a batch of item names.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Prices for as many of `names` as the source knows. Partial answers are fine.
    async fn fetch_prices(&self, names: &[String]) -> Result<Vec<PriceQuote>, PriceFetchError>;
}

#[derive(Clone)]
pub struct PriceClient {
    http: Client,
    base_url: Url,
    market: String,
}

impl PriceClient {
    pub fn new() -> Result<Self, PriceFetchError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base: &str) -> Result<Self, PriceFetchError> {
        let base_url = Url::parse(base)?;
        let http = Client::builder()
            .user_agent(user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            market: DEFAULT_MARKET.to_string(),
        })
    }

    pub fn from_config(config: &PricingConfig) -> Result<Self, PriceFetchError> {
        Ok(Self::with_base_url(&config.base_url)?.with_market(&config.market))
    }

    pub fn with_market(mut self, market: &str) -> Self {
        self.market = market.to_string();
        self
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

#[derive(Debug, Serialize)]
struct PriceRequest<'a> {
    market: &'a str,
    names: &'a [String],
}

#[async_trait]
impl PriceFeed for PriceClient {
    async fn fetch_prices(&self, names: &[String]) -> Result<Vec<PriceQuote>, PriceFetchError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url("prices")?;
        debug!(%url, count = names.len(), "requesting prices");

        let raw: serde_json::Value = self
            .http
            .post(url)
            .json(&PriceRequest {
                market: &self.market,
                names,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let quotes = parse_quotes(raw)?;
        debug!(received = quotes.len(), "price payload decoded");
        Ok(quotes)
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceDto {
    #[serde(alias = "type_id", alias = "typeId", deserialize_with = "string_from_json")]
    id: String,
    name: String,
    #[serde(default, alias = "minSell")]
    sell_min: Option<f64>,
    #[serde(default, alias = "maxBuy")]
    buy_max: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default, alias = "dateModified")]
    date_modified: Option<i64>,
    #[serde(default, alias = "updatedAt")]
    updated_at: Option<String>,
}

impl PriceDto {
    /// Sell-side price first; a bare `price` is the fallback.
    fn into_quote(self) -> Option<PriceQuote> {
        let unit_price = self
            .sell_min
            .filter(|price| price.is_finite() && *price > 0.0)
            .or(self.price)
            .filter(|price| price.is_finite() && *price >= 0.0)?;
        Some(PriceQuote {
            item_id: self.id,
            name: self.name,
            unit_price,
            buy_price: self.buy_max.filter(|price| price.is_finite() && *price > 0.0),
            quoted_at: parse_timestamp_fields(self.date_modified, self.updated_at.as_deref()),
        })
    }
}

fn parse_quotes(value: serde_json::Value) -> Result<Vec<PriceQuote>, PriceFetchError> {
    let entries: Vec<PriceDto> = match value {
        serde_json::Value::Array(_) => {
            serde_json::from_value(value).map_err(|err| PriceFetchError::Decode(err.to_string()))?
        }
        serde_json::Value::Object(_) => {
            let ApiEnvelope {
                status,
                data,
                message,
            } = serde_json::from_value::<ApiEnvelope<Vec<PriceDto>>>(value)
                .map_err(|err| PriceFetchError::Decode(err.to_string()))?;
            if !status.eq_ignore_ascii_case("ok") {
                return Err(PriceFetchError::Api(message.unwrap_or(status)));
            }
            data.ok_or_else(|| PriceFetchError::Decode("response missing data".into()))?
        }
        other => {
            return Err(PriceFetchError::Decode(format!(
                "expected an array or object, got {other}"
            )))
        }
    };

    Ok(entries.into_iter().filter_map(PriceDto::into_quote).collect())
}

fn parse_timestamp_fields(epoch: Option<i64>, iso: Option<&str>) -> Option<OffsetDateTime> {
    epoch
        .filter(|secs| *secs >= 0)
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .or_else(|| iso.and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok()))
}

fn string_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> serde::de::Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}
