use crate::external::quote_provider::{ProviderQuote, QuoteProvider, QuoteProviderError};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

/// Yahoo Finance quote provider. No API key required.
pub struct YahooQuoteProvider {
    client: reqwest::Client,
}

impl YahooQuoteProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (compatible; Finwatch/0.1)")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooQuoteResponse {
    #[serde(rename = "quoteResponse")]
    quote_response: YahooQuoteBody,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteBody {
    result: Option<Vec<YahooQuoteRow>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteRow {
    symbol: String,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketChange")]
    regular_market_change: Option<f64>,
    #[serde(rename = "regularMarketChangePercent")]
    regular_market_change_percent: Option<f64>,
    #[serde(rename = "regularMarketVolume")]
    regular_market_volume: Option<i64>,
    #[serde(rename = "marketCap")]
    market_cap: Option<f64>,
    #[serde(rename = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

#[async_trait]
impl QuoteProvider for YahooQuoteProvider {
    async fn fetch_quote(&self, symbol: &str) -> Result<ProviderQuote, QuoteProviderError> {
        let url = "https://query1.finance.yahoo.com/v7/finance/quote";

        let resp = self
            .client
            .get(url)
            .query(&[("symbols", symbol)])
            .send()
            .await
            .map_err(|e| QuoteProviderError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            if status.as_u16() == 404 {
                return Err(QuoteProviderError::NotFound);
            }
            if status.as_u16() == 429 {
                return Err(QuoteProviderError::RateLimited);
            }
            if status.is_server_error() {
                return Err(QuoteProviderError::Unavailable(format!("HTTP {}", status)));
            }
            return Err(QuoteProviderError::BadResponse(format!("HTTP {}", status)));
        }

        let body: YahooQuoteResponse = resp
            .json()
            .await
            .map_err(|e| QuoteProviderError::Parse(e.to_string()))?;

        if let Some(error) = body.quote_response.error {
            return Err(QuoteProviderError::BadResponse(error.description));
        }

        let rows = body
            .quote_response
            .result
            .ok_or_else(|| QuoteProviderError::BadResponse("no results in response".into()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(QuoteProviderError::NotFound)?;

        let price = row
            .regular_market_price
            .ok_or_else(|| QuoteProviderError::Parse("missing regularMarketPrice".into()))?;

        // regularMarketTime is a Unix timestamp; absent outside trading hours
        // for some instruments, in which case we stamp it ourselves.
        let as_of = row
            .regular_market_time
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        Ok(ProviderQuote {
            symbol: row.symbol,
            price,
            change: row.regular_market_change.unwrap_or(0.0),
            change_percent: row.regular_market_change_percent.unwrap_or(0.0),
            volume: row.regular_market_volume,
            market_cap: row.market_cap,
            as_of,
        })
    }
}
