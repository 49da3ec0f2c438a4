use crate::external::quote_provider::{ProviderQuote, QuoteProvider, QuoteProviderError};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn from_env() -> Result<Self, QuoteProviderError> {
        let api_key = std::env::var("ALPHAVANTAGE_API_KEY")
            .map_err(|_| QuoteProviderError::BadResponse("ALPHAVANTAGE_API_KEY not set".into()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AvGlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<AvGlobalQuote>,

    // When rate-limited Alpha Vantage returns:
    // { "Note": "Thank you for using Alpha Vantage! ... 5 calls per minute ..." }
    #[serde(rename = "Note")]
    note: Option<String>,

    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvGlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: String,
    #[serde(rename = "05. price")]
    price: String,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "09. change")]
    change: String,
    #[serde(rename = "10. change percent")]
    change_percent: String,
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    async fn fetch_quote(&self, symbol: &str) -> Result<ProviderQuote, QuoteProviderError> {
        let url = "https://www.alphavantage.co/query";

        let resp = self
            .client
            .get(url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| QuoteProviderError::Network(e.to_string()))?;

        let body = resp
            .json::<AvGlobalQuoteResponse>()
            .await
            .map_err(|e| QuoteProviderError::Parse(e.to_string()))?;

        if body.note.is_some() {
            // This is the throttle response
            return Err(QuoteProviderError::RateLimited);
        }

        if let Some(msg) = body.error_message {
            return Err(QuoteProviderError::BadResponse(msg));
        }

        let quote = body.global_quote.ok_or(QuoteProviderError::NotFound)?;

        // An empty symbol means Alpha Vantage did not recognize the ticker.
        if quote.symbol.is_empty() {
            return Err(QuoteProviderError::NotFound);
        }

        let price = quote
            .price
            .parse::<f64>()
            .map_err(|e| QuoteProviderError::Parse(e.to_string()))?;

        let change = quote
            .change
            .parse::<f64>()
            .map_err(|e| QuoteProviderError::Parse(e.to_string()))?;

        // Change percent arrives as e.g. "1.3200%".
        let change_percent = quote
            .change_percent
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(|e| QuoteProviderError::Parse(e.to_string()))?;

        let volume = quote.volume.and_then(|v| v.parse::<i64>().ok());

        Ok(ProviderQuote {
            symbol: quote.symbol,
            price,
            change,
            change_percent,
            volume,
            // GLOBAL_QUOTE reports no intraday timestamp.
            market_cap: None,
            as_of: Utc::now(),
        })
    }
}
