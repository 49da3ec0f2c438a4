use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::news_queries;
use crate::errors::AppError;
use crate::models::news::{IngestOutcome, NewsItem, RawNewsItem};
use crate::services::sentiment::SentimentClassifier;

/// Configuration for news ingestion
#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_key: Option<String>,
}

impl NewsConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("NEWS_ENABLED")
                .ok()
                .and_then(|s| s.parse::<bool>().ok())
                .unwrap_or(false),
            provider: std::env::var("NEWS_PROVIDER").unwrap_or_else(|_| "serper".to_string()),
            api_key: std::env::var("NEWS_API_KEY").ok(),
        }
    }
}

/// Trait for news providers
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_news(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RawNewsItem>, AppError>;
}

/// Serper API provider (uses Google's news search)
pub struct SerperProvider {
    api_key: String,
    client: Client,
}

impl SerperProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    news: Option<Vec<SerperNewsItem>>,
}

#[derive(Debug, Deserialize)]
struct SerperNewsItem {
    title: String,
    link: String,
    source: String,
    date: String,
    snippet: String,
}

#[async_trait]
impl NewsProvider for SerperProvider {
    async fn fetch_news(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RawNewsItem>, AppError> {
        info!("Fetching news from Serper for query: {}", query);

        let request_body = serde_json::json!({
            "q": query,
            "type": "news",
            "num": max_results.min(100), // Serper max is 100
        });

        let response = self
            .client
            .post("https://google.serper.dev/news")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!("Serper API request failed: {}", e);
                AppError::External(format!("News API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Serper API error {}: {}", status, error_text);
            return Err(AppError::External(format!(
                "News API returned error {}: {}",
                status, error_text
            )));
        }

        let serper_response: SerperResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Serper response: {}", e);
            AppError::External(format!("Failed to parse news response: {}", e))
        })?;

        let items: Vec<RawNewsItem> = serper_response
            .news
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let published_at = parse_serper_date(&item.date)?;
                Some(RawNewsItem {
                    title: item.title,
                    source: item.source,
                    url: Some(item.link),
                    published_at,
                    summary: Some(item.snippet),
                })
            })
            .collect();

        info!("Fetched {} news items from Serper", items.len());
        Ok(items)
    }
}

/// Parse Serper date format (e.g., "2 hours ago", "1 day ago", "Mar 15, 2024")
fn parse_serper_date(date_str: &str) -> Option<DateTime<Utc>> {
    let now = Utc::now();
    let lower = date_str.to_lowercase();

    if lower.contains("ago") {
        if let Some(minutes) = extract_number(&lower, "minute") {
            return Some(now - Duration::minutes(minutes as i64));
        }
        if let Some(hours) = extract_number(&lower, "hour") {
            return Some(now - Duration::hours(hours as i64));
        }
        if let Some(days) = extract_number(&lower, "day") {
            return Some(now - Duration::days(days as i64));
        }
    }

    if let Ok(dt) = chrono::NaiveDate::parse_from_str(date_str, "%b %d, %Y") {
        return Some(dt.and_hms_opt(0, 0, 0)?.and_utc());
    }

    warn!("Could not parse date '{}', using current time", date_str);
    Some(now)
}

fn extract_number(text: &str, unit: &str) -> Option<u32> {
    if !text.contains(unit) {
        return None;
    }
    text.split_whitespace()
        .find_map(|word| word.parse::<u32>().ok())
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Dedup key over the normalized identity of an item: same title, source,
/// and publication second always hash to the same fingerprint.
pub fn fingerprint(title: &str, source: &str, published_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(title));
    hasher.update([0x1f]);
    hasher.update(normalize_text(source));
    hasher.update([0x1f]);
    hasher.update(published_at.trunc_subsecs(0).timestamp().to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Word-boundary scan of title + summary for known tracked symbols.
/// Matching is case-sensitive: tickers appear uppercase in headlines.
pub fn extract_symbols(text: &str, known_symbols: &[String]) -> Vec<String> {
    if known_symbols.is_empty() {
        return Vec::new();
    }

    let alternatives: Vec<String> = known_symbols.iter().map(|s| regex::escape(s)).collect();
    let pattern = format!(r"\b({})\b", alternatives.join("|"));
    let re = match regex::Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("Failed to build symbol matcher: {}", e);
            return Vec::new();
        }
    };

    let mut found: Vec<String> = re
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    found.sort();
    found.dedup();
    found
}

/// News ingestion and query pipeline.
pub struct NewsService {
    config: NewsConfig,
    provider: Option<Arc<dyn NewsProvider>>,
    classifier: Arc<dyn SentimentClassifier>,
}

impl NewsService {
    pub fn new(config: NewsConfig, classifier: Arc<dyn SentimentClassifier>) -> Self {
        let provider: Option<Arc<dyn NewsProvider>> = if config.enabled {
            if let Some(api_key) = &config.api_key {
                match config.provider.as_str() {
                    "serper" => {
                        info!("Initializing Serper news provider");
                        Some(Arc::new(SerperProvider::new(api_key.clone())))
                    }
                    _ => {
                        warn!("Unknown news provider: {}", config.provider);
                        None
                    }
                }
            } else {
                warn!("News enabled but no API key provided");
                None
            }
        } else {
            info!("News ingestion disabled");
            None
        };

        Self {
            config,
            provider,
            classifier,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.provider.is_some()
    }

    /// Idempotent ingest. A fingerprint already on record is a silent no-op
    /// (`inserted = false`), and the classifier is not consulted for it.
    pub async fn ingest(
        &self,
        pool: &PgPool,
        raw: &RawNewsItem,
        known_symbols: &[String],
    ) -> Result<IngestOutcome, AppError> {
        let fingerprint = fingerprint(&raw.title, &raw.source, raw.published_at);

        if news_queries::fingerprint_exists(pool, &fingerprint)
            .await
            .map_err(AppError::Db)?
        {
            return Ok(IngestOutcome { inserted: false });
        }

        let mut haystack = raw.title.clone();
        if let Some(summary) = &raw.summary {
            haystack.push(' ');
            haystack.push_str(summary);
        }
        let related_symbols = extract_symbols(&haystack, known_symbols);

        // One classifier call per fresh item.
        let sentiment = self.classifier.classify(&haystack);

        // The ON CONFLICT guard absorbs the race with a concurrent writer
        // ingesting the same item between our existence check and insert.
        let inserted = news_queries::insert_item(
            pool,
            &fingerprint,
            &raw.title,
            &raw.source,
            raw.url.as_deref(),
            raw.published_at,
            raw.summary.as_deref(),
            sentiment,
            &related_symbols,
        )
        .await
        .map_err(AppError::Db)?;

        Ok(IngestOutcome {
            inserted: inserted > 0,
        })
    }

    /// Pull fresh items for a symbol from the provider and ingest them.
    /// Returns how many were actually new.
    pub async fn ingest_for_symbol(
        &self,
        pool: &PgPool,
        symbol: &str,
        known_symbols: &[String],
    ) -> Result<usize, AppError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| AppError::External("News ingestion is not enabled".to_string()))?;

        let query = format!("{} stock news", symbol);
        let items = provider.fetch_news(&query, 20).await?;

        let mut inserted = 0;
        for item in &items {
            if self.ingest(pool, item, known_symbols).await?.inserted {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

/// Most-recent-first page of a symbol's news, restartable via the
/// `before` cursor.
pub async fn by_symbol(
    pool: &PgPool,
    symbol: &str,
    limit: i64,
    before: Option<DateTime<Utc>>,
) -> Result<Vec<NewsItem>, AppError> {
    news_queries::fetch_by_symbol(pool, symbol, limit.clamp(1, 100), before)
        .await
        .map_err(AppError::Db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn identical_normalized_identity_collides() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let a = fingerprint("Apple Reports Record Revenue", "Financial Times", at);
        let b = fingerprint("  apple   reports record revenue ", "FINANCIAL TIMES", at);
        assert_eq!(a, b);
    }

    #[test]
    fn different_source_or_time_does_not_collide() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let a = fingerprint("Apple Reports Record Revenue", "Financial Times", at);
        let b = fingerprint("Apple Reports Record Revenue", "Reuters", at);
        let c = fingerprint(
            "Apple Reports Record Revenue",
            "Financial Times",
            at + Duration::seconds(1),
        );
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn subsecond_precision_does_not_split_fingerprints() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let a = fingerprint("Title", "Source", at);
        let b = fingerprint("Title", "Source", at + Duration::milliseconds(400));
        assert_eq!(a, b);
    }

    #[test]
    fn symbols_match_on_word_boundaries_only() {
        let known = vec!["AAPL".to_string(), "CAT".to_string(), "MSFT".to_string()];

        let found = extract_symbols("AAPL rallies while CATALOG expands", &known);
        assert_eq!(found, vec!["AAPL".to_string()]);

        let found = extract_symbols("CAT and MSFT both moved, MSFT more", &known);
        assert_eq!(found, vec!["CAT".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn no_known_symbols_means_no_matches() {
        assert!(extract_symbols("AAPL rallies", &[]).is_empty());
    }

    #[test]
    fn relative_dates_parse() {
        let parsed = parse_serper_date("2 hours ago").unwrap();
        let delta = Utc::now() - parsed;
        assert!((delta - Duration::hours(2)).num_minutes().abs() <= 1);

        let parsed = parse_serper_date("Mar 15, 2024").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }
}
