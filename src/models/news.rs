use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Sentiment classification for news
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

/// A stored news item. Append-only, deduplicated by fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NewsItem {
    pub id: Uuid,
    pub fingerprint: String,
    pub title: String,
    pub source: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub sentiment: Sentiment,
    pub related_symbols: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// An item as it arrives from a provider, before dedup and tagging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNewsItem {
    pub title: String,
    pub source: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub summary: Option<String>,
}

/// Outcome of an ingest call. A fingerprint collision is a no-op, not an
/// error.
#[derive(Debug, Serialize)]
pub struct IngestOutcome {
    pub inserted: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewsQueryParams {
    pub symbol: String,
    pub limit: Option<i64>,
    /// Keyset cursor: only items published strictly before this instant.
    pub before: Option<DateTime<Utc>>,
}
