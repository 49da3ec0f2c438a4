mod portfolio;
mod holding;
mod quote;
mod valuation;
pub mod alert;
pub mod news;

pub use portfolio::{Portfolio, CreatePortfolio, UpdatePortfolio};
pub use holding::{Holding, CreateHolding};
pub use quote::{Quote, QuoteResult, QuoteBatch};
pub use valuation::{Valuation, HoldingValuation, ValuationSnapshot};
pub use alert::{AlertRule, AlertCondition, AlertStatus, AlertEvent, CreateAlertRule, RuleAction};
pub use news::{NewsItem, RawNewsItem, Sentiment, IngestOutcome, NewsQueryParams};
