//! Background Jobs Module
//!
//! Implementations of the background jobs driven by the job scheduler
//! service. These run independently of user requests.
//!
//! # Available Jobs
//!
//! - `quote_refresh_job` - Refreshes tracked quotes and evaluates alerts
//! - `valuation_snapshot_job` - Samples portfolio valuations into the
//!   historical series and enforces retention
//! - `news_ingest_job` - Pulls fresh news for tracked symbols
//!
//! Jobs are idempotent, log their failures, and report a `JobResult` with
//! processed/failed counts back to the scheduler.

pub mod quote_refresh_job;
pub mod valuation_snapshot_job;
pub mod news_ingest_job;
