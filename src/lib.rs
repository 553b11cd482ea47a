//! Google Ads Extractor
//!
//! An ETL-style tap that pulls Google Ads report streams into NDJSON files

pub mod cli;
pub mod client;
pub mod config;
pub mod runner;
pub mod storage;
pub mod streams;

// Re-exports for convenience
pub use client::{Authenticator, GoogleAdsClient, RefreshFlow, ResumableError};
pub use config::{Config, OAuthCredentials};
pub use runner::{StreamOutcome, SyncRunner, SyncSummary};
pub use storage::{MemorySink, NdjsonDirSink, RecordSink};
pub use streams::{Context, RecordPager, ReportStream, select_streams};
