//! HTTP client layer: authentication and the Google Ads API surface

mod auth;
mod googleads;

pub use auth::{Authenticator, GOOGLE_TOKEN_ENDPOINT, RefreshFlow};
pub use googleads::{API_BASE, AccessibleCustomers, GoogleAdsClient, SearchResponse};

use reqwest::StatusCode;

/// A transient, recognized API failure that truncates the current stream
/// invocation instead of aborting the run.
///
/// Raised by the pagination loop when a stream designates the response
/// status as resumable; the loop downcasts errors to this type to decide
/// between "end the sequence with a warning" and "propagate".
#[derive(Debug)]
pub struct ResumableError {
    pub status: StatusCode,
    pub message: String,
}

impl ResumableError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ResumableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for ResumableError {}
