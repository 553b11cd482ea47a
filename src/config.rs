//! Extractor configuration
//!
//! Loads a JSON (JSON5-tolerant) config file, overlays secrets from the
//! environment, and validates the OAuth credential variant and date window
//! before anything touches the network.

use chrono::{Days, NaiveDate, Utc};
use eyre::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// OAuth2 refresh-token credentials.
///
/// Two variants are supported, distinguished by which fields are populated:
/// - **Direct**: `client_id` + `client_secret` + `refresh_token`, redeemed
///   against Google's token endpoint.
/// - **Proxy**: `refresh_proxy_url` + `refresh_token` (plus an optional
///   `refresh_proxy_url_auth` header value), where a trusted intermediary
///   performs the exchange on our behalf.
///
/// Exactly one variant must be self-consistent; this is checked by
/// [`Config::validate`] and again when the authenticator is built.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub refresh_proxy_url: Option<String>,
    pub refresh_proxy_url_auth: Option<String>,
}

impl OAuthCredentials {
    /// True when all three direct-exchange fields are present.
    pub fn is_direct(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.refresh_token.is_some()
    }

    /// True when the proxy-exchange fields are present.
    pub fn is_proxy(&self) -> bool {
        self.refresh_proxy_url.is_some() && self.refresh_token.is_some()
    }
}

/// Process-wide extractor configuration, read-only after load.
///
/// # Example
/// ```no_run
/// use googleads_extractor::Config;
///
/// # fn example() -> eyre::Result<()> {
/// let config = Config::load("config.json")?;
/// println!("Syncing {} through {}", config.start_date, config.end_date);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub oauth_credentials: OAuthCredentials,
    pub developer_token: String,
    /// Manager account id for the `login-customer-id` header. Falls back to
    /// the per-invocation context when absent.
    pub login_customer_id: Option<String>,
    /// Sync only these customer ids instead of discovering accessible
    /// accounts. Takes precedence over `customer_id`.
    pub customer_ids: Option<Vec<String>>,
    /// Single-customer form of `customer_ids`.
    pub customer_id: Option<String>,
    pub user_agent: Option<String>,
    /// First day of the report window. Defaults to 90 days before today.
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    /// Last day of the report window. Defaults to today.
    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,
    /// Gates the click view report stream, which needs extra permissions on
    /// the Google Ads account.
    #[serde(default)]
    pub enable_click_view_report_stream: bool,
    /// Whole-request timeout applied to the HTTP client. No timeout if unset.
    pub request_timeout_secs: Option<u64>,
}

fn default_end_date() -> NaiveDate {
    Utc::now().date_naive()
}

fn default_start_date() -> NaiveDate {
    Utc::now().date_naive() - Days::new(90)
}

impl Config {
    /// Load and validate a config file.
    ///
    /// The file is parsed as JSON5, so plain JSON as well as commented
    /// configs are accepted. Secrets found in the environment override the
    /// file contents (see [`Config::apply_env_overrides`]).
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = json5::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Overlay credential fields from environment variables.
    ///
    /// Recognized variables:
    /// - `GOOGLE_ADS_DEVELOPER_TOKEN`
    /// - `GOOGLE_ADS_CLIENT_ID` / `GOOGLE_ADS_CLIENT_SECRET`
    /// - `GOOGLE_ADS_REFRESH_TOKEN`
    /// - `GOOGLE_ADS_REFRESH_PROXY_URL` / `GOOGLE_ADS_REFRESH_PROXY_URL_AUTH`
    /// - `GOOGLE_ADS_LOGIN_CUSTOMER_ID`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("GOOGLE_ADS_DEVELOPER_TOKEN") {
            self.developer_token = token;
        }
        if let Ok(id) = std::env::var("GOOGLE_ADS_CLIENT_ID") {
            self.oauth_credentials.client_id = Some(id);
        }
        if let Ok(secret) = std::env::var("GOOGLE_ADS_CLIENT_SECRET") {
            self.oauth_credentials.client_secret = Some(secret);
        }
        if let Ok(token) = std::env::var("GOOGLE_ADS_REFRESH_TOKEN") {
            self.oauth_credentials.refresh_token = Some(token);
        }
        if let Ok(url) = std::env::var("GOOGLE_ADS_REFRESH_PROXY_URL") {
            self.oauth_credentials.refresh_proxy_url = Some(url);
        }
        if let Ok(auth) = std::env::var("GOOGLE_ADS_REFRESH_PROXY_URL_AUTH") {
            self.oauth_credentials.refresh_proxy_url_auth = Some(auth);
        }
        if let Ok(id) = std::env::var("GOOGLE_ADS_LOGIN_CUSTOMER_ID") {
            self.login_customer_id = Some(id);
        }
    }

    /// Validate credential and date-window invariants.
    ///
    /// # Errors
    /// Returns an error if neither OAuth variant is complete, if the
    /// developer token is empty, or if `start_date > end_date`.
    pub fn validate(&self) -> Result<()> {
        if !self.oauth_credentials.is_direct() && !self.oauth_credentials.is_proxy() {
            eyre::bail!(
                "oauth_credentials must provide either client_id/client_secret/refresh_token \
                 or refresh_proxy_url/refresh_token"
            );
        }
        if self.developer_token.is_empty() {
            eyre::bail!("developer_token must not be empty");
        }
        if self.start_date > self.end_date {
            eyre::bail!(
                "start_date ({}) must not be after end_date ({})",
                self.start_date,
                self.end_date
            );
        }
        Ok(())
    }

    /// Start of the report window as a quoted GAQL date literal, e.g.
    /// `'2024-01-01'`.
    pub fn start_date_literal(&self) -> String {
        format!("'{}'", self.start_date.format("%Y-%m-%d"))
    }

    /// End of the report window as a quoted GAQL date literal.
    pub fn end_date_literal(&self) -> String {
        format!("'{}'", self.end_date.format("%Y-%m-%d"))
    }

    /// Explicitly configured customer ids, if any.
    ///
    /// Resolution order: `customer_ids`, then a singleton list from
    /// `customer_id`, then `None` (meaning "discover dynamically").
    pub fn configured_customer_ids(&self) -> Option<Vec<String>> {
        if let Some(ids) = &self.customer_ids {
            return Some(ids.clone());
        }
        self.customer_id.clone().map(|id| vec![id])
    }
}
