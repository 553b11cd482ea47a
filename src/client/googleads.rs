//! Google Ads API client
//!
//! Provides `GoogleAdsClient` for issuing search and discovery requests
//! against the Google Ads REST surface. Request headers are resolved per
//! invocation from the config and the stream context; the bearer token comes
//! from the shared [`Authenticator`].

use super::Authenticator;
use crate::config::Config;
use crate::streams::Context as StreamContext;
use eyre::{Context, Result};
use reqwest::header::{self, HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Base URL of the Google Ads API, including the pinned version.
pub const API_BASE: &str = "https://googleads.googleapis.com/v20";

/// Google Ads API client.
///
/// One client is shared by every stream invocation in a run; it owns the
/// HTTP connection pool, the authenticator (and thus the token cache), and
/// the config used for header resolution.
///
/// # Example
/// ```no_run
/// use googleads_extractor::{Config, GoogleAdsClient};
/// use std::sync::Arc;
///
/// # async fn example() -> eyre::Result<()> {
/// let config = Arc::new(Config::load("config.json")?);
/// let client = GoogleAdsClient::new(config)?;
/// let accessible = client.list_accessible_customers().await?;
/// println!("{} accessible account(s)", accessible.resource_names.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GoogleAdsClient {
    http: reqwest::Client,
    authenticator: Authenticator,
    config: Arc<Config>,
    base_url: String,
}

/// One page of a `googleAds:search` response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<Value>,
    pub next_page_token: Option<String>,
}

/// Response of the `customers:listAccessibleCustomers` discovery endpoint.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibleCustomers {
    #[serde(default)]
    pub resource_names: Vec<String>,
}

impl GoogleAdsClient {
    /// Create a client against the production API base.
    ///
    /// # Errors
    /// Fails on incomplete OAuth credentials or if the HTTP client cannot be
    /// built.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        Self::with_base_url(config, API_BASE)
    }

    /// Create a client against a custom API base URL.
    pub fn with_base_url(config: Arc<Config>, base_url: impl Into<String>) -> Result<Self> {
        let authenticator = Authenticator::from_credentials(&config.oauth_credentials)?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            authenticator,
            config,
            base_url: base_url.into(),
        })
    }

    /// The config this client was built with.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Obtain a valid access token from the authenticator.
    ///
    /// Used by the `auth` CLI command to verify credentials without issuing
    /// an API request.
    pub async fn access_token(&self) -> Result<String> {
        self.authenticator.bearer_token(&self.http).await
    }

    /// Resolve the per-request header set.
    ///
    /// `developer-token` is always sent; `User-Agent` only when configured;
    /// `login-customer-id` resolves to the explicit config value, else the
    /// context's customer id, else is omitted.
    fn request_headers(&self, context: Option<&StreamContext>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(user_agent) = &self.config.user_agent {
            headers.insert(header::USER_AGENT, user_agent.parse()?);
        }
        headers.insert("developer-token", self.config.developer_token.parse()?);

        let login_customer_id = self
            .config
            .login_customer_id
            .clone()
            .or_else(|| context.map(|c| c.customer_id.clone()));
        if let Some(login_customer_id) = login_customer_id {
            headers.insert("login-customer-id", login_customer_id.parse()?);
        }
        Ok(headers)
    }

    /// Issue one page of a GAQL search for the context's customer.
    ///
    /// The query rides in the URL as `query=`; `page_token` continues a prior
    /// page and `order_by` requests ascending sort on a replication key.
    /// Returns the raw response so callers can apply their own status policy.
    pub async fn search_page(
        &self,
        context: &StreamContext,
        query: &str,
        page_token: Option<&str>,
        order_by: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = format!(
            "{}/customers/{}/googleAds:search",
            self.base_url, context.customer_id
        );

        let mut params: Vec<(&str, &str)> = vec![("query", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        if let Some(key) = order_by {
            params.push(("sort", "asc"));
            params.push(("order_by", key));
        }

        let token = self.authenticator.bearer_token(&self.http).await?;
        log::trace!("POST {} (pageToken: {})", url, page_token.unwrap_or("-"));
        self.http
            .post(&url)
            .query(&params)
            .headers(self.request_headers(Some(context))?)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Search request for customer {} failed", context.customer_id))
    }

    /// List the customer accounts the refresh token can access.
    ///
    /// # Errors
    /// Any non-success status is fatal here; discovery has no resumable
    /// error class.
    pub async fn list_accessible_customers(&self) -> Result<AccessibleCustomers> {
        let url = format!("{}/customers:listAccessibleCustomers", self.base_url);
        let token = self.authenticator.bearer_token(&self.http).await?;
        let response = self
            .http
            .get(&url)
            .headers(self.request_headers(None)?)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to list accessible customers")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Failed to list accessible customers ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse accessible customers response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthCredentials;
    use chrono::NaiveDate;

    fn config(login_customer_id: Option<&str>) -> Arc<Config> {
        Arc::new(Config {
            oauth_credentials: OAuthCredentials {
                client_id: Some("id".into()),
                client_secret: Some("secret".into()),
                refresh_token: Some("refresh".into()),
                ..Default::default()
            },
            developer_token: "dev-token".into(),
            login_customer_id: login_customer_id.map(Into::into),
            customer_ids: None,
            customer_id: None,
            user_agent: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            enable_click_view_report_stream: false,
            request_timeout_secs: None,
        })
    }

    #[test]
    fn test_login_customer_id_prefers_config() {
        let client = GoogleAdsClient::new(config(Some("777"))).unwrap();
        let context = StreamContext::new("111");
        let headers = client.request_headers(Some(&context)).unwrap();
        assert_eq!(headers.get("login-customer-id").unwrap(), "777");
        assert_eq!(headers.get("developer-token").unwrap(), "dev-token");
    }

    #[test]
    fn test_login_customer_id_falls_back_to_context() {
        let client = GoogleAdsClient::new(config(None)).unwrap();
        let context = StreamContext::new("111");
        let headers = client.request_headers(Some(&context)).unwrap();
        assert_eq!(headers.get("login-customer-id").unwrap(), "111");
    }

    #[test]
    fn test_login_customer_id_absent_without_context() {
        let client = GoogleAdsClient::new(config(None)).unwrap();
        let headers = client.request_headers(None).unwrap();
        assert!(headers.get("login-customer-id").is_none());
    }

    #[test]
    fn test_user_agent_only_when_configured() {
        let client = GoogleAdsClient::new(config(None)).unwrap();
        let headers = client.request_headers(None).unwrap();
        assert!(headers.get(header::USER_AGENT).is_none());

        let mut with_agent = (*config(None)).clone();
        with_agent.user_agent = Some("gadx/0.3".into());
        let client = GoogleAdsClient::new(Arc::new(with_agent)).unwrap();
        let headers = client.request_headers(None).unwrap();
        assert_eq!(headers.get(header::USER_AGENT).unwrap(), "gadx/0.3");
    }
}
