//! OAuth2 refresh-token authentication
//!
//! Redeems a long-lived refresh token for short-lived bearer tokens, either
//! directly against Google's token endpoint or through a caller-supplied
//! proxy that performs the exchange on our behalf. Tokens are cached until
//! shortly before expiry, so at most one exchange happens per validity
//! window.

use crate::config::OAuthCredentials;
use eyre::{Context, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// Google's OAuth2 token endpoint used by the direct exchange.
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v4/token";

/// Refresh tokens a minute before the provider-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// How a refresh token gets exchanged for an access token.
#[derive(Clone, Debug)]
pub enum RefreshFlow {
    /// Exchange directly with the provider's token endpoint.
    Direct {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    /// Exchange through a trusted proxy that holds the client secret.
    Proxy {
        url: Url,
        authorization: Option<String>,
        refresh_token: String,
    },
}

impl RefreshFlow {
    /// Select a flow from the configured credential fields.
    ///
    /// The direct flow wins when `client_id`, `client_secret`, and
    /// `refresh_token` are all present; otherwise the proxy flow is used,
    /// requiring `refresh_proxy_url` and `refresh_token`.
    ///
    /// # Errors
    /// Returns a configuration error if neither variant is complete. No
    /// network call is attempted.
    pub fn from_credentials(credentials: &OAuthCredentials) -> Result<Self> {
        match (
            &credentials.client_id,
            &credentials.client_secret,
            &credentials.refresh_token,
            &credentials.refresh_proxy_url,
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token), _) => Ok(Self::Direct {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                refresh_token: refresh_token.clone(),
            }),
            (_, _, Some(refresh_token), Some(proxy_url)) => {
                let url = Url::parse(proxy_url)
                    .with_context(|| format!("Invalid refresh_proxy_url: {}", proxy_url))?;
                Ok(Self::Proxy {
                    url,
                    authorization: credentials.refresh_proxy_url_auth.clone(),
                    refresh_token: refresh_token.clone(),
                })
            }
            (_, _, None, _) => Err(eyre::eyre!("oauth_credentials.refresh_token is required")),
            _ => Err(eyre::eyre!(
                "oauth_credentials must provide either client_id/client_secret/refresh_token \
                 or refresh_proxy_url/refresh_token"
            )),
        }
    }
}

#[derive(Clone, Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Produces valid bearer tokens for outgoing requests.
///
/// The caller never needs to know which refresh flow is configured; the
/// strategy is fixed at construction and the token cache is shared across
/// stream invocations. The cache lock is held across the refresh call, so a
/// future parallel runner still performs a single exchange per expiry.
#[derive(Debug)]
pub struct Authenticator {
    flow: RefreshFlow,
    token_endpoint: String,
    cached: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    /// Build an authenticator for the given flow against Google's token
    /// endpoint.
    pub fn new(flow: RefreshFlow) -> Self {
        Self::with_token_endpoint(flow, GOOGLE_TOKEN_ENDPOINT)
    }

    /// Build an authenticator with a custom token endpoint for the direct
    /// flow. The proxy flow always uses the URL embedded in the flow itself.
    pub fn with_token_endpoint(flow: RefreshFlow, token_endpoint: impl Into<String>) -> Self {
        Self {
            flow,
            token_endpoint: token_endpoint.into(),
            cached: Mutex::new(None),
        }
    }

    /// Select a flow from credentials and build an authenticator for it.
    ///
    /// # Errors
    /// Fails with a configuration error if the credential fields do not form
    /// a complete variant.
    pub fn from_credentials(credentials: &OAuthCredentials) -> Result<Self> {
        Ok(Self::new(RefreshFlow::from_credentials(credentials)?))
    }

    /// The refresh flow selected at construction.
    pub fn flow(&self) -> &RefreshFlow {
        &self.flow
    }

    /// Return a valid bearer token, refreshing if the cached one is missing
    /// or stale. At most one outbound call per expiry window.
    ///
    /// # Errors
    /// Returns an error if the token exchange fails; the stale cache entry is
    /// left untouched so a later call can retry.
    pub async fn bearer_token(&self, http: &reqwest::Client) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
            log::debug!("Cached access token expired, refreshing");
        }

        let token = self.refresh(http).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn refresh(&self, http: &reqwest::Client) -> Result<CachedToken> {
        let response = match &self.flow {
            RefreshFlow::Direct {
                client_id,
                client_secret,
                refresh_token,
            } => {
                log::debug!("Refreshing access token via token endpoint");
                http.get(&self.token_endpoint)
                    .query(&[
                        ("refresh_token", refresh_token.as_str()),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("grant_type", "refresh_token"),
                    ])
                    .send()
                    .await
                    .context("Token refresh request failed")?
            }
            RefreshFlow::Proxy {
                url,
                authorization,
                refresh_token,
            } => {
                log::debug!("Refreshing access token via proxy {}", url);
                let mut request = http
                    .post(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .header(reqwest::header::ACCEPT, "application/json")
                    .json(&serde_json::json!({
                        "refresh_token": refresh_token,
                        "grant_type": "refresh_token",
                    }));
                if let Some(authorization) = authorization {
                    request = request.header(reqwest::header::AUTHORIZATION, authorization);
                }
                request
                    .send()
                    .await
                    .context("Proxy token refresh request failed")?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Token refresh rejected ({}): {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
