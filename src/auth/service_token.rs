use crate::config::ServiceAuthConfig;
use crate::error::AppError;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

/// Refresh this long before the token actually expires.
pub const EXPIRY_BUFFER_MILLIS: i64 = 5 * 60 * 1000;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at_millis: i64,
}

impl CachedToken {
    fn is_fresh(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at_millis - EXPIRY_BUFFER_MILLIS
    }
}

#[derive(Debug, Deserialize)]
struct ClientCredentialsResponse {
    access_token: String,
    expires_in: u64,
}

/// Caches the client-credentials token for the downstream data platform.
///
/// The async mutex doubles as in-flight deduplication: when the cached token
/// is stale and several requests arrive at once, one of them fetches while
/// the rest wait on the lock and then reuse the stored result. A failed
/// fetch leaves the cache empty so the next caller retries.
#[derive(Debug)]
pub struct ServiceTokenCache {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    resource: String,
    authority: String,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceTokenCache {
    /// Build from configuration. All four identifiers absent disables the
    /// integration (`Ok(None)`); a partial set is a startup error so the
    /// misconfiguration is caught before the first request needs a token.
    pub fn from_config(config: &ServiceAuthConfig) -> Result<Option<Self>, AppError> {
        if !config.is_configured() {
            return Ok(None);
        }

        let tenant_id = require(&config.tenant_id, "service_auth.tenant_id")?;
        let client_id = require(&config.client_id, "service_auth.client_id")?;
        let client_secret = require(&config.client_secret, "service_auth.client_secret")?;
        let resource = require(&config.resource, "service_auth.resource")?;

        let http = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("reqwest build error: {e}")))?;

        Ok(Some(Self {
            tenant_id,
            client_id,
            client_secret,
            resource,
            authority: config.authority.trim_end_matches('/').to_string(),
            http,
            cached: Mutex::new(None),
        }))
    }

    /// The resource base URL this cache authenticates against.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Return a token valid for at least the expiry buffer, fetching a new
    /// one if needed.
    pub async fn get_token(&self) -> Result<String, AppError> {
        let mut cached = self.cached.lock().await;

        let now_millis = Utc::now().timestamp_millis();
        if let Some(entry) = cached.as_ref() {
            if entry.is_fresh(now_millis) {
                return Ok(entry.token.clone());
            }
        }

        // Drop the stale entry first so a failed fetch leaves the cache empty
        *cached = None;

        let fetched = self.fetch_token().await?;
        let token = fetched.token.clone();
        *cached = Some(fetched);

        Ok(token)
    }

    /// Drop the cached token so the next call fetches a fresh one.
    pub async fn clear(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken, AppError> {
        let token_url = format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id);
        let scope = format!("{}/.default", self.resource);

        tracing::debug!(tenant_id = %self.tenant_id, "fetching service token");

        let response = self
            .http
            .post(&token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::TokenTimeout(format!("token endpoint did not respond: {e}"))
                } else {
                    AppError::TokenFetch(format!("token request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::TokenFetch(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let parsed: ClientCredentialsResponse = response
            .json()
            .await
            .map_err(|e| AppError::TokenFetch(format!("invalid token response: {e}")))?;

        if parsed.access_token.is_empty() {
            return Err(AppError::TokenFetch(
                "token response missing access_token".to_string(),
            ));
        }

        Ok(CachedToken {
            token: parsed.access_token,
            expires_at_millis: Utc::now().timestamp_millis() + (parsed.expires_in as i64) * 1000,
        })
    }
}

fn require(value: &Option<String>, field: &str) -> Result<String, AppError> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| AppError::MissingCredentials(field.to_string()))
}
