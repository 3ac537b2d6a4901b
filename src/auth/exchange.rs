use crate::auth::config::OAuthProvider;
use crate::error::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on any single token endpoint round-trip.
pub const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause before the single retry, giving a briefly overloaded provider a
/// chance to recover.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Token material returned by a provider's token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

struct AttemptError {
    error: AppError,
    retryable: bool,
}

/// Speaks the OAuth 2.0 token endpoint wire protocol directly.
///
/// Server errors and connection failures get a single retry; client errors
/// (4xx) are returned immediately with the provider's response body so the
/// caller can see what the provider rejected. Timeouts are not retried,
/// keeping the worst-case latency bounded.
#[derive(Clone)]
pub struct TokenExchanger {
    http: Client,
}

impl TokenExchanger {
    pub fn new() -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            // Following redirects opens the client up to SSRF vulnerabilities.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("reqwest build error: {e}")))?;
        Ok(Self { http })
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        provider: &OAuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, AppError> {
        let token_url = provider
            .token_url
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Token URL not configured".to_string()))?;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.as_str()),
        ];

        self.post_form(token_url, &params).await
    }

    /// Redeem a refresh token for a fresh access token.
    pub async fn refresh(
        &self,
        provider: &OAuthProvider,
        refresh_token: &str,
    ) -> Result<TokenSet, AppError> {
        let token_url = provider
            .token_url
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Token URL not configured".to_string()))?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.as_str()),
        ];

        self.post_form(token_url, &params).await
    }

    async fn post_form(
        &self,
        token_url: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, AppError> {
        match self.post_form_once(token_url, params).await {
            Ok(tokens) => Ok(tokens),
            Err(attempt) if attempt.retryable => {
                tracing::warn!(error = %attempt.error, "token request failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.post_form_once(token_url, params)
                    .await
                    .map_err(|a| a.error)
            }
            Err(attempt) => Err(attempt.error),
        }
    }

    async fn post_form_once(
        &self,
        token_url: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, AttemptError> {
        let response = self
            .http
            .post(token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError {
                        error: AppError::TokenTimeout(format!(
                            "token endpoint did not respond: {e}"
                        )),
                        retryable: false,
                    }
                } else {
                    AttemptError {
                        error: AppError::TokenExchange(format!("token request failed: {e}")),
                        retryable: true,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError {
                error: AppError::TokenExchange(format!("token endpoint returned {status}: {body}")),
                retryable: status.is_server_error(),
            });
        }

        let tokens: TokenSet = response.json().await.map_err(|e| AttemptError {
            error: AppError::TokenExchange(format!("invalid token response: {e}")),
            retryable: false,
        })?;

        if tokens.access_token.is_empty() {
            return Err(AttemptError {
                error: AppError::TokenExchange(
                    "token response missing access_token".to_string(),
                ),
                retryable: false,
            });
        }

        Ok(tokens)
    }
}
