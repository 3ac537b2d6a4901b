use crate::{
    auth::{
        exchange::{TokenExchanger, TokenSet},
        providers::Oauth2Client,
        state::{OAuthState, StateCodec},
    },
    cache::CacheHandle,
    config::Config,
    database::{DatabaseManager, UserRecord},
    error::AppError,
};
use chrono::Utc;
use oauth2::{CsrfToken, RedirectUrl, Scope};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub authorization_url: String,
    pub state: String,
    pub platform: String,
}

/// Result of a completed callback: who logged in, the provider tokens,
/// and where the frontend asked to be sent afterwards.
#[derive(Debug)]
pub struct CallbackOutcome {
    pub user_id: i32,
    pub tokens: TokenSet,
    pub return_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlatformInfo {
    pub name: String,
    pub display_name: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlatformsResponse {
    pub platforms: Vec<PlatformInfo>,
}

/// OAuth flow handlers
pub struct OAuthFlows {
    config: Config,
    state_codec: StateCodec,
    exchanger: TokenExchanger,
    http_client: Client,
    database: Arc<dyn DatabaseManager>,
    cache: CacheHandle,
    oauth_clients: HashMap<String, Arc<Oauth2Client>>,
}

impl OAuthFlows {
    pub fn new(
        config: Config,
        database: Arc<dyn DatabaseManager>,
        cache: CacheHandle,
        oauth_clients: HashMap<String, Arc<Oauth2Client>>,
    ) -> Result<Self, AppError> {
        let state_codec = StateCodec::new(&config.state.secret, config.state.max_age_seconds)?;
        let exchanger = TokenExchanger::new()?;

        Ok(Self {
            config,
            state_codec,
            exchanger,
            http_client: Client::new(),
            database,
            cache,
            oauth_clients,
        })
    }

    pub fn state_codec(&self) -> &StateCodec {
        &self.state_codec
    }

    /// Build the provider authorization URL with a signed state token.
    pub fn get_authorization_url(
        &self,
        platform: &str,
        user_id: Option<String>,
        return_url: Option<String>,
        fallback_redirect_uri: &str,
    ) -> Result<AuthorizeResponse, AppError> {
        let provider = self
            .config
            .get_oauth_provider(platform)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown platform: {platform}")))?;

        // Use the configured redirect URI if available, otherwise the one
        // derived from the incoming request
        let redirect_uri = provider
            .redirect_uri
            .as_deref()
            .unwrap_or(fallback_redirect_uri);
        tracing::debug!(platform, redirect_uri, "building authorization URL");

        let state = self
            .state_codec
            .sign(&OAuthState::new(platform, user_id, return_url))?;

        let client = self.get_oauth_client(platform)?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| AppError::BadRequest(format!("Invalid redirect URI: {e}")))?;

        // The request borrows the client, so the clone needs its own binding
        let client = (*client).clone().set_redirect_uri(redirect_url);
        let mut request = client
            .authorize_url(|| CsrfToken::new(state.clone()))
            .add_scopes(provider.scopes.iter().map(|s| Scope::new(s.clone())));

        for (name, value) in &provider.extra_authorize_params {
            request = request.add_extra_param(name, value);
        }

        let (authorization_url, _csrf_token) = request.url();

        Ok(AuthorizeResponse {
            authorization_url: authorization_url.to_string(),
            state,
            platform: platform.to_string(),
        })
    }

    /// Complete the redirect leg: verify state, trade the code for tokens,
    /// fetch the user profile, and upsert the local account.
    pub async fn handle_callback(
        &self,
        platform: &str,
        code: &str,
        state_token: &str,
        redirect_uri: &str,
    ) -> Result<CallbackOutcome, AppError> {
        let state = self.state_codec.verify(state_token)?;

        if state.platform != platform {
            return Err(AppError::BadRequest(
                "State token platform mismatch".to_string(),
            ));
        }

        self.consume_nonce(&state).await?;

        let provider = self
            .config
            .get_oauth_provider(platform)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown platform: {platform}")))?;

        let redirect_uri = provider.redirect_uri.as_deref().unwrap_or(redirect_uri);
        let tokens = self
            .exchanger
            .exchange_code(&provider, code, redirect_uri)
            .await?;

        let user_info = self
            .get_user_info(&provider, &tokens.access_token)
            .await?;

        let platform_user_id = json_string(&user_info, &provider.user_id_field)
            .ok_or_else(|| {
                AppError::Upstream("User ID not found in provider response".to_string())
            })?;

        let email = json_string(&user_info, &provider.email_field)
            // Microsoft leaves `mail` null for accounts without a mailbox
            .or_else(|| json_string(&user_info, "userPrincipalName"))
            .ok_or_else(|| AppError::Upstream("Email not found in provider response".to_string()))?;

        let display_name = json_string(&user_info, &provider.display_name_field);

        let user_record = UserRecord::new(platform, &platform_user_id, &email)
            .with_display_name(display_name)
            .with_last_login(Utc::now());

        let user_id = self.database.users().upsert(&user_record).await?;

        tracing::info!(platform, user_id, "oauth login completed");

        Ok(CallbackOutcome {
            user_id,
            tokens,
            return_url: state.return_url,
        })
    }

    /// Redeem a provider refresh token for a fresh token set.
    pub async fn refresh(&self, platform: &str, refresh_token: &str) -> Result<TokenSet, AppError> {
        let provider = self
            .config
            .get_oauth_provider(platform)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown platform: {platform}")))?;

        self.exchanger.refresh(&provider, refresh_token).await
    }

    pub fn list_platforms(&self) -> PlatformsResponse {
        let platforms = self
            .config
            .list_oauth_providers()
            .into_iter()
            .filter_map(|name| {
                self.config
                    .get_oauth_provider(&name)
                    .map(|provider| PlatformInfo {
                        name: name.clone(),
                        display_name: super::providers::get_display_name(&name),
                        scopes: provider.scopes,
                    })
            })
            .collect();

        PlatformsResponse { platforms }
    }

    /// Reject a state token whose nonce has already been used. Consumed
    /// nonces stay in the cache for the state TTL, after which the
    /// timestamp check rejects the token anyway.
    async fn consume_nonce(&self, state: &OAuthState) -> Result<(), AppError> {
        let key = format!("oauth_state_nonce:{}", state.nonce);
        let ttl = Duration::from_secs(self.config.state.max_age_seconds.max(0) as u64);

        // set_if_absent is atomic, so two callbacks racing on the same state
        // cannot both claim the nonce
        if !self.cache.set_if_absent(&key, "used", Some(ttl)).await? {
            return Err(AppError::BadRequest(
                "State token has already been used".to_string(),
            ));
        }

        Ok(())
    }

    fn get_oauth_client(&self, platform: &str) -> Result<Arc<Oauth2Client>, AppError> {
        self.oauth_clients
            .get(platform)
            .cloned()
            .ok_or_else(|| AppError::BadRequest(format!("Unknown platform: {platform}")))
    }

    async fn get_user_info(
        &self,
        provider: &crate::auth::config::OAuthProvider,
        access_token: &str,
    ) -> Result<HashMap<String, Value>, AppError> {
        let user_info_url = provider
            .user_info_url
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("User info URL not configured".to_string()))?;

        let response = self
            .http_client
            .get(user_info_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to fetch user info: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "User info request failed with status: {}",
                response.status()
            )));
        }

        let user_info: HashMap<String, Value> = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse user info: {e}")))?;

        Ok(user_info)
    }
}

/// Pull a string field out of the userinfo document, handling providers
/// that nest the payload under `data` (Twitter API v2).
fn json_string(info: &HashMap<String, Value>, field: &str) -> Option<String> {
    if let Some(value) = info.get(field).and_then(|v| v.as_str()) {
        return Some(value.to_string());
    }

    info.get("data")
        .and_then(|data| data.get(field))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
