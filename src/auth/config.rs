use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthConfig {
    #[serde(default)]
    pub providers: HashMap<String, OAuthProvider>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProvider {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub user_info_url: Option<String>,
    #[serde(default = "default_user_id_field")]
    pub user_id_field: String,
    #[serde(default = "default_email_field")]
    pub email_field: String,
    #[serde(default = "default_display_name_field")]
    pub display_name_field: String,
    // For providers like Microsoft with tenant support
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Extra query parameters appended to the authorization URL
    /// (e.g. `access_type=offline` for Google refresh tokens)
    #[serde(default)]
    pub extra_authorize_params: HashMap<String, String>,
}

fn default_user_id_field() -> String {
    "id".to_string()
}

fn default_email_field() -> String {
    "email".to_string()
}

fn default_display_name_field() -> String {
    "name".to_string()
}

impl Default for OAuthProvider {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: None,
            scopes: Vec::new(),
            authorization_url: None,
            token_url: None,
            user_info_url: None,
            user_id_field: default_user_id_field(),
            email_field: default_email_field(),
            display_name_field: default_display_name_field(),
            tenant_id: None,
            extra_authorize_params: HashMap::new(),
        }
    }
}

/// Apply well-known endpoint and scope defaults based on platform name.
/// Explicitly configured values always win.
pub fn apply_platform_defaults(platform: &str, provider: &mut OAuthProvider) {
    match platform {
        "google" | "youtube" => apply_google_defaults(provider),
        "linkedin" => apply_linkedin_defaults(provider),
        "twitter" => apply_twitter_defaults(provider),
        "microsoft" => apply_microsoft_defaults(provider),
        _ => {} // Custom platform, no defaults to apply
    }
}

fn apply_google_defaults(provider: &mut OAuthProvider) {
    if provider.authorization_url.is_none() {
        provider.authorization_url =
            Some("https://accounts.google.com/o/oauth2/v2/auth".to_string());
    }
    if provider.token_url.is_none() {
        provider.token_url = Some("https://oauth2.googleapis.com/token".to_string());
    }
    if provider.user_info_url.is_none() {
        provider.user_info_url = Some("https://www.googleapis.com/oauth2/v2/userinfo".to_string());
    }
    if provider.scopes.is_empty() {
        provider.scopes = vec![
            "openid".to_string(),
            "email".to_string(),
            "profile".to_string(),
        ];
    }
    // Google only issues refresh tokens when offline access is requested
    provider
        .extra_authorize_params
        .entry("access_type".to_string())
        .or_insert_with(|| "offline".to_string());
    provider
        .extra_authorize_params
        .entry("prompt".to_string())
        .or_insert_with(|| "consent".to_string());
}

fn apply_linkedin_defaults(provider: &mut OAuthProvider) {
    if provider.authorization_url.is_none() {
        provider.authorization_url =
            Some("https://www.linkedin.com/oauth/v2/authorization".to_string());
    }
    if provider.token_url.is_none() {
        provider.token_url = Some("https://www.linkedin.com/oauth/v2/accessToken".to_string());
    }
    if provider.user_info_url.is_none() {
        provider.user_info_url = Some("https://api.linkedin.com/v2/userinfo".to_string());
    }
    if provider.scopes.is_empty() {
        provider.scopes = vec![
            "openid".to_string(),
            "profile".to_string(),
            "email".to_string(),
        ];
    }
    if provider.user_id_field == "id" {
        // default wasn't overridden
        provider.user_id_field = "sub".to_string();
    }
}

fn apply_twitter_defaults(provider: &mut OAuthProvider) {
    if provider.authorization_url.is_none() {
        provider.authorization_url = Some("https://twitter.com/i/oauth2/authorize".to_string());
    }
    if provider.token_url.is_none() {
        provider.token_url = Some("https://api.twitter.com/2/oauth2/token".to_string());
    }
    if provider.user_info_url.is_none() {
        provider.user_info_url = Some("https://api.twitter.com/2/users/me".to_string());
    }
    if provider.scopes.is_empty() {
        provider.scopes = vec![
            "tweet.read".to_string(),
            "users.read".to_string(),
            "offline.access".to_string(),
        ];
    }
}

fn apply_microsoft_defaults(provider: &mut OAuthProvider) {
    let tenant = provider.tenant_id.as_deref().unwrap_or("common");
    if provider.authorization_url.is_none() {
        provider.authorization_url = Some(format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/authorize",
            tenant
        ));
    }
    if provider.token_url.is_none() {
        provider.token_url = Some(format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            tenant
        ));
    }
    if provider.user_info_url.is_none() {
        provider.user_info_url = Some("https://graph.microsoft.com/v1.0/me".to_string());
    }
    if provider.scopes.is_empty() {
        provider.scopes = vec![
            "openid".to_string(),
            "profile".to_string(),
            "email".to_string(),
        ];
    }
    if provider.email_field == "email" {
        // default wasn't overridden
        provider.email_field = "mail".to_string();
    }
    if provider.display_name_field == "name" {
        provider.display_name_field = "displayName".to_string();
    }
}
