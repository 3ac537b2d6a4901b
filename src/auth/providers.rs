use crate::{auth::config::OAuthProvider, config::Config, error::AppError};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl,
    basic::BasicClient,
};
use std::{collections::HashMap, sync::Arc};

// Avoid oauth2 type madness
pub type Oauth2Client =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Platform display name mapping
pub fn get_display_name(platform: &str) -> String {
    match platform {
        "google" => "Google".to_string(),
        "youtube" => "YouTube".to_string(),
        "linkedin" => "LinkedIn".to_string(),
        "twitter" => "Twitter".to_string(),
        "microsoft" => "Microsoft".to_string(),
        _ => platform.to_string(),
    }
}

/// Initialize OAuth clients for all configured platforms
pub fn initialize_oauth_clients(
    config: &Config,
) -> Result<HashMap<String, Arc<Oauth2Client>>, AppError> {
    let mut clients = HashMap::new();

    for platform in config.list_oauth_providers() {
        if let Some(provider) = config.get_oauth_provider(&platform) {
            let client = Arc::new(create_oauth_client(&provider, &platform)?);
            clients.insert(platform, client);
        }
    }

    Ok(clients)
}

/// Create OAuth client for a single platform
pub fn create_oauth_client(
    provider: &OAuthProvider,
    platform: &str,
) -> Result<Oauth2Client, AppError> {
    let auth_url = AuthUrl::new(
        provider
            .authorization_url
            .as_ref()
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Authorization URL not configured for platform '{}'. Known platforms \
                     (google, linkedin, twitter, microsoft) are auto-configured; custom \
                     platforms must specify authorization_url explicitly.",
                    platform
                ))
            })?
            .clone(),
    )
    .map_err(|e| {
        AppError::BadRequest(format!(
            "Invalid authorization URL for platform '{}': {}",
            platform, e
        ))
    })?;

    let token_url = TokenUrl::new(
        provider
            .token_url
            .as_ref()
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Token URL not configured for platform '{}'. Known platforms \
                     (google, linkedin, twitter, microsoft) are auto-configured; custom \
                     platforms must specify token_url explicitly.",
                    platform
                ))
            })?
            .clone(),
    )
    .map_err(|e| {
        AppError::BadRequest(format!(
            "Invalid token URL for platform '{}': {}",
            platform, e
        ))
    })?;

    let redirect_url = provider
        .redirect_uri
        .as_ref()
        .map(|uri| RedirectUrl::new(uri.clone()))
        .transpose()
        .map_err(|e| {
            AppError::BadRequest(format!(
                "Invalid redirect URI for platform '{}': {}",
                platform, e
            ))
        })?;

    let mut client = BasicClient::new(ClientId::new(provider.client_id.clone()))
        .set_client_secret(ClientSecret::new(provider.client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url);

    if let Some(redirect_url) = redirect_url {
        client = client.set_redirect_uri(redirect_url);
    }

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn create_test_provider() -> OAuthProvider {
        OAuthProvider {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            redirect_uri: Some("http://localhost:3000/auth/callback/google".to_string()),
            scopes: vec!["openid".to_string(), "email".to_string()],
            authorization_url: Some("https://accounts.google.com/o/oauth2/v2/auth".to_string()),
            token_url: Some("https://oauth2.googleapis.com/token".to_string()),
            user_info_url: Some("https://www.googleapis.com/oauth2/v2/userinfo".to_string()),
            user_id_field: "id".to_string(),
            email_field: "email".to_string(),
            display_name_field: "name".to_string(),
            tenant_id: None,
            extra_authorize_params: StdHashMap::new(),
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(get_display_name("google"), "Google");
        assert_eq!(get_display_name("linkedin"), "LinkedIn");
        assert_eq!(get_display_name("twitter"), "Twitter");
        assert_eq!(get_display_name("custom"), "custom");
    }

    #[test]
    fn test_create_oauth_client() {
        let provider = create_test_provider();
        assert!(create_oauth_client(&provider, "google").is_ok());
    }

    #[test]
    fn test_create_oauth_client_missing_auth_url() {
        let mut provider = create_test_provider();
        provider.authorization_url = None;

        let result = create_oauth_client(&provider, "test");
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Authorization URL not configured")
        );
    }

    #[test]
    fn test_create_oauth_client_missing_token_url() {
        let mut provider = create_test_provider();
        provider.token_url = None;

        let result = create_oauth_client(&provider, "test");
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Token URL not configured")
        );
    }
}
