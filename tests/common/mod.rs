use axum::Router;
use social_token_gateway::{
    Config, Server, auth::config::OAuthProvider, test_utils::TestServerBuilder,
};

/// Unified test harness that wires a full server and its router
pub struct TestHarness {
    pub server: Server,
    pub app: Router,
}

impl TestHarness {
    #[allow(dead_code)]
    pub async fn new() -> Self {
        let server = TestServerBuilder::new().build().await;
        let app = server.create_app();
        Self { server, app }
    }

    /// Harness whose "google" provider points at a mock OAuth server
    #[allow(dead_code)]
    pub async fn with_mock_provider(mock_uri: &str) -> Self {
        let mut config = Config::default();
        config.oauth.providers.insert(
            "google".to_string(),
            OAuthProvider {
                client_id: "test_client_id".to_string(),
                client_secret: "test_client_secret".to_string(),
                redirect_uri: Some("http://localhost:3000/auth/callback/google".to_string()),
                scopes: vec![
                    "openid".to_string(),
                    "email".to_string(),
                    "profile".to_string(),
                ],
                authorization_url: Some(format!("{mock_uri}/auth")),
                token_url: Some(format!("{mock_uri}/token")),
                user_info_url: Some(format!("{mock_uri}/userinfo")),
                user_id_field: "sub".to_string(),
                ..Default::default()
            },
        );

        let server = TestServerBuilder::new().with_config(config).build().await;
        let app = server.create_app();
        Self { server, app }
    }
}
