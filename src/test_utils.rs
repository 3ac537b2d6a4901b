use crate::{
    auth::config::OAuthProvider,
    config::Config,
    database::{DatabaseManager, entities::UserRecord},
    server::Server,
};
use chrono::Utc;
use std::sync::Arc;

/// Test server builder for creating test instances with sane defaults
pub struct TestServerBuilder {
    config: Config,
    state_secret: Option<String>,
    with_google_provider: bool,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            state_secret: Some("test-secret".to_string()),
            with_google_provider: true,
        }
    }

    /// Set a custom state-signing secret for testing
    pub fn with_state_secret(mut self, secret: String) -> Self {
        self.state_secret = Some(secret);
        self
    }

    /// Set a custom configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Skip registering the default "google" test provider
    pub fn without_providers(mut self) -> Self {
        self.with_google_provider = false;
        self
    }

    /// Build the test server with configured settings
    pub async fn build(self) -> Server {
        let mut config = self.config;

        config.database.url = "sqlite::memory:".to_string();

        if let Some(secret) = &self.state_secret {
            config.state.secret = secret.clone();
        }

        if self.with_google_provider && !config.oauth.providers.contains_key("google") {
            config.oauth.providers.insert(
                "google".to_string(),
                OAuthProvider {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    redirect_uri: Some("http://localhost:3000/auth/callback/google".to_string()),
                    ..Default::default()
                },
            );
        }
        config = config.with_platform_defaults();

        let server = Server::new(config).await.unwrap();
        server.database.migrate().await.unwrap();
        server
    }
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a test user in the database
pub async fn create_test_user(database: &Arc<dyn DatabaseManager>) -> i32 {
    create_test_user_with_data(database, "test_user_123", "google", "test@example.com").await
}

/// Create a test user with custom data
pub async fn create_test_user_with_data(
    database: &Arc<dyn DatabaseManager>,
    platform_user_id: &str,
    platform: &str,
    email: &str,
) -> i32 {
    let user = UserRecord {
        id: 0,
        platform_user_id: platform_user_id.to_string(),
        platform: platform.to_string(),
        email: email.to_string(),
        display_name: Some("Test User".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        last_login: Some(Utc::now()),
    };
    database.users().upsert(&user).await.unwrap()
}
