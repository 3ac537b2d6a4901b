use crate::auth::config::{OAuthConfig, OAuthProvider, apply_platform_defaults};
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub service_auth: ServiceAuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// "development" or "production"; gates the Secure cookie flag
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration for OAuth state token signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// HMAC secret; empty means unconfigured, which is a fatal startup error
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_state_max_age")]
    pub max_age_seconds: i64,
}

fn default_state_max_age() -> i64 {
    600 // 10 minutes
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            max_age_seconds: default_state_max_age(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_max_age")]
    pub max_age_seconds: i64,
}

fn default_cookie_name() -> String {
    "gateway_session".to_string()
}

fn default_session_max_age() -> i64 {
    7 * 24 * 60 * 60 // 7 days
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            max_age_seconds: default_session_max_age(),
        }
    }
}

/// Service-principal (client-credentials) configuration for the downstream
/// data platform. All four identifiers are required when the integration is
/// enabled; leaving all of them unset disables it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceAuthConfig {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Target resource base URL, e.g. "https://org.crm.dynamics.com"
    #[serde(default)]
    pub resource: Option<String>,
    /// Identity provider authority; overridable for tests
    #[serde(default = "default_authority")]
    pub authority: String,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com".to_string()
}

impl ServiceAuthConfig {
    pub fn is_configured(&self) -> bool {
        self.tenant_id.is_some()
            || self.client_id.is_some()
            || self.client_secret.is_some()
            || self.resource.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config.with_platform_defaults())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(
            Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config.with_platform_defaults())
    }

    /// Fill in well-known endpoint URLs and scopes for recognized platforms.
    pub fn with_platform_defaults(mut self) -> Self {
        for (name, provider) in self.oauth.providers.iter_mut() {
            apply_platform_defaults(name, provider);
        }
        self
    }

    pub fn get_oauth_provider(&self, name: &str) -> Option<OAuthProvider> {
        self.oauth.providers.get(name).cloned()
    }

    pub fn list_oauth_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.oauth.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
