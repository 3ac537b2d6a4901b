pub mod auth;
pub mod health;
pub mod platform;
pub mod session;

pub use auth::create_auth_routes;
pub use health::create_health_routes;
pub use platform::create_platform_routes;
pub use session::create_session_routes;
