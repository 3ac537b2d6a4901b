pub mod config;
pub mod cookies;
pub mod exchange;
pub mod flows;
pub mod providers;
pub mod request_context;
pub mod service_token;
pub mod state;

pub use cookies::SessionCookieStore;
pub use exchange::{TokenExchanger, TokenSet};
pub use flows::OAuthFlows;
pub use request_context::RequestContext;
pub use service_token::ServiceTokenCache;
pub use state::{OAuthState, StateCodec, StateError};
