use crate::config::{Config, SessionConfig};
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite, time::Duration},
};

/// Issues and reads the session cookie.
///
/// The cookie value is the database user ID; routes that need the full user
/// record look it up on each request. HttpOnly and SameSite=Lax always;
/// Secure only in production so local HTTP development keeps working.
#[derive(Clone)]
pub struct SessionCookieStore {
    name: String,
    max_age_seconds: i64,
    secure: bool,
}

impl SessionCookieStore {
    pub fn new(session: &SessionConfig, secure: bool) -> Self {
        Self {
            name: session.cookie_name.clone(),
            max_age_seconds: session.max_age_seconds,
            secure,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.session, config.server.is_production())
    }

    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    /// Set the session cookie on the response.
    pub fn set(&self, cookies: &Cookies, user_id: &str) {
        let cookie = Cookie::build((self.name.clone(), user_id.to_string()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::seconds(self.max_age_seconds))
            .build();
        cookies.add(cookie);
    }

    /// Read the session cookie value, if present and non-empty.
    pub fn get(&self, cookies: &Cookies) -> Option<String> {
        cookies
            .get(&self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Expire the session cookie. Attributes must match the ones used when
    /// setting it or browsers keep the old cookie around.
    pub fn delete(&self, cookies: &Cookies) {
        let cookie = Cookie::build((self.name.clone(), String::new()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::seconds(0))
            .build();
        cookies.add(cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionCookieStore {
        SessionCookieStore::new(&SessionConfig::default(), false)
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let cookies = Cookies::default();
        let store = store();

        store.set(&cookies, "42");
        assert_eq!(store.get(&cookies), Some("42".to_string()));
    }

    #[test]
    fn test_get_missing_cookie() {
        let cookies = Cookies::default();
        assert_eq!(store().get(&cookies), None);
    }

    #[test]
    fn test_empty_value_treated_as_missing() {
        let cookies = Cookies::default();
        let store = store();

        store.set(&cookies, "");
        assert_eq!(store.get(&cookies), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookies = Cookies::default();
        let store = SessionCookieStore::new(&SessionConfig::default(), true);

        store.set(&cookies, "42");
        let cookie = cookies.get("gateway_session").unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(604800)));
    }

    #[test]
    fn test_delete_expires_cookie() {
        let cookies = Cookies::default();
        let store = store();

        store.set(&cookies, "42");
        store.delete(&cookies);

        let cookie = cookies.get("gateway_session").unwrap();
        assert_eq!(cookie.max_age(), Some(Duration::seconds(0)));
        assert_eq!(cookie.value(), "");
    }
}
