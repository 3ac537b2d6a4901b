use crate::{
    auth::{TokenSet, flows::PlatformsResponse},
    error::AppError,
    server::Server,
};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Json, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use tower_cookies::Cookies;
use url::Url;

#[derive(Deserialize)]
pub struct AuthorizeQuery {
    pub return_url: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub platform: String,
    pub refresh_token: String,
}

pub fn create_auth_routes() -> Router<Server> {
    Router::new()
        .route("/authorize/{platform}", get(authorize_handler))
        .route("/callback/{platform}", get(callback_handler))
        .route("/refresh", post(refresh_handler))
        .route("/providers", get(providers_handler))
}

pub async fn authorize_handler(
    State(server): State<Server>,
    Path(platform): Path<String>,
    Query(params): Query<AuthorizeQuery>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    let redirect_uri = params
        .redirect_uri
        .unwrap_or_else(|| build_redirect_uri_from_request(&headers, &platform));

    // An existing session ties the new connection to the logged-in account
    let user_id = server.session_store.get(&cookies);

    let response = server.oauth_flows.get_authorization_url(
        &platform,
        user_id,
        params.return_url,
        &redirect_uri,
    )?;
    Ok(Redirect::to(&response.authorization_url))
}

pub async fn callback_handler(
    State(server): State<Server>,
    Path(platform): Path<String>,
    Query(params): Query<CallbackQuery>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    // Providers report user denial and their own errors via query params
    if let Some(error) = params.error {
        let error_description = params
            .error_description
            .unwrap_or_else(|| "OAuth authentication failed".to_string());
        let error_url =
            build_callback_url(&[("error", &error), ("error_description", &error_description)])?;
        return Ok(Redirect::to(&error_url));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state parameter".to_string()))?;

    let redirect_uri = build_redirect_uri_from_request(&headers, &platform);

    match server
        .oauth_flows
        .handle_callback(&platform, &code, &state, &redirect_uri)
        .await
    {
        Ok(outcome) => {
            server
                .session_store
                .set(&cookies, &outcome.user_id.to_string());

            Ok(Redirect::to(&sanitize_return_url(
                outcome.return_url.as_deref(),
            )))
        }
        Err(e) => {
            tracing::warn!(platform, error = %e, "oauth callback failed");
            let error_url = build_callback_url(&[
                ("error", "oauth_callback_failed"),
                ("error_description", &e.to_string()),
                ("platform", &platform),
            ])?;
            Ok(Redirect::to(&error_url))
        }
    }
}

pub async fn refresh_handler(
    State(server): State<Server>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenSet>, AppError> {
    let tokens = server
        .oauth_flows
        .refresh(&request.platform, &request.refresh_token)
        .await?;
    Ok(Json(tokens))
}

pub async fn providers_handler(
    State(server): State<Server>,
) -> Result<Json<PlatformsResponse>, AppError> {
    Ok(Json(server.oauth_flows.list_platforms()))
}

/// Only same-origin relative paths are honored; anything else falls back to
/// the root so the callback cannot be abused as an open redirect.
fn sanitize_return_url(return_url: Option<&str>) -> String {
    match return_url {
        Some(url) if url.starts_with('/') && !url.starts_with("//") => url.to_string(),
        _ => "/".to_string(),
    }
}

/// Build a redirect URI from request headers, supporting reverse proxies
fn build_redirect_uri_from_request(headers: &HeaderMap, platform: &str) -> String {
    let scheme = determine_scheme_from_headers(headers);
    let host = determine_host_from_headers(headers);
    format!("{scheme}://{host}/auth/callback/{platform}")
}

fn determine_scheme_from_headers(headers: &HeaderMap) -> &'static str {
    if let Some(proto) = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
    {
        if proto.contains("https") {
            return "https";
        }
    }

    if headers.get("x-forwarded-ssl").is_some() {
        return "https";
    }

    "http" // default for development
}

fn determine_host_from_headers(headers: &HeaderMap) -> String {
    if let Some(host) = headers
        .get("x-forwarded-host")
        .and_then(|h| h.to_str().ok())
    {
        // First host wins when there are multiple (comma-separated)
        return host.split(',').next().unwrap().trim().to_string();
    }

    headers
        .get("host")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:3000")
        .to_string()
}

/// Build frontend callback URLs with proper query parameter encoding so
/// provider-controlled error text cannot inject into the redirect.
fn build_callback_url(params: &[(&str, &str)]) -> Result<String, AppError> {
    let mut url = Url::parse("http://temp/callback")
        .map_err(|e| AppError::Internal(format!("Failed to parse base URL: {e}")))?;

    {
        let mut query_pairs = url.query_pairs_mut();
        for (key, value) in params {
            query_pairs.append_pair(key, value);
        }
    }

    Ok(format!("/callback?{}", url.query().unwrap_or("")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestServerBuilder;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;
    use tower_cookies::CookieManagerLayer;

    #[tokio::test]
    async fn test_authorize_handler_redirects_to_provider() {
        let server = TestServerBuilder::new().build().await;
        let app = create_auth_routes()
            .layer(CookieManagerLayer::new())
            .with_state(server);

        let request = Request::builder()
            .uri("/authorize/google?return_url=/dashboard")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
        assert!(location.contains("state="));
        assert!(location.contains("response_type=code"));
        assert!(location.contains("client_id=test-client-id"));
    }

    #[tokio::test]
    async fn test_authorize_handler_unknown_platform() {
        let server = TestServerBuilder::new().build().await;
        let app = create_auth_routes()
            .layer(CookieManagerLayer::new())
            .with_state(server);

        let request = Request::builder()
            .uri("/authorize/unknown")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_providers_handler() {
        let server = TestServerBuilder::new().build().await;
        let app = create_auth_routes()
            .layer(CookieManagerLayer::new())
            .with_state(server);

        let request = Request::builder()
            .uri("/providers")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_callback_handler_provider_error_redirects() {
        let server = TestServerBuilder::new().build().await;
        let app = create_auth_routes()
            .layer(CookieManagerLayer::new())
            .with_state(server);

        let request = Request::builder()
            .uri("/callback/google?error=access_denied&error_description=User+said+no")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert!(location.starts_with("/callback?"));
        assert!(location.contains("error=access_denied"));
    }

    #[tokio::test]
    async fn test_callback_handler_missing_code() {
        let server = TestServerBuilder::new().build().await;
        let app = create_auth_routes()
            .layer(CookieManagerLayer::new())
            .with_state(server);

        let request = Request::builder()
            .uri("/callback/google?state=whatever")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_sanitize_return_url() {
        assert_eq!(sanitize_return_url(Some("/dashboard")), "/dashboard");
        assert_eq!(sanitize_return_url(Some("/a/b?c=d")), "/a/b?c=d");
        assert_eq!(sanitize_return_url(None), "/");
        // Protocol-relative and absolute URLs are rejected
        assert_eq!(sanitize_return_url(Some("//evil.com")), "/");
        assert_eq!(sanitize_return_url(Some("https://evil.com")), "/");
    }

    #[test]
    fn test_build_callback_url_encodes_params() {
        let url = build_callback_url(&[
            ("error", "invalid_request"),
            ("error_description", "Missing required parameter"),
        ])
        .unwrap();

        assert!(url.starts_with("/callback?"));
        assert!(url.contains("error=invalid_request"));
        assert!(url.contains("error_description=Missing+required+parameter"));
    }

    #[test]
    fn test_build_redirect_uri_from_request() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "example.com".parse().unwrap());
        assert_eq!(
            build_redirect_uri_from_request(&headers, "google"),
            "http://example.com/auth/callback/google"
        );

        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert_eq!(
            build_redirect_uri_from_request(&headers, "linkedin"),
            "https://example.com/auth/callback/linkedin"
        );

        headers.insert(
            "x-forwarded-host",
            "api.example.com, internal".parse().unwrap(),
        );
        assert_eq!(
            build_redirect_uri_from_request(&headers, "twitter"),
            "https://api.example.com/auth/callback/twitter"
        );

        let empty = HeaderMap::new();
        assert_eq!(
            build_redirect_uri_from_request(&empty, "google"),
            "http://localhost:3000/auth/callback/google"
        );
    }
}
