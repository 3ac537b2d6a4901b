//! OAuth integration tests that exercise the complete authentication flow
//! against a mock provider, including the cases that only show up end to
//! end: user ID stability across logins, state replay, and expiry.

mod common;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::TestHarness;
use social_token_gateway::{
    auth::state::OAuthState,
    error::AppError,
};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

const REDIRECT_URI: &str = "http://localhost:3000/auth/callback/google";

async fn mock_provider() -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "mock_access_token_123",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "mock_refresh_token_456",
            "scope": "openid email profile"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sub": "google_user_12345",
            "email": "testuser@example.com",
            "name": "Test User",
            "email_verified": true
        })))
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
async fn test_oauth_end_to_end_user_id_consistency() {
    let mock_server = mock_provider().await;
    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;
    let flows = &harness.server.oauth_flows;

    // Three logins with fresh states should all resolve to the same user
    let mut user_ids = Vec::new();
    for code in ["mock_auth_code_1", "mock_auth_code_2", "mock_auth_code_3"] {
        let auth_response = flows
            .get_authorization_url("google", None, None, REDIRECT_URI)
            .unwrap();

        let outcome = flows
            .handle_callback("google", code, &auth_response.state, REDIRECT_URI)
            .await
            .unwrap();

        assert_eq!(outcome.tokens.access_token, "mock_access_token_123");
        user_ids.push(outcome.user_id);
    }

    assert_eq!(user_ids[0], user_ids[1]);
    assert_eq!(user_ids[1], user_ids[2]);

    // And a single row exists for the provider identity
    let user = harness
        .server
        .database
        .users()
        .find_by_platform("google", "google_user_12345")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.id, user_ids[0]);
    assert_eq!(user.email, "testuser@example.com");
    assert_eq!(user.display_name.as_deref(), Some("Test User"));
    assert!(user.last_login.is_some());
}

#[tokio::test]
async fn test_state_token_cannot_be_replayed() {
    let mock_server = mock_provider().await;
    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;
    let flows = &harness.server.oauth_flows;

    let auth_response = flows
        .get_authorization_url("google", None, None, REDIRECT_URI)
        .unwrap();

    flows
        .handle_callback("google", "code_1", &auth_response.state, REDIRECT_URI)
        .await
        .unwrap();

    // Same state token a second time must be rejected
    let err = flows
        .handle_callback("google", "code_2", &auth_response.state, REDIRECT_URI)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_expired_state_rejected() {
    let mock_server = mock_provider().await;
    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;
    let flows = &harness.server.oauth_flows;

    let mut state = OAuthState::new("google", None, None);
    state.timestamp_millis -= 11 * 60 * 1000; // past the 10 minute TTL
    let token = flows.state_codec().sign(&state).unwrap();

    let err = flows
        .handle_callback("google", "code", &token, REDIRECT_URI)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::State(_)));
}

#[tokio::test]
async fn test_state_platform_mismatch_rejected() {
    let mock_server = mock_provider().await;
    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;
    let flows = &harness.server.oauth_flows;

    let state = OAuthState::new("linkedin", None, None);
    let token = flows.state_codec().sign(&state).unwrap();

    let err = flows
        .handle_callback("google", "code", &token, REDIRECT_URI)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_callback_route_sets_session_cookie() {
    let mock_server = mock_provider().await;
    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;

    let state = OAuthState::new("google", None, Some("/dashboard".to_string()));
    let token = harness.server.oauth_flows.state_codec().sign(&state).unwrap();

    let request = Request::builder()
        .uri(format!("/auth/callback/google?code=mock_code&state={token}"))
        .body(Body::empty())
        .unwrap();

    let response = harness.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(location, "/dashboard");

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("gateway_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
}

#[tokio::test]
async fn test_callback_route_garbage_state_redirects_with_error() {
    let mock_server = mock_provider().await;
    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;

    let request = Request::builder()
        .uri("/auth/callback/google?code=mock_code&state=not-a-real-state")
        .body(Body::empty())
        .unwrap();

    let response = harness.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/callback?"));
    assert!(location.contains("error=oauth_callback_failed"));
    // No session cookie on a failed callback
    assert!(response.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn test_absolute_return_url_not_honored() {
    let mock_server = mock_provider().await;
    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;

    let state = OAuthState::new("google", None, Some("https://evil.com/phish".to_string()));
    let token = harness.server.oauth_flows.state_codec().sign(&state).unwrap();

    let request = Request::builder()
        .uri(format!("/auth/callback/google?code=mock_code&state={token}"))
        .body(Body::empty())
        .unwrap();

    let response = harness.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get("location").unwrap(), "/");
}

#[tokio::test]
async fn test_refresh_route_returns_new_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old_refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "refreshed_access_token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(&mock_server)
        .await;

    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "platform": "google",
                "refresh_token": "old_refresh"
            })
            .to_string(),
        ))
        .unwrap();

    let response = harness.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["access_token"], "refreshed_access_token");
}

#[tokio::test]
async fn test_refresh_route_unknown_platform() {
    let harness = TestHarness::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "platform": "myspace",
                "refresh_token": "whatever"
            })
            .to_string(),
        ))
        .unwrap();

    let response = harness.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_5xx_is_retried_once() {
    let mock_server = MockServer::start().await;

    // First attempt fails with a 500, the retry succeeds
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "after_retry",
            "token_type": "Bearer"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sub": "user_1",
            "email": "retry@example.com",
            "name": "Retry User"
        })))
        .mount(&mock_server)
        .await;

    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;
    let flows = &harness.server.oauth_flows;

    let auth_response = flows
        .get_authorization_url("google", None, None, REDIRECT_URI)
        .unwrap();

    let outcome = flows
        .handle_callback("google", "code", &auth_response.state, REDIRECT_URI)
        .await
        .unwrap();
    assert_eq!(outcome.tokens.access_token, "after_retry");
}

#[tokio::test]
async fn test_provider_4xx_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = TestHarness::with_mock_provider(&mock_server.uri()).await;
    let flows = &harness.server.oauth_flows;

    let auth_response = flows
        .get_authorization_url("google", None, None, REDIRECT_URI)
        .unwrap();

    let err = flows
        .handle_callback("google", "bad_code", &auth_response.state, REDIRECT_URI)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenExchange(_)));
}
