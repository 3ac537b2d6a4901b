use crate::{database::UserRecord, error::AppError, server::Server};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tower_cookies::Cookies;

#[derive(Debug, Serialize)]
struct SessionUser {
    id: i32,
    platform: String,
    email: String,
    display_name: Option<String>,
}

impl From<UserRecord> for SessionUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            platform: user.platform,
            email: user.email,
            display_name: user.display_name,
        }
    }
}

pub fn create_session_routes() -> Router<Server> {
    Router::new()
        .route("/", get(session_handler))
        .route("/logout", post(logout_handler))
}

/// Resolve the session cookie to a user record. A cookie pointing at a user
/// that no longer exists is removed and reported as no session rather than
/// an error.
pub async fn session_handler(
    State(server): State<Server>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    let Some(cookie_value) = server.session_store.get(&cookies) else {
        return Ok(Json(json!({ "user": null })));
    };

    let user_id: i32 = match cookie_value.parse() {
        Ok(id) => id,
        Err(_) => {
            server.session_store.delete(&cookies);
            return Ok(Json(json!({ "user": null })));
        }
    };

    match server.database.users().find_by_id(user_id).await? {
        Some(user) => Ok(Json(json!({ "user": SessionUser::from(user) }))),
        None => {
            tracing::debug!(user_id, "session cookie references missing user");
            server.session_store.delete(&cookies);
            Ok(Json(json!({ "user": null })))
        }
    }
}

pub async fn logout_handler(
    State(server): State<Server>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    server.session_store.delete(&cookies);
    Ok(Json(json!({ "success": true })))
}
