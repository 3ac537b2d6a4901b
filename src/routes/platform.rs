use crate::{error::AppError, server::Server};
use axum::{Router, extract::State, response::Json, routing::get};
use serde_json::Value;

pub fn create_platform_routes() -> Router<Server> {
    Router::new().route("/whoami", get(whoami_handler))
}

/// Call the data platform's WhoAmI endpoint with a service token. Exists
/// mainly to verify the client-credentials path end to end.
pub async fn whoami_handler(State(server): State<Server>) -> Result<Json<Value>, AppError> {
    let service_tokens = server.service_tokens.as_ref().ok_or_else(|| {
        AppError::NotFound("Data platform integration is not configured".to_string())
    })?;

    let token = service_tokens.get_token().await?;
    let url = format!("{}/api/data/v9.2/WhoAmI", service_tokens.resource());

    let response = server
        .http_client
        .get(&url)
        .bearer_auth(&token)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("WhoAmI request failed: {e}")))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        // Token was revoked upstream; drop it so the next call re-fetches
        service_tokens.clear().await;
        return Err(AppError::Upstream(
            "Data platform rejected the service token".to_string(),
        ));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream(format!(
            "WhoAmI returned {status}: {body}"
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("Invalid WhoAmI response: {e}")))?;

    Ok(Json(body))
}
