use crate::{
    auth::{
        OAuthFlows, ServiceTokenCache, SessionCookieStore, providers::initialize_oauth_clients,
        request_context::RequestContext,
    },
    cache::{CacheHandle, new_memory_cache},
    config::Config,
    database::{DatabaseManager, DatabaseManagerImpl},
    error::AppError,
    health::HealthService,
    routes::{
        create_auth_routes, create_health_routes, create_platform_routes, create_session_routes,
    },
    shutdown::{DatabaseShutdown, HttpServerShutdown, ShutdownCoordinator, ShutdownManager},
};
use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub oauth_flows: Arc<OAuthFlows>,
    pub service_tokens: Option<Arc<ServiceTokenCache>>,
    pub session_store: SessionCookieStore,
    pub health_service: Arc<HealthService>,
    pub database: Arc<dyn DatabaseManager>,
    pub cache: CacheHandle,
    pub http_client: reqwest::Client,
    pub shutdown_coordinator: Arc<ShutdownCoordinator>,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        // Process-local cache for the OAuth replay guard
        let cache = new_memory_cache();

        let database_impl = Arc::new(DatabaseManagerImpl::new_from_config(&config).await?);
        let database: Arc<dyn DatabaseManager> = database_impl.clone();

        let oauth_clients = initialize_oauth_clients(&config)?;
        let oauth_flows = Arc::new(OAuthFlows::new(
            config.clone(),
            database.clone(),
            cache.clone(),
            oauth_clients,
        )?);

        // Absent entirely means the integration is off; a partial config
        // fails here instead of on the first request
        let service_tokens = ServiceTokenCache::from_config(&config.service_auth)?.map(Arc::new);

        let session_store = SessionCookieStore::from_config(&config);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("reqwest build error: {e}")))?;

        let health_service = Arc::new(HealthService::new());
        health_service.register(database_impl).await;

        let shutdown_coordinator = Arc::new(ShutdownCoordinator::new());

        Ok(Self {
            config: Arc::new(config),
            oauth_flows,
            service_tokens,
            session_store,
            health_service,
            database,
            cache,
            http_client,
            shutdown_coordinator,
        })
    }

    pub async fn run(&self) -> Result<(), AppError> {
        self.database.migrate().await?;

        let mut shutdown_manager = ShutdownManager::new(Duration::from_secs(30));
        shutdown_manager.register(HttpServerShutdown::new("HTTP Server".to_string()));
        shutdown_manager.register(DatabaseShutdown::new(self.database.clone()));

        let app = self.create_app();

        let addr = SocketAddr::from((
            self.config
                .server
                .host
                .parse::<std::net::IpAddr>()
                .map_err(|e| AppError::Internal(format!("Invalid server host: {e}")))?,
            self.config.server.port,
        ));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to address: {e}")))?;

        info!("Server listening on http://{}", addr);

        let shutdown_coordinator = self.shutdown_coordinator.clone();
        tokio::spawn(async move {
            shutdown_coordinator.wait_for_shutdown_signal().await;
        });

        let shutdown_rx = self.shutdown_coordinator.subscribe();
        let serve_future = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let mut rx = shutdown_rx;
            let _ = rx.changed().await;
            info!("Graceful shutdown initiated");
        });

        if let Err(e) = serve_future.await {
            error!("Server error: {}", e);
        }

        shutdown_manager.shutdown_all().await;
        info!("Server shutdown complete");

        Ok(())
    }

    /// Creates the application router
    pub fn create_app(&self) -> Router {
        Router::new()
            .nest("/auth", create_auth_routes())
            .nest("/session", create_session_routes())
            .nest("/platform", create_platform_routes())
            .nest("/health", create_health_routes())
            .with_state(self.clone())
            .layer(CookieManagerLayer::new())
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
    }
}

/// Tag every request with an X-Request-ID (honoring one supplied by an
/// upstream proxy) and log it with the client context.
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let context = RequestContext::extract_from_headers(request.headers());
    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        ip = context.ip_address.as_deref().unwrap_or("-"),
        user_agent = context.user_agent.as_deref().unwrap_or("-"),
        "request received"
    );

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check_on_full_app() {
        let server = crate::test_utils::TestServerBuilder::new().build().await;
        let app = server.create_app();

        let request = HttpRequest::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_request_id_header_added() {
        let server = crate::test_utils::TestServerBuilder::new().build().await;
        let app = server.create_app();

        let request = HttpRequest::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_header_preserved() {
        let server = crate::test_utils::TestServerBuilder::new().build().await;
        let app = server.create_app();

        let request = HttpRequest::builder()
            .uri("/health")
            .header("x-request-id", "upstream-id-123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "upstream-id-123"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = crate::test_utils::TestServerBuilder::new().build().await;
        let app = server.create_app();

        let request = HttpRequest::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
