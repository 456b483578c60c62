//! Application startup and lifecycle management.

use crate::config::{CorsConfig, PredictionConfig};
use crate::handlers;
use crate::pipeline::DomainRegistry;
use crate::services::providers::{GeminiConfig, GeminiInsightProvider, InsightProvider};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{http_trace_layer, request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PredictionConfig,
    pub registry: Arc<DomainRegistry>,
    pub insight_provider: Arc<dyn InsightProvider>,
}

impl AppState {
    pub fn new(
        config: PredictionConfig,
        registry: DomainRegistry,
        insight_provider: Arc<dyn InsightProvider>,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            insight_provider,
        }
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allows_any() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                }),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/predict", post(handlers::predict))
        .route("/predict_diabetes", post(handlers::predict_diabetes))
        .route("/generate_insight", post(handlers::generate_insight))
        // Route layer so the matched path template is available as a label.
        .route_layer(from_fn(metrics_middleware))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(from_fn(security_headers_middleware))
        .layer(http_trace_layer())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Load artifacts, wire the insight provider and bind the listener.
    /// Port 0 binds an ephemeral port.
    pub async fn build(config: PredictionConfig) -> Result<Self, AppError> {
        let registry = DomainRegistry::load(&config.artifacts.dir);
        if !registry.any_ready() {
            tracing::warn!(
                dir = %config.artifacts.dir.display(),
                "No domain artifacts loaded; every prediction will fail until restart"
            );
        }

        let provider = GeminiInsightProvider::new(GeminiConfig::from(&config.insight))
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;
        if provider.is_configured() {
            tracing::info!(model = %config.insight.model, "Initialized Gemini insight provider");
        } else {
            tracing::warn!("GEMINI_API_KEY not set; /generate_insight will fail closed");
        }

        let state = AppState::new(config.clone(), registry, Arc::new(provider));
        Self::build_with_state(state).await
    }

    /// Bind a listener for an already-assembled state.
    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        let addr = state.config.common.bind_address();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until Ctrl-C or SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
