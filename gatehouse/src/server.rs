//! HTTP server with graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, StatusCode},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{config::Config, error::Result, router::build_router, state::AppState};

/// Server instance
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server for a built application state
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM
    ///
    /// The application state is shut down (subsystems stopped, store flushed)
    /// after the last connection drains.
    pub async fn serve(self) -> Result<()> {
        let config = self.state.config();
        let addr = config.bind_addr();

        tracing::info!("Starting {} on {}", config.service.name, addr);
        self.log_middleware_config();

        let app = self.wrap(build_router(self.state.clone()));

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        self.state.shutdown().await;
        tracing::info!("Server shutdown complete");

        Ok(())
    }

    /// Add the transport layers around the portal router
    ///
    /// The first layer in the builder is the outermost: request ids are
    /// assigned before anything else sees the request.
    fn wrap(&self, app: Router) -> Router {
        let config = self.state.config();
        let body_limit = config.service.body_limit_mb * 1024 * 1024;

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(SetSensitiveRequestHeadersLayer::new([
                header::AUTHORIZATION,
                header::COOKIE,
                header::PROXY_AUTHORIZATION,
            ]))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_response(DefaultOnResponse::new().include_headers(true)),
            )
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.service.timeout_secs),
            ))
            .layer(build_cors_layer(config));

        app.layer(middleware)
    }

    fn log_middleware_config(&self) {
        let config = self.state.config();
        tracing::info!("Middleware configuration:");
        tracing::info!("  - Panic recovery: enabled");
        tracing::info!("  - Request ID tracking: enabled");
        tracing::info!("  - Sensitive header masking: enabled");
        tracing::info!("  - Request body limit: {} MB", config.service.body_limit_mb);
        tracing::info!("  - CORS mode: {}", config.service.cors_mode);
        tracing::info!("  - Request timeout: {} seconds", config.service.timeout_secs);
        tracing::info!(
            "  - Lockout: {} failures, bans redirect to {}",
            config.lockout.threshold,
            config.lockout.ban_redirect
        );
        tracing::info!("  - Stats endpoint public: {}", config.stats.public);
    }

    /// Get the application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Build CORS layer based on configuration
fn build_cors_layer(config: &Config) -> CorsLayer {
    match config.service.cors_mode.as_str() {
        "permissive" => {
            tracing::debug!("Enabling permissive CORS");
            CorsLayer::permissive()
        }
        "restrictive" => {
            tracing::debug!("Enabling restrictive CORS (default deny)");
            CorsLayer::new()
        }
        "disabled" => {
            tracing::debug!("CORS disabled (using restrictive)");
            CorsLayer::new()
        }
        other => {
            tracing::warn!("Unknown CORS mode: {}, defaulting to restrictive", other);
            CorsLayer::new()
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    tracing::info!("Shutdown signal received, draining requests...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_modes_build() {
        for mode in ["permissive", "restrictive", "disabled", "bogus"] {
            let mut config = Config::default();
            config.service.cors_mode = mode.to_string();
            let _ = build_cors_layer(&config);
        }
    }
}
