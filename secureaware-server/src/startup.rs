//! Server startup and shutdown logic

use anyhow::{Context, Result};
use axum::{
    routing::get,
    Router,
};
use secureaware_config::SecureAwareConfig;
use secureaware_rbac::protect;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::handlers;
use crate::services::AppState;

/// Server application struct
pub struct Server {
    config: SecureAwareConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: SecureAwareConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the complete application router
    pub fn build_app(&self) -> Router {
        build_app(&self.config, self.state.clone())
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn start(self) -> Result<()> {
        let app = self.build_app();
        let addr = self.config.server.socket_address();

        self.log_config_summary();

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    fn log_config_summary(&self) {
        let access = &self.config.access;
        tracing::info!("=== SecureAware Configuration ===");
        tracing::info!("Bind Address: {}", self.config.server.socket_address());
        tracing::info!("Request Timeout: {:?}", self.config.server.request_timeout);
        tracing::info!("Sign-in Path: {}", access.sign_in_path);
        tracing::info!("Landing Path: {}", access.landing_path);
        tracing::info!("Public Paths: {}", access.public_paths.join(", "));
        tracing::info!("Role Source: {:?}", access.role_source);
        tracing::info!("Route Rules: {}", self.state.guard.routes().rules().len());
        tracing::info!("=================================");
    }
}

/// Portal routes behind the route guard, plus the HTTP layers
pub fn build_app(config: &SecureAwareConfig, state: AppState) -> Router {
    let guard = state.guard.clone();

    let routes = Router::new()
        .route("/", get(handlers::root))
        .route("/dashboard", get(handlers::dashboard))
        .route("/api/me/compliance", get(handlers::my_compliance))
        .route("/api/me/permissions", get(handlers::my_permissions))
        .route("/api/admin/users", get(handlers::list_users))
        .route(
            "/api/admin/users/{id}/role",
            axum::routing::put(handlers::assign_role).delete(handlers::remove_role),
        )
        .route("/api/admin/users/{id}/audit", get(handlers::audit_trail))
        .with_state(state);

    let mut app = protect(routes, guard).layer(TimeoutLayer::new(config.server.request_timeout));

    if config.server.trace_requests {
        app = app.layer(TraceLayer::new_for_http());
    }

    app
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
