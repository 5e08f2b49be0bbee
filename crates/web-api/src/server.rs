use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use fight_exposure_engine::ExposureEngine;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    engine: Arc<ExposureEngine>,
}

impl ApiServer {
    #[must_use]
    pub const fn new(engine: Arc<ExposureEngine>) -> Self {
        Self { engine }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/fills", post(handlers::record_fill))
            .route("/api/stake-info", get(handlers::get_stake_info))
            .route("/api/order-actions", post(handlers::record_order_action))
            .route("/api/orders/check", post(handlers::check_order))
            .route(
                "/api/fights/:fight_id/participants/:user_id/refresh",
                post(handlers::refresh_watermark),
            )
            .route(
                "/api/fights/:fight_id/participants/:user_id/initialize",
                post(handlers::initialize_participant),
            )
            .route(
                "/api/fights/:fight_id/participants/:user_id/audit",
                post(handlers::audit_exposure),
            )
            .route(
                "/api/fights/:fight_id/participants/:user_id/report",
                get(handlers::get_report),
            )
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.engine.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        self.serve_with_shutdown(addr, std::future::pending()).await
    }

    /// Like [`ApiServer::serve`], but stops accepting connections once `shutdown`
    /// resolves and drains in-flight requests.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve_with_shutdown<F>(self, addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Web API stopped");
        Ok(())
    }
}
