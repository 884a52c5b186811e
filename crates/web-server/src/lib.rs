use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, put},
};
use database::CustomerRepository;
use metrics::MetricsEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
///
/// Holds no metrics: every request loads a fresh snapshot from the
/// repository and recomputes.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn CustomerRepository>,
    pub engine: MetricsEngine,
}

impl AppState {
    pub fn new(repo: Arc<dyn CustomerRepository>, engine: MetricsEngine) -> Self {
        Self { repo, engine }
    }
}

/// Builds the router with all routes and middleware attached.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api/customers",
            get(handlers::list_customers).post(handlers::create_customer),
        )
        .route("/api/customers/:id", delete(handlers::delete_customer))
        .route("/api/customers/:id/status", put(handlers::update_customer_status))
        .route("/api/metrics/monthly", get(handlers::get_monthly_metrics))
        .route("/api/metrics/ltv", get(handlers::get_ltv))
        .route("/api/metrics/summary", get(handlers::get_summary))
        .route("/api/export/metrics.csv", get(handlers::export_metrics_csv))
        .with_state(state)
        .layer(cors)
        // Logs every incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024))
}

/// Binds `addr` and serves the API until the process is stopped.
///
/// Tracing is initialized by the caller.
pub async fn run_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
