use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::dashboard::Dashboard;

pub fn app(dashboard: Dashboard) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router(Arc::new(dashboard)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run(dashboard: Dashboard, port: u16) -> Result<()> {
    let app = app(dashboard);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://localhost:{}", port);
    axum::serve(listener, app)
        .await
        .with_context(|| "Web server stopped unexpectedly")?;
    Ok(())
}
