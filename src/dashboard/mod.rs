use std::net::SocketAddr;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::driver::SharedReport;

#[derive(Clone)]
pub struct DashboardState {
    pub report: SharedReport,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Routes served by the dashboard.
pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(text_status_handler))
        .route("/api/status", get(status_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn run_dashboard(addr: SocketAddr, state: DashboardState) {
    tracing::info!(addr = %addr, "Starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind dashboard server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, router(state)).await {
        tracing::error!(error = %e, "Dashboard server failed");
    }
}

async fn status_handler(State(state): State<DashboardState>) -> Response {
    match state.report.read().await.as_ref() {
        Some(report) => Json(report.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No cycle has completed yet".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn text_status_handler(State(state): State<DashboardState>) -> Response {
    match state.report.read().await.as_ref() {
        Some(report) => report.render_text().into_response(),
        None => "Waiting for the first cycle...\n".into_response(),
    }
}
