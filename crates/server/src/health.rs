use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chatterbox_agent::{Responder, ResponderStats};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    responder: Arc<Responder>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub responder: ResponderStats,
    pub checked_at: String,
}

pub fn router(responder: Arc<Responder>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { responder })
}

pub async fn spawn(bind_address: &str, port: u16, responder: Arc<Responder>) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(responder)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Liveness plus a snapshot of the responder. Always 200 while the process
/// is up; a disabled generative path is reported, not treated as failure.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let stats = state.responder.stats();
    let detail = if stats.generative_enabled {
        "chatterbox responder running".to_string()
    } else {
        "chatterbox responder running without generative replies".to_string()
    };

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck { status: "ready", detail },
        responder: stats,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
