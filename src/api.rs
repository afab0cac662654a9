//! REST API server for the advisory orchestration engine
//!
//! Thin JSON surface over the executor: it parses parameters at the
//! boundary and returns the final payload untouched. Any structured-field
//! extraction from the result text belongs to the presentation layer.

use axum::{extract::Path, extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::executor::GraphExecutor;
use crate::models::RiskProfile;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdviseRequest {
    pub session_id: Option<String>,
    pub investment_amount: f64,
    pub risk_profile: String,
    /// Caller-supplied opening prompt; a default advisory prompt is built
    /// from the amount and profile when absent.
    pub prompt: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub executor: Arc<GraphExecutor>,
}

/// Default opening prompt for an advisory session.
pub fn build_initial_prompt(amount: f64, risk_profile: RiskProfile) -> String {
    format!(
        "I am an investor with ${:.2} to invest.\n\n\
         My risk profile is: {}\n\n\
         Please:\n\
         1. Analyze current market conditions using get_market_overview\n\
         2. Calculate the optimal portfolio allocation with calculate_portfolio_allocation\n\
         3. Analyze the most promising sectors with analyze_sector_performance\n\
         4. Get quotes for specific top picks using get_stock_quote\n\
         5. Provide detailed recommendations with rationale\n\n\
         Be specific: include tickers, allocation percentages, and justifications.",
        amount, risk_profile
    )
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Advisory Endpoint
/// =============================

async fn run_advisory(
    State(state): State<ApiState>,
    Json(req): Json<AdviseRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        session_id = %session_id,
        amount = req.investment_amount,
        risk_profile = %req.risk_profile,
        "Received advisory request"
    );

    let prompt = match req.prompt {
        Some(prompt) => prompt,
        None => match RiskProfile::parse(&req.risk_profile) {
            Ok(profile) => build_initial_prompt(req.investment_amount, profile),
            Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
        },
    };

    match state
        .executor
        .run_session(&session_id, req.investment_amount, &req.risk_profile, &prompt)
        .await
    {
        Ok(final_state) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "session_id": session_id,
                "result_text": final_state.result_text,
                "recommendations": final_state.recommendations,
                "machine_state": final_state.machine_state,
            }))),
        ),
        Err(failure) => {
            let status = match failure.error {
                crate::OrchestrationError::ConfigurationError(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ApiResponse::error(format!("Advisory run failed: {}", failure))),
            )
        }
    }
}

/// =============================
/// Cancellation Endpoint
/// =============================

async fn cancel_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    if state.executor.cancel(&session_id).await {
        (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "session_id": session_id,
                "cancelled": true,
            }))),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "No running session '{}'",
                session_id
            ))),
        )
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(executor: Arc<GraphExecutor>) -> Router {
    let state = ApiState { executor };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/v1/advise", post(run_advisory))
        .route("/api/v1/sessions/:session_id/cancel", post(cancel_session))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    executor: Arc<GraphExecutor>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(executor);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
