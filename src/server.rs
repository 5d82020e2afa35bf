use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::negotiation::session::{HttpPartnerSession, NegotiationSession, SimulatedSession};
use crate::negotiation::Orchestrator;
use crate::scoring::PreferenceWeights;
use crate::solver::{solve, Pins};
use crate::types::{FinalReport, OfferSet, RequiredItem, Solution};

#[derive(Clone)]
struct ApiState {
    config: Config,
    session: Arc<dyn NegotiationSession>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize)]
struct PlanRequest {
    items: Vec<RequiredItem>,
    offers: OfferSet,
    weights: Option<PreferenceWeights>,
    budget: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RecalculateRequest {
    #[serde(flatten)]
    plan: PlanRequest,
    #[serde(default)]
    pins: Pins,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    feasible: bool,
    solution: Option<Solution>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    feasible: bool,
    solution: Option<Solution>,
    offers: Option<OfferSet>,
}

#[derive(Debug, Serialize)]
struct NegotiateResponse {
    feasible: bool,
    report: Option<FinalReport>,
}

pub fn build_session(config: &Config) -> Arc<dyn NegotiationSession> {
    if config.partner.base_url.trim().is_empty() {
        Arc::new(SimulatedSession::new(
            config.simulator.success_rate,
            config.simulator.min_discount,
            config.simulator.max_discount,
        ))
    } else {
        Arc::new(HttpPartnerSession::new(config.partner.base_url.clone()))
    }
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState {
        session: build_session(&config),
        config,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/plan", post(plan))
        .route("/v1/search", post(search))
        .route("/v1/recalculate", post(recalculate))
        .route("/v1/negotiate", post(negotiate))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn plan(
    State(state): State<ApiState>,
    Json(request): Json<PlanRequest>,
) -> ApiResult<PlanResponse> {
    let weights = resolve_weights(&state, request.weights)?;
    let solution = solve(&request.items, &request.offers, &weights, request.budget, None)
        .map_err(ApiError::internal)?;
    Ok(ok(PlanResponse {
        feasible: solution.is_some(),
        solution,
    }))
}

async fn search(
    State(state): State<ApiState>,
    Json(request): Json<PlanRequest>,
) -> ApiResult<SearchResponse> {
    let weights = resolve_weights(&state, request.weights)?;
    let found = Orchestrator::search(&request.items, &request.offers, &weights, request.budget)
        .map_err(ApiError::internal)?;
    let (solution, offers) = match found {
        Some((solution, offers)) => (Some(solution), Some(offers)),
        None => (None, None),
    };
    Ok(ok(SearchResponse {
        feasible: solution.is_some(),
        solution,
        offers,
    }))
}

async fn recalculate(
    State(state): State<ApiState>,
    Json(request): Json<RecalculateRequest>,
) -> ApiResult<PlanResponse> {
    let weights = resolve_weights(&state, request.plan.weights)?;
    validate_pins(&request.pins, &request.plan.offers)?;
    let solution = Orchestrator::recalculate(
        &request.plan.items,
        &request.plan.offers,
        &weights,
        request.plan.budget,
        &request.pins,
    )
    .map_err(ApiError::internal)?;
    Ok(ok(PlanResponse {
        feasible: solution.is_some(),
        solution,
    }))
}

async fn negotiate(
    State(state): State<ApiState>,
    Json(request): Json<PlanRequest>,
) -> ApiResult<NegotiateResponse> {
    let weights = resolve_weights(&state, request.weights)?;
    let orchestrator = Orchestrator::new(
        Arc::clone(&state.session),
        state.config.negotiation_policy(),
    );
    let report = orchestrator
        .run_full_process(&request.items, &request.offers, &weights, request.budget)
        .await
        .map_err(ApiError::internal)?;
    Ok(ok(NegotiateResponse {
        feasible: report.is_some(),
        report,
    }))
}

fn resolve_weights(
    state: &ApiState,
    requested: Option<PreferenceWeights>,
) -> std::result::Result<PreferenceWeights, ApiError> {
    let weights = match requested {
        Some(weights) => weights,
        None => state
            .config
            .preference_weights()
            .map_err(ApiError::internal)?,
    };
    weights
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(weights)
}

/// Rejects pins naming an offer absent from a non-empty candidate list.
/// Pins on categories with no candidates are ignored, matching the solver's
/// zero-offer exclusion rule.
fn validate_pins(pins: &Pins, offers: &OfferSet) -> std::result::Result<(), ApiError> {
    for (category, offer_name) in pins {
        let Some(candidates) = offers.get(category) else {
            continue;
        };
        if candidates.is_empty() {
            continue;
        }
        if !candidates.iter().any(|o| &o.name == offer_name) {
            return Err(ApiError::bad_request(format!(
                "pinned offer '{offer_name}' not found in category '{category}'"
            )));
        }
    }
    Ok(())
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Catalog;

    #[test]
    fn pin_validation_flags_unknown_offers() {
        let catalog = Catalog::sample();
        let mut pins = Pins::new();
        pins.insert("Desk".to_string(), "Imaginary Desk".to_string());
        assert!(validate_pins(&pins, &catalog.offers).is_err());

        pins.clear();
        pins.insert("Desk".to_string(), "Rapid Desk".to_string());
        assert!(validate_pins(&pins, &catalog.offers).is_ok());

        // A pin on an unknown category follows the zero-offer exclusion rule.
        pins.clear();
        pins.insert("Whiteboard".to_string(), "AnyBoard".to_string());
        assert!(validate_pins(&pins, &catalog.offers).is_ok());
    }
}
