use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::agent::{StrategyAgent, StrategyResponse};
use crate::error::StrategyError;
use crate::features::CampaignInput;
use crate::forecast::ResolverStatus;
use crate::history::{History, HistoryEntry};

pub const HISTORY_CAPACITY: usize = 2000;
const HISTORY_PAGE: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<StrategyAgent>,
    pub history: Arc<History>,
}

impl AppState {
    pub fn new(agent: StrategyAgent) -> Self {
        Self {
            agent: Arc::new(agent),
            history: Arc::new(History::with_capacity(HISTORY_CAPACITY)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/strategy", post(generate_strategy))
        .route("/debug/history", get(debug_history))
        .route("/admin/reset-forecaster", post(admin_reset_forecaster))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---------- errors ----------

/// API-layer error; serialized as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// 422 - request parsed but unusable
    Unprocessable(String),
    /// 500 - strategy could not be produced
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<StrategyError> for ApiError {
    fn from(err: StrategyError) -> Self {
        if err.is_client_error() {
            ApiError::Unprocessable(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rej: JsonRejection) -> Self {
        ApiError::Unprocessable(rej.body_text())
    }
}

// ---------- request ----------

/// Wire form of a strategy request. The core fields are required; every other
/// recognized attribute may be supplied and is otherwise defaulted.
#[derive(Debug, Deserialize)]
pub struct StrategyRequest {
    pub age: i64,
    pub job: String,
    pub marital: String,
    pub duration: i64,
    pub campaign: i64,
    pub contact: String,
    pub month: String,
    pub budget: f64,
    #[serde(flatten)]
    pub extra: CampaignInput,
}

impl StrategyRequest {
    /// Range checks live here; the agent accepts whatever it is given.
    pub fn validate(self) -> Result<CampaignInput, ApiError> {
        let age = in_range("age", self.age, 18, 100)?;
        let duration = in_range("duration", self.duration, 1, 3600)?;
        let campaign = in_range("campaign", self.campaign, 1, 63)?;
        if !self.budget.is_finite() || self.budget < 1000.0 {
            return Err(ApiError::Unprocessable(format!(
                "budget must be at least 1000, got {}",
                self.budget
            )));
        }
        Ok(CampaignInput {
            age: Some(age),
            job: Some(self.job),
            marital: Some(self.marital),
            duration: Some(duration),
            campaign: Some(campaign),
            contact: Some(self.contact),
            month: Some(self.month),
            // Fractional budgets are truncated like the allocation shares.
            budget: Some(self.budget.trunc() as u64),
            ..self.extra
        })
    }
}

fn in_range(field: &str, value: i64, lo: i64, hi: i64) -> Result<u32, ApiError> {
    if (lo..=hi).contains(&value) {
        Ok(value as u32)
    } else {
        Err(ApiError::Unprocessable(format!(
            "{field} must be between {lo} and {hi}, got {value}"
        )))
    }
}

// ---------- handlers ----------

#[derive(Serialize)]
struct RootOut {
    message: &'static str,
}

async fn root() -> Json<RootOut> {
    Json(RootOut {
        message: "Marketing strategy agent API is running",
    })
}

#[derive(Serialize)]
struct HealthOut {
    status: &'static str,
    provider: &'static str,
    forecaster: ResolverStatus,
}

async fn health(State(state): State<AppState>) -> Json<HealthOut> {
    Json(HealthOut {
        status: "healthy",
        provider: state.agent.provider_name(),
        forecaster: state.agent.forecaster_status(),
    })
}

async fn generate_strategy(
    State(state): State<AppState>,
    body: Result<Json<StrategyRequest>, JsonRejection>,
) -> Result<Json<StrategyResponse>, ApiError> {
    let Json(req) = body.inspect_err(|e| warn!(error = %e, "Rejected strategy request body"))?;
    let input = req
        .validate()
        .inspect_err(|e| warn!(error = ?e, "Strategy request out of range"))?;
    let budget = input.budget.unwrap_or_default();
    info!(budget, contact = ?input.contact, "Strategy request accepted");

    let resp = state.agent.generate(&input).await?;
    state.history.push(&resp, budget);
    Ok(Json(resp))
}

async fn debug_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.history.snapshot_last_n(HISTORY_PAGE))
}

async fn admin_reset_forecaster(State(state): State<AppState>) -> Json<ResolverStatus> {
    let status = state.agent.forecasts().reset();
    info!(?status, "Forecaster resolver reset");
    Json(status)
}
