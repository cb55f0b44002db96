//! Insight handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;

use finanza_core::{AIInsight, InsightRefresh};

use crate::{AppError, AppState, CurrentUser};

/// Response for insight endpoints
#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    /// Latest completed result; empty before the first request
    pub insights: Vec<AIInsight>,
    /// Whether a request is running for this owner
    pub loading: bool,
}

/// GET /api/insights - Latest insights and loading state
pub async fn get_insights(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Json<InsightsResponse> {
    let owner = state.registry.get(user.owner()).await;
    Json(InsightsResponse {
        insights: owner.insights.latest().unwrap_or_default(),
        loading: owner.insights.is_loading(),
    })
}

/// POST /api/insights/refresh - Ask the generator for fresh insights
///
/// Returns 202 with the previous result if a request is already running.
/// Generator failures still produce 200 with the generic tip.
pub async fn refresh_insights(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<(StatusCode, Json<InsightsResponse>), AppError> {
    let owner = state.registry.loaded(user.owner()).await?;
    // Snapshot, so the ledger is not locked while the model runs
    let transactions = owner.ledger.lock().await.transactions();

    match owner.insights.request(&transactions).await {
        InsightRefresh::Completed(insights) => Ok((
            StatusCode::OK,
            Json(InsightsResponse {
                insights,
                loading: false,
            }),
        )),
        InsightRefresh::InProgress => Ok((
            StatusCode::ACCEPTED,
            Json(InsightsResponse {
                insights: owner.insights.latest().unwrap_or_default(),
                loading: true,
            }),
        )),
    }
}
