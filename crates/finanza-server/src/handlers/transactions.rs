//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use tracing::info;

use finanza_core::{Transaction, TransactionDraft};

use crate::{AppError, AppState, CurrentUser, SuccessResponse};

/// GET /api/transactions - The owner's transactions, most recent first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let owner = state.registry.loaded(user.owner()).await?;
    let transactions = owner.ledger.lock().await.transactions();
    Ok(Json(transactions))
}

/// POST /api/transactions - Validate a draft and record it
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(draft): Json<TransactionDraft>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    // Reject bad input before touching the store
    let new = draft.validate(Utc::now().date_naive())?;

    let owner = state.registry.loaded(user.owner()).await?;
    let created = owner.ledger.lock().await.add(new).await?;

    info!(id = %created.id, kind = created.kind.as_str(), "Transaction created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/transactions/:id - Remove a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let owner = state.registry.loaded(user.owner()).await?;
    let removed = owner.ledger.lock().await.remove(&id).await?;

    info!(id = %removed.id, "Transaction deleted");
    Ok(Json(SuccessResponse { success: true }))
}
