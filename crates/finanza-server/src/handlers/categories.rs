//! Category catalog handler

use std::sync::Arc;

use axum::{extract::State, Json};

use finanza_core::Category;

use crate::AppState;

/// GET /api/categories - The fixed category catalog, in display order
pub async fn list_categories(State(state): State<Arc<AppState>>) -> Json<Vec<Category>> {
    Json(state.catalog.categories().to_vec())
}
