//! Financial summary handler

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use finanza_core::FinancialSummary;

use crate::{AppError, AppState, CurrentUser};

/// Query parameters for the summary
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Restrict to one calendar month (YYYY-MM)
    pub month: Option<String>,
}

/// Parse "YYYY-MM" into (year, month)
fn parse_month(input: &str) -> Option<(i32, u32)> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", input.trim()), "%Y-%m-%d").ok()?;
    Some((date.year(), date.month()))
}

/// GET /api/summary - Balance, income, expenses and per-category breakdown
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<FinancialSummary>, AppError> {
    let month = match params.month.as_deref() {
        Some(raw) => Some(
            parse_month(raw).ok_or_else(|| AppError::bad_request("month must be YYYY-MM"))?,
        ),
        None => None,
    };

    let owner = state.registry.loaded(user.owner()).await?;
    let ledger = owner.ledger.lock().await;
    let summary = match month {
        Some((year, month)) => ledger.month_summary(&state.catalog, year, month),
        None => ledger.summary(&state.catalog),
    };
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2024-05"), Some((2024, 5)));
        assert_eq!(parse_month(" 2024-12 "), Some((2024, 12)));
        assert_eq!(parse_month("2024-13"), None);
        assert_eq!(parse_month("May 2024"), None);
    }
}
