//! Server status handler

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use finanza_core::User;

use crate::{bearer_token, AppState};

/// Response for GET /api/status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// "cloud" or "local"
    pub mode: &'static str,
    pub ai_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_backend: Option<&'static str>,
    /// Present when a valid bearer token was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// GET /api/status - Mode, AI availability and the current user, if any
///
/// Never rejects: an invalid token just means no user.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<StatusResponse> {
    let user = match (&state.identity, bearer_token(&headers)) {
        (Some(identity), Some(token)) => match identity.session(token).await {
            Ok(session) => session.map(|s| s.user),
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup failed");
                None
            }
        },
        _ => None,
    };

    Json(StatusResponse {
        mode: state.mode(),
        ai_configured: state.registry.ai_configured(),
        ai_backend: state.ai_backend,
        user,
    })
}
