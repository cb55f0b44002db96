//! Authentication handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;

use finanza_core::{Session, User};

use crate::{AppError, AppState, CurrentUser, SuccessResponse};

/// Request body for sign-up and sign-in
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/signup - Create an account and open a session
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let identity = state.require_identity()?;
    let session = identity.sign_up(&body.email, &body.password).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/auth/signin - Open a session for an existing account
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<Session>, AppError> {
    let identity = state.require_identity()?;
    let session = identity.sign_in(&body.email, &body.password).await?;
    Ok(Json(session))
}

/// POST /api/auth/signout - Invalidate the current session
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<SuccessResponse>, AppError> {
    let identity = state.require_identity()?;
    if let Some(token) = &user.token {
        identity.sign_out(token).await?;
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/me - The signed-in user
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<User>, AppError> {
    state.require_identity()?;
    user.session
        .map(|s| Json(s.user))
        .ok_or_else(|| AppError::unauthorized("Authentication required"))
}
