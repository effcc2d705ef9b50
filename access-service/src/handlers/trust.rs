use service_core::{
    axum::{
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{dtos::trust::TrustListResponse, middleware::AuthUser, AppState};

/// Let `username` read the caller's files
pub async fn grant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.access.grant_trust(user.username(), &username).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Withdraw a previous grant
pub async fn revoke(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.access.revoke_trust(user.username(), &username).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Users the caller trusts
pub async fn list_trusted(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let users = state.access.trusted_by(user.username()).await?;
    Ok(Json(TrustListResponse::new(user.username().to_string(), users)))
}

/// Users that trust the caller
pub async fn list_trusters(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let users = state.access.trusters_of(user.username()).await?;
    Ok(Json(TrustListResponse::new(user.username().to_string(), users)))
}
