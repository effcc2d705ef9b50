use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::auth::{LoginRequest, RegisterRequest, RegisterResponse},
    services::ServiceError,
    utils::{Password, ValidatedJson},
    AppState,
};

const REGISTRATION_FAILED: &str = "Could not create user";

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .access
        .register(&req.username, &Password::new(req.password))
        .await
        .map_err(|e| match e {
            // A taken username must look like any other rejected registration.
            ServiceError::Conflict(_) | ServiceError::InvalidInput(_) => {
                tracing::info!(error = %e, "Registration rejected");
                AppError::BadRequest(anyhow::anyhow!(REGISTRATION_FAILED))
            }
            other => other.into(),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: identity.sanitized(),
            message: "User created".to_string(),
        }),
    ))
}

/// Login with username and password
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let issued = state
        .access
        .authenticate(&req.username, &Password::new(req.password))
        .await?;
    Ok((StatusCode::OK, Json(issued)))
}
