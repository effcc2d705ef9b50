use service_core::{
    axum::{
        extract::{Path, State},
        http::{header, HeaderMap, StatusCode},
        response::IntoResponse,
    },
    error::AppError,
};

use crate::{
    middleware::bearer_token,
    services::{error::UNAUTHORIZED_MESSAGE, ServiceError},
    AppState,
};

/// Download one of the caller's own files
pub async fn download_own(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    serve(&state, &headers, &filename, "").await
}

/// Download a file owned by someone who trusts the caller
pub async fn download_from(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((filename, owner)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    serve(&state, &headers, &filename, &owner).await
}

async fn serve(
    state: &AppState,
    headers: &HeaderMap,
    filename: &str,
    owner: &str,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!(UNAUTHORIZED_MESSAGE)))?;

    let requester = state
        .access
        .authorize(token, owner)
        .await
        .map_err(ServiceError::into_access_error)?;
    let owner = if owner.is_empty() { requester.as_str() } else { owner };

    let path = state
        .namespace
        .resolve_existing(owner, filename)
        .await
        .map_err(ServiceError::into_access_error)?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::error!(owner = %owner, filename = %filename, error = %e, "Failed to read file");
        ServiceError::Storage(anyhow::Error::new(e)).into_access_error()
    })?;

    tracing::info!(
        requester = %requester,
        owner = %owner,
        filename = %filename,
        size = bytes.len(),
        "File download completed"
    );

    let safe_name: String = filename
        .chars()
        .map(|c| if c.is_control() || c == '"' || c == '\\' { '_' } else { c })
        .collect();
    let disposition = format!("attachment; filename=\"{}\"", safe_name);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
