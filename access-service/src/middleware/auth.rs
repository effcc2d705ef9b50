use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::services::{error::UNAUTHORIZED_MESSAGE, IdentityClaims, ServiceError};
use crate::AppState;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware to require a valid identity token. Verified claims are stored in the
/// request extensions for [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        tracing::info!("Missing or malformed Authorization header");
        AppError::Unauthorized(anyhow::anyhow!(UNAUTHORIZED_MESSAGE))
    })?;

    let claims = state
        .access
        .tokens()
        .verify(token)
        .map_err(AppError::from)?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor for the authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub IdentityClaims);

impl AuthUser {
    pub fn username(&self) -> &str {
        &self.0.username
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<IdentityClaims>().ok_or_else(|| {
            AppError::from(ServiceError::Internal(anyhow::anyhow!(
                "Auth claims missing from request extensions"
            )))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
