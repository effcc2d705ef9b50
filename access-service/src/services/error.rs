use service_core::error::AppError;
use thiserror::Error;

/// Internal error kinds. Every variant carries the precise reason; collapsing to the
/// outward signal happens only in the `AppError` conversions below.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(AuthFailure),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(anyhow::Error),

    /// A local failure that is neither the caller's fault nor the store's.
    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("bad credentials")]
    BadCredentials,

    #[error("token rejected ({0})")]
    Token(TokenRejection),
}

/// Why an identity token was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("malformed")]
    Malformed,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("unexpected signing algorithm")]
    UnexpectedAlgorithm,

    #[error("wrong issuer")]
    WrongIssuer,

    #[error("expired")]
    Expired,

    #[error("not yet valid")]
    NotYetValid,

    #[error("missing subject")]
    MissingSubject,
}

impl TokenRejection {
    /// Stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed",
            TokenRejection::SignatureMismatch => "signature_mismatch",
            TokenRejection::UnexpectedAlgorithm => "unexpected_algorithm",
            TokenRejection::WrongIssuer => "wrong_issuer",
            TokenRejection::Expired => "expired",
            TokenRejection::NotYetValid => "not_yet_valid",
            TokenRejection::MissingSubject => "missing_subject",
        }
    }
}

impl From<TokenRejection> for ServiceError {
    fn from(reason: TokenRejection) -> Self {
        ServiceError::AuthenticationFailed(AuthFailure::Token(reason))
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Storage(anyhow::Error::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for ServiceError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        ServiceError::Storage(anyhow::Error::new(err))
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{} cannot be empty", field)));
    }
    Ok(())
}

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";
pub const NOT_FOUND_MESSAGE: &str = "Resource not found";
pub const FORBIDDEN_MESSAGE: &str = "Access denied";
pub const CONFLICT_MESSAGE: &str = "Already exists";

impl ServiceError {
    /// Shape an error raised while deciding a read on someone else's resources.
    ///
    /// Missing identities and storage faults both become the same not-found signal, so a
    /// caller cannot tell "no such user" from "lookup broke".
    pub fn into_access_error(self) -> AppError {
        match self {
            ServiceError::Storage(e) => {
                tracing::error!(error = %e, "Storage fault during access decision");
                AppError::NotFound(anyhow::anyhow!(NOT_FOUND_MESSAGE))
            }
            other => other.into(),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::AuthenticationFailed(reason) => {
                tracing::warn!(reason = %reason, "Authentication failed");
                AppError::Unauthorized(anyhow::anyhow!(UNAUTHORIZED_MESSAGE))
            }
            ServiceError::NotFound(detail) => {
                tracing::info!(detail = %detail, "Not found");
                AppError::NotFound(anyhow::anyhow!(NOT_FOUND_MESSAGE))
            }
            ServiceError::Forbidden(detail) => {
                tracing::info!(detail = %detail, "Access denied");
                AppError::Forbidden(anyhow::anyhow!(FORBIDDEN_MESSAGE))
            }
            ServiceError::Conflict(detail) => {
                tracing::info!(detail = %detail, "Conflict");
                AppError::Conflict(anyhow::anyhow!(CONFLICT_MESSAGE))
            }
            ServiceError::Storage(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
