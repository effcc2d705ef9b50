use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use metrics::counter;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::services::error::{require_non_empty, ServiceError, TokenRejection};

/// The only accepted signing scheme.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token service for issuing and verifying identity tokens.
///
/// Stateless: holds only the keys derived from the configured secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    lifetime: Duration,
}

/// Claims carried by an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Authenticated username
    #[serde(default)]
    pub username: String,
    /// Issuer
    pub iss: String,
    /// Subject (same as `username`)
    #[serde(default)]
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Token returned to a client after login
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let secret = config.signing_secret.expose_secret();
        if secret.is_empty() {
            anyhow::bail!("Signing secret cannot be empty");
        }
        if config.expiry_minutes <= 0 {
            anyhow::bail!("Token lifetime must be positive");
        }

        tracing::info!(issuer = %config.issuer, "Token service initialized with HS256");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: config.issuer.clone(),
            lifetime: Duration::minutes(config.expiry_minutes),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    /// Issue a token for `username`, valid from now for the configured lifetime.
    pub fn issue(&self, username: &str) -> Result<IssuedToken, ServiceError> {
        self.issue_at(username, Utc::now())
    }

    pub fn issue_at(&self, username: &str, now: DateTime<Utc>) -> Result<IssuedToken, ServiceError> {
        require_non_empty("username", username)?;

        let claims = IdentityClaims {
            username: username.to_string(),
            iss: self.issuer.clone(),
            sub: username.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))?;

        Ok(IssuedToken {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.lifetime_seconds(),
        })
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, ServiceError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify against an explicit clock. The token is valid while `nbf <= now <= exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, ServiceError> {
        let result = self.check(token, now.timestamp());
        if let Err(reason) = &result {
            tracing::debug!(reason = %reason, "Token rejected");
            counter!("token_rejections_total", "reason" => reason.as_str()).increment(1);
        }
        result.map_err(ServiceError::from)
    }

    fn check(&self, token: &str, now: i64) -> Result<IdentityClaims, TokenRejection> {
        if token.is_empty() {
            return Err(TokenRejection::Malformed);
        }

        // Time checks are done below against the caller's clock.
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss"]);

        let claims = decode::<IdentityClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| classify(e.kind()))?
            .claims;

        if claims.username.is_empty() {
            return Err(TokenRejection::MissingSubject);
        }
        if now < claims.nbf {
            return Err(TokenRejection::NotYetValid);
        }
        if now > claims.exp {
            return Err(TokenRejection::Expired);
        }

        Ok(claims)
    }
}

fn classify(kind: &ErrorKind) -> TokenRejection {
    match kind {
        ErrorKind::InvalidSignature => TokenRejection::SignatureMismatch,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenRejection::UnexpectedAlgorithm
        }
        ErrorKind::InvalidIssuer => TokenRejection::WrongIssuer,
        ErrorKind::ExpiredSignature => TokenRejection::Expired,
        ErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
        _ => TokenRejection::Malformed,
    }
}
