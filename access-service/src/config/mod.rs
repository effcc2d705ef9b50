use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;

/// Placeholder signing secret for local development. Never a security boundary.
pub const DEV_SIGNING_SECRET: &str = "demo-signing-key";

/// Issuer claim stamped into and required from every identity token.
pub const DEFAULT_ISSUER: &str = "crzyFileServer";

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `postgres://...` or `sqlite://...`
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub signing_secret: Secret<String>,
    pub issuer: String,
    pub expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per owner.
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
}

impl JwtConfig {
    /// Development settings: placeholder secret, default issuer, 30 minute lifetime.
    pub fn development() -> Self {
        Self {
            signing_secret: Secret::new(DEV_SIGNING_SECRET.to_string()),
            issuer: DEFAULT_ISSUER.to_string(),
            expiry_minutes: 30,
        }
    }
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        // APP_ENV also picks the dotenv files, so one variable drives both.
        let environment: Environment = core_config::app_env()
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AccessConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("access-service"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            database: DatabaseConfig {
                url: Secret::new(get_env(
                    "DATABASE_URL",
                    Some("sqlite://access.db?mode=rwc"),
                    is_prod,
                )?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            jwt: JwtConfig {
                signing_secret: Secret::new(get_env(
                    "JWT_SIGNING_SECRET",
                    Some(DEV_SIGNING_SECRET),
                    is_prod,
                )?),
                issuer: get_env("JWT_ISSUER", Some(DEFAULT_ISSUER), false)?,
                expiry_minutes: parse_env("JWT_EXPIRY_MINUTES", "30", false)?,
            },
            storage: StorageConfig {
                root: PathBuf::from(get_env("STORAGE_ROOT", Some("user-files"), false)?),
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5", false)?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", false)?,
                register_attempts: parse_env("RATE_LIMIT_REGISTER_ATTEMPTS", "3", false)?,
                register_window_seconds: parse_env(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    "3600",
                    false,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.signing_secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SIGNING_SECRET must not be empty"
            )));
        }

        if self.environment == Environment::Prod {
            let secret = self.jwt.signing_secret.expose_secret();
            if secret == DEV_SIGNING_SECRET || secret.len() < 32 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SIGNING_SECRET must be a real secret of at least 32 bytes in production"
                )));
            }
        }

        Ok(())
    }

    /// True when tokens are signed with [`DEV_SIGNING_SECRET`].
    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt.signing_secret.expose_secret() == DEV_SIGNING_SECRET
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" | "test" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
