use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        load_env_files();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Name of the running environment, taken from `APP_ENV` (defaults to `development`).
pub fn app_env() -> String {
    std::env::var("APP_ENV")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "development".to_string())
}

/// Load dotenv files from the working directory.
///
/// Files are read from most to least specific and never overwrite a variable that is
/// already set, so the process environment always wins:
/// `.env.{env}.local`, `.env.local` (not for `test`), `.env.{env}`, `.env`.
pub fn load_env_files() -> Vec<String> {
    load_env_files_from(Path::new("."), &app_env())
}

/// Same as [`load_env_files`] but rooted at `dir`. Returns the files that were applied.
pub fn load_env_files_from(dir: &Path, env: &str) -> Vec<String> {
    let mut candidates = vec![format!(".env.{env}.local")];
    if env != "test" {
        candidates.push(".env.local".to_string());
    }
    candidates.push(format!(".env.{env}"));
    candidates.push(".env".to_string());

    candidates
        .into_iter()
        .filter(|name| dotenvy::from_path(dir.join(name)).is_ok())
        .collect()
}
