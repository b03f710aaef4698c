// ⚙️ Configuration - environment variables only
//
// Everything the binaries need is read once at startup. `from_vars` takes a
// lookup function so tests never touch the real process environment.

use crate::assumptions::BusinessAssumptions;
use crate::error::{AppError, AppResult};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE_PATH: &str = "gym.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_GROQ_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_INSIGHT_CACHE_MINUTES: u64 = 10;

/// Language-model connection settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `None` means the model is not configured; calls fail and callers degrade
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub cors_origin: String,
    pub llm: LlmConfig,
    pub insight_cache_ttl: Duration,
    pub assumptions: BusinessAssumptions,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_vars<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cache_minutes = match non_empty("GYM_INSIGHT_CACHE_MINUTES") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                AppError::config(format!(
                    "GYM_INSIGHT_CACHE_MINUTES must be a whole number of minutes, got {:?}",
                    raw
                ))
            })?,
            None => DEFAULT_INSIGHT_CACHE_MINUTES,
        };

        let assumptions = match non_empty("GYM_ASSUMPTIONS_PATH") {
            Some(path) => BusinessAssumptions::from_file(&path)
                .map_err(|e| AppError::config(format!("{:#}", e)))?,
            None => BusinessAssumptions::default(),
        };

        Ok(Config {
            database_path: PathBuf::from(
                non_empty("GYM_DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            ),
            bind_addr: non_empty("GYM_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            cors_origin: non_empty("GYM_CORS_ORIGIN")
                .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            llm: LlmConfig {
                api_key: non_empty("GROQ_API_KEY"),
                model: non_empty("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
                base_url: non_empty("GROQ_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            },
            insight_cache_ttl: Duration::from_secs(cache_minutes * 60),
            assumptions,
        })
    }
}
