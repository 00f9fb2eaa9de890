//! Startup configuration loaded from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Runtime configuration. Missing required variables abort startup;
/// everything else falls back to a sensible default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot API token.
    pub bot_token: String,
    /// Path of the sqlite database holding documents and the diary.
    pub database_path: PathBuf,
    /// Directory for the JSON fallback copies of persisted documents.
    pub cache_dir: PathBuf,
    /// Gemini API key; when absent the AI analysis feature is disabled.
    pub gemini_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let database_path: PathBuf = env::var("DATABASE_PATH")
            .context("DATABASE_PATH must be set")?
            .into();
        let cache_dir: PathBuf = env::var("CACHE_DIR")
            .unwrap_or_else(|_| "cache".to_string())
            .into();
        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|key| !key.is_empty());

        Ok(Self {
            bot_token,
            database_path,
            cache_dir,
            gemini_api_key,
        })
    }
}
