use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub llm_timeout_secs: u64,
    pub template_dir: PathBuf,
    pub output_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: database_url_from_env()?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_model: env_or("OPENAI_MODEL", "gpt-4o"),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            llm_timeout_secs: env_or("LLM_TIMEOUT_SECS", "120")
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            template_dir: PathBuf::from(env_or("TEMPLATE_DIR", "templates")),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "output_proposals")),
            port: env_or("PORT", "8000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

/// A mounted volume (Railway) takes precedence over `DATABASE_URL`.
fn database_url_from_env() -> Result<String> {
    if let Ok(volume) = std::env::var("RAILWAY_VOLUME_MOUNT_PATH") {
        let dir = PathBuf::from(volume);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
        return Ok(format!("sqlite://{}", dir.join("proposals.db").display()));
    }
    Ok(env_or("DATABASE_URL", "sqlite://proposals.db"))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
