//! Process configuration
//!
//! Everything the components need is read once from the environment (a `.env`
//! file is honored by the binary) and handed to constructors explicitly.

use crate::error::{InsightsError, Result};
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "data/orders.db";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8501";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub llm: LlmConfig,
    pub tracker: TrackerConfig,
    pub bind_addr: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub repo: Option<String>,
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            db_path: get("ORDERS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            llm: LlmConfig {
                api_key: get("OPENAI_API_KEY"),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            },
            tracker: TrackerConfig {
                api_url: get("GITHUB_API_URL")
                    .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
                token: get("GITHUB_TOKEN"),
                repo: get("GITHUB_REPO"),
            },
            bind_addr: get("INSIGHTS_BIND").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        }
    }
}

impl TrackerConfig {
    pub fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| InsightsError::Config("GITHUB_TOKEN is not set".to_string()))
    }

    pub fn repo(&self) -> Result<&str> {
        let repo = self
            .repo
            .as_deref()
            .ok_or_else(|| InsightsError::Config("GITHUB_REPO is not set".to_string()))?;
        match repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(repo)
            }
            _ => Err(InsightsError::Config(format!(
                "GITHUB_REPO must look like owner/name, got '{}'",
                repo
            ))),
        }
    }
}
