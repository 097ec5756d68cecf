//! Environment-driven settings.
//!
//! Every variable is optional. Blank values count as unset, so an
//! `OPENAI_API_KEY=` line in a `.env` file still means demo mode.

use crate::client::DEFAULT_TIMEOUT;
use crate::error::{PipelineError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://prompt_engine.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub llm_timeout: Duration,
    pub default_model: String,
    /// YAML file whose templates override the built-in ones.
    pub templates_path: Option<PathBuf>,
}

impl Config {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|e| {
            PipelineError::InvalidConfig(format!("BIND_ADDR '{bind_raw}' is not a socket address: {e}"))
        })?;

        let llm_timeout = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| {
                    PipelineError::InvalidConfig(format!("LLM_TIMEOUT_SECS '{raw}': {e}"))
                })?;
                if secs == 0 {
                    return Err(PipelineError::InvalidConfig(
                        "LLM_TIMEOUT_SECS must be greater than 0".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            anthropic_base_url: get("ANTHROPIC_BASE_URL"),
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr,
            llm_timeout,
            default_model: get("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            templates_path: get("PROMPT_TEMPLATES_PATH").map(PathBuf::from),
        })
    }

    /// `true` when neither provider has a credential.
    pub fn demo_mode(&self) -> bool {
        self.openai_api_key.is_none() && self.anthropic_api_key.is_none()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            openai_base_url: None,
            anthropic_base_url: None,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            llm_timeout: DEFAULT_TIMEOUT,
            default_model: DEFAULT_MODEL.to_string(),
            templates_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.demo_mode());
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert!(config.templates_path.is_none());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "   "),
            ("DATABASE_URL", ""),
        ]))
        .unwrap();
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("LLM_TIMEOUT_SECS", "5"),
            ("DEFAULT_MODEL", "claude-3-haiku-20240307"),
        ]))
        .unwrap();
        assert!(!config.demo_mode());
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.llm_timeout, Duration::from_secs(5));
        assert_eq!(config.default_model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_lookup(lookup(&[("BIND_ADDR", "nowhere")])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        let err = Config::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        assert!(Config::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "soon")])).is_err());
    }
}
