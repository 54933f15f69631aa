//! Runtime configuration from environment variables
//!
//! Binaries call `dotenv::dotenv()` first, then [`AppConfig::from_env`].

use crate::error::OrchestrationError;
use crate::Result;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MOCK_DATA_DIR: &str = "./mock_data";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_DISPATCH_ITERATIONS: usize = 6;
pub const DEFAULT_HISTORY_WINDOW: usize = 20;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub mock_data_dir: PathBuf,
    pub knowledge_base_file: Option<PathBuf>,
    /// `None` selects the keyword router and planner
    pub llm: Option<LlmConfig>,
    pub max_dispatch_iterations: usize,
    pub history_window: usize,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mock_data_dir: PathBuf::from(DEFAULT_MOCK_DATA_DIR),
            knowledge_base_file: None,
            llm: None,
            max_dispatch_iterations: DEFAULT_MAX_DISPATCH_ITERATIONS,
            history_window: DEFAULT_HISTORY_WINDOW,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let llm = get("OPENAI_API_KEY")
            .map(|api_key| -> Result<LlmConfig> {
                Ok(LlmConfig {
                    api_key,
                    api_base: get("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                    model: get("OPENAI_MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                    timeout_secs: parse_or("LLM_TIMEOUT_SECS", get("LLM_TIMEOUT_SECS"), DEFAULT_LLM_TIMEOUT_SECS)?,
                })
            })
            .transpose()?;

        let max_dispatch_iterations = parse_or(
            "MAX_DISPATCH_ITERATIONS",
            get("MAX_DISPATCH_ITERATIONS"),
            DEFAULT_MAX_DISPATCH_ITERATIONS,
        )?;
        if max_dispatch_iterations == 0 {
            return Err(OrchestrationError::ConfigError(
                "MAX_DISPATCH_ITERATIONS must be at least 1".to_string(),
            ));
        }

        let port = parse_or(
            "PORT",
            get("PORT").or_else(|| get("API_PORT")),
            DEFAULT_PORT,
        )?;

        Ok(Self {
            mock_data_dir: get("MOCK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MOCK_DATA_DIR)),
            knowledge_base_file: get("KNOWLEDGE_BASE_FILE").map(PathBuf::from),
            llm,
            max_dispatch_iterations,
            history_window: parse_or("HISTORY_WINDOW", get("HISTORY_WINDOW"), DEFAULT_HISTORY_WINDOW)?,
            port,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| {
            OrchestrationError::ConfigError(format!("{} has invalid value '{}'", key, value))
        }),
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
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_llm_enabled_by_api_key() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL_NAME", "gpt-4o"),
            ("LLM_TIMEOUT_SECS", "10"),
        ]))
        .unwrap();

        let llm = config.llm.unwrap();
        assert_eq!(llm.api_key, "sk-test");
        assert_eq!(llm.model, "gpt-4o");
        assert_eq!(llm.api_base, DEFAULT_API_BASE);
        assert_eq!(llm.timeout_secs, 10);
    }

    #[test]
    fn test_blank_api_key_disables_llm() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "   ")])).unwrap();
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_port_falls_back_to_api_port() {
        let config = AppConfig::from_lookup(lookup(&[("API_PORT", "9090")])).unwrap();
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_invalid_numbers_are_config_errors() {
        let bad_iterations =
            AppConfig::from_lookup(lookup(&[("MAX_DISPATCH_ITERATIONS", "many")]));
        assert!(matches!(bad_iterations, Err(OrchestrationError::ConfigError(_))));

        let zero = AppConfig::from_lookup(lookup(&[("MAX_DISPATCH_ITERATIONS", "0")]));
        assert!(matches!(zero, Err(OrchestrationError::ConfigError(_))));

        let bad_port = AppConfig::from_lookup(lookup(&[("PORT", "70000")]));
        assert!(bad_port.is_err());
    }
}
