//! Application constants and service configuration.
//!
//! Configuration comes from the environment (or any key lookup, for tests)
//! and is handed to the extraction adapter at construction time. Nothing here
//! mutates process-wide state.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

/// Seconds before a hung extraction call is abandoned.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// In-flight extraction calls during batch scoring.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "sepsis_vignette=info,warn"
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Backend '{0}' requires a service credential (set OPENAI_API_KEY)")]
    MissingCredential(Backend),

    #[error("HTTP client could not be built: {0}")]
    HttpClient(String),
}

/// Which implementation backs the extraction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Hosted OpenAI-compatible chat completions service.
    #[default]
    OpenAi,
    /// Local Ollama instance.
    Ollama,
    /// Deterministic pattern-based reader, no network.
    Rules,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
            Self::Rules => write!(f, "rules"),
        }
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            "rules" | "rule-based" | "fallback" => Ok(Self::Rules),
            _ => Err(ConfigError::InvalidValue {
                key: "SEPSIS_BACKEND".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// Everything the extraction adapter needs to reach its backing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub backend: Backend,
    pub base_url: String,
    pub model: String,
    /// Opaque credential. Never logged or serialized.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Token budget across all calls made through one adapter. None = unmetered.
    pub token_budget: Option<u64>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Where diagnostic dumps go. None = disabled.
    pub dump_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::for_backend(Backend::default())
    }
}

impl ServiceConfig {
    /// Defaults for a given backend.
    pub fn for_backend(backend: Backend) -> Self {
        let (base_url, model) = match backend {
            Backend::OpenAi => (DEFAULT_OPENAI_URL, DEFAULT_OPENAI_MODEL),
            Backend::Ollama => (DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL),
            Backend::Rules => ("", "rules"),
        };
        Self {
            backend,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_budget: None,
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            dump_dir: None,
        }
    }

    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Recognized keys: `SEPSIS_BACKEND`, `SEPSIS_BASE_URL`, `SEPSIS_MODEL`,
    /// `OPENAI_API_KEY`, `SEPSIS_TIMEOUT_SECS`, `SEPSIS_TOKEN_BUDGET`,
    /// `SEPSIS_DUMP_DIR`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("SEPSIS_BACKEND") {
            Some(v) => v.parse()?,
            None => Backend::default(),
        };
        let mut config = Self::for_backend(backend);

        if let Some(url) = get("SEPSIS_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = get("SEPSIS_MODEL") {
            config.model = model;
        }
        config.api_key = get("OPENAI_API_KEY");
        if let Some(v) = get("SEPSIS_TIMEOUT_SECS") {
            config.timeout_secs = parse_number("SEPSIS_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("SEPSIS_TOKEN_BUDGET") {
            config.token_budget = Some(parse_number("SEPSIS_TOKEN_BUDGET", &v)?);
        }
        config.dump_dir = get("SEPSIS_DUMP_DIR").map(PathBuf::from);

        Ok(config)
    }

    /// Fail early when the chosen backend cannot work with this configuration.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.backend == Backend::OpenAi && self.api_key.is_none() {
            return Err(ConfigError::MissingCredential(self.backend));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_openai_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.backend, Backend::OpenAi);
        assert_eq!(config.base_url, DEFAULT_OPENAI_URL);
        assert_eq!(config.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
        assert!(config.token_budget.is_none());
        assert!(config.dump_dir.is_none());
    }

    #[test]
    fn ollama_backend_switches_defaults() {
        let config =
            ServiceConfig::from_lookup(lookup_from(&[("SEPSIS_BACKEND", "ollama")])).unwrap();
        assert_eq!(config.backend, Backend::Ollama);
        assert_eq!(config.base_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("SEPSIS_BACKEND", "rules"),
            ("SEPSIS_TIMEOUT_SECS", "30"),
            ("SEPSIS_TOKEN_BUDGET", "5000"),
            ("SEPSIS_DUMP_DIR", "/tmp/dumps"),
        ]))
        .unwrap();
        assert_eq!(config.backend, Backend::Rules);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.token_budget, Some(5000));
        assert_eq!(config.dump_dir, Some(PathBuf::from("/tmp/dumps")));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config =
            ServiceConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn invalid_number_is_rejected() {
        let result =
            ServiceConfig::from_lookup(lookup_from(&[("SEPSIS_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!("claude".parse::<Backend>().is_err());
        assert_eq!("Rule-Based".parse::<Backend>().unwrap(), Backend::Rules);
    }

    #[test]
    fn openai_requires_credential() {
        let config = ServiceConfig::for_backend(Backend::OpenAi);
        assert!(matches!(
            config.check(),
            Err(ConfigError::MissingCredential(Backend::OpenAi))
        ));
        assert!(ServiceConfig::for_backend(Backend::Rules).check().is_ok());
    }

    #[test]
    fn credential_is_never_serialized() {
        let mut config = ServiceConfig::for_backend(Backend::OpenAi);
        config.api_key = Some("sk-secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
