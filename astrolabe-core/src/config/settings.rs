//! # Client Settings
//!
//! Generation settings are resolved once at startup from an optional TOML
//! file and the process environment, validated, and then passed by value to
//! the components that need them.
//!
//! Environment variables take precedence over the file:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LLM_PROVIDER` | `gemini` |
//! | `LLM_MAX_RETRIES` | `3` |
//! | `LLM_RETRY_DELAY_SECONDS` | `2.0` |
//! | `LLM_TEMPERATURE` | `0.5` |
//! | `LLM_MAX_TOKENS` | `4096` |
//! | `LLM_TOP_K` | `2` |
//! | `LLM_TOP_P` | `0.5` |
//!
//! Provider credentials and models come from `GOOGLE_*`, `OLLAMA_*`,
//! `ANTHROPIC_*` and `OPENAI_*` variables.

use super::error::ConfigError;
use crate::constants::*;
use crate::types::GenerationParams;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Ollama,
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "ollama" => Ok(ProviderKind::Ollama),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(ConfigError::UnknownProvider {
                provider: other.to_string(),
            }),
        }
    }
}

/// Connection details for the selected generation provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Exponential backoff budget for generation calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_LLM_MAX_RETRIES,
            base_delay: Duration::from_secs_f64(DEFAULT_LLM_RETRY_DELAY_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub retry: RetrySettings,
    pub params: GenerationParams,
    pub system_prompt: Option<String>,
}

/// Raw `config/client.toml` structure
#[derive(Debug, Deserialize, Default)]
pub(super) struct RawSettings {
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub generation: RawGeneration,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawGeneration {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub max_retries: Option<u32>,
    pub retry_delay_seconds: Option<f64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
}

impl Settings {
    /// Resolve settings from the environment alone.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(RawSettings::default(), lookup)
    }

    pub(super) fn resolve<F>(raw: RawSettings, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let generation = raw.generation;

        let kind: ProviderKind = env("LLM_PROVIDER")
            .or(generation.provider)
            .unwrap_or_else(|| ProviderKind::Gemini.to_string())
            .parse()?;

        let params = GenerationParams {
            temperature: parsed(&env, "LLM_TEMPERATURE")?
                .or(generation.temperature)
                .unwrap_or(GenerationParams::default().temperature),
            max_tokens: parsed(&env, "LLM_MAX_TOKENS")?
                .or(generation.max_tokens)
                .unwrap_or(GenerationParams::default().max_tokens),
            top_k: parsed(&env, "LLM_TOP_K")?
                .or(generation.top_k)
                .unwrap_or(GenerationParams::default().top_k),
            top_p: parsed(&env, "LLM_TOP_P")?
                .or(generation.top_p)
                .unwrap_or(GenerationParams::default().top_p),
        };
        validate_params(&params)?;

        let max_retries: u32 = parsed(&env, "LLM_MAX_RETRIES")?
            .or(generation.max_retries)
            .unwrap_or(DEFAULT_LLM_MAX_RETRIES);
        if max_retries == 0 {
            return Err(invalid("LLM_MAX_RETRIES", max_retries, "must be at least 1"));
        }
        let delay_secs: f64 = parsed(&env, "LLM_RETRY_DELAY_SECONDS")?
            .or(generation.retry_delay_seconds)
            .unwrap_or(DEFAULT_LLM_RETRY_DELAY_SECS);
        let base_delay = Duration::try_from_secs_f64(delay_secs).map_err(|_| {
            invalid(
                "LLM_RETRY_DELAY_SECONDS",
                delay_secs,
                "must be a non-negative number of seconds",
            )
        })?;

        let provider = match kind {
            ProviderKind::Gemini => ProviderSettings {
                kind,
                model: env("GOOGLE_MODEL")
                    .or(generation.model)
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                endpoint: generation
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string()),
                api_key: Some(env("GOOGLE_API_KEY").ok_or(ConfigError::MissingApiKey {
                    provider: kind.to_string(),
                    env_var: "GOOGLE_API_KEY",
                })?),
            },
            ProviderKind::Ollama => ProviderSettings {
                kind,
                model: env("OLLAMA_MODEL")
                    .or(generation.model)
                    .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                endpoint: env("OLLAMA_API_BASE_URL")
                    .or(generation.endpoint)
                    .unwrap_or_else(|| DEFAULT_OLLAMA_ENDPOINT.to_string()),
                api_key: None,
            },
            ProviderKind::Anthropic => ProviderSettings {
                kind,
                model: env("ANTHROPIC_MODEL")
                    .or(generation.model)
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                endpoint: generation
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_ENDPOINT.to_string()),
                api_key: Some(env("ANTHROPIC_API_KEY").ok_or(ConfigError::MissingApiKey {
                    provider: kind.to_string(),
                    env_var: "ANTHROPIC_API_KEY",
                })?),
            },
            ProviderKind::OpenAi => ProviderSettings {
                kind,
                model: env("OPENAI_MODEL")
                    .or(generation.model)
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                endpoint: env("OPENAI_BASE_URL")
                    .or(generation.endpoint)
                    .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string()),
                api_key: Some(env("OPENAI_API_KEY").ok_or(ConfigError::MissingApiKey {
                    provider: kind.to_string(),
                    env_var: "OPENAI_API_KEY",
                })?),
            },
        };

        Ok(Self {
            provider,
            retry: RetrySettings {
                max_retries,
                base_delay,
            },
            params,
            system_prompt: raw.system_prompt.filter(|prompt| !prompt.trim().is_empty()),
        })
    }
}

fn parsed<T, F>(env: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| invalid(key, value, err)),
        None => Ok(None),
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_params(params: &GenerationParams) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&params.temperature) {
        return Err(invalid(
            "temperature",
            params.temperature,
            "must be between 0 and 2",
        ));
    }
    if !(params.top_p > 0.0 && params.top_p <= 1.0) {
        return Err(invalid("top_p", params.top_p, "must be in (0, 1]"));
    }
    if params.max_tokens == 0 {
        return Err(invalid("max_tokens", params.max_tokens, "must be positive"));
    }
    if params.top_k == 0 {
        return Err(invalid("top_k", params.top_k, "must be positive"));
    }
    Ok(())
}
