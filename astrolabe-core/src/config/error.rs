use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse settings from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse server configuration from {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("server configuration is missing the 'mcpServers' object")]
    MissingServers,

    #[error("server '{server}' has an invalid definition: {source}")]
    InvalidServer {
        server: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("server '{server}' is missing required field '{field}'")]
    MissingField { server: String, field: &'static str },

    #[error("server '{server}' has an invalid header '{header}'")]
    InvalidHeader { server: String, header: String },

    #[error("server '{server}' uses unsupported transport '{kind}'")]
    UnsupportedTransport { server: String, kind: String },

    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("unsupported generation provider '{provider}' (expected gemini, ollama, anthropic or openai)")]
    UnknownProvider { provider: String },

    #[error("provider '{provider}' requires the {env_var} environment variable")]
    MissingApiKey {
        provider: String,
        env_var: &'static str,
    },
}

impl ConfigError {
    /// Operator-facing message in Portuguese
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::NotFound { path } => {
                format!("Arquivo de configuração '{}' não encontrado.", path.display())
            }
            ConfigError::Json { path, .. } | ConfigError::Parse { path, .. } => format!(
                "Não foi possível interpretar '{}'. Verifique o formato do arquivo.",
                path.display()
            ),
            ConfigError::MissingField { server, field } => {
                format!("O servidor '{server}' precisa do campo '{field}'.")
            }
            ConfigError::MissingApiKey { env_var, .. } => {
                format!("Defina a variável de ambiente {env_var}.")
            }
            other => format!("Erro ao carregar a configuração: {other}"),
        }
    }
}
