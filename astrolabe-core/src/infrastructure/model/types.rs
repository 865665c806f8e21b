//! Model types - Request and Error types

use crate::types::{ChatMessage, GenerationParams};
use reqwest::StatusCode;
use thiserror::Error;

/// Model request for one generation call
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub params: GenerationParams,
}

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Operator-facing message in Portuguese
    pub fn user_message(&self) -> String {
        match self {
            ModelError::MissingApiKey { provider } => {
                format!("O provedor '{provider}' precisa de uma chave de API.")
            }
            ModelError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Não foi possível ligar ao provedor '{provider}'.")
                } else if source.is_timeout() {
                    format!("O pedido a '{provider}' excedeu o tempo limite.")
                } else if let Some(status) = source.status() {
                    match status {
                        StatusCode::NOT_FOUND => {
                            format!("Endpoint de '{provider}' não encontrado.")
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            format!("Limite de pedidos atingido em '{provider}'.")
                        }
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            format!("O provedor '{provider}' está indisponível.")
                        }
                        _ => format!("Pedido a '{provider}' falhou: {}", status.as_u16()),
                    }
                } else {
                    format!("Erro de rede em '{provider}'.")
                }
            }
            ModelError::InvalidResponse { provider, .. } => {
                format!("A resposta de '{provider}' é inválida.")
            }
        }
    }
}
