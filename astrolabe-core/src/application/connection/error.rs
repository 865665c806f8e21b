use super::ConnectionState;
use crate::config::ConfigError;
use crate::infrastructure::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("server '{server}' is not initialized (state: {state})")]
    NotInitialized {
        server: String,
        state: ConnectionState,
    },
    #[error("server '{server}' is busy ({state})")]
    Busy {
        server: String,
        state: ConnectionState,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConnectionError {
    /// Operator-facing message in Portuguese
    pub fn user_message(&self) -> String {
        match self {
            ConnectionError::Config(err) => err.user_message(),
            ConnectionError::NotInitialized { server, .. } => {
                format!("O servidor '{server}' não foi inicializado.")
            }
            ConnectionError::Busy { server, .. } => {
                format!("O servidor '{server}' está ocupado. Tente novamente.")
            }
            ConnectionError::Transport(TransportError::Spawn { server, .. }) => {
                format!("Não foi possível iniciar o servidor '{server}'.")
            }
            ConnectionError::Transport(err) => format!("Falha na comunicação: {err}"),
        }
    }
}
