use crate::application::connection::ConnectionError;
use crate::application::tooling::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("failed to initialize server '{server}': {source}")]
    Startup {
        server: String,
        #[source]
        source: ConnectionError,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Operator-facing message in Portuguese
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Startup { server, source } => format!(
                "Falha ao inicializar o servidor {server}: {}. A abortar a sessão de chat.",
                source.user_message()
            ),
            ChatError::Registry(RegistryError::Collision {
                tool,
                first,
                second,
            }) => format!(
                "A ferramenta '{tool}' existe em '{first}' e em '{second}'. Ajuste a configuração ou a política de colisão."
            ),
            ChatError::Registry(RegistryError::Listing { server, source }) => format!(
                "Não foi possível listar as ferramentas de '{server}': {}",
                source.user_message()
            ),
            ChatError::Io(err) => format!("Erro de entrada/saída: {err}"),
        }
    }
}
