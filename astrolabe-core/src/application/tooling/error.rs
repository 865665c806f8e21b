use crate::application::connection::ConnectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{tool}' is offered by both '{first}' and '{second}'")]
    Collision {
        tool: String,
        first: String,
        second: String,
    },
    #[error("failed to list tools of server '{server}': {source}")]
    Listing {
        server: String,
        #[source]
        source: ConnectionError,
    },
}
