//! # Server connections
//!
//! One [`ServerConnection`] per configured peer. It owns the transport and
//! the MCP session on top of it, and exposes initialize, list-tools,
//! execute-tool and cleanup to the chat loop.

mod error;
mod server;
mod session;
mod state;


pub use error::ConnectionError;
pub use server::ServerConnection;
pub use session::McpSession;
pub use state::ConnectionState;
