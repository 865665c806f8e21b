//! Astrolabe core: MCP server connections, tool routing, generation
//! providers and the chat loop that ties them together.

pub mod application;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use domain::types;
pub use infrastructure::{model, rpc, transport};

pub use application::chat::{ChatError, ChatOrchestrator, ChatState, InputSource, LineInput, TurnReply};
pub use application::connection::{ConnectionError, ConnectionState, ServerConnection};
pub use application::interpreter::{Interpretation, ResponseInterpreter, ToolCall};
pub use application::tooling::{CollisionPolicy, ToolRegistry};
