//! # Chat orchestration
//!
//! [`ChatOrchestrator`] drives a session: it starts every connection,
//! composes the system message from the discovered tools, then loops over
//! operator input. Each turn asks the generation backend for a reply, runs
//! a requested tool through the [`ToolRegistry`](crate::application::tooling::ToolRegistry)
//! and asks again for a final answer that incorporates the tool result.

mod error;
mod input;
mod orchestrator;
mod prompt;

pub use error::ChatError;
pub use input::{InputSource, LineInput};
pub use orchestrator::{ChatOrchestrator, ChatState, TurnReply};
pub use prompt::compose_system_prompt;
