//! Model infrastructure module
//!
//! # Structure
//! - `types` - Request and Error types
//! - `traits` - ModelClient trait
//! - `adapter` - Message format adapters
//! - `factory` - Provider factory for creating clients
//! - `clients` - Individual client implementations
//! - `backend` - Retrying generation facade used by the chat loop

pub mod adapter;
pub mod backend;
pub mod clients;
pub mod factory;
pub mod traits;
pub mod types;

pub use backend::GenerationBackend;
pub use factory::ProviderFactory;
pub use traits::ModelClient;
pub use types::{ModelError, ModelRequest};
