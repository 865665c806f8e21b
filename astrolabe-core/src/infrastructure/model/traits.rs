//! Model traits

use super::types::{ModelError, ModelRequest};
use async_trait::async_trait;

/// One text-generation provider
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider id used in logs and errors
    fn id(&self) -> &str;

    /// Model name sent with every request
    fn model(&self) -> &str;

    /// Send one chat request and return the generated text.
    async fn chat(&self, request: ModelRequest) -> Result<String, ModelError>;
}
