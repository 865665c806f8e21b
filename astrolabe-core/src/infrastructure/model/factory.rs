//! Provider factory - creates clients from settings

use super::clients::{AnthropicClient, GeminiClient, OllamaClient, OpenAIClient};
use super::traits::ModelClient;
use crate::config::{ProviderKind, ProviderSettings};

/// Factory for creating model clients from provider settings.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates the client for the configured provider. The choice is made
    /// once; every generation call goes to the same client.
    pub fn create(settings: &ProviderSettings) -> Box<dyn ModelClient> {
        match settings.kind {
            ProviderKind::Gemini => Box::new(GeminiClient::from_settings(settings)),
            ProviderKind::Ollama => Box::new(OllamaClient::from_settings(settings)),
            ProviderKind::Anthropic => Box::new(AnthropicClient::from_settings(settings)),
            ProviderKind::OpenAi => Box::new(OpenAIClient::from_settings(settings)),
        }
    }
}
