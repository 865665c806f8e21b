//! Anthropic messages API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ProviderSettings;
use crate::constants::ANTHROPIC_API_VERSION;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{ModelError, ModelRequest};

const MESSAGES_PATH: &str = "/v1/messages";

#[derive(Clone)]
pub struct AnthropicClient {
    base: HttpClientBase,
    model: String,
}

impl AnthropicClient {
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            base: HttpClientBase::new(
                settings.kind.as_str(),
                settings.endpoint.clone(),
                settings.api_key.clone(),
            ),
            model: settings.model.clone(),
        }
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ModelRequest) -> Result<String, ModelError> {
        let url = self.base.build_url(MESSAGES_PATH);
        let (system, messages) = MessageAdapter::to_anthropic_format(&request.messages);

        // Only temperature and max_tokens are forwarded to this provider.
        let payload = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
            system,
            messages,
        };

        info!(
            provider = self.base.id.as_str(),
            model = request.model.as_str(),
            messages = request.messages.len(),
            "Sending request to Anthropic"
        );

        let response: AnthropicResponse = self
            .base
            .post_with_header_key(
                &url,
                "x-api-key",
                &[("anthropic-version", ANTHROPIC_API_VERSION)],
                &payload,
            )
            .await?;
        debug!("Received response from Anthropic");

        let text: Vec<String> = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(ModelError::invalid_response(&self.base.id, "missing text block"));
        }
        Ok(text.concat())
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
