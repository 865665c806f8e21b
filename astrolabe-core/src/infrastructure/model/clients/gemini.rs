//! Gemini client implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ProviderSettings;
use crate::constants::DEFAULT_GEMINI_API_PATH;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{ModelError, ModelRequest};

/// Gemini client for Google AI
#[derive(Clone)]
pub struct GeminiClient {
    base: HttpClientBase,
    model: String,
}

impl GeminiClient {
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

    fn build_model_url(&self, model: &str) -> String {
        self.base
            .build_url(&format!("{DEFAULT_GEMINI_API_PATH}/{model}:generateContent"))
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ModelRequest) -> Result<String, ModelError> {
        let url = self.build_model_url(&request.model);
        let (system, contents) = MessageAdapter::to_gemini_format(&request.messages);

        let payload = GeminiRequest {
            contents,
            system_instruction: system.map(|text| GeminiSystem {
                parts: vec![GeminiTextPart { text }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.params.temperature,
                max_output_tokens: request.params.max_tokens,
                top_k: request.params.top_k,
                top_p: request.params.top_p,
            },
        };

        info!(
            provider = self.base.id.as_str(),
            model = request.model.as_str(),
            messages = request.messages.len(),
            "Sending request to Gemini"
        );

        let response: GeminiResponse = self.base.post_with_query_key(&url, &payload).await?;
        debug!("Received response from Gemini");

        let parts: Vec<String> = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if parts.is_empty() {
            return Err(ModelError::invalid_response(&self.base.id, "missing text"));
        }
        Ok(parts.concat())
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystem>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiSystem {
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_k: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}
