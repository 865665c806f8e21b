//! Message adapters - convert the conversation history to provider formats
//!
//! A history whose first entry has the `model` role carries the composed
//! system instructions. Every adapter lifts that entry out and sends it the
//! way its provider expects system text; later `model` entries are ordinary
//! assistant turns.

use crate::types::{ChatMessage, MessageRole};
use serde_json::{Value, json};

/// Adapter for converting messages to different API formats
pub struct MessageAdapter;

impl MessageAdapter {
    /// Split the leading system entry from the conversation turns.
    pub fn split_system(messages: &[ChatMessage]) -> (Option<&str>, &[ChatMessage]) {
        match messages.split_first() {
            Some((first, rest)) if first.role == MessageRole::Model => {
                (Some(first.content.as_str()), rest)
            }
            _ => (None, messages),
        }
    }

    /// OpenAI-style format: `[{"role": "system" | "user" | "assistant", "content": ...}]`
    pub fn to_openai_format(messages: &[ChatMessage]) -> Vec<Value> {
        let (system, turns) = Self::split_system(messages);
        let mut converted = Vec::with_capacity(messages.len());
        if let Some(system) = system {
            converted.push(json!({ "role": "system", "content": system }));
        }
        converted.extend(turns.iter().map(|msg| {
            json!({
                "role": assistant_role(msg.role),
                "content": msg.content.clone()
            })
        }));
        converted
    }

    /// Ollama's chat endpoint uses the OpenAI message shape
    pub fn to_ollama_format(messages: &[ChatMessage]) -> Vec<Value> {
        Self::to_openai_format(messages)
    }

    /// Anthropic messages API: system text travels outside the message list.
    pub fn to_anthropic_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let (system, turns) = Self::split_system(messages);
        let converted = turns
            .iter()
            .map(|msg| {
                json!({
                    "role": assistant_role(msg.role),
                    "content": msg.content.clone()
                })
            })
            .collect();
        (system.map(str::to_string), converted)
    }

    /// Convert messages to Gemini format
    /// Returns: (system_instruction_text, contents)
    pub fn to_gemini_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let (system, turns) = Self::split_system(messages);
        let contents = turns
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.as_str(),
                    "parts": [{"text": msg.content.clone()}]
                })
            })
            .collect();
        (system.map(str::to_string), contents)
    }
}

fn assistant_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Model => "assistant",
        MessageRole::User => "user",
    }
}
