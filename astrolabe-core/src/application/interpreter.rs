//! Decides whether generated text is a tool call or a plain answer.

use serde_json::{Map, Value};

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// Nothing was generated.
    Empty,
    /// Natural language, carried exactly as generated.
    Text(String),
    ToolCall(ToolCall),
    /// The text looked like a tool call but could not be used as one.
    Fault(String),
}

impl Interpretation {
    /// Text folded into the conversation for a fault.
    pub fn fault_message(description: &str) -> String {
        format!("Ocorreu um erro interno: {description}")
    }
}

pub struct ResponseInterpreter;

impl ResponseInterpreter {
    pub fn parse(raw: &str) -> Interpretation {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Interpretation::Empty;
        }

        let candidate = strip_fence(trimmed);
        if !(candidate.starts_with('{') && candidate.ends_with('}')) {
            return Interpretation::Text(raw.to_string());
        }

        let Ok(Value::Object(object)) = serde_json::from_str::<Value>(candidate) else {
            return Interpretation::Text(raw.to_string());
        };
        match tool_call(object) {
            Ok(Some(call)) => Interpretation::ToolCall(call),
            Ok(None) => Interpretation::Text(raw.to_string()),
            Err(description) => Interpretation::Fault(description),
        }
    }
}

fn strip_fence(text: &str) -> &str {
    let opens = text
        .get(..FENCE_OPEN.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(FENCE_OPEN));
    if opens && text.len() >= FENCE_OPEN.len() + FENCE_CLOSE.len() && text.ends_with(FENCE_CLOSE) {
        text[FENCE_OPEN.len()..text.len() - FENCE_CLOSE.len()].trim()
    } else {
        text
    }
}

fn tool_call(mut object: Map<String, Value>) -> Result<Option<ToolCall>, String> {
    if !(object.contains_key("tool") && object.contains_key("arguments")) {
        return Ok(None);
    }
    let name = match object.remove("tool") {
        Some(Value::String(name)) => name,
        Some(other) => {
            return Err(format!(
                "o campo 'tool' deve ser texto, recebido: {other}"
            ));
        }
        None => return Ok(None),
    };
    let arguments = object.remove("arguments").unwrap_or(Value::Null);
    Ok(Some(ToolCall { name, arguments }))
}
