use serde_json::Value;

/// Text form of a tool result as it is folded into the conversation.
///
/// A JSON string is used verbatim. A `tools/call` result carrying a
/// `content` list with text blocks becomes those texts joined by newlines.
/// Anything else is compact JSON.
pub fn render_result(result: &Value) -> String {
    if let Value::String(text) = result {
        return text.clone();
    }
    if let Some(blocks) = result.get("content").and_then(Value::as_array) {
        let texts: Vec<&str> = blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();
        if !texts.is_empty() {
            return texts.join("\n");
        }
    }
    result.to_string()
}
