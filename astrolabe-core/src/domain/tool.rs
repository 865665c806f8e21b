use serde_json::Value;

/// One argument of a tool, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

/// A tool advertised by a server's `tools/list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub title: Option<String>,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDescriptor {
    /// Decode one entry of a `tools/list` result. Entries without a name
    /// yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name").and_then(Value::as_str)?.to_string();
        let title = value
            .get("title")
            .or_else(|| value.pointer("/annotations/title"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let schema = value.get("inputSchema");
        let required: Vec<&str> = schema
            .and_then(|schema| schema.get("required"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let parameters = schema
            .and_then(|schema| schema.get("properties"))
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(param, info)| ToolParameter {
                        name: param.clone(),
                        description: info
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        required: required.contains(&param.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name,
            title,
            description,
            parameters,
        })
    }

    /// Summary block listed in the system prompt.
    pub fn format_for_llm(&self) -> String {
        let mut output = format!("Tool: {}\n", self.name);
        if let Some(title) = &self.title {
            output.push_str(&format!("User-readable title: {title}\n"));
        }
        let arguments: Vec<String> = self
            .parameters
            .iter()
            .map(|param| {
                let mut line = format!(
                    "- {}: {}",
                    param.name,
                    param.description.as_deref().unwrap_or("No description")
                );
                if param.required {
                    line.push_str(" (required)");
                }
                line
            })
            .collect();
        output.push_str(&format!(
            "Description: {}\nArguments:\n{}\n",
            self.description,
            arguments.join("\n")
        ));
        output
    }
}
