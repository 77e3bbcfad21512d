//! Tool System
//!
//! Callback tools the agent can invoke. Tools are registered at runtime and
//! dispatched by the reasoning loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier (`"tool"` in the prompt format)
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: HashMap::new(),
            id: None,
        }
    }

    #[must_use]
    pub fn with_argument(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }

    /// String argument, if present and a string
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(serde_json::Value::as_str)
    }

    /// Integer argument given either as a JSON number or a numeric string
    pub fn int_arg(&self, key: &str) -> Result<i64> {
        let value = self.arguments.get(key).ok_or_else(|| {
            AgentError::ToolValidation(format!("Missing required parameter: {key}"))
        })?;

        let parsed = match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| AgentError::ToolValidation(format!("'{key}' must be an integer, got {value}")))
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,

    /// Call ID (if provided in request)
    pub id: Option<String>,

    pub success: bool,

    /// Output (success message or error)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: false,
            output: error.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,

    /// JSON Schema type (string, integer, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    pub description: String,

    #[serde(default)]
    pub required: bool,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Tool definition schema (shown to the LLM)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    pub parameters: Vec<ParameterSchema>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && !call.arguments.contains_key(&param.name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_shared(Arc::new(tool));
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Validate and execute a tool call
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(call)?;
        tool.execute(call).await
    }

    /// All tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate system prompt section describing available tools
    pub fn generate_prompt_section(&self) -> String {
        use std::fmt::Write as _;

        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("Call a tool by responding with a JSON block:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");

        for schema in self.schemas() {
            let _ = writeln!(prompt, "### {}", schema.name);
            let _ = writeln!(prompt, "{}", schema.description);

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    let _ = writeln!(
                        prompt,
                        "- `{}` ({}){}: {}",
                        param.name, param.param_type, required, param.description
                    );
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Multiply two integers
pub struct MultiplyTool;

impl MultiplyTool {
    pub const NAME: &'static str = "multiply";

    /// Operands from `a`/`b`, or from a single `"a,b"` string in `operands`
    fn operands(call: &ToolCall) -> Result<(i64, i64)> {
        if let Some(pair) = call.str_arg("operands") {
            let (a, b) = pair.split_once(',').ok_or_else(|| {
                AgentError::ToolValidation(format!("Expected two comma-separated integers, got '{pair}'"))
            })?;
            let parse = |s: &str| {
                s.trim().parse::<i64>().map_err(|_| {
                    AgentError::ToolValidation(format!("'{}' is not an integer", s.trim()))
                })
            };
            return Ok((parse(a)?, parse(b)?));
        }

        Ok((call.int_arg("a")?, call.int_arg("b")?))
    }
}

#[async_trait]
impl Tool for MultiplyTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get the product of two integers.".into(),
            parameters: vec![
                ParameterSchema::optional("a", "integer", "First factor"),
                ParameterSchema::optional("b", "integer", "Second factor"),
                ParameterSchema::optional(
                    "operands",
                    "string",
                    "Alternative to a/b: both factors separated by a comma, e.g. '6,7'",
                ),
            ],
            has_side_effects: false,
        }
    }

    fn validate(&self, call: &ToolCall) -> Result<()> {
        let has_pair = call.arguments.contains_key("a") && call.arguments.contains_key("b");
        if has_pair || call.arguments.contains_key("operands") {
            Ok(())
        } else {
            Err(AgentError::ToolValidation(
                "Provide both 'a' and 'b', or 'operands'".into(),
            ))
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let (a, b) = Self::operands(call)?;
        tracing::debug!(a, b, "Multiplying");

        Ok(a.checked_mul(b).map_or_else(
            || ToolResult::failure(Self::NAME, format!("{a} * {b} overflows a 64-bit integer")),
            |product| {
                ToolResult::success(Self::NAME, product.to_string())
                    .with_data(serde_json::json!({ "product": product }))
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_multiply_numbers_and_strings() {
        let call = ToolCall::new("multiply")
            .with_argument("a", json!(6))
            .with_argument("b", json!("7"));

        let result = MultiplyTool.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "42");
        assert_eq!(result.data, Some(json!({ "product": 42 })));
    }

    #[tokio::test]
    async fn test_multiply_comma_form() {
        let call = ToolCall::new("multiply").with_argument("operands", json!(" 12, -3 "));
        let result = MultiplyTool.execute(&call).await.unwrap();
        assert_eq!(result.output, "-36");
    }

    #[tokio::test]
    async fn test_multiply_overflow_is_failed_result() {
        let call = ToolCall::new("multiply")
            .with_argument("a", json!(i64::MAX))
            .with_argument("b", json!(2));
        let result = MultiplyTool.execute(&call).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_registry_rejects_missing_operands() {
        let mut registry = ToolRegistry::new();
        registry.register(MultiplyTool);

        let call = ToolCall::new("multiply").with_argument("a", json!(2));
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));

        let err = registry.execute(&ToolCall::new("divide")).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(name) if name == "divide"));
    }

    #[test]
    fn test_tool_call_accepts_prompt_format() {
        let call: ToolCall =
            serde_json::from_str(r#"{"tool": "multiply", "arguments": {"a": 1, "b": 2}}"#).unwrap();
        assert_eq!(call.name, "multiply");
        assert_eq!(call.int_arg("b").unwrap(), 2);
        assert!(call.id.is_none());
    }

    #[test]
    fn test_prompt_section_lists_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(MultiplyTool);

        assert_eq!(registry.names(), vec!["multiply"]);
        let section = registry.generate_prompt_section();
        assert!(section.contains("### multiply"));
        assert!(section.contains("- `a` (integer): First factor"));
    }
}
