//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for agent behavior.
//! The agent observes, thinks, acts (via tools), and responds.

use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Marker opening a tool-call block in model output
const TOOL_FENCE: &str = "```tool";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt template
    pub system_prompt: String,

    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,

    /// Context budget for a single run, in estimated tokens
    pub max_context_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
            max_context_tokens: 32_000,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

Call at most one tool per reply. After receiving the tool result, use it to
write your answer. If you can answer directly without tools, do so."#;

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Build the full system prompt including tool descriptions
    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Run the reasoning loop until the model answers without a tool call
    pub async fn run(&self, conversation: &mut Conversation) -> Result<String> {
        if conversation.messages().first().map(|m| &m.role) != Some(&Role::System) {
            conversation
                .messages_mut()
                .insert(0, Message::system(self.build_system_prompt()));
        }

        for iteration in 1..=self.config.max_iterations {
            conversation.truncate_to_fit();

            let completion = self
                .provider
                .complete(conversation.messages(), &self.config.generation)
                .await?;

            if completion.truncated() {
                tracing::warn!(iteration, "Completion hit the token limit");
            }

            let content = completion.content;
            conversation.push(Message::assistant(&content));

            let Some(tool_call) = parse_tool_call(&content) else {
                tracing::debug!(iteration, "Final answer");
                return Ok(content);
            };

            tracing::info!(tool = %tool_call.name, iteration, "Executing tool");
            let result = self.execute_tool(&tool_call).await;
            if !result.success {
                tracing::warn!(tool = %result.name, output = %result.output, "Tool call failed");
            }

            conversation.push(Message::tool(format_tool_result(&result), tool_call.id.clone()));
        }

        Err(AgentError::MaxIterations(self.config.max_iterations))
    }

    /// Answer a single question in a fresh conversation
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut conversation = Conversation::with_system_prompt(self.build_system_prompt())
            .with_max_context_tokens(self.config.max_context_tokens);
        conversation.push(Message::user(question));
        self.run(&mut conversation).await
    }

    /// Execute a tool call; errors become failed results for the model to see
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        let mut result = match self.tools.execute(call).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure(call.name.clone(), format!("Error: {e}")),
        };
        result.id.clone_from(&call.id);
        result
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Parse a tool call from LLM output.
///
/// Only the first JSON value after the marker is read, so arguments may
/// themselves contain code fences.
fn parse_tool_call(content: &str) -> Option<ToolCall> {
    let call = content
        .find(TOOL_FENCE)
        .and_then(|start| first_json_value(&content[start + TOOL_FENCE.len()..]))
        .or_else(|| parse_inline_tool_call(content))?;

    Some(with_call_id(call))
}

/// Fallback for models that emit a bare `{"tool": ...}` object
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    content
        .match_indices('{')
        .find_map(|(idx, _)| first_json_value(&content[idx..]))
}

fn first_json_value(text: &str) -> Option<ToolCall> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<ToolCall>()
        .next()
        .and_then(std::result::Result::ok)
}

fn with_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    call
}

fn format_tool_result(result: &ToolResult) -> String {
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, result.output)
    } else {
        format!("[Tool '{}' failed]\n{}", result.name, result.output)
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, FinishReason, ModelInfo, ProviderInfo};
    use crate::tool::MultiplyTool;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records what it was sent
    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: "scripted".into(),
                models: Vec::new(),
                supports_tools: false,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Provider("script exhausted".into()))?;
            Ok(Completion {
                content,
                model: options.model.clone(),
                usage: None,
                finish_reason: Some(FinishReason::Stop),
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_parse_tool_call_block() {
        let content = "Let me compute that.\n```tool\n{\"tool\": \"multiply\", \"arguments\": {\"a\": 6, \"b\": 7}}\n```";
        let call = parse_tool_call(content).unwrap();
        assert_eq!(call.name, "multiply");
        assert_eq!(call.int_arg("a").unwrap(), 6);
        assert!(call.id.is_some());
    }

    #[test]
    fn test_parse_tool_call_with_fenced_argument() {
        let content = "```tool\n{\"tool\": \"process_code\", \"arguments\": {\"html_code\": \"```html\\n<p>x</p>\\n```\"}}\n```";
        let call = parse_tool_call(content).unwrap();
        assert_eq!(call.str_arg("html_code"), Some("```html\n<p>x</p>\n```"));
    }

    #[test]
    fn test_parse_inline_tool_call() {
        let content = r#"Calling {"tool": "multiply", "arguments": {"operands": "2,3"}} now"#;
        let call = parse_tool_call(content).unwrap();
        assert_eq!(call.name, "multiply");
    }

    #[test]
    fn test_plain_answer_has_no_tool_call() {
        assert!(parse_tool_call("The answer is 42.").is_none());
        assert!(parse_tool_call("{\"note\": \"no tool here\"}").is_none());
    }

    #[tokio::test]
    async fn test_run_executes_tool_then_answers() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "```tool\n{\"tool\": \"multiply\", \"arguments\": {\"a\": 6, \"b\": 7}}\n```",
            "6 times 7 is 42.",
        ]));
        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .tool(MultiplyTool)
            .build()
            .unwrap();

        let answer = agent.ask("What is 6 times 7?").await.unwrap();
        assert_eq!(answer, "6 times 7 is 42.");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0][0].content.contains("### multiply"));
        let tool_msg = seen[1].last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content, "[Tool 'multiply' returned]\n42");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "```tool\n{\"tool\": \"divide\", \"arguments\": {}}\n```",
            "Sorry, I cannot divide.",
        ]));
        let agent = Agent::with_defaults(provider.clone(), Arc::new(ToolRegistry::new()));

        let answer = agent.ask("10 / 2?").await.unwrap();
        assert_eq!(answer, "Sorry, I cannot divide.");

        let seen = provider.seen.lock().unwrap();
        assert!(seen[1].last().unwrap().content.starts_with("[Tool 'divide' failed]"));
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let call = "```tool\n{\"tool\": \"multiply\", \"arguments\": {\"a\": 1, \"b\": 1}}\n```";
        let provider = Arc::new(ScriptedProvider::new(&[call, call, call]));
        let agent = AgentBuilder::new()
            .provider(provider)
            .tool(MultiplyTool)
            .max_iterations(2)
            .build()
            .unwrap();

        let err = agent.ask("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(2)));
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }
}
