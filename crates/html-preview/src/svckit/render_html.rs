//! Render HTML Tool
//!
//! Publishes one generated HTML document and returns the preview URL.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{
    AgentError, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
    tool::ParameterSchema,
};

use crate::publisher::Publisher;

/// Tool wrapping [`Publisher::publish`]
pub struct RenderHtmlTool {
    publisher: Arc<Publisher>,
}

impl RenderHtmlTool {
    pub const NAME: &'static str = "render_html";

    pub const fn new(publisher: Arc<Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl Tool for RenderHtmlTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Save a generated HTML page and open it in the user's browser. \
                Pass exactly one complete HTML document per call. Returns the preview URL."
                .into(),
            parameters: vec![ParameterSchema::required(
                "html_code",
                "string",
                "The full HTML document for a single page",
            )],
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let html = call
            .str_arg("html_code")
            .ok_or_else(|| AgentError::ToolValidation("'html_code' must be a string".into()))?
            .to_owned();

        let publisher = self.publisher.clone();
        let published = tokio::task::spawn_blocking(move || publisher.publish(&html))
            .await
            .map_err(|e| AgentError::ToolExecution(e.to_string()))?;

        Ok(match published {
            Ok(url) => ToolResult::success(Self::NAME, format!("Preview published at {url}"))
                .with_data(serde_json::json!({ "url": url })),
            Err(e) => {
                tracing::error!(error = %e, "Publishing preview failed");
                ToolResult::failure(Self::NAME, e.user_message())
            }
        })
    }
}
