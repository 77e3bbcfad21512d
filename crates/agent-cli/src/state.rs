//! Application State

use std::sync::Arc;

use agent_core::{Agent, AgentBuilder, LlmProvider, MultiplyTool};
use html_preview::{
    BrowserLauncher, HTML_PREVIEW_PROMPT, NoBrowser, PreviewConfig, Publisher, SystemBrowser,
    tools::RenderHtmlTool,
};

use crate::cli::Cli;

/// Everything the prompt loop needs
pub struct AppState {
    /// Agent with the multiply and render_html tools
    pub agent: Agent,

    /// Shared with the render tool; owns the preview server
    pub publisher: Arc<Publisher>,
}

impl AppState {
    pub fn build(cli: &Cli, provider: Arc<dyn LlmProvider>) -> anyhow::Result<Self> {
        let browser: Arc<dyn BrowserLauncher> = if cli.no_browser {
            Arc::new(NoBrowser)
        } else {
            Arc::new(SystemBrowser)
        };
        let publisher = Arc::new(Publisher::with_browser(PreviewConfig::default(), browser)?);

        let agent = AgentBuilder::new()
            .provider(provider)
            .system_prompt(HTML_PREVIEW_PROMPT)
            .tool(MultiplyTool)
            .tool(RenderHtmlTool::new(publisher.clone()))
            .model(&cli.model)
            .temperature(cli.temperature)
            .max_iterations(cli.max_iterations)
            .build()?;

        Ok(Self { agent, publisher })
    }
}
