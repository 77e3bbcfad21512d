//! Service Kit - Agent Tools
//!
//! Tools that expose the publisher to the agent through `agent_core::Tool`.

mod render_html;

pub use render_html::RenderHtmlTool;
