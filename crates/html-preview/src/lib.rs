//! # html-preview
//!
//! Turns LLM-generated markup into a page you can look at.
//!
//! ```text
//! raw text ──▶ strip fences ──▶ html_previews/<hex>.html ──▶ http://localhost:8000/<hex>.html
//!                                        ▲                              │
//!                                        │        started once          ▼
//!                                 PreviewServer (ServeDir) ◀──── default browser
//! ```
//!
//! The [`Publisher`] is the only entry point: `publish(text) -> url`. It owns
//! the [`PreviewServer`], which binds `localhost:8000` the first time anything
//! is published and then serves the output directory until the process exits.
//!
//! The port is fixed, so two processes on one machine cannot both serve
//! previews; the second one logs the bind failure and still writes files.

pub mod browser;
pub mod config;
pub mod error;
pub mod fence;
pub mod publisher;
pub mod server;
pub mod svckit;

pub use browser::{BrowserLauncher, NoBrowser, SystemBrowser};
pub use config::PreviewConfig;
pub use error::{PreviewError, Result};
pub use fence::strip_code_fence;
pub use publisher::Publisher;
pub use server::{PreviewServer, ServerStatus};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::RenderHtmlTool;
}

/// System prompt for the page-building agent
pub const HTML_PREVIEW_PROMPT: &str = r#"You are a helpful assistant that can also build web pages.

## Building pages

When the user asks for a page, a UI mock-up, a chart or anything else that is
best shown in a browser:

1. Write ONE complete, self-contained HTML document (inline CSS and JS, no
   local assets).
2. Pass the whole document to `render_html` in a single call. Never split a
   page across calls and never send two documents in one call.
3. Reply with the URL the tool returns and a short summary of the page.

## Arithmetic

Use `multiply` for integer products instead of computing them yourself.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

Call at most one tool per reply. If you can answer directly without tools, do so."#;
