//! # agent-runtime
//!
//! Runtime providers for the html-agent system.
//!
//! ## Providers
//!
//! - **DeepSeek** (default): hosted chat completions over the OpenAI-compatible API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::DeepSeekProvider;
//!
//! let provider = DeepSeekProvider::from_env()?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "deepseek")]
pub mod deepseek;

#[cfg(feature = "deepseek")]
pub use deepseek::{DeepSeekConfig, DeepSeekProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, LlmProvider, Message, Result, Role, Tool, ToolRegistry,
};
