//! Command-line arguments

use clap::Parser;

use agent_core::provider::DEFAULT_MODEL;

/// Words that end the interactive session
const EXIT_WORDS: [&str; 3] = ["exit", "quit", "退出"];

#[derive(Debug, Parser)]
#[command(name = "html-agent")]
#[command(author, version, about = "Chat with an agent that can multiply and build web pages")]
pub struct Cli {
    /// Ask a single question and exit instead of starting the prompt loop
    #[arg(trailing_var_arg = true)]
    pub task: Vec<String>,

    /// Chat model
    #[arg(long, env = "DEEPSEEK_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    /// Maximum reasoning steps per question
    #[arg(long, default_value_t = 10)]
    pub max_iterations: usize,

    /// Write previews without opening a browser
    #[arg(long, env = "HTML_AGENT_NO_BROWSER")]
    pub no_browser: bool,
}

impl Cli {
    /// The one-shot task, if any words were given
    pub fn one_shot(&self) -> Option<String> {
        (!self.task.is_empty()).then(|| self.task.join(" "))
    }
}

pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_WORDS.contains(&input.as_str())
}
