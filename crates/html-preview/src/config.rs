//! Preview Configuration
//!
//! Where previews are written and where they are served from. The defaults
//! are the only values the CLI uses.

use std::path::PathBuf;

/// Directory (relative to the process's working directory) for previews
pub const DEFAULT_OUTPUT_DIR: &str = "html_previews";

pub const DEFAULT_HOST: &str = "localhost";

pub const DEFAULT_PORT: u16 = 8000;

/// Extension of every preview file
pub const PREVIEW_EXTENSION: &str = "html";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewConfig {
    /// Output directory; resolved to an absolute path by the publisher
    pub output_dir: PathBuf,

    /// Host both bound by the server and used in published URLs
    pub host: String,

    pub port: u16,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

impl PreviewConfig {
    pub fn new(output_dir: impl Into<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        Self {
            output_dir: output_dir.into(),
            host: host.into(),
            port,
        }
    }

    /// `http://<host>:<port>/`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    /// URL of a file directly inside the output directory
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{file_name}", self.base_url())
    }
}
