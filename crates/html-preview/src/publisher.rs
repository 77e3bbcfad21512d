//! Preview Publisher
//!
//! `publish(text) -> url`: strip fences, write a new file, make sure the
//! server is up, open a tab, hand back the URL. Only writing the file can
//! fail; server and browser trouble is logged and the URL is still returned.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::config::{PREVIEW_EXTENSION, PreviewConfig};
use crate::error::{PreviewError, Result};
use crate::fence::strip_code_fence;
use crate::server::PreviewServer;

/// Writes previews and owns the process's preview server.
///
/// Construct one per process; a second publisher on the same port would
/// fail to bind.
pub struct Publisher {
    config: PreviewConfig,
    output_dir: PathBuf,
    server: PreviewServer,
    browser: Arc<dyn BrowserLauncher>,
}

impl Publisher {
    /// Publisher that opens previews in the default browser
    pub fn new(config: PreviewConfig) -> Result<Self> {
        Self::with_browser(config, Arc::new(SystemBrowser))
    }

    pub fn with_browser(config: PreviewConfig, browser: Arc<dyn BrowserLauncher>) -> Result<Self> {
        let output_dir = std::path::absolute(&config.output_dir).map_err(|source| {
            PreviewError::ResolveDir {
                path: config.output_dir.clone(),
                source,
            }
        })?;
        let server = PreviewServer::new(&output_dir, config.host.clone(), config.port);

        Ok(Self {
            config,
            output_dir,
            server,
            browser,
        })
    }

    /// Publish one HTML document and return its URL
    pub fn publish(&self, raw_text: &str) -> Result<String> {
        let html = strip_code_fence(raw_text);
        let file_name = self.write_preview(&html)?;

        self.server.start_once();

        let url = self.config.url_for(&file_name);
        tracing::info!(%url, "Preview published");
        // Best effort: the URL is still useful without a browser.
        if let Err(e) = self.browser.open(&url) {
            tracing::warn!(%url, error = %e, "Could not open browser");
        }

        Ok(url)
    }

    /// Write `html` to a fresh file and return its name
    fn write_preview(&self, html: &str) -> Result<String> {
        fs::create_dir_all(&self.output_dir).map_err(|source| PreviewError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let file_name = format!("{}.{PREVIEW_EXTENSION}", Uuid::new_v4().simple());
        let path = self.output_dir.join(&file_name);
        let write_err = |source| PreviewError::Write {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(write_err)?;
        file.write_all(html.as_bytes()).map_err(write_err)?;

        tracing::debug!(path = %path.display(), bytes = html.len(), "Wrote preview");
        Ok(file_name)
    }

    /// Absolute output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub const fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub const fn server(&self) -> &PreviewServer {
        &self.server
    }
}
