//! Browser Launch
//!
//! Opening a browser is a side effect the publisher never depends on: the
//! launcher reports failure and the caller logs it.

/// Opens a URL for the user to look at
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// The user's default browser
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        tracing::info!(%url, "Opening preview in browser");
        webbrowser::open(url)
    }
}

/// Does nothing; for headless runs
pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        tracing::debug!(%url, "Browser launch disabled");
        Ok(())
    }
}
