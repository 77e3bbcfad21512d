//! Error Types for Preview Publishing

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PreviewError>;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Cannot resolve output directory {}: {source}", path.display())]
    ResolveDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write preview {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Port already taken or address not resolvable
    #[error("Cannot bind preview server to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Cannot spawn preview server thread: {0}")]
    Spawn(std::io::Error),
}

impl PreviewError {
    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::ResolveDir { path, .. } | Self::CreateDir { path, .. } => {
                format!("Could not prepare the preview folder {}.", path.display())
            }
            Self::Write { path, .. } => format!("Could not save the page to {}.", path.display()),
            Self::Bind { addr, .. } => format!("Preview server could not listen on {addr}."),
            Self::Spawn(_) => "Preview server could not be started.".into(),
        }
    }
}
