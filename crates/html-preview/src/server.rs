//! Static Preview Server
//!
//! Serves the output directory over plain HTTP. Started at most once; the
//! serve loop lives on a detached thread with its own single-threaded tokio
//! runtime, so callers never wait on it and it never keeps the process alive.
//! Failures after startup are only visible in the logs.

use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{MethodRouter, get},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::error::{PreviewError, Result};

/// Outcome of the single start attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerStatus {
    /// Listening; the serve loop runs until process exit
    Running { addr: SocketAddr },
    /// The one start attempt failed; it is never retried
    Failed { reason: String },
}

/// Lazily started static file server for one directory
pub struct PreviewServer {
    root: PathBuf,
    host: String,
    port: u16,
    status: OnceLock<ServerStatus>,
}

impl PreviewServer {
    pub fn new(root: impl Into<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        Self {
            root: root.into(),
            host: host.into(),
            port,
            status: OnceLock::new(),
        }
    }

    /// Start serving unless a start was already attempted.
    ///
    /// Concurrent first calls block briefly while one of them binds; every
    /// caller then sees the same status.
    pub fn start_once(&self) -> &ServerStatus {
        self.status.get_or_init(|| match self.spawn() {
            Ok(addr) => {
                tracing::info!(
                    root = %self.root.display(),
                    "Preview server started: http://{}:{}/",
                    self.host,
                    self.port
                );
                ServerStatus::Running { addr }
            }
            Err(e) => {
                tracing::error!(error = %e, "Preview server failed to start; published URLs will not resolve");
                ServerStatus::Failed {
                    reason: e.to_string(),
                }
            }
        })
    }

    /// `None` until `start_once` has been called
    pub fn status(&self) -> Option<&ServerStatus> {
        self.status.get()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status(), Some(ServerStatus::Running { .. }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bind on the caller's thread, then hand the listener to the serve thread
    fn spawn(&self) -> Result<SocketAddr> {
        let addr_text = format!("{}:{}", self.host, self.port);
        let bind_err = |source| PreviewError::Bind {
            addr: addr_text.clone(),
            source,
        };

        let listener = TcpListener::bind((self.host.as_str(), self.port)).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let addr = listener.local_addr().map_err(bind_err)?;

        let app = router(self.root.clone());
        std::thread::Builder::new()
            .name("preview-server".into())
            .spawn(move || serve_forever(listener, app))
            .map_err(PreviewError::Spawn)?;

        Ok(addr)
    }
}

fn serve_forever(listener: TcpListener, app: Router) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Preview server runtime failed to start");
            return;
        }
    };

    let result = runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        axum::serve(listener, app).await
    });

    if let Err(e) = result {
        tracing::error!(error = %e, "Preview server stopped");
    }
}

/// Files from `root`, `index.html` for directories, listings otherwise
pub fn router(root: PathBuf) -> Router {
    let listing: MethodRouter = get(list_directory).with_state(Arc::new(root.clone()));

    Router::new()
        .fallback_service(ServeDir::new(root).fallback(listing))
        .layer(TraceLayer::new_for_http())
}

/// Directory listing for requests `ServeDir` could not answer
async fn list_directory(State(root): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let Some(dir) = resolve_dir(&root, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match render_listing(&dir, uri.path()).await {
        Ok(page) => Html(page).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Map a request path onto `root`, refusing anything that climbs out of it
fn resolve_dir(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let mut dir = root.to_path_buf();

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') || s.contains(':') => return None,
            s => dir.push(s),
        }
    }

    Some(dir)
}

async fn render_listing(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        let href = if is_dir {
            name.push('/');
            format!("{}/", urlencoding::encode(name.trim_end_matches('/')))
        } else {
            urlencoding::encode(&name).into_owned()
        };
        names.push((name, href));
    }
    names.sort_by_key(|(name, _)| name.to_lowercase());

    let title = format!("Directory listing for {}", escape_html(request_path));
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );
    for (name, href) in &names {
        page.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_html(href),
            escape_html(name)
        ));
    }
    page.push_str("</ul>\n<hr>\n</body>\n</html>\n");

    Ok(page)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
