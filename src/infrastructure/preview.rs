use crate::utils::{Logger, Result, SatchelError};
use axum::Router;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};

/// Static HTTP server over a built output directory.
///
/// Files are served below the base path; paths with no matching file fall
/// back to `index.html` so client-side routes load.
#[derive(Debug, Clone)]
pub struct PreviewServer {
    dir: PathBuf,
    base: String,
}

impl PreviewServer {
    pub fn new(dir: impl Into<PathBuf>, base: &str) -> Self {
        let base = if base.starts_with('/') {
            base.trim_end_matches('/').to_string()
        } else {
            // relative and absolute-URL bases are served from the root
            String::new()
        };
        Self {
            dir: dir.into(),
            base,
        }
    }

    pub fn router(&self) -> Router {
        let files = ServeDir::new(&self.dir).fallback(ServeFile::new(self.dir.join("index.html")));

        if self.base.is_empty() {
            Router::new().fallback_service(files)
        } else {
            Router::new().nest_service(&self.base, files)
        }
    }

    pub async fn serve(self, host: &str, port: u16) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(SatchelError::config(format!(
                "{} does not exist; run `satchel build` first",
                self.dir.display()
            )));
        }

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| SatchelError::build(format!("Preview server bind failed: {}", e)))?;

        Logger::info(&format!("📦 Preview: http://{}{}/", addr, self.base));
        Logger::info(&format!("📁 Serving {}", self.dir.display()));

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .map_err(|e| SatchelError::build(format!("Preview server failed: {}", e)))?;

        Logger::info("✅ Preview server stopped");
        Ok(())
    }
}
