//! Local HTTP server for the generated site.

use super::build::build_site;
use anyhow::{Context, Result};
use axum::Router;
use sitegen_core::Config;
use std::path::Path;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Serve the output directory on `127.0.0.1:<port>`, building first when
/// `build` is set.
pub async fn serve_site(root: &Path, config_path: &Path, port: u16, build: bool) -> Result<()> {
    if build {
        let (root, config_path) = (root.to_path_buf(), config_path.to_path_buf());
        let report = tokio::task::spawn_blocking(move || build_site(&root, &config_path))
            .await
            .context("Build task panicked")??;
        tracing::info!("Built {} pages", report.pages.len());
    }

    let config = Config::load(root, config_path).context("Failed to load configuration")?;
    let output_dir = config.output_dir();

    let app = Router::new()
        .fallback_service(ServeDir::new(&output_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Serving {:?} at http://{}", output_dir, addr);
    println!("Serving at http://{}", addr);
    println!("   Press Ctrl+C to stop");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
