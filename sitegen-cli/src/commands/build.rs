//! Build and clean command implementations.

use anyhow::{Context, Result};
use sitegen_core::Config;
use sitegen_render::{BuildReport, BuildSettings, SiteCompiler};
use std::path::Path;

fn load_compiler(root: &Path, config_path: &Path) -> Result<SiteCompiler> {
    tracing::debug!("Loading config {:?} under {:?}", config_path, root);
    let config = Config::load(root, config_path).context("Failed to load configuration")?;
    Ok(SiteCompiler::new(BuildSettings::from_config(&config)))
}

/// Build the site below `root`
pub fn build_site(root: &Path, config_path: &Path) -> Result<BuildReport> {
    let compiler = load_compiler(root, config_path)?;
    tracing::info!(
        "Building {:?} into {:?}",
        compiler.settings().content_dir,
        compiler.settings().output_dir
    );

    compiler.build().context("Failed to build site")
}

/// Remove everything a build writes
pub fn clean_site(root: &Path, config_path: &Path) -> Result<()> {
    let compiler = load_compiler(root, config_path)?;
    compiler
        .clean_all()
        .context("Failed to remove generated files")?;
    tracing::info!("Removed generated files from {:?}", compiler.settings().output_dir);
    Ok(())
}
