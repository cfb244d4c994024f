//! Init command implementation.

use anyhow::{Context, Result};
use include_dir::{include_dir, Dir, DirEntry};
use std::fs;
use std::path::Path;

// Starter project, embedded so it survives `cargo install`
static STARTER: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/starter");

/// Write the starter project into `root`, leaving existing files alone
pub fn init_project(root: &Path) -> Result<()> {
    fs::create_dir_all(root).with_context(|| format!("Failed to create {:?}", root))?;

    let mut written = 0;
    let mut skipped = 0;
    write_dir(&STARTER, root, &mut written, &mut skipped)?;

    tracing::info!("Wrote {} starter files ({} already present)", written, skipped);
    println!("sitegen initialized in {:?}", root);
    println!("  - Edit content/_global/global.yaml to set the site name and base_url");
    println!("  - Run `sitegen build`, then `sitegen serve`");
    Ok(())
}

fn write_dir(dir: &Dir<'_>, root: &Path, written: &mut usize, skipped: &mut usize) -> Result<()> {
    for entry in dir.entries() {
        match entry {
            DirEntry::Dir(sub) => write_dir(sub, root, written, skipped)?,
            DirEntry::File(file) => {
                let target = root.join(file.path());
                if target.exists() {
                    tracing::debug!("Keeping existing {:?}", target);
                    *skipped += 1;
                    continue;
                }

                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {:?}", parent))?;
                }
                fs::write(&target, file.contents())
                    .with_context(|| format!("Failed to write {:?}", target))?;
                tracing::debug!("Created {:?}", target);
                *written += 1;
            }
        }
    }

    Ok(())
}
