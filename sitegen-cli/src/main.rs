//! # sitegen CLI
//!
//! Builds, cleans and serves a sitegen project.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitegen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root
    #[arg(long, global = true, default_value = ".", env = "SITEGEN_ROOT")]
    root: PathBuf,

    /// Configuration file, relative to the project root
    #[arg(long, global = true, default_value = "sitegen.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter project into the root
    Init,

    /// Remove generated pages, sitemap.xml and robots.txt
    Clean,

    /// Build the static site
    Build,

    /// Serve the output directory over HTTP
    Serve {
        /// Server port
        #[arg(long, default_value_t = 8000)]
        port: u16,

        /// Serve the existing output without building first
        #[arg(long)]
        no_build: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init => commands::init_project(&cli.root),
        Commands::Clean => commands::clean_site(&cli.root, &cli.config),
        Commands::Build => commands::build_site(&cli.root, &cli.config).map(|_| ()),
        Commands::Serve { port, no_build } => {
            commands::serve_site(&cli.root, &cli.config, port, !no_build).await
        }
    }
}
