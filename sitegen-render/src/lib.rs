//! # sitegen-render
//!
//! Template rendering and site compilation for sitegen: tera templates,
//! render contexts, the build orchestrator and the sitemap.

pub mod compiler;
pub mod context;
pub mod sitemap;
pub mod templates;

pub use compiler::{BuildError, BuildReport, BuildSettings, SiteCompiler};
pub use context::{ContentIndex, ContextBuilder, IndexProvider, ProviderRegistry};
pub use templates::TemplateRenderer;
