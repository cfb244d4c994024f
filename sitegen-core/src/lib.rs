//! # sitegen-core
//!
//! Core library for the sitegen static site generator.
//!
//! This crate provides the content side of the pipeline: project and page
//! configuration, front matter, markdown rendering, content discovery and
//! listings, and post-processing of rendered HTML.

pub mod config;
pub mod frontmatter;
pub mod listing;
pub mod markdown;
pub mod models;
pub mod postprocess;
pub mod slug;

pub use config::{is_draft, load_mapping, Config, ConfigError};
pub use frontmatter::{parse_frontmatter, FrontmatterDialect};
pub use listing::{
    ContentItem, ContentLibrary, Discovery, ListingRequest, NamingConvention, SortDirection,
    SortKey,
};
pub use markdown::{CommonMarkRenderer, MarkdownEngine, MarkdownRenderer, PlainRenderer};
pub use models::{ListingEntry, PageDescriptor, SectionDescriptor};
pub use postprocess::PostProcessor;
pub use slug::slugify;
