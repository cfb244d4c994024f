//! Markdown to HTML conversion.
//!
//! Two renderers share the [`MarkdownRenderer`] interface; the engine is
//! chosen once from the project config.

pub mod highlight;

use crate::slug::slugify;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use highlight::HighlightTransformer;

/// Converts a markdown body into an HTML fragment
pub trait MarkdownRenderer: Send + Sync {
    fn to_html(&self, markdown: &str) -> String;
}

/// Which renderer a build uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkdownEngine {
    #[default]
    Full,
    Plain,
}

impl MarkdownEngine {
    pub fn renderer(self) -> Box<dyn MarkdownRenderer> {
        match self {
            MarkdownEngine::Full => Box::new(CommonMarkRenderer::new()),
            MarkdownEngine::Plain => Box::new(PlainRenderer),
        }
    }
}

/// pulldown-cmark with the extended feature set, heading anchors and
/// highlighted code blocks
pub struct CommonMarkRenderer {
    options: Options,
}

impl CommonMarkRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_DEFINITION_LIST);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self { options }
    }
}

impl Default for CommonMarkRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer for CommonMarkRenderer {
    fn to_html(&self, markdown: &str) -> String {
        let events: Vec<Event> = Parser::new_ext(markdown, self.options).collect();

        let heading_ids = collect_heading_ids(&events);
        let events = attach_heading_ids(events, heading_ids);
        let events = HighlightTransformer::new().transform(events);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }
}

/// Fallback that only wraps blank-line separated blocks in paragraphs
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl MarkdownRenderer for PlainRenderer {
    fn to_html(&self, markdown: &str) -> String {
        let normalized = markdown.replace("\r\n", "\n");
        normalized
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(|block| format!("<p>{}</p>", block))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Slug ids for every heading, in document order; repeated slugs get a
/// numeric suffix.
fn collect_heading_ids(events: &[Event]) -> Vec<String> {
    let mut ids = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut current: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = current.as_mut() {
                    title.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(title) = current.take() {
                    let base = match slugify(&title) {
                        slug if slug.is_empty() => String::from("section"),
                        slug => slug,
                    };
                    let count = seen.entry(base.clone()).or_insert(0);
                    let id = if *count == 0 {
                        base
                    } else {
                        format!("{}-{}", base, count)
                    };
                    *count += 1;
                    ids.push(id);
                }
            }
            _ => {}
        }
    }

    ids
}

/// Give headings their slug id unless an explicit `{#id}` was written
fn attach_heading_ids(events: Vec<Event<'_>>, ids: Vec<String>) -> Vec<Event<'_>> {
    let mut ids = ids.into_iter();

    events
        .into_iter()
        .map(|event| match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let generated = ids.next();
                let id = id.or_else(|| generated.map(|s| CowStr::Boxed(s.into_boxed_str())));
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                })
            }
            other => other,
        })
        .collect()
}
