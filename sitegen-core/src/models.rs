//! Content model: page and section descriptors, listing entries.

use crate::config::{is_draft, is_truthy};
use crate::slug::humanize;
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

/// Layout used when a page names none
pub const DEFAULT_LAYOUT: &str = "standard";

/// One logical page, built from a YAML config file or a markdown file
#[derive(Debug, Clone, PartialEq)]
pub struct PageDescriptor {
    /// Logical name (file stem), e.g. "blogs"
    pub name: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub date: String,
    pub keywords: Vec<String>,
    /// Nav placements to render, e.g. `["top", "footer"]`
    pub navs: Vec<String>,
    pub layout: String,
    pub draft: bool,
    pub sections: Vec<SectionDescriptor>,
    pub hero: Option<Value>,
    /// The raw `meta` (or `page`) block, or the front matter
    pub meta: Mapping,
    /// Logical name of the owning page, for sub-pages
    pub parent: Option<String>,
    /// Page-level adjustments to the derived listing
    pub listing: ListingOverride,
}

/// `listing: { sort: title_asc, limit: 5 }` on an index page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingOverride {
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

impl PageDescriptor {
    /// Build from a page config mapping. Fields are looked up in the
    /// `meta`/`page` block first, then at the top level.
    pub fn from_config(name: &str, data: &Mapping) -> Self {
        let meta = ["meta", "page"]
            .iter()
            .find_map(|key| data.get(*key).and_then(Value::as_mapping))
            .cloned()
            .unwrap_or_default();

        let lookup = |key: &str| meta.get(key).or_else(|| data.get(key));
        let text = |key: &str| lookup(key).and_then(scalar_string).unwrap_or_default();

        let sections = data
            .get("sections")
            .and_then(Value::as_sequence)
            .map(|seq| seq.iter().filter_map(SectionDescriptor::from_value).collect())
            .unwrap_or_default();

        let listing = data
            .get("listing")
            .and_then(Value::as_mapping)
            .map(ListingOverride::from_mapping)
            .unwrap_or_default();

        Self {
            name: name.to_string(),
            title: lookup("title")
                .and_then(scalar_string)
                .unwrap_or_else(|| humanize(name)),
            description: text("description"),
            author: text("author"),
            date: text("date"),
            keywords: lookup("keywords").map(string_list).unwrap_or_default(),
            navs: data
                .get("navs")
                .or_else(|| meta.get("navs"))
                .map(string_list)
                .unwrap_or_default(),
            layout: data
                .get("layout")
                .or_else(|| meta.get("layout"))
                .and_then(scalar_string)
                .unwrap_or_else(|| DEFAULT_LAYOUT.to_string()),
            draft: is_draft(data),
            sections,
            hero: data.get("hero").filter(|v| !v.is_null()).cloned(),
            meta,
            parent: None,
            listing,
        }
    }

    /// Build from markdown front matter and body. The body becomes a single
    /// `markdown` section.
    pub fn from_markdown(name: &str, metadata: Mapping, body: &str, default_layout: &str) -> Self {
        let text = |key: &str| metadata.get(key).and_then(scalar_string);

        Self {
            name: name.to_string(),
            title: text("title").unwrap_or_else(|| humanize(name)),
            description: text("description").unwrap_or_default(),
            author: text("author").unwrap_or_default(),
            date: text("date").unwrap_or_default(),
            keywords: metadata.get("keywords").map(string_list).unwrap_or_default(),
            navs: metadata.get("navs").map(string_list).unwrap_or_default(),
            layout: text("layout").unwrap_or_else(|| default_layout.to_string()),
            draft: metadata.get("draft").is_some_and(is_truthy),
            sections: vec![SectionDescriptor::markdown(body)],
            hero: metadata.get("hero").filter(|v| !v.is_null()).cloned(),
            parent: None,
            listing: ListingOverride::default(),
            meta: metadata,
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }
}

impl ListingOverride {
    fn from_mapping(mapping: &Mapping) -> Self {
        Self {
            sort: mapping.get("sort").and_then(scalar_string),
            limit: mapping.get("limit").and_then(as_limit),
        }
    }
}

/// A typed unit of page content, rendered through `sections/<kind>.html`
#[derive(Debug, Clone, PartialEq)]
pub struct SectionDescriptor {
    pub kind: String,
    /// Every field of the section except `type`
    pub fields: Mapping,
}

impl SectionDescriptor {
    /// Sections without a `type` are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let mapping = value.as_mapping()?;
        let kind = mapping.get("type").and_then(scalar_string)?;
        let kind = kind.trim();
        if kind.is_empty() {
            tracing::warn!("Skipping section without a type");
            return None;
        }

        let fields = mapping
            .iter()
            .filter(|(key, _)| key.as_str() != Some("type"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Some(Self {
            kind: kind.to_string(),
            fields,
        })
    }

    pub fn markdown(body: &str) -> Self {
        let mut fields = Mapping::new();
        fields.insert(Value::String("body_md".into()), Value::String(body.into()));

        Self {
            kind: String::from("markdown"),
            fields,
        }
    }

    /// Markdown source under `body_md` or `content`
    pub fn markdown_body(&self) -> Option<&str> {
        self.fields
            .get("body_md")
            .or_else(|| self.fields.get("content"))
            .and_then(Value::as_str)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(scalar_string)
    }

    /// `pagelist.*` sections with a subfolder pull a listing into their context
    pub fn is_pagelist(&self) -> bool {
        (self.kind == "pagelist" || self.kind.starts_with("pagelist."))
            && self.fields.contains_key("subfolder")
    }
}

/// Summary of one content item for index pages
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub title: String,
    pub author: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    /// Site-absolute link to the rendered item
    pub href: String,
    pub image: Option<String>,
    pub source: PathBuf,
    /// Front matter merged with the derived fields
    pub meta: Mapping,
}

/// Render a scalar as text; sequences, mappings and null yield `None`.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// A sequence of scalars, or a comma separated string
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(seq) => seq.iter().filter_map(scalar_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// A non-negative limit given as a number or numeric string
pub fn as_limit(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_page_from_config_reads_meta_block() {
        let data = mapping(
            r#"
meta:
  title: Hilton Family
  description: Updates and adventures
  date: 2025-08-11
  keywords: family, blog
layout: home
navs: [top, footer]
hero:
  headline: Welcome
sections:
  - type: markdown
    body_md: Hello
  - heading: no type here
  - type: pagelist.cards
    subfolder: blogs
"#,
        );

        let page = PageDescriptor::from_config("index", &data);
        assert_eq!(page.title, "Hilton Family");
        assert_eq!(page.description, "Updates and adventures");
        assert_eq!(page.date, "2025-08-11");
        assert_eq!(page.keywords, vec!["family", "blog"]);
        assert_eq!(page.layout, "home");
        assert_eq!(page.navs, vec!["top", "footer"]);
        assert!(page.hero.is_some());
        assert!(!page.draft);

        assert_eq!(page.sections.len(), 2);
        assert_eq!(page.sections[0].markdown_body(), Some("Hello"));
        assert!(!page.sections[0].fields.contains_key("type"));
        assert!(page.sections[1].is_pagelist());
    }

    #[test]
    fn test_page_from_config_defaults() {
        let page = PageDescriptor::from_config("about-us", &Mapping::new());
        assert_eq!(page.title, "About Us");
        assert_eq!(page.layout, DEFAULT_LAYOUT);
        assert!(page.sections.is_empty());
        assert!(page.hero.is_none());
        assert_eq!(page.listing, ListingOverride::default());
    }

    #[test]
    fn test_page_block_and_listing_override() {
        let data = mapping("page:\n  title: Team\n  draft: true\nlisting:\n  sort: title_asc\n  limit: '3'\n");
        let page = PageDescriptor::from_config("people", &data);
        assert_eq!(page.title, "Team");
        assert!(page.draft);
        assert_eq!(page.listing.sort.as_deref(), Some("title_asc"));
        assert_eq!(page.listing.limit, Some(3));
    }

    #[test]
    fn test_page_from_markdown() {
        let meta = mapping("title: Hello\nauthor: Quinn\nlayout: home\n");
        let page = PageDescriptor::from_markdown("hello", meta, "Body text", DEFAULT_LAYOUT)
            .with_parent("blogs");

        assert_eq!(page.title, "Hello");
        assert_eq!(page.author, "Quinn");
        assert_eq!(page.layout, "home");
        assert_eq!(page.parent.as_deref(), Some("blogs"));
        assert_eq!(page.sections[0].kind, "markdown");
        assert_eq!(page.sections[0].markdown_body(), Some("Body text"));
    }

    #[test]
    fn test_section_content_alias() {
        let section =
            SectionDescriptor::from_value(&Value::Mapping(mapping("type: text\ncontent: Hi\n")))
                .unwrap();
        assert_eq!(section.markdown_body(), Some("Hi"));
        assert!(!section.is_pagelist());
    }

    #[test]
    fn test_scalar_helpers() {
        assert_eq!(scalar_string(&Value::from(42)), Some("42".to_string()));
        assert_eq!(scalar_string(&Value::Null), None);
        assert!(string_list(&Value::Null).is_empty());
        assert_eq!(as_limit(&Value::from(-1)), None);
        assert_eq!(as_limit(&Value::from(5)), Some(5));
    }
}
