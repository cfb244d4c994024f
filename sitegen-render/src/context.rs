//! Render context assembly.
//!
//! Every template receives a JSON object built from the site and nav
//! configs, the page descriptor and, for index pages, the listing produced
//! by the index provider registered under the page's logical name.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use serde_yaml::{Mapping, Value};
use sitegen_core::listing::{
    ContentLibrary, Discovery, ListingRequest, NamingConvention, SortKey,
};
use sitegen_core::models::{scalar_string, ListingEntry, PageDescriptor, SectionDescriptor};
use sitegen_core::markdown::MarkdownRenderer;
use std::collections::BTreeMap;

/// Supplies the listing for an index page and the layout of its sub-pages
pub trait IndexProvider: Send + Sync {
    /// Context key the listing is exposed under, e.g. `posts`
    fn context_key(&self) -> &str;

    /// Listing for the page; the page's own `listing` block may adjust it
    fn request(&self, page: &PageDescriptor) -> ListingRequest;

    /// Layout for items below the page's content subfolder
    fn subpage_layout(&self) -> &str;

    /// How sub-page file names are read
    fn naming(&self) -> NamingConvention;
}

/// A listing of the page's own content subfolder
#[derive(Debug, Clone)]
pub struct ContentIndex {
    key: String,
    template: ListingRequest,
    subpage_layout: String,
}

impl ContentIndex {
    /// `template` carries discovery, naming, sort, limit and avatar
    /// settings; its subfolder is replaced by the page name.
    pub fn new(key: &str, template: ListingRequest, subpage_layout: &str) -> Self {
        Self {
            key: key.to_string(),
            template,
            subpage_layout: subpage_layout.to_string(),
        }
    }

    /// Dated posts under `<year>/<month>/`, newest first
    pub fn blog_posts() -> Self {
        Self::new(
            "posts",
            ListingRequest::new("")
                .with_discovery(Discovery::Recursive)
                .with_naming(NamingConvention::AuthorTitle)
                .with_sort(SortKey::parse("date_desc")),
            "blog_post",
        )
    }

    /// One file per person, alphabetical, with avatars
    pub fn people() -> Self {
        Self::new(
            "people",
            ListingRequest::new("")
                .with_discovery(Discovery::Flat)
                .with_naming(NamingConvention::Plain)
                .with_sort(SortKey::parse("title_asc"))
                .with_avatars(true),
            "profile_page",
        )
    }
}

impl IndexProvider for ContentIndex {
    fn context_key(&self) -> &str {
        &self.key
    }

    fn request(&self, page: &PageDescriptor) -> ListingRequest {
        let mut request = self.template.clone();
        request.subfolder = page.name.clone();

        if let Some(sort) = &page.listing.sort {
            request.sort = SortKey::parse(sort);
        }
        if page.listing.limit.is_some() {
            request.limit = page.listing.limit;
        }

        request
    }

    fn subpage_layout(&self) -> &str {
        &self.subpage_layout
    }

    fn naming(&self) -> NamingConvention {
        self.template.naming
    }
}

/// Index providers keyed by logical page name
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn IndexProvider>>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// `blogs` and `people`
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("blogs", ContentIndex::blog_posts());
        registry.register("people", ContentIndex::people());
        registry
    }

    pub fn register(&mut self, page_name: &str, provider: impl IndexProvider + 'static) {
        self.providers
            .insert(page_name.to_string(), Box::new(provider));
    }

    pub fn get(&self, page_name: &str) -> Option<&dyn IndexProvider> {
        self.providers.get(page_name).map(|p| p.as_ref())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Builds page and section contexts for one build
pub struct ContextBuilder<'a> {
    globals: JsonValue,
    nav: JsonValue,
    library: &'a ContentLibrary,
    markdown: &'a dyn MarkdownRenderer,
    providers: &'a ProviderRegistry,
    build_time: DateTime<Utc>,
    image_base_url: String,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        globals: &Mapping,
        nav: &Mapping,
        library: &'a ContentLibrary,
        markdown: &'a dyn MarkdownRenderer,
        providers: &'a ProviderRegistry,
        build_time: DateTime<Utc>,
        image_base_url: &str,
    ) -> Self {
        Self {
            globals: mapping_to_json(globals),
            nav: mapping_to_json(nav),
            library,
            markdown,
            providers,
            build_time,
            image_base_url: image_base_url.to_string(),
        }
    }

    /// Context for a whole page
    pub fn page_context(&self, page: &PageDescriptor) -> JsonValue {
        let mut ctx = Map::new();

        ctx.insert("globals".into(), self.globals.clone());
        ctx.insert("top_nav".into(), self.nav.clone());

        ctx.insert("page_name".into(), page.name.clone().into());
        ctx.insert(
            "parent".into(),
            page.parent.clone().map_or(JsonValue::Null, JsonValue::from),
        );
        ctx.insert("layout".into(), page.layout.clone().into());
        ctx.insert("title".into(), page.title.clone().into());
        ctx.insert("description".into(), page.description.clone().into());
        ctx.insert("author".into(), page.author.clone().into());
        ctx.insert("date".into(), page.date.clone().into());
        ctx.insert("keywords".into(), page.keywords.clone().into());
        ctx.insert("navs".into(), page.navs.clone().into());
        ctx.insert(
            "has_left_nav".into(),
            page.navs.iter().any(|n| n == "left").into(),
        );
        ctx.insert(
            "has_right_nav".into(),
            page.navs.iter().any(|n| n == "right").into(),
        );

        ctx.insert("meta".into(), mapping_to_json(&page.meta));
        ctx.insert("page".into(), page_json(page));
        ctx.insert(
            "hero".into(),
            page.hero.as_ref().map_or(JsonValue::Null, yaml_to_json),
        );
        ctx.insert(
            "sections".into(),
            page.sections.iter().map(section_json).collect::<Vec<_>>().into(),
        );

        ctx.insert("now".into(), self.build_time.to_rfc3339().into());
        ctx.insert(
            "asset_stamp".into(),
            self.build_time.format("%Y%m%d%H%M%S").to_string().into(),
        );
        ctx.insert(
            "current_date".into(),
            self.build_time.format("%Y-%m-%d").to_string().into(),
        );
        ctx.insert("image_base_url".into(), self.image_base_url.clone().into());

        // Filled in by the compiler once navs and sections are rendered
        ctx.insert("nav_html".into(), JsonValue::Object(Map::new()));
        ctx.insert("sections_html".into(), String::new().into());

        if page.parent.is_none() {
            if let Some(provider) = self.providers.get(&page.name) {
                let entries = self.library.list(&provider.request(page));
                tracing::debug!(
                    "Index '{}' lists {} entries as '{}'",
                    page.name,
                    entries.len(),
                    provider.context_key()
                );
                ctx.insert(provider.context_key().into(), entries_json(&entries));
            }
        }

        JsonValue::Object(ctx)
    }

    /// Context for one section: the page context with the section's own
    /// fields layered on top.
    pub fn section_context(&self, page_context: &JsonValue, section: &SectionDescriptor) -> JsonValue {
        let mut ctx = page_context.as_object().cloned().unwrap_or_default();

        let fields = mapping_to_json(&section.fields);
        if let JsonValue::Object(fields) = &fields {
            for (key, value) in fields {
                ctx.insert(key.clone(), value.clone());
            }
        }
        ctx.insert("section".into(), section_json(section));
        ctx.insert("type".into(), section.kind.clone().into());

        if let Some(body) = section.markdown_body() {
            ctx.insert("content_html".into(), self.markdown.to_html(body).into());
        }

        if section.is_pagelist() {
            if let Some(request) = ListingRequest::from_section(section) {
                ctx.insert("pages".into(), entries_json(&self.library.list(&request)));
            }
        }

        JsonValue::Object(ctx)
    }
}

fn page_json(page: &PageDescriptor) -> JsonValue {
    let mut obj = match mapping_to_json(&page.meta) {
        JsonValue::Object(obj) => obj,
        _ => Map::new(),
    };

    obj.insert("name".into(), page.name.clone().into());
    obj.insert("title".into(), page.title.clone().into());
    obj.insert("description".into(), page.description.clone().into());
    obj.insert("author".into(), page.author.clone().into());
    obj.insert("date".into(), page.date.clone().into());
    obj.insert("keywords".into(), page.keywords.clone().into());
    obj.insert("navs".into(), page.navs.clone().into());
    obj.insert("layout".into(), page.layout.clone().into());

    JsonValue::Object(obj)
}

fn section_json(section: &SectionDescriptor) -> JsonValue {
    let mut obj = match mapping_to_json(&section.fields) {
        JsonValue::Object(obj) => obj,
        _ => Map::new(),
    };
    obj.insert("type".into(), section.kind.clone().into());
    JsonValue::Object(obj)
}

#[derive(Serialize)]
struct EntryView<'e> {
    title: &'e str,
    author: Option<&'e str>,
    date: Option<&'e str>,
    description: Option<&'e str>,
    href: &'e str,
    image: Option<&'e str>,
    meta: JsonValue,
}

fn entries_json(entries: &[ListingEntry]) -> JsonValue {
    entries
        .iter()
        .map(|entry| {
            let view = EntryView {
                title: &entry.title,
                author: entry.author.as_deref(),
                date: entry.date.as_deref(),
                description: entry.description.as_deref(),
                href: &entry.href,
                image: entry.image.as_deref(),
                meta: mapping_to_json(&entry.meta),
            };
            serde_json::to_value(view).unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .into()
}

pub fn mapping_to_json(mapping: &Mapping) -> JsonValue {
    let obj = mapping
        .iter()
        .map(|(key, value)| (key_string(key), yaml_to_json(value)))
        .collect();
    JsonValue::Object(obj)
}

/// Convert YAML to JSON; non-string keys are stringified.
pub fn yaml_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(JsonValue::Null, JsonValue::Number)
            }
        }
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Sequence(seq) => JsonValue::Array(seq.iter().map(yaml_to_json).collect()),
        Value::Mapping(mapping) => mapping_to_json(mapping),
        Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn key_string(key: &Value) -> String {
    scalar_string(key).unwrap_or_else(|| {
        serde_yaml::to_string(key)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use sitegen_core::markdown::PlainRenderer;
    use std::fs;
    use tempfile::TempDir;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 11, 9, 30, 0).unwrap()
    }

    fn library(dir: &TempDir) -> ContentLibrary {
        let content = dir.path().join("content");
        ContentLibrary::new(&content, content.join("_images"), "/content/_images/", "pages")
    }

    #[test]
    fn test_page_context_keys() {
        let dir = TempDir::new().unwrap();
        let library = library(&dir);
        let providers = ProviderRegistry::with_defaults();
        let globals = mapping("site:\n  name: Demo\n");
        let nav = mapping("menus:\n  left: []\n");
        let builder = ContextBuilder::new(
            &globals,
            &nav,
            &library,
            &PlainRenderer,
            &providers,
            fixed_time(),
            "/img/",
        );

        let page = PageDescriptor::from_config(
            "about",
            &mapping("meta:\n  title: About\n  extra: 1\nnavs: [top, left]\nhero:\n  headline: Hi\n"),
        );
        let ctx = builder.page_context(&page);

        assert_eq!(ctx["globals"]["site"]["name"], "Demo");
        assert_eq!(ctx["top_nav"]["menus"]["left"], json!([]));
        assert!(ctx.get("site").is_none());
        assert!(ctx.get("nav").is_none());
        assert_eq!(ctx["title"], "About");
        assert_eq!(ctx["page"]["title"], "About");
        assert_eq!(ctx["page"]["extra"], 1);
        assert_eq!(ctx["hero"]["headline"], "Hi");
        assert_eq!(ctx["has_left_nav"], true);
        assert_eq!(ctx["has_right_nav"], false);
        assert_eq!(ctx["current_date"], "2025-08-11");
        assert_eq!(ctx["asset_stamp"], "20250811093000");
        assert_eq!(ctx["image_base_url"], "/img/");
        assert!(ctx.get("posts").is_none());
    }

    #[test]
    fn test_registered_provider_supplies_listing() {
        let dir = TempDir::new().unwrap();
        let post = dir.path().join("content/blogs/2025/08/Jane-Doe--My-First-Post.md");
        fs::create_dir_all(post.parent().unwrap()).unwrap();
        fs::write(&post, "Hello").unwrap();

        let library = library(&dir);
        let providers = ProviderRegistry::with_defaults();
        let builder = ContextBuilder::new(
            &Mapping::new(),
            &Mapping::new(),
            &library,
            &PlainRenderer,
            &providers,
            fixed_time(),
            "/content/_images/",
        );

        let page = PageDescriptor::from_config("blogs", &mapping("layout: blog_index\n"));
        let ctx = builder.page_context(&page);

        let posts = ctx["posts"].as_array().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["title"], "My First Post");
        assert_eq!(posts[0]["author"], "Jane Doe");
        assert_eq!(posts[0]["date"], "2025-08-01");
        assert_eq!(posts[0]["href"], "/pages/blogs/2025/08/Jane-Doe--My-First-Post.html");
        assert!(posts[0].get("name").is_none());
    }

    #[test]
    fn test_custom_provider_registration() {
        let dir = TempDir::new().unwrap();
        let item = dir.path().join("content/recipes/Pancakes.md");
        fs::create_dir_all(item.parent().unwrap()).unwrap();
        fs::write(&item, "Flour").unwrap();

        let library = library(&dir);
        let mut providers = ProviderRegistry::empty();
        providers.register(
            "recipes",
            ContentIndex::new("recipes", ListingRequest::new(""), "standard"),
        );
        assert_eq!(providers.get("recipes").map(|p| p.subpage_layout()), Some("standard"));
        assert!(providers.get("blogs").is_none());

        let builder = ContextBuilder::new(
            &Mapping::new(),
            &Mapping::new(),
            &library,
            &PlainRenderer,
            &providers,
            fixed_time(),
            "/content/_images/",
        );
        let ctx = builder.page_context(&PageDescriptor::from_config("recipes", &Mapping::new()));
        assert_eq!(ctx["recipes"][0]["title"], "Pancakes");
    }

    #[test]
    fn test_section_fields_override_page_keys() {
        let dir = TempDir::new().unwrap();
        let library = library(&dir);
        let providers = ProviderRegistry::empty();
        let builder = ContextBuilder::new(
            &Mapping::new(),
            &Mapping::new(),
            &library,
            &PlainRenderer,
            &providers,
            fixed_time(),
            "/content/_images/",
        );

        let page = PageDescriptor::from_config(
            "index",
            &mapping("meta:\n  title: Home\nsections:\n  - type: markdown\n    title: Section Title\n    body_md: Hello\n"),
        );
        let page_ctx = builder.page_context(&page);
        let ctx = builder.section_context(&page_ctx, &page.sections[0]);

        assert_eq!(ctx["title"], "Section Title");
        assert_eq!(ctx["page"]["title"], "Home");
        assert_eq!(ctx["type"], "markdown");
        assert_eq!(ctx["content_html"], "<p>Hello</p>");
    }

    #[test]
    fn test_yaml_to_json_stringifies_keys() {
        let json = yaml_to_json(&serde_yaml::from_str("1: one\ntrue: yes\nlist: [1, 2.5]\n").unwrap());
        assert_eq!(json["1"], "one");
        assert_eq!(json["true"], "yes");
        assert_eq!(json["list"][1], 2.5);
    }
}
