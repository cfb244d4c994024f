//! Content discovery and listings for index pages.
//!
//! Markdown items are discovered below a content subfolder, their metadata
//! is completed from the path (dates, author/title file names), and the
//! resulting entries are sorted and truncated on request.

use crate::config::is_truthy;
use crate::frontmatter::{infer_date, parse_frontmatter};
use crate::models::{as_limit, scalar_string, ListingEntry, SectionDescriptor};
use crate::slug::humanize;
use chrono::NaiveDate;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

const AVATAR_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "svg"];

static SPACE_RUN: OnceLock<Regex> = OnceLock::new();

fn space_run() -> &'static Regex {
    SPACE_RUN.get_or_init(|| Regex::new(r"\s{2,}").unwrap())
}

/// How far below the subfolder to look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// Only files directly in the subfolder
    Flat,
    /// Every file below the subfolder
    Recursive,
}

/// How author and title are read from a file stem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingConvention {
    /// `Author-Name--Title-Of-The-Post`
    AuthorTitle,
    /// The whole stem is the title
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A `<field>_<asc|desc>` sort request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    /// Parse `<field>_<direction>`. The direction is split at the last
    /// underscore; a missing direction means `desc`, a missing field `date`.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let (field, direction) = match spec.rsplit_once('_') {
            Some((field, dir)) if dir.eq_ignore_ascii_case("asc") => (field, SortDirection::Asc),
            Some((field, dir)) if dir.eq_ignore_ascii_case("desc") => (field, SortDirection::Desc),
            _ => (spec, SortDirection::Desc),
        };

        let field = if field.is_empty() { "date" } else { field };

        Self {
            field: field.to_string(),
            direction,
        }
    }
}

impl Default for SortKey {
    fn default() -> Self {
        Self {
            field: String::from("date"),
            direction: SortDirection::Desc,
        }
    }
}

/// What to list and how
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRequest {
    pub subfolder: String,
    pub discovery: Discovery,
    pub naming: NamingConvention,
    pub sort: SortKey,
    pub limit: Option<usize>,
    /// Look for `<stem>_avatar.*` images when front matter names none
    pub avatars: bool,
}

impl ListingRequest {
    pub fn new(subfolder: impl Into<String>) -> Self {
        Self {
            subfolder: subfolder.into(),
            discovery: Discovery::Recursive,
            naming: NamingConvention::Plain,
            sort: SortKey::default(),
            limit: None,
            avatars: false,
        }
    }

    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_avatars(mut self, avatars: bool) -> Self {
        self.avatars = avatars;
        self
    }

    /// Request described by a `pagelist.*` section: `subfolder`, `sort`,
    /// `limit`, `recursive`, `avatars` and `naming: author_title`.
    pub fn from_section(section: &SectionDescriptor) -> Option<Self> {
        let subfolder = section.get_str("subfolder")?;
        let field = |key: &str| section.fields.get(key);

        let discovery = if field("recursive").is_some_and(is_truthy) {
            Discovery::Recursive
        } else {
            Discovery::Flat
        };

        let naming = match section.get_str("naming").as_deref() {
            Some("author_title") => NamingConvention::AuthorTitle,
            _ => NamingConvention::Plain,
        };

        Some(
            Self::new(subfolder)
                .with_discovery(discovery)
                .with_naming(naming)
                .with_sort(
                    section
                        .get_str("sort")
                        .map(|s| SortKey::parse(&s))
                        .unwrap_or_default(),
                )
                .with_limit(field("limit").and_then(as_limit))
                .with_avatars(field("avatars").is_some_and(is_truthy)),
        )
    }
}

/// A discovered markdown file with its completed metadata
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub path: PathBuf,
    /// Path relative to the listed subfolder
    pub rel_path: PathBuf,
    pub metadata: Mapping,
    pub body: String,
}

impl ContentItem {
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }
}

/// Reads markdown content below the content root
#[derive(Debug, Clone)]
pub struct ContentLibrary {
    content_dir: PathBuf,
    images_dir: PathBuf,
    image_base_url: String,
    pages_dir: String,
}

impl ContentLibrary {
    pub fn new(
        content_dir: impl Into<PathBuf>,
        images_dir: impl Into<PathBuf>,
        image_base_url: impl Into<String>,
        pages_dir: impl Into<String>,
    ) -> Self {
        Self {
            content_dir: content_dir.into(),
            images_dir: images_dir.into(),
            image_base_url: image_base_url.into(),
            pages_dir: pages_dir.into(),
        }
    }

    /// Markdown files in or below `subfolder`, in sorted path order.
    /// A missing folder yields nothing.
    pub fn discover(&self, subfolder: &str, discovery: Discovery) -> Vec<PathBuf> {
        let root = self.content_dir.join(subfolder);
        if !root.is_dir() {
            return Vec::new();
        }

        let mut walker = WalkDir::new(&root).min_depth(1);
        if discovery == Discovery::Flat {
            walker = walker.max_depth(1);
        }

        let mut paths: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("md"))
            .collect();

        paths.sort();
        paths
    }

    /// Read every non-draft item and complete its metadata from the path.
    /// Unreadable files are logged and skipped.
    pub fn load_items(
        &self,
        subfolder: &str,
        discovery: Discovery,
        naming: NamingConvention,
    ) -> Vec<ContentItem> {
        let root = self.content_dir.join(subfolder);
        let mut items = Vec::new();

        for path in self.discover(subfolder, discovery) {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping unreadable {:?}: {}", path, e);
                    continue;
                }
            };

            let (mut metadata, body) = parse_frontmatter(&content);
            if metadata.get("draft").is_some_and(is_truthy) {
                tracing::debug!("Skipping draft {:?}", path);
                continue;
            }

            derive_metadata(&mut metadata, &path, naming);

            let rel_path = path.strip_prefix(&root).unwrap_or(path.as_path()).to_path_buf();
            items.push(ContentItem {
                path,
                rel_path,
                metadata,
                body,
            });
        }

        items
    }

    /// Sorted, truncated listing for an index page or a pagelist section
    pub fn list(&self, request: &ListingRequest) -> Vec<ListingEntry> {
        let mut entries: Vec<ListingEntry> = self
            .load_items(&request.subfolder, request.discovery, request.naming)
            .into_iter()
            .map(|item| self.entry_for(&request.subfolder, item, request.avatars))
            .collect();

        sort_entries(&mut entries, &request.sort);

        if let Some(limit) = request.limit {
            entries.truncate(limit);
        }

        entries
    }

    /// Published link of an item: `/<pages_dir>/<subfolder>/<rel>.html`
    pub fn href_for(&self, subfolder: &str, rel_path: &Path) -> String {
        let rel = posix_path(&rel_path.with_extension("html"));
        let segments: Vec<&str> = [self.pages_dir.as_str(), subfolder, rel.as_str()]
            .into_iter()
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .collect();

        format!("/{}", segments.join("/"))
    }

    /// First existing `<stem>_avatar.<ext>` in the image directory
    pub fn probe_avatar(&self, stem: &str) -> Option<String> {
        let stem = stem.to_lowercase();
        AVATAR_EXTENSIONS.iter().find_map(|ext| {
            let file = format!("{}_avatar.{}", stem, ext);
            self.images_dir
                .join(&file)
                .is_file()
                .then(|| format!("{}{}", self.image_base_url, file))
        })
    }

    fn entry_for(&self, subfolder: &str, item: ContentItem, avatars: bool) -> ListingEntry {
        let text = |key: &str| item.metadata.get(key).and_then(scalar_string);
        let stem = item.stem();

        let image = text("image")
            .or_else(|| text("avatar"))
            .or_else(|| avatars.then(|| self.probe_avatar(&stem)).flatten());

        ListingEntry {
            title: text("title").unwrap_or_else(|| humanize(&stem)),
            author: text("author"),
            date: text("date"),
            description: text("description"),
            href: self.href_for(subfolder, &item.rel_path),
            image,
            source: item.path,
            meta: item.metadata,
        }
    }
}

/// Fill in date, author and title where the front matter is silent
fn derive_metadata(metadata: &mut Mapping, path: &Path, naming: NamingConvention) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !infer_date(metadata, &file_name) && !metadata.contains_key("date") {
        if let Some(date) = date_from_path(path) {
            insert_text(metadata, "date", date);
        }
    }

    let stem = file_stem(path);
    let (author, title) = match naming {
        NamingConvention::AuthorTitle => split_author_title(&stem),
        NamingConvention::Plain => (None, humanize(&stem)),
    };

    if let Some(author) = author {
        if !metadata.contains_key("author") {
            insert_text(metadata, "author", author);
        }
    }
    if !metadata.contains_key("title") {
        insert_text(metadata, "title", title);
    }
}

fn insert_text(metadata: &mut Mapping, key: &str, value: String) {
    metadata.insert(Value::String(key.to_string()), Value::String(value));
}

/// `YYYY-MM-01` from `<year>/<month>/<file>`, when both directory names
/// look like a year and a month.
pub fn date_from_path(path: &Path) -> Option<String> {
    let month_dir = path.parent()?;
    let month = month_dir.file_name()?.to_str()?;
    let year = month_dir.parent()?.file_name()?.to_str()?;

    let is_year = year.len() == 4 && year.chars().all(|c| c.is_ascii_digit());
    let is_month = month.len() == 2
        && month
            .parse::<u32>()
            .is_ok_and(|m| (1..=12).contains(&m));

    (is_year && is_month).then(|| format!("{}-{}-01", year, month))
}

/// Split `Author-Name--Title` into (author, title).
///
/// Without `--`, runs of two or more spaces separate the author from the
/// title. A stem with a single part is a title with no author.
pub fn split_author_title(stem: &str) -> (Option<String>, String) {
    if let Some((author, title)) = stem.split_once("--") {
        let author = humanize(author);
        let title = humanize(title);
        let title = if title.is_empty() {
            humanize(stem)
        } else {
            title
        };
        return ((!author.is_empty()).then_some(author), title);
    }

    let parts: Vec<&str> = space_run()
        .split(stem.trim())
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [author, rest @ ..] if !rest.is_empty() => (Some(humanize(author)), humanize(&rest.join(" "))),
        _ => (None, humanize(stem)),
    }
}

/// Comparable form of a field value. Variant order is the sort order:
/// missing values are lowest, then dates, then free text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Missing,
    Date(NaiveDate),
    Text(String),
}

impl SortValue {
    fn of(field: &str, raw: Option<String>) -> Self {
        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            return SortValue::Missing;
        };

        match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => SortValue::Date(date),
            Err(_) if field == "date" => SortValue::Missing,
            Err(_) => SortValue::Text(raw),
        }
    }
}

fn field_value(entry: &ListingEntry, field: &str) -> Option<String> {
    match field {
        "title" => Some(entry.title.clone()),
        "href" => Some(entry.href.clone()),
        _ => entry.meta.get(field).and_then(scalar_string),
    }
}

/// Sort by the requested field, then title ascending, then href ascending.
/// The tie-break ignores the sort direction.
pub fn sort_entries(entries: &mut [ListingEntry], key: &SortKey) {
    entries.sort_by_cached_key(|entry| {
        let value = SortValue::of(&key.field, field_value(entry, &key.field));
        (
            Directed(value, key.direction),
            entry.title.clone(),
            entry.href.clone(),
        )
    });
}

/// A sort value compared in the requested direction
#[derive(Debug, PartialEq, Eq)]
struct Directed(SortValue, SortDirection);

impl PartialOrd for Directed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Directed {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.1 {
            SortDirection::Asc => self.0.cmp(&other.0),
            SortDirection::Desc => other.0.cmp(&self.0),
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn posix_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn library(dir: &TempDir) -> ContentLibrary {
        let content = dir.path().join("content");
        ContentLibrary::new(&content, content.join("_images"), "/content/_images/", "pages")
    }

    fn entry(title: &str, date: Option<&str>) -> ListingEntry {
        let mut meta = Mapping::new();
        if let Some(date) = date {
            insert_text(&mut meta, "date", date.to_string());
        }
        ListingEntry {
            title: title.to_string(),
            author: None,
            date: date.map(str::to_string),
            description: None,
            href: format!("/pages/{}.html", title),
            image: None,
            source: PathBuf::from(title),
            meta,
        }
    }

    fn titles(entries: &[ListingEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("date_desc"), SortKey::default());
        assert_eq!(SortKey::parse(""), SortKey::default());

        let key = SortKey::parse("title_asc");
        assert_eq!(key.field, "title");
        assert_eq!(key.direction, SortDirection::Asc);

        let key = SortKey::parse("published_at_asc");
        assert_eq!(key.field, "published_at");
        assert_eq!(key.direction, SortDirection::Asc);

        let key = SortKey::parse("published_at");
        assert_eq!(key.field, "published_at");
        assert_eq!(key.direction, SortDirection::Desc);

        assert_eq!(SortKey::parse("_asc").field, "date");
    }

    #[test]
    fn test_missing_dates_sort_lowest_in_both_directions() {
        let mut entries = vec![
            entry("Undated", None),
            entry("Newer", Some("2025-02-01")),
            entry("Garbled", Some("someday")),
            entry("Older", Some("2024-12-31")),
        ];

        sort_entries(&mut entries, &SortKey::parse("date_desc"));
        assert_eq!(titles(&entries), vec!["Newer", "Older", "Garbled", "Undated"]);

        sort_entries(&mut entries, &SortKey::parse("date_asc"));
        assert_eq!(titles(&entries), vec!["Garbled", "Undated", "Older", "Newer"]);
    }

    #[test]
    fn test_ties_break_on_title_regardless_of_direction() {
        let mut entries = vec![
            entry("B", Some("2025-01-01")),
            entry("A", Some("2025-01-01")),
        ];

        sort_entries(&mut entries, &SortKey::parse("date_desc"));
        assert_eq!(titles(&entries), vec!["A", "B"]);
        sort_entries(&mut entries, &SortKey::parse("date_asc"));
        assert_eq!(titles(&entries), vec!["A", "B"]);
    }

    #[test]
    fn test_text_fields_sort_after_dates() {
        let mut entries = vec![entry("Zed", None), entry("Amy", None)];
        sort_entries(&mut entries, &SortKey::parse("title_asc"));
        assert_eq!(titles(&entries), vec!["Amy", "Zed"]);
    }

    #[test]
    fn test_split_author_title() {
        assert_eq!(
            split_author_title("Jane-Doe--My-First-Post"),
            (Some("Jane Doe".to_string()), "My First Post".to_string())
        );
        assert_eq!(
            split_author_title("jane doe  my  post"),
            (Some("Jane Doe".to_string()), "My Post".to_string())
        );
        assert_eq!(split_author_title("Solo-Title"), (None, "Solo Title".to_string()));
    }

    #[test]
    fn test_date_from_path() {
        assert_eq!(
            date_from_path(Path::new("content/blogs/2025/08/post.md")),
            Some("2025-08-01".to_string())
        );
        assert_eq!(date_from_path(Path::new("content/blogs/2025/13/post.md")), None);
        assert_eq!(date_from_path(Path::new("content/people/quinn.md")), None);
    }

    #[test]
    fn test_list_blog_posts() {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("content");
        write(&content, "blogs/2025/08/Jane-Doe--My-First-Post.md", "# Hello\n");
        write(
            &content,
            "blogs/2025/09/Ann-Lee--Second.md",
            "---\ntitle: Custom Title\n---\nBody\n",
        );
        write(
            &content,
            "blogs/2025/10/Hidden--Draft.md",
            "---\ndraft: true\n---\nSecret\n",
        );

        let request = ListingRequest::new("blogs").with_naming(NamingConvention::AuthorTitle);
        let entries = library(&dir).list(&request);

        assert_eq!(titles(&entries), vec!["Custom Title", "My First Post"]);
        let first_post = &entries[1];
        assert_eq!(first_post.author.as_deref(), Some("Jane Doe"));
        assert_eq!(first_post.date.as_deref(), Some("2025-08-01"));
        assert_eq!(
            first_post.href,
            "/pages/blogs/2025/08/Jane-Doe--My-First-Post.html"
        );
    }

    #[test]
    fn test_list_people_with_avatars_and_limit() {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("content");
        write(&content, "people/Quinn.md", "# Quinn\n");
        write(&content, "people/Ada-Lovelace.md", "# Ada\n");
        write(&content, "people/nested/Ignored.md", "# Nope\n");
        write(&content, "_images/quinn_avatar.svg", "<svg/>");

        let request = ListingRequest::new("people")
            .with_discovery(Discovery::Flat)
            .with_sort(SortKey::parse("title_asc"))
            .with_avatars(true);
        let entries = library(&dir).list(&request);

        assert_eq!(titles(&entries), vec!["Ada Lovelace", "Quinn"]);
        assert_eq!(entries[0].image, None);
        assert_eq!(
            entries[1].image.as_deref(),
            Some("/content/_images/quinn_avatar.svg")
        );

        let limited = library(&dir).list(&request.with_limit(Some(1)));
        assert_eq!(titles(&limited), vec!["Ada Lovelace"]);
    }

    #[test]
    fn test_missing_subfolder_lists_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(library(&dir).list(&ListingRequest::new("nowhere")).is_empty());
    }

    #[test]
    fn test_request_from_section() {
        let value: Value = serde_yaml::from_str(
            "type: pagelist.cards\nsubfolder: blogs\nsort: title_asc\nlimit: 2\nrecursive: true\nnaming: author_title\n",
        )
        .unwrap();
        let section = SectionDescriptor::from_value(&value).unwrap();
        let request = ListingRequest::from_section(&section).unwrap();

        assert_eq!(request.subfolder, "blogs");
        assert_eq!(request.discovery, Discovery::Recursive);
        assert_eq!(request.naming, NamingConvention::AuthorTitle);
        assert_eq!(request.sort, SortKey::parse("title_asc"));
        assert_eq!(request.limit, Some(2));
    }
}
