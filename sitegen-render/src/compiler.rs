//! Site compilation - orchestrates loading, rendering, and output.

use crate::context::{ContextBuilder, IndexProvider, ProviderRegistry};
use crate::sitemap::{page_url, render_robots, render_sitemap};
use crate::templates::TemplateRenderer;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use serde_yaml::Mapping;
use sitegen_core::config::{
    is_draft, load_mapping, Config, ConfigError, GLOBAL_DIR, GLOBAL_FILE, IMAGES_DIR, NAV_FILE,
};
use sitegen_core::frontmatter::{infer_date, parse_frontmatter};
use sitegen_core::listing::{ContentLibrary, Discovery, NamingConvention};
use sitegen_core::markdown::{MarkdownEngine, MarkdownRenderer};
use sitegen_core::models::{scalar_string, PageDescriptor, DEFAULT_LAYOUT};
use sitegen_core::postprocess::PostProcessor;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const INDEX_PAGE: &str = "index";
const SITEMAP_FILE: &str = "sitemap.xml";
const ROBOTS_FILE: &str = "robots.txt";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Missing {what} directory: {path:?}")]
    MissingDirectory { what: &'static str, path: PathBuf },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything one build needs, fixed before it starts
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub content_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub output_dir: PathBuf,
    pub pages_dir: String,
    pub image_base_url: String,
    pub markdown: MarkdownEngine,
    /// Source of `now`, `asset_stamp` and `current_date`
    pub build_time: DateTime<Utc>,
}

impl BuildSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            content_dir: config.content_dir(),
            templates_dir: config.templates_dir(),
            output_dir: config.output_dir(),
            pages_dir: config.pages_dir.clone(),
            image_base_url: config.image_base_url.clone(),
            markdown: config.markdown,
            build_time: Utc::now(),
        }
    }

    pub fn with_build_time(mut self, build_time: DateTime<Utc>) -> Self {
        self.build_time = build_time;
        self
    }

    pub fn global_dir(&self) -> PathBuf {
        self.content_dir.join(GLOBAL_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.content_dir.join(IMAGES_DIR)
    }

    pub fn pages_output_dir(&self) -> PathBuf {
        self.output_dir.join(&self.pages_dir)
    }
}

/// What a build wrote
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Every written file, in write order
    pub artifacts: Vec<PathBuf>,
    /// Output-relative paths of the HTML pages, in emission order
    pub pages: Vec<String>,
    /// Top-level pages not emitted: drafts and unreadable files
    pub skipped: usize,
}

/// Compiles a content tree into static HTML
pub struct SiteCompiler {
    settings: BuildSettings,
    markdown: Box<dyn MarkdownRenderer>,
    providers: ProviderRegistry,
}

impl SiteCompiler {
    pub fn new(settings: BuildSettings) -> Self {
        Self {
            markdown: settings.markdown.renderer(),
            providers: ProviderRegistry::with_defaults(),
            settings,
        }
    }

    /// Attach a listing provider to the page with this logical name
    pub fn register_index(&mut self, page_name: &str, provider: impl IndexProvider + 'static) {
        self.providers.register(page_name, provider);
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Remove the generated pages directory and root index
    pub fn clean(&self) -> Result<(), BuildError> {
        let pages = self.settings.pages_output_dir();
        if self.settings.pages_dir.trim_matches(|c| c == '/' || c == '.').is_empty() {
            tracing::warn!("pages_dir {:?} is the output root; not removing it", self.settings.pages_dir);
        } else if pages.is_dir() {
            fs::remove_dir_all(&pages)?;
        }
        remove_file_if_exists(&self.settings.output_dir.join("index.html"))
    }

    /// `clean` plus the sitemap and robots file
    pub fn clean_all(&self) -> Result<(), BuildError> {
        self.clean()?;
        remove_file_if_exists(&self.settings.output_dir.join(SITEMAP_FILE))?;
        remove_file_if_exists(&self.settings.output_dir.join(ROBOTS_FILE))
    }

    /// Build the entire site
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let settings = &self.settings;
        require_dir("content", &settings.content_dir)?;
        require_dir("templates", &settings.templates_dir)?;

        self.clean()?;

        let global_dir = settings.global_dir();
        let globals = load_mapping(&global_dir.join(GLOBAL_FILE))?;
        let nav = load_mapping(&global_dir.join(NAV_FILE))?;

        let library = ContentLibrary::new(
            &settings.content_dir,
            settings.images_dir(),
            settings.image_base_url.clone(),
            settings.pages_dir.clone(),
        );
        let session = Session {
            templates: TemplateRenderer::load(&settings.templates_dir),
            contexts: ContextBuilder::new(
                &globals,
                &nav,
                &library,
                self.markdown.as_ref(),
                &self.providers,
                settings.build_time,
                &settings.image_base_url,
            ),
            post: PostProcessor::new(settings.image_base_url.clone()),
        };

        let mut report = BuildReport::default();
        let mut sources = discover_pages(&settings.content_dir)?;
        tracing::info!("Found {} top-level pages", sources.len());

        if let Some(path) = sources.remove(INDEX_PAGE) {
            match self.load_page(INDEX_PAGE, &path)? {
                Some(page) => {
                    let html = session.render_page(&page);
                    self.emit_page("index.html", &html, &mut report)?;
                }
                None => report.skipped += 1,
            }
        }

        for (name, path) in &sources {
            let Some(page) = self.load_page(name, path)? else {
                report.skipped += 1;
                continue;
            };

            let html = session.render_page(&page);
            let rel = format!("{}/{}.html", settings.pages_dir, name);
            self.emit_page(&rel, &html, &mut report)?;

            if settings.content_dir.join(name).is_dir() {
                self.build_subpages(&page, &library, &session, &mut report)?;
            }
        }

        let base_url = globals
            .get("site")
            .and_then(|site| site.get("base_url"))
            .and_then(scalar_string)
            .unwrap_or_default();

        let urls: Vec<String> = report
            .pages
            .iter()
            .map(|page| page_url(&base_url, page))
            .collect();
        self.write_artifact(ROBOTS_FILE, &render_robots(&base_url), &mut report)?;
        self.write_artifact(SITEMAP_FILE, &render_sitemap(&urls), &mut report)?;

        tracing::info!(
            "Built {} pages ({} skipped)",
            report.pages.len(),
            report.skipped
        );

        Ok(report)
    }

    /// Render every markdown item below `content/<name>/`
    fn build_subpages(
        &self,
        parent: &PageDescriptor,
        library: &ContentLibrary,
        session: &Session<'_>,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let provider = self.providers.get(&parent.name);
        let layout = provider.map_or(DEFAULT_LAYOUT, |p| p.subpage_layout());
        let naming = provider.map_or(NamingConvention::Plain, |p| p.naming());

        let items = library.load_items(&parent.name, Discovery::Recursive, naming);
        tracing::debug!("Rendering {} sub-pages of '{}'", items.len(), parent.name);

        for item in items {
            let mut page =
                PageDescriptor::from_markdown(&item.stem(), item.metadata, &item.body, layout)
                    .with_parent(&parent.name);
            if page.navs.is_empty() {
                page.navs = parent.navs.clone();
            }

            let rel = item
                .rel_path
                .with_extension("html")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let rel = format!("{}/{}/{}", self.settings.pages_dir, parent.name, rel);

            let html = session.render_page(&page);
            self.emit_page(&rel, &html, report)?;
        }

        Ok(())
    }

    /// Parse one top-level page; drafts and unreadable markdown yield `None`.
    fn load_page(&self, name: &str, path: &Path) -> Result<Option<PageDescriptor>, BuildError> {
        let page = if is_markdown(path) {
            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping unreadable page {:?}: {}", path, e);
                    return Ok(None);
                }
            };
            let (mut metadata, body) = parse_frontmatter(&content);
            if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
                infer_date(&mut metadata, file_name);
            }
            PageDescriptor::from_markdown(name, metadata, &body, DEFAULT_LAYOUT)
        } else {
            let data: Mapping = load_mapping(path)?;
            if is_draft(&data) {
                tracing::debug!("Skipping draft page {:?}", path);
                return Ok(None);
            }
            PageDescriptor::from_config(name, &data)
        };

        if page.draft {
            tracing::debug!("Skipping draft page {:?}", path);
            return Ok(None);
        }

        Ok(Some(page))
    }

    fn emit_page(
        &self,
        rel: &str,
        html: &str,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        self.write_artifact(rel, html, report)?;
        report.pages.push(rel.to_string());
        Ok(())
    }

    fn write_artifact(
        &self,
        rel: &str,
        contents: &str,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let path = self.settings.output_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&path, contents).map_err(|source| BuildError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Wrote {:?}", path);
        report.artifacts.push(path);
        Ok(())
    }
}

/// Loaded templates and context builder for one build
struct Session<'a> {
    templates: TemplateRenderer,
    contexts: ContextBuilder<'a>,
    post: PostProcessor,
}

impl Session<'_> {
    /// Navs first, then sections, then the layout around them
    fn render_page(&self, page: &PageDescriptor) -> String {
        let mut context = self.contexts.page_context(page);

        let nav_html: serde_json::Map<String, JsonValue> = page
            .navs
            .iter()
            .map(|nav| {
                let html = self.templates.render_nav(nav, &context);
                (nav.clone(), JsonValue::String(html))
            })
            .collect();

        let sections: Vec<String> = page
            .sections
            .iter()
            .map(|section| {
                let section_context = self.contexts.section_context(&context, section);
                self.templates.render_section(&section.kind, &section_context)
            })
            .collect();

        if let Some(obj) = context.as_object_mut() {
            obj.insert("nav_html".into(), JsonValue::Object(nav_html));
            obj.insert("sections_html".into(), sections.join("\n").into());
        }

        let html = self.templates.render_layout(&page.layout, &context);
        self.post.process(&html)
    }
}

/// Top-level `*.yaml`, `*.yml` and `*.md` files by logical name.
///
/// YAML wins over markdown for the same name. Names starting with `_` or
/// `.`, and README files, are not pages.
fn discover_pages(content_dir: &Path) -> Result<BTreeMap<String, PathBuf>, BuildError> {
    let mut pages: BTreeMap<String, (u8, PathBuf)> = BTreeMap::new();

    for entry in fs::read_dir(content_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        let rank = match ext {
            "yaml" => 0,
            "yml" => 1,
            "md" => 2,
            _ => continue,
        };
        if stem.starts_with('_') || stem.starts_with('.') || stem.eq_ignore_ascii_case("readme") {
            continue;
        }

        match pages.get(stem) {
            Some((existing, _)) if *existing <= rank => {
                tracing::debug!("Ignoring {:?}; {} is already defined", path, stem);
            }
            _ => {
                pages.insert(stem.to_string(), (rank, path.clone()));
            }
        }
    }

    Ok(pages
        .into_iter()
        .map(|(name, (_, path))| (name, path))
        .collect())
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("md")
}

fn require_dir(what: &'static str, path: &Path) -> Result<(), BuildError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(BuildError::MissingDirectory {
            what,
            path: path.to_path_buf(),
        })
    }
}

fn remove_file_if_exists(path: &Path) -> Result<(), BuildError> {
    if path.is_file() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discover_pages_prefers_yaml() {
        let dir = TempDir::new().unwrap();
        for name in ["about.md", "about.yaml", "blogs.yml", "blogs.md", "README.md", "_draft.yaml", "notes.txt"] {
            touch(&dir.path().join(name));
        }
        fs::create_dir_all(dir.path().join("people.yaml")).unwrap();

        let pages = discover_pages(dir.path()).unwrap();
        let names: Vec<&str> = pages.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["about", "blogs"]);
        assert_eq!(pages["about"], dir.path().join("about.yaml"));
        assert_eq!(pages["blogs"], dir.path().join("blogs.yml"));
    }

    #[test]
    fn test_missing_directories_are_fatal() {
        let dir = TempDir::new().unwrap();
        let config = Config::with_root(dir.path());
        let compiler = SiteCompiler::new(BuildSettings::from_config(&config));

        match compiler.build() {
            Err(BuildError::MissingDirectory { what, .. }) => assert_eq!(what, "content"),
            other => panic!("expected a missing directory error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_clean_all_removes_generated_files() {
        let dir = TempDir::new().unwrap();
        let config = Config::with_root(dir.path());
        let compiler = SiteCompiler::new(BuildSettings::from_config(&config));

        for rel in ["index.html", "sitemap.xml", "robots.txt", "pages/a.html"] {
            touch(&dir.path().join(rel));
        }
        touch(&dir.path().join("keep.txt"));

        compiler.clean_all().unwrap();
        assert!(!dir.path().join("index.html").exists());
        assert!(!dir.path().join("pages").exists());
        assert!(!dir.path().join("sitemap.xml").exists());
        assert!(dir.path().join("keep.txt").exists());
    }
}
