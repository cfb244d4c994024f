//! Tera template loading and fail-soft rendering.
//!
//! Whole pages resolve through a fixed layout registry; sections and navs
//! resolve by convention to `sections/<kind>.html` and `navs/<name>.html`.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context, Template, Tera};
use walkdir::WalkDir;

/// Layout name to physical template
pub const LAYOUT_TEMPLATES: [(&str, &str); 7] = [
    ("home", "home.html"),
    ("standard", "standard.html"),
    ("blog_index", "blog_index.html"),
    ("blog_post", "blog_post.html"),
    ("people_index", "people_index.html"),
    ("profile_page", "profile_page.html"),
    ("sitemap", "sitemap.html"),
];

pub const FALLBACK_LAYOUT: &str = "standard.html";

/// Template for a layout name; unknown layouts fall back to `standard.html`.
pub fn layout_template(layout: &str) -> &'static str {
    match LAYOUT_TEMPLATES.iter().find(|(name, _)| *name == layout) {
        Some((_, template)) => template,
        None => {
            tracing::warn!("Unknown layout '{}', using {}", layout, FALLBACK_LAYOUT);
            FALLBACK_LAYOUT
        }
    }
}

pub fn section_template(kind: &str) -> String {
    format!("sections/{}.html", kind)
}

pub fn nav_template(name: &str) -> String {
    format!("navs/{}.html", name)
}

/// Every template below one root, compiled once per build
pub struct TemplateRenderer {
    tera: Tera,
    /// Templates that could not be compiled, with the reason
    broken: HashMap<String, String>,
}

impl TemplateRenderer {
    /// Load every file below `root`. Template names are root-relative
    /// paths with `/` separators.
    ///
    /// A template that fails to compile does not abort the build: it and
    /// every template extending it or importing its macros render as the
    /// error marker, the rest render normally.
    pub fn load(root: &Path) -> Self {
        let mut sources = Vec::new();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            match fs::read_to_string(entry.path()) {
                Ok(source) => sources.push((name, source)),
                Err(e) => tracing::warn!("Skipping template {:?}: {}", entry.path(), e),
            }
        }

        tracing::debug!("Loaded {} templates from {:?}", sources.len(), root);
        Self::from_raw(sources)
    }

    /// Compile `(name, source)` pairs
    pub fn from_raw(sources: Vec<(String, String)>) -> Self {
        let mut broken = HashMap::new();
        // Templates each one extends or imports macros from
        let mut deps: HashMap<String, Vec<String>> = HashMap::new();
        let mut good = Vec::new();

        for (name, source) in sources {
            match Template::new(&name, None, &source) {
                Ok(template) => {
                    let uses = template
                        .parent
                        .into_iter()
                        .chain(template.imported_macro_files.into_iter().map(|(file, _)| file))
                        .collect();
                    deps.insert(name.clone(), uses);
                    good.push((name, source));
                }
                Err(e) => {
                    let message = format!("Failed to parse '{}': {}", name, error_chain(&e));
                    tracing::error!("{}", message);
                    broken.insert(name, message);
                }
            }
        }

        // A template is unusable when anything it depends on is
        loop {
            let unusable: Vec<(String, String)> = deps
                .iter()
                .filter_map(|(name, uses)| {
                    uses.iter().find_map(|dep| match broken.get(dep) {
                        Some(reason) => Some((name.clone(), format!("uses '{}': {}", dep, reason))),
                        None if !deps.contains_key(dep) => {
                            Some((name.clone(), format!("uses missing template '{}'", dep)))
                        }
                        None => None,
                    })
                })
                .collect();

            if unusable.is_empty() {
                break;
            }
            for (name, reason) in unusable {
                tracing::error!("Template '{}' {}", name, reason);
                deps.remove(&name);
                broken.insert(name, reason);
            }
        }
        good.retain(|(name, _)| deps.contains_key(name));

        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html", ".htm", ".xml"]);
        tera.set_escape_fn(escape_html);

        let names: Vec<String> = good.iter().map(|(name, _)| name.clone()).collect();
        if let Err(e) = tera.add_raw_templates(good) {
            let message = error_chain(&e);
            tracing::error!("Failed to load templates: {}", message);
            for name in names {
                broken.insert(name, message.clone());
            }
        }

        Self { tera, broken }
    }

    /// Render `name` against a JSON object. Never fails: errors are logged
    /// and returned as a preserved HTML comment naming the template.
    pub fn render(&self, name: &str, context: &JsonValue) -> String {
        match self.try_render(name, context) {
            Ok(html) => html,
            Err(message) => {
                tracing::error!("Failed to render template '{}': {}", name, message);
                error_marker(name, &message)
            }
        }
    }

    pub fn render_layout(&self, layout: &str, context: &JsonValue) -> String {
        self.render(layout_template(layout), context)
    }

    pub fn render_section(&self, kind: &str, context: &JsonValue) -> String {
        self.render(&section_template(kind), context)
    }

    pub fn render_nav(&self, name: &str, context: &JsonValue) -> String {
        self.render(&nav_template(name), context)
    }

    fn try_render(&self, name: &str, context: &JsonValue) -> Result<String, String> {
        if let Some(reason) = self.broken.get(name) {
            return Err(reason.clone());
        }

        let context = Context::from_value(context.clone()).map_err(|e| error_chain(&e))?;
        self.tera.render(name, &context).map_err(|e| error_chain(&e))
    }
}

/// `<!--! sitegen: failed to render template '<name>': <error> -->`
pub fn error_marker(name: &str, message: &str) -> String {
    format!(
        "<!--! sitegen: failed to render template '{}': {} -->",
        defang(name),
        defang(message)
    )
}

/// HTML escaping for autoescaped output; `/` is left alone so URLs stay
/// readable.
fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(c),
        }
    }
    output
}

/// Break up `--` so the text cannot end the comment early
fn defang(text: &str) -> String {
    let mut text = text.replace('\n', " ");
    while text.contains("--") {
        text = text.replace("--", "- -");
    }
    text
}

/// The error and every source below it, joined with `: `
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
