//! Code syntax highlighting using syntect.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use std::sync::OnceLock;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME: OnceLock<Theme> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme() -> &'static Theme {
    THEME.get_or_init(|| {
        let theme_set = ThemeSet::load_defaults();
        theme_set
            .themes
            .get("InspiredGitHub")
            .or_else(|| theme_set.themes.get("base16-ocean.light"))
            .cloned()
            .unwrap_or_default()
    })
}

/// Transformer for syntax highlighting fenced code blocks that name a language
pub struct HighlightTransformer;

impl HighlightTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Replace each highlighted code block with a single HTML event.
    /// Blocks without a language pass through untouched.
    pub fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut result = Vec::with_capacity(events.len());
        let mut code_lang: Option<String> = None;
        let mut code_content = String::new();

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                    if code_lang.is_none() && language(info).is_some() =>
                {
                    code_lang = language(info).map(str::to_string);
                    code_content.clear();
                }
                Event::Text(text) if code_lang.is_some() => {
                    code_content.push_str(text.as_ref());
                }
                Event::End(TagEnd::CodeBlock) if code_lang.is_some() => {
                    if let Some(lang) = code_lang.take() {
                        let highlighted = highlight_code(&code_content, &lang);
                        result.push(Event::Html(CowStr::Boxed(highlighted.into_boxed_str())));
                    }
                }
                other => result.push(other),
            }
        }

        result
    }
}

impl Default for HighlightTransformer {
    fn default() -> Self {
        Self::new()
    }
}

/// First token of a fence info string: "rust ignore" -> "rust"
fn language(info: &str) -> Option<&str> {
    info.split_whitespace().next()
}

fn highlight_code(code: &str, lang: &str) -> String {
    let ss = syntax_set();
    let syntax = ss
        .find_syntax_by_token(lang)
        .or_else(|| ss.find_syntax_by_extension(lang))
        .unwrap_or_else(|| ss.find_syntax_plain_text());

    match highlighted_html_for_string(code, ss, syntax, theme()) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!("Highlighting {} failed: {}", lang, e);
            format!("<pre><code>{}</code></pre>", html_escape(code))
        }
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
