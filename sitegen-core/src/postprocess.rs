//! Output post-processing: image tokens and HTML minification.

use regex::{Captures, Regex};
use std::sync::OnceLock;

static IMAGE_TOKEN: OnceLock<Regex> = OnceLock::new();
static VERBATIM_TAG: OnceLock<Regex> = OnceLock::new();
static COMMENT: OnceLock<Regex> = OnceLock::new();
static BETWEEN_TAGS: OnceLock<Regex> = OnceLock::new();
static SPACE_RUN: OnceLock<Regex> = OnceLock::new();
static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn image_token() -> &'static Regex {
    IMAGE_TOKEN.get_or_init(|| Regex::new(r"\{\{\s*([^\s{}]+)\s*\}\}").unwrap())
}

fn verbatim_tag() -> &'static Regex {
    VERBATIM_TAG.get_or_init(|| Regex::new(r"(?i)<(/?)(pre|code|script|style)(?:[\s/>]|$)").unwrap())
}

fn comment() -> &'static Regex {
    COMMENT.get_or_init(|| Regex::new(r"(?s)<!--(.*?)-->").unwrap())
}

fn between_tags() -> &'static Regex {
    BETWEEN_TAGS.get_or_init(|| Regex::new(r">\s+<").unwrap())
}

fn space_run() -> &'static Regex {
    SPACE_RUN.get_or_init(|| Regex::new(r"\s{2,}").unwrap())
}

fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"<\x{E000}(\d+)\x{E000}>").unwrap())
}

/// Applies image tokens then minification to rendered pages
#[derive(Debug, Clone)]
pub struct PostProcessor {
    image_base_url: String,
}

impl PostProcessor {
    pub fn new(image_base_url: impl Into<String>) -> Self {
        Self {
            image_base_url: image_base_url.into(),
        }
    }

    pub fn process(&self, html: &str) -> String {
        minify_html(&replace_image_tokens(html, &self.image_base_url))
    }
}

/// Rewrite `{{ file.ext }}` to `<base_url>file.ext` anywhere in the text.
///
/// ```
/// use sitegen_core::postprocess::replace_image_tokens;
///
/// let html = replace_image_tokens(r#"<img src="{{logo.svg}}">"#, "/content/_images/");
/// assert_eq!(html, r#"<img src="/content/_images/logo.svg">"#);
/// ```
pub fn replace_image_tokens(html: &str, base_url: &str) -> String {
    image_token()
        .replace_all(html, |caps: &Captures| format!("{}{}", base_url, &caps[1]))
        .into_owned()
}

/// Strip comments and collapse whitespace, leaving `pre`, `code`,
/// `script` and `style` elements byte-identical.
///
/// Conditional comments (`<!--[if ...`) and comments opening with `<!--!`
/// survive.
pub fn minify_html(html: &str) -> String {
    let (protected, blocks) = protect_verbatim(html);

    let stripped = comment().replace_all(&protected, |caps: &Captures| {
        let body = &caps[1];
        if body.starts_with("[if") || body.starts_with('!') {
            caps[0].to_string()
        } else {
            String::new()
        }
    });
    let collapsed = between_tags().replace_all(&stripped, "><");
    let collapsed = space_run().replace_all(&collapsed, " ");

    placeholder()
        .replace_all(&collapsed, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| blocks.get(idx))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

struct TagMark<'a> {
    start: usize,
    end: usize,
    closing: bool,
    name: &'a str,
}

/// Swap verbatim elements for tag-shaped placeholders.
///
/// `pre` and `code` nest; `script` and `style` end at their first closing
/// tag. An opening tag that never closes is left as ordinary markup.
fn protect_verbatim(html: &str) -> (String, Vec<String>) {
    let marks: Vec<TagMark> = verbatim_tag()
        .captures_iter(html)
        .filter_map(|caps| {
            let name = caps.get(2)?;
            Some(TagMark {
                start: caps.get(0)?.start(),
                end: name.end(),
                closing: !caps[1].is_empty(),
                name: name.as_str(),
            })
        })
        .collect();

    let mut out = String::with_capacity(html.len());
    let mut blocks = Vec::new();
    let mut cursor = 0;
    let mut i = 0;

    while i < marks.len() {
        let open = &marks[i];
        if open.closing || open.start < cursor {
            i += 1;
            continue;
        }

        let nests = open.name.eq_ignore_ascii_case("pre") || open.name.eq_ignore_ascii_case("code");
        let mut depth = 0usize;
        let mut end = None;
        let mut j = i;

        while j < marks.len() {
            let mark = &marks[j];
            if mark.name.eq_ignore_ascii_case(open.name) {
                if mark.closing {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end = Some(
                            html[mark.end..]
                                .find('>')
                                .map_or(html.len(), |idx| mark.end + idx + 1),
                        );
                        break;
                    }
                } else if j == i || nests {
                    depth += 1;
                }
            }
            j += 1;
        }

        let Some(end) = end else {
            i += 1;
            continue;
        };

        out.push_str(&html[cursor..open.start]);
        out.push_str(&format!("<\u{E000}{}\u{E000}>", blocks.len()));
        blocks.push(html[open.start..end].to_string());
        cursor = end;
        i = j + 1;
    }

    out.push_str(&html[cursor..]);
    (out, blocks)
}
