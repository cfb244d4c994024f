//! Frontmatter parsing from markdown files.
//!
//! Two metadata dialects are accepted between the `---` delimiters: a list
//! of `- key: value` lines, and a plain YAML mapping.

use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;
use thiserror::Error;

const DELIMITER: &str = "---";

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Frontmatter must be a mapping")]
    NotAMapping,
}

/// The encoding used by a metadata block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontmatterDialect {
    /// `- key: value` per line
    List,
    /// A YAML mapping
    Mapping,
}

impl FrontmatterDialect {
    /// A block whose first non-blank character is a dash uses the list dialect.
    pub fn sniff(block: &str) -> Self {
        if block.trim_start().starts_with('-') {
            FrontmatterDialect::List
        } else {
            FrontmatterDialect::Mapping
        }
    }
}

static DATE_PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();

fn date_prefix_regex() -> &'static Regex {
    DATE_PREFIX_REGEX.get_or_init(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").unwrap())
}

/// Split content into its raw metadata block and body.
///
/// Returns `None` when the content does not open with `---` or has no
/// closing delimiter.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    if !content.starts_with(DELIMITER) {
        return None;
    }

    let mut parts = content.splitn(3, DELIMITER);
    parts.next()?;
    let metadata = parts.next()?;
    let body = parts.next()?;

    Some((metadata, strip_delimiter_line(body)))
}

/// Drop what is left of the closing delimiter's line.
fn strip_delimiter_line(body: &str) -> &str {
    match body.find('\n') {
        Some(idx) if body[..idx].trim().is_empty() => &body[idx + 1..],
        None if body.trim().is_empty() => "",
        _ => body,
    }
}

/// Parse frontmatter from markdown content
///
/// Returns a tuple of (metadata, markdown_body). Content without
/// frontmatter yields an empty mapping and the full content as body.
/// Malformed YAML is logged and treated the same way.
///
/// # Example
///
/// ```
/// use sitegen_core::frontmatter::parse_frontmatter;
///
/// let content = "---\ntitle: My Post\ndate: 2025-01-01\n---\n# Hello World\n";
///
/// let (meta, body) = parse_frontmatter(content);
/// assert_eq!(meta.get("title").and_then(|v| v.as_str()), Some("My Post"));
/// assert_eq!(body, "# Hello World\n");
/// ```
pub fn parse_frontmatter(content: &str) -> (Mapping, String) {
    let Some((block, body)) = split_frontmatter(content) else {
        return (Mapping::new(), content.to_string());
    };

    match FrontmatterDialect::sniff(block) {
        FrontmatterDialect::List => (parse_list_dialect(block), body.to_string()),
        FrontmatterDialect::Mapping => match parse_mapping_dialect(block) {
            Ok(metadata) => (metadata, body.to_string()),
            Err(e) => {
                tracing::warn!("Error parsing frontmatter: {}", e);
                (Mapping::new(), content.to_string())
            }
        },
    }
}

/// Parse a YAML mapping block. An empty block is an empty mapping.
pub fn parse_mapping_dialect(block: &str) -> Result<Mapping, FrontmatterError> {
    if block.trim().is_empty() {
        return Ok(Mapping::new());
    }

    match serde_yaml::from_str::<Value>(block)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

/// Parse `- key: value` lines.
///
/// Values may be quoted (quotes are stripped) or bracketed lists
/// (`[top, "footer"]`). `#` comments are dropped; lines that are not
/// `- key: value` are ignored.
pub fn parse_list_dialect(block: &str) -> Mapping {
    let mut metadata = Mapping::new();

    for line in block.lines() {
        if let Some((key, value)) = parse_list_line(line) {
            metadata.insert(Value::String(key), value);
        }
    }

    metadata
}

fn parse_list_line(line: &str) -> Option<(String, Value)> {
    let line = strip_comment(line.trim()).trim();
    let entry = line.strip_prefix('-')?.trim_start();
    let (key, raw_value) = entry.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let raw_value = raw_value.trim();
    let value = if let Some(inner) = raw_value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        Value::Sequence(
            inner
                .split(',')
                .map(unquote)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        )
    } else {
        let text = unquote(raw_value);
        // Dates keep only the day: "2025-08-11 10:30" -> "2025-08-11"
        let text = if key == "date" && text.contains('-') {
            text.split_whitespace().next().unwrap_or(text)
        } else {
            text
        };
        Value::String(text.to_string())
    };

    Some((key.to_string(), value))
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim_matches('\'')
}

/// Cut a line at the first `#` that is not inside a quoted value.
/// A quote only opens at the start of a token, so apostrophes in words
/// do not hide comments.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for (idx, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\''
                    if prev.map_or(true, |p| p.is_whitespace() || matches!(p, ':' | '[' | ',')) =>
                {
                    quote = Some(c)
                }
                '#' if prev.map_or(true, char::is_whitespace) => return &line[..idx],
                _ => {}
            },
        }
        prev = Some(c);
    }

    line
}

/// The leading `YYYY-MM-DD` of a file name, if any
pub fn date_prefix(file_name: &str) -> Option<&str> {
    date_prefix_regex()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Adopt the file name's date prefix when the metadata carries no `date`.
/// Returns whether a date was inserted.
pub fn infer_date(metadata: &mut Mapping, file_name: &str) -> bool {
    if metadata.contains_key("date") {
        return false;
    }

    match date_prefix(file_name) {
        Some(date) => {
            metadata.insert(Value::String("date".into()), Value::String(date.into()));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text<'a>(meta: &'a Mapping, key: &str) -> Option<&'a str> {
        meta.get(key).and_then(Value::as_str)
    }

    fn list<'a>(meta: &'a Mapping, key: &str) -> Vec<&'a str> {
        meta.get(key)
            .and_then(Value::as_sequence)
            .map(|seq| seq.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_parse_mapping_dialect() {
        let content = r#"---
title: Test Post
description: A test post
date: 2025-01-01
author: Jane Doe
keywords:
  - rust
  - programming
---

# Hello World

This is the content."#;

        let (meta, body) = parse_frontmatter(content);
        assert_eq!(text(&meta, "title"), Some("Test Post"));
        assert_eq!(text(&meta, "description"), Some("A test post"));
        assert_eq!(text(&meta, "date"), Some("2025-01-01"));
        assert_eq!(text(&meta, "author"), Some("Jane Doe"));
        assert_eq!(list(&meta, "keywords"), vec!["rust", "programming"]);
        assert!(body.starts_with("\n# Hello World"));
        assert!(body.contains("This is the content."));
    }

    #[test]
    fn test_parse_list_dialect() {
        let content = r#"---
  - title: "Why My Toaster Has Opinions"
  - description: 'Some longer description'
  - author: "Stephen Hilton"
  - date: "2025-08-11 09:30"
  - keywords: ["family", 'blog', updates]
  - navs: ["top"]  # where to show it
  - tags: []
---
Body text"#;

        let (meta, body) = parse_frontmatter(content);
        assert_eq!(text(&meta, "title"), Some("Why My Toaster Has Opinions"));
        assert_eq!(text(&meta, "description"), Some("Some longer description"));
        assert_eq!(text(&meta, "author"), Some("Stephen Hilton"));
        assert_eq!(text(&meta, "date"), Some("2025-08-11"));
        assert_eq!(list(&meta, "keywords"), vec!["family", "blog", "updates"]);
        assert_eq!(list(&meta, "navs"), vec!["top"]);
        assert!(list(&meta, "tags").is_empty());
        assert_eq!(body, "Body text");
    }

    #[test]
    fn test_list_dialect_ignores_non_entries() {
        let meta = parse_list_dialect("- title: Kept\nnot an entry\n- : no key\n# - hidden: yes\n");
        assert_eq!(meta.len(), 1);
        assert_eq!(text(&meta, "title"), Some("Kept"));
    }

    #[test]
    fn test_list_dialect_keeps_hash_inside_quotes_and_words() {
        let meta = parse_list_dialect("- color: \"#315BE0\"\n- title: Jane's C# notes # comment\n");
        assert_eq!(text(&meta, "color"), Some("#315BE0"));
        assert_eq!(text(&meta, "title"), Some("Jane's C# notes"));
    }

    #[test]
    fn test_dialect_sniff() {
        assert_eq!(FrontmatterDialect::sniff("\n  - a: b"), FrontmatterDialect::List);
        assert_eq!(FrontmatterDialect::sniff("a: b"), FrontmatterDialect::Mapping);
    }

    #[test]
    fn test_parse_no_frontmatter() {
        let content = "# Just Content\n\nNo frontmatter here.";
        let (meta, body) = parse_frontmatter(content);
        assert!(meta.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_unclosed_frontmatter_is_body() {
        let content = "---\ntitle: Never closed\n";
        let (meta, body) = parse_frontmatter(content);
        assert!(meta.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_invalid_yaml_keeps_raw_body() {
        let content = "---\ntitle: Test\ninvalid yaml: [unclosed\n---\n\nContent.";
        let (meta, body) = parse_frontmatter(content);
        assert!(meta.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_empty_block_is_empty_mapping() {
        let (meta, body) = parse_frontmatter("---\n---\nHello");
        assert!(meta.is_empty());
        assert_eq!(body, "Hello");
    }

    #[test]
    fn test_recognized_fields_round_trip_in_both_dialects() {
        let list_src = "---\n- title: \"Round Trip\"\n- date: 2024-02-29\n- author: Ada\n- keywords: [a, b]\n---\n";
        let mapping_src = "---\ntitle: Round Trip\ndate: 2024-02-29\nauthor: Ada\nkeywords: [a, b]\n---\n";

        for content in [list_src, mapping_src] {
            let (meta, _) = parse_frontmatter(content);
            let rendered = format!(
                "---\ntitle: {}\ndate: {}\nauthor: {}\nkeywords: [{}]\n---\n",
                text(&meta, "title").unwrap(),
                text(&meta, "date").unwrap(),
                text(&meta, "author").unwrap(),
                list(&meta, "keywords").join(", "),
            );
            let (reparsed, _) = parse_frontmatter(&rendered);
            assert_eq!(reparsed, meta);
        }
    }

    #[test]
    fn test_infer_date_from_file_name() {
        let mut meta = Mapping::new();
        assert!(infer_date(&mut meta, "2025-03-04-spring.md"));
        assert_eq!(text(&meta, "date"), Some("2025-03-04"));

        let mut explicit = parse_mapping_dialect("date: 2020-01-01").unwrap();
        assert!(!infer_date(&mut explicit, "2025-03-04-spring.md"));
        assert_eq!(text(&explicit, "date"), Some("2020-01-01"));

        let mut none = Mapping::new();
        assert!(!infer_date(&mut none, "spring.md"));
        assert!(none.is_empty());
    }
}
