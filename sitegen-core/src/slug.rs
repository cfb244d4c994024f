//! Slug generation and display-name helpers for file stems.

use regex::Regex;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

static HYPHEN_RUN: OnceLock<Regex> = OnceLock::new();

fn hyphen_run() -> &'static Regex {
    HYPHEN_RUN.get_or_init(|| Regex::new(r"-+").unwrap())
}

/// Convert a string to a URL-safe slug, used for heading anchors.
///
/// ```
/// use sitegen_core::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("Rust & Safety"), "rust-safety");
/// ```
pub fn slugify(input: &str) -> String {
    let cleaned: String = input
        .to_lowercase()
        .graphemes(true)
        .filter_map(|g| {
            let c = g.chars().next()?;
            if matches!(c, ' ' | '_' | '\t' | '\n' | '-') {
                Some("-")
            } else if c.is_alphanumeric() {
                Some(g)
            } else {
                None
            }
        })
        .collect();

    hyphen_run()
        .replace_all(&cleaned, "-")
        .trim_matches('-')
        .to_string()
}

/// Title-case every word: the first letter of a word is uppercased and the
/// rest lowercased. Apostrophes do not start a new word.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_word = false;

    for c in input.chars() {
        if c.is_alphanumeric() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            if c != '\'' {
                in_word = false;
            }
        }
    }

    out
}

/// Turn a file stem like `my-first-post` into `My First Post`.
pub fn humanize(stem: &str) -> String {
    title_case(stem.replace('-', " ").trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  C++ -- Tips  "), "c-tips");
        assert_eq!(slugify("snake_case_name"), "snake-case-name");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("my first post"), "My First Post");
        assert_eq!(title_case("HTML tips"), "Html Tips");
        assert_eq!(title_case("jane's notes"), "Jane's Notes");
    }

    #[test]
    fn test_humanize_stem() {
        assert_eq!(humanize("Jane-Doe"), "Jane Doe");
        assert_eq!(humanize("my-first-post"), "My First Post");
        assert_eq!(humanize("-quinn-"), "Quinn");
    }
}
