//! sitemap.xml and robots.txt generation.

/// Absolute URL for a site-relative path.
///
/// Repeated slashes in the path part collapse to one; a scheme's `//`
/// is kept.
pub fn page_url(base_url: &str, path: &str) -> String {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );

    let (scheme, rest) = match joined.find("://") {
        Some(idx) => joined.split_at(idx + 3),
        None => ("", joined.as_str()),
    };

    let mut collapsed = String::with_capacity(joined.len());
    collapsed.push_str(scheme);
    let mut prev_slash = false;
    for c in rest.chars() {
        if c == '/' && prev_slash {
            continue;
        }
        prev_slash = c == '/';
        collapsed.push(c);
    }

    collapsed
}

/// Sitemap protocol document listing `urls` in the given order
pub fn render_sitemap(urls: &[String]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");

    for url in urls {
        xml.push_str(&format!("  <url><loc>{}</loc></url>\n", escape_xml(url)));
    }

    xml.push_str("</urlset>\n");
    xml
}

pub fn render_robots(base_url: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\nSitemap: {}\n",
        page_url(base_url, "sitemap.xml")
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
