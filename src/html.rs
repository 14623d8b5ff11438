//! Pattern-based HTML handling for the publish stages. No parsing: the
//! document is whatever the model produced.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>\s*").expect("valid regex"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("valid regex"));
static HTML_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<html[^>]*>").expect("valid regex"));
static HTML_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</html>").expect("valid regex"));

pub fn strip_doctype(html: &str) -> String {
    DOCTYPE.replace_all(html, "").into_owned()
}

/// Text of the first `<title>` element, trimmed. Tag match is case-insensitive.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Removes the title element, the `<html>` wrapper tags, any `<h1>` that
/// repeats the title, and then every literal occurrence of the title text.
///
/// The last step also eats body text that happens to contain the title.
pub fn clean_body(html: &str, title: &str) -> String {
    let cleaned = TITLE.replace_all(html, "");
    let cleaned = HTML_OPEN.replace_all(&cleaned, "");
    let cleaned = HTML_CLOSE.replace_all(&cleaned, "").into_owned();

    let heading = format!(r"(?i)<h1[^>]*>\s*{}\s*</h1>", regex::escape(title));
    let cleaned = match Regex::new(&heading) {
        Ok(re) => re.replace_all(&cleaned, "").into_owned(),
        Err(e) => {
            warn!("Skipping duplicate <h1> removal: {e}");
            cleaned
        }
    };

    if title.is_empty() {
        cleaned.trim().to_string()
    } else {
        cleaned.replace(title, "").trim().to_string()
    }
}

/// Cover image paragraph prepended to the blog post.
pub fn cover_tag(image_url: &str, title: &str) -> String {
    format!(
        "<p><img src=\"{image_url}\" alt=\"Capa: {title}\" style=\"max-width:100%;height:auto;\"></p>\n"
    )
}
