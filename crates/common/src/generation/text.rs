//! Post-processing of model output into publishable article fields

use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

const EXCERPT_LIMIT: usize = 160;
const EXCERPT_CUT: usize = 157;
const EXCERPT_FALLBACK_CHARS: usize = 200;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex"))
        }
    };
}

static_regex!(quotes, r#"["“”‘’'`]"#);
static_regex!(title_disallowed, r"[^\w\s\-:.]");
static_regex!(whitespace, r"\s+");
static_regex!(doctype, r"(?i)<!DOCTYPE[^>]*>");
static_regex!(structure_tags, r"(?i)</?(?:html|head|body)[^>]*>");
static_regex!(title_tag, r"(?i)<title[^>]*>.*?</title>");
static_regex!(meta_tag, r"(?i)<meta[^>]*>");
static_regex!(class_attr, r#"(?i)\s*class="[^"]*""#);
static_regex!(markdown_heading, r"#{1,3}\s*");
static_regex!(markdown_bold, r"\*\*([^*]+)\*\*");
static_regex!(markdown_italic, r"\*([^*]+)\*");
static_regex!(leading_h1, r"(?i)^<h1[^>]*>.*?</h1>\s*");
static_regex!(first_paragraph, r"(?is)<p[^>]*>(.*?)</p>");
static_regex!(any_tag, r"<[^>]*>");

/// Clean a model-proposed title, falling back to the keyword when nothing
/// usable is left.
pub fn clean_title(raw: &str, fallback: &str) -> String {
    let title = quotes().replace_all(raw.trim(), "");
    let title = title_disallowed().replace_all(&title, "");
    let title = whitespace().replace_all(&title, " ");
    let title = title.trim();

    if title.is_empty() {
        fallback.trim().to_string()
    } else {
        title.to_string()
    }
}

/// Reduce a model response to content-level HTML.
///
/// Document structure, CSS classes, and markdown markers are removed,
/// markdown emphasis becomes `<strong>`/`<em>`, and a heading that repeats
/// the title is dropped.
pub fn clean_content(raw: &str, title: &str) -> String {
    let content = doctype().replace_all(raw, "");
    let content = structure_tags().replace_all(&content, "");
    let content = title_tag().replace_all(&content, "");
    let content = meta_tag().replace_all(&content, "");
    let content = class_attr().replace_all(&content, "");
    let content = markdown_heading().replace_all(&content, "");
    let content = markdown_bold().replace_all(&content, |caps: &Captures| {
        format!("<strong>{}</strong>", &caps[1])
    });
    let content = markdown_italic().replace_all(&content, |caps: &Captures| {
        format!("<em>{}</em>", &caps[1])
    });
    let content = whitespace().replace_all(&content, " ");
    let content = leading_h1().replace(content.trim(), "");

    strip_repeated_title(&content, title).trim().to_string()
}

fn strip_repeated_title(content: &str, title: &str) -> String {
    let words: Vec<String> = title
        .split_whitespace()
        .take(3)
        .map(|w| regex_lite::escape(&w.to_lowercase()))
        .collect();

    if words.is_empty() {
        return content.to_string();
    }

    let pattern = format!(
        r"(?i)^<h[1-6][^>]*>[^<]*(?:{})[^<]*</h[1-6]>\s*",
        words.join("|")
    );

    match Regex::new(&pattern) {
        Ok(re) => re.replace(content, "").into_owned(),
        Err(_) => content.to_string(),
    }
}

/// Text content with every tag replaced by a space
pub fn strip_tags(html: &str) -> String {
    let text = any_tag().replace_all(html, " ");
    whitespace().replace_all(&text, " ").trim().to_string()
}

pub fn word_count(html: &str) -> usize {
    strip_tags(html).split_whitespace().count()
}

/// Excerpt from the first paragraph, at most 160 characters.
///
/// Inline tags are dropped without leaving a gap.
pub fn excerpt(html: &str) -> String {
    let source = match first_paragraph().captures(html) {
        Some(caps) => caps[1].to_string(),
        None => strip_tags(html).chars().take(EXCERPT_FALLBACK_CHARS).collect(),
    };

    let source = if source.chars().count() > EXCERPT_LIMIT {
        let cut: String = source.chars().take(EXCERPT_CUT).collect();
        format!("{}...", cut)
    } else {
        source
    };

    any_tag().replace_all(&source, "").trim().to_string()
}
