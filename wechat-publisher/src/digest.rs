use regex::Regex;
use std::sync::OnceLock;

/// Platform limit for the article summary, ellipsis included.
pub const MAX_DIGEST_CHARS: usize = 60;

const ELLIPSIS: &str = "...";

/// Lightweight markup left over after tags are gone.
const MARKUP_PUNCTUATION: [char; 7] = ['#', '*', '_', '`', '~', '>', '|'];

/// Entities the renderer emits. `&amp;` goes last; nested escapes lose one
/// layer per pass.
const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&amp;", "&"),
];

static STYLE_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();

fn style_re() -> &'static Regex {
    STYLE_RE.get_or_init(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap())
}

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

/// Derive a short plain-text summary from rendered article HTML.
///
/// The result is at most [`MAX_DIGEST_CHARS`] characters and feeding it back
/// in returns it unchanged.
pub fn extract_digest(html: &str) -> String {
    let without_styles = style_re().replace_all(html, " ");
    let without_tags = tag_re().replace_all(&without_styles, " ");

    let plain = strip_entities_and_markup(&without_tags);

    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, MAX_DIGEST_CHARS)
}

/// Decode entities and drop markup punctuation until neither changes the
/// text. Both steps only shrink it, so this terminates.
fn strip_entities_and_markup(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let decoded = ENTITIES
            .iter()
            .fold(current.clone(), |acc, (entity, plain)| acc.replace(entity, plain));
        let next: String = decoded
            .chars()
            .filter(|c| !MARKUP_PUNCTUATION.contains(c))
            .collect();

        if next == current {
            return next;
        }
        current = next;
    }
}

/// Cut to `max` characters, ellipsis included.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let keep = max.saturating_sub(ELLIPSIS.len());
    let head: String = text.chars().take(keep).collect();
    format!("{}{}", head.trim_end(), ELLIPSIS)
}
