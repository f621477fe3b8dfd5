use crate::traits::ContentRenderer;
use regex::Regex;
use std::sync::OnceLock;

static BOLD_RE: OnceLock<Regex> = OnceLock::new();
static CODE_RE: OnceLock<Regex> = OnceLock::new();
static LINK_RE: OnceLock<Regex> = OnceLock::new();

/// Minimal Markdown to HTML conversion.
///
/// Covers headings, paragraphs, bullet lists, block quotes, fenced code and
/// the common inline spans. Content that already starts with a tag is passed
/// through untouched. Themed rendering is expected to be plugged in through
/// [`ContentRenderer`].
#[derive(Debug, Default, Clone)]
pub struct BasicMarkdownRenderer;

impl BasicMarkdownRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ContentRenderer for BasicMarkdownRenderer {
    fn render(&self, content: &str) -> String {
        if content.trim_start().starts_with('<') {
            return content.to_string();
        }
        markdown_to_html(content)
    }
}

/// Block being accumulated while walking lines.
enum Block {
    None,
    Paragraph(Vec<String>),
    List(Vec<String>),
    Quote(Vec<String>),
    Code(Vec<String>),
}

fn markdown_to_html(markdown: &str) -> String {
    let mut html = String::new();
    let mut block = Block::None;

    for line in markdown.lines() {
        if let Block::Code(lines) = &mut block {
            if line.trim_start().starts_with("```") {
                flush(&mut html, std::mem::replace(&mut block, Block::None));
            } else {
                lines.push(line.to_string());
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            flush(&mut html, std::mem::replace(&mut block, Block::Code(Vec::new())));
            continue;
        }

        if trimmed.is_empty() {
            flush(&mut html, std::mem::replace(&mut block, Block::None));
            continue;
        }

        if let Some((level, text)) = heading(trimmed) {
            flush(&mut html, std::mem::replace(&mut block, Block::None));
            html.push_str(&format!("<h{level}>{}</h{level}>\n", inline(text)));
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            match &mut block {
                Block::List(items) => items.push(item.to_string()),
                _ => flush(&mut html, std::mem::replace(&mut block, Block::List(vec![item.to_string()]))),
            }
            continue;
        }

        if let Some(quoted) = trimmed.strip_prefix('>') {
            let quoted = quoted.trim_start().to_string();
            match &mut block {
                Block::Quote(lines) => lines.push(quoted),
                _ => flush(&mut html, std::mem::replace(&mut block, Block::Quote(vec![quoted]))),
            }
            continue;
        }

        match &mut block {
            Block::Paragraph(lines) => lines.push(trimmed.to_string()),
            _ => flush(
                &mut html,
                std::mem::replace(&mut block, Block::Paragraph(vec![trimmed.to_string()])),
            ),
        }
    }

    flush(&mut html, block);
    html
}

fn flush(html: &mut String, block: Block) {
    match block {
        Block::None => {}
        Block::Paragraph(lines) => {
            let text: Vec<String> = lines.iter().map(|l| inline(l)).collect();
            html.push_str(&format!("<p>{}</p>\n", text.join("<br/>")));
        }
        Block::List(items) => {
            html.push_str("<ul>\n");
            for item in items {
                html.push_str(&format!("<li>{}</li>\n", inline(&item)));
            }
            html.push_str("</ul>\n");
        }
        Block::Quote(lines) => {
            let text: Vec<String> = lines.iter().map(|l| inline(l)).collect();
            html.push_str(&format!("<blockquote><p>{}</p></blockquote>\n", text.join("<br/>")));
        }
        Block::Code(lines) => {
            html.push_str(&format!("<pre><code>{}</code></pre>\n", escape(&lines.join("\n"))));
        }
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..].strip_prefix(' ').map(|text| (level, text.trim()))
}

fn inline(text: &str) -> String {
    let escaped = escape(text);
    let bold = BOLD_RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
    let code = CODE_RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap());
    let link = LINK_RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap());

    let with_code = code.replace_all(&escaped, "<code>$1</code>");
    let with_bold = bold.replace_all(&with_code, "<strong>$1</strong>");
    link.replace_all(&with_bold, r#"<a href="$2">$1</a>"#).into_owned()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
