//! Markup normalization for question titles and answer bodies.
//!
//! Code regions are pulled out before anything else touches the text, so they
//! come back byte-for-byte. Everything around them is reduced to plain,
//! single-spaced prose. Both `<code>` elements and fences produced by an
//! earlier run count as code regions, and a `<` that doesn't start a known
//! element stays text, which is what makes normalization idempotent.

use scraper::{ElementRef, Html};

use crate::models::{NormalizedRecord, RawRecord};

/// Brackets an index into the held-aside code list. Private-use code points
/// survive the HTML parser and whitespace collapsing untouched.
const MARK_OPEN: char = '\u{E000}';
const MARK_CLOSE: char = '\u{E001}';

const FENCE_OPEN: &str = "```\n";
const FENCE_CLOSE: &str = "\n```";

/// Elements Stack Overflow's sanitizer lets through (always lowercase).
/// Any other `<` is literal text, e.g. a decoded `std::vector<int>`.
const MARKUP_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "dd", "del", "div", "dl", "dt", "em", "h1", "h2",
    "h3", "h4", "h5", "h6", "hr", "i", "img", "kbd", "li", "ol", "p", "pre", "script", "span",
    "strike", "strong", "style", "sub", "sup", "table", "tbody", "td", "template", "th",
    "thead", "tr", "ul",
];

/// Normalize marked-up text. Returns `None` for empty or whitespace-only
/// input and for input that contains nothing but markup.
pub fn normalize(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let raw = raw.replace([MARK_OPEN, MARK_CLOSE], "");
    let mut code_blocks = Vec::new();

    let prose = extract_fences(&raw, &mut code_blocks);
    let text = strip_markup(&prose, &mut code_blocks);
    let collapsed = collapse_whitespace(&text);
    if collapsed.is_empty() {
        return None;
    }

    Some(reinsert_code(&collapsed, &code_blocks))
}

/// Normalize an optional field; absent stays absent.
pub fn normalize_field(raw: Option<&str>) -> Option<String> {
    raw.and_then(normalize)
}

pub fn normalize_record(record: &RawRecord) -> NormalizedRecord {
    NormalizedRecord {
        id: record.id,
        title: normalize_field(record.title.as_deref()),
        link: record.link.clone(),
        answer_count: record.answer_count,
        accepted_answer_score: record.accepted_answer_score,
        accepted_answer_body: normalize_field(record.accepted_answer_body.as_deref()),
    }
}

fn marker(index: usize) -> String {
    format!("{MARK_OPEN}{index}{MARK_CLOSE}")
}

/// Replace already-fenced code with markers.
fn extract_fences(text: &str, blocks: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(FENCE_OPEN) {
        let body_start = start + FENCE_OPEN.len();
        let Some(close) = rest[body_start..].find(FENCE_CLOSE) else {
            break;
        };
        let body_end = body_start + close;

        out.push_str(&rest[..start]);
        out.push_str(&marker(blocks.len()));
        blocks.push(rest[body_start..body_end].to_string());
        rest = &rest[body_end + FENCE_CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Parse as an HTML fragment and keep only text. `<code>` contents are held
/// aside; the parser decodes character entities on the way.
fn strip_markup(text: &str, blocks: &mut Vec<String>) -> String {
    let fragment = Html::parse_fragment(&escape_stray_brackets(text));
    if !fragment.errors.is_empty() {
        tracing::debug!(
            "Recovered from {} markup errors while normalizing",
            fragment.errors.len()
        );
    }

    let mut out = String::with_capacity(text.len());
    collect_text(fragment.root_element(), &mut out, blocks);
    out
}

/// Escape every `<` that doesn't open or close a known element, so text
/// decoded by an earlier pass reads the same when parsed again.
fn escape_stray_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        if c == '<' && !opens_markup(&text[i + 1..]) {
            out.push_str("&lt;");
        } else {
            out.push(c);
        }
    }
    out
}

fn opens_markup(rest: &str) -> bool {
    if rest.starts_with("!--") {
        return true;
    }
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let name_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let (name, after) = rest.split_at(name_len);

    let name_ends = after.starts_with(|c: char| c == '>' || c == '/' || c.is_whitespace());
    name_ends && MARKUP_TAGS.contains(&name)
}

fn collect_text(element: ElementRef<'_>, out: &mut String, blocks: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };

        let name = child_el.value().name();
        match name {
            "code" => {
                out.push_str(&marker(blocks.len()));
                blocks.push(child_el.text().collect());
            }
            "script" | "style" | "template" => {}
            _ => {
                let block = is_block_element(name);
                if block {
                    out.push(' ');
                }
                collect_text(child_el, out, blocks);
                if block {
                    out.push(' ');
                }
            }
        }
    }
}

/// Elements whose boundaries separate words.
fn is_block_element(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "br"
            | "hr"
            | "pre"
            | "blockquote"
            | "ul"
            | "ol"
            | "li"
            | "table"
            | "tr"
            | "td"
            | "th"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn reinsert_code(text: &str, blocks: &[String]) -> String {
    let extra: usize = blocks.iter().map(|b| b.len() + 10).sum();
    let mut out = String::with_capacity(text.len() + extra);
    let mut rest = text;

    while let Some(open) = rest.find(MARK_OPEN) {
        out.push_str(&rest[..open]);
        let after = &rest[open + MARK_OPEN.len_utf8()..];
        let Some(close) = after.find(MARK_CLOSE) else {
            rest = after;
            continue;
        };

        if let Some(code) = after[..close]
            .parse::<usize>()
            .ok()
            .and_then(|i| blocks.get(i))
        {
            out.push('\n');
            out.push_str(FENCE_OPEN);
            out.push_str(code);
            out.push_str(FENCE_CLOSE);
            out.push('\n');
        }
        rest = &after[close + MARK_CLOSE.len_utf8()..];
    }

    out.push_str(rest);
    out
}
