//! Conversion of text runs (`T` content) to inline Markdown.
//!
//! Text runs carry a small HTML subset: `<span style='...'>` for character
//! formatting and `<a href='...'>` for links. Everything else is stripped.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Matches any start or end tag.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)([^>]*)>").unwrap());

/// Matches a `style` attribute value.
static STYLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bstyle\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Matches an `href` attribute value.
static HREF_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Convert raw text run content to Markdown.
///
/// Line breaks become single spaces, HTML entities are decoded, span
/// formatting and anchors become Markdown, and other tags are removed.
pub fn convert_text(raw: &str) -> String {
    let flattened = flatten_newlines(raw);
    let decoded = decode_entities(&flattened);
    convert_markup(&decoded)
}

/// Text content without any markup, trimmed. Used for page titles.
pub fn plain_text(raw: &str) -> String {
    let flattened = flatten_newlines(raw);
    let decoded = decode_entities(&flattened);
    TAG_RE.replace_all(&decoded, "").trim().to_string()
}

fn flatten_newlines(raw: &str) -> String {
    raw.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Decode HTML5 named and numeric entities.
///
/// Each `&...;` reference is resolved on its own; an ampersand that does not
/// start a known reference stays literal.
fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let resolved = tail
            .find(';')
            .filter(|&end| end > 0 && end <= MAX_ENTITY_LEN)
            .and_then(|end| resolve_entity(&tail[..end]).map(|value| (end, value)));

        match resolved {
            Some((end, value)) => {
                decoded.push_str(&value);
                rest = &tail[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = tail;
            }
        }
    }
    decoded.push_str(rest);

    Cow::Owned(decoded)
}

/// Longest entity name in the HTML5 table is 31 characters.
const MAX_ENTITY_LEN: usize = 32;

fn resolve_entity(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code)
            .filter(|c| *c != '\0')
            .map(String::from);
    }
    quick_xml::escape::resolve_html5_entity(name).map(str::to_string)
}

/// Markup collected for one open `span` or `a` element.
struct Frame {
    wrap: Wrap,
    buffer: String,
}

enum Wrap {
    /// Root of the run
    None,
    /// Character formatting: opening markers, closing markers
    Style(String, String),
    /// Hyperlink target
    Link(String),
}

fn convert_markup(text: &str) -> String {
    let mut stack = vec![Frame {
        wrap: Wrap::None,
        buffer: String::new(),
    }];
    let mut last = 0;

    for caps in TAG_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if let Some(top) = stack.last_mut() {
            top.buffer.push_str(&text[last..whole.start()]);
        }
        last = whole.end();

        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        let attrs = &caps[3];

        match (name.as_str(), closing) {
            ("span", false) => {
                let (open, close) = style_markers(attrs);
                stack.push(Frame {
                    wrap: Wrap::Style(open, close),
                    buffer: String::new(),
                });
            }
            ("a", false) => {
                let href = attr_value(&HREF_ATTR_RE, attrs).unwrap_or_default();
                stack.push(Frame {
                    wrap: Wrap::Link(href),
                    buffer: String::new(),
                });
            }
            ("span", true) => close_frame(&mut stack, |w| matches!(w, Wrap::Style(..))),
            ("a", true) => close_frame(&mut stack, |w| matches!(w, Wrap::Link(_))),
            _ => {}
        }
    }

    if let Some(top) = stack.last_mut() {
        top.buffer.push_str(&text[last..]);
    }

    // Unterminated elements keep their text without markup.
    while stack.len() > 1 {
        if let Some(frame) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.buffer.push_str(&frame.buffer);
            }
        }
    }

    stack.pop().map(|f| f.buffer).unwrap_or_default()
}

fn close_frame(stack: &mut Vec<Frame>, matches: impl Fn(&Wrap) -> bool) {
    let is_match = stack.len() > 1 && stack.last().is_some_and(|f| matches(&f.wrap));
    if !is_match {
        return;
    }
    let Some(frame) = stack.pop() else {
        return;
    };
    let rendered = match frame.wrap {
        Wrap::Style(open, close) => wrap_trimmed(&frame.buffer, &open, &close),
        Wrap::Link(href) => render_link(&frame.buffer, &href),
        Wrap::None => frame.buffer,
    };
    if let Some(parent) = stack.last_mut() {
        parent.buffer.push_str(&rendered);
    }
}

/// Wrap `text` in markers, keeping surrounding whitespace outside them.
fn wrap_trimmed(text: &str, open: &str, close: &str) -> String {
    let core = text.trim();
    if core.is_empty() || (open.is_empty() && close.is_empty()) {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    format!("{}{}{}{}{}", &text[..start], open, core, close, &text[end..])
}

fn render_link(text: &str, href: &str) -> String {
    if href.is_empty() {
        return text.to_string();
    }
    let core = text.trim();
    let label = if core.is_empty() { href } else { core };
    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    format!("{}[{}]({}){}", &text[..start], label, href, &text[end..])
}

fn attr_value(re: &Regex, attrs: &str) -> Option<String> {
    let caps = re.captures(attrs)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
}

/// Opening and closing Markdown for a span's inline CSS.
fn style_markers(attrs: &str) -> (String, String) {
    let Some(style) = attr_value(&STYLE_ATTR_RE, attrs) else {
        return (String::new(), String::new());
    };

    let mut bold = false;
    let mut italic = false;
    let mut strike = false;
    let mut underline = false;
    let mut vertical: Option<&str> = None;

    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let value = value.trim().to_ascii_lowercase();
        match property.trim().to_ascii_lowercase().as_str() {
            "font-weight" => {
                bold = value == "bold"
                    || value == "bolder"
                    || value.parse::<u32>().is_ok_and(|w| w >= 600);
            }
            "font-style" => italic = value == "italic" || value == "oblique",
            "text-decoration" | "text-decoration-line" => {
                underline |= value.contains("underline");
                strike |= value.contains("line-through");
            }
            "vertical-align" => {
                if value == "super" {
                    vertical = Some("sup");
                } else if value == "sub" {
                    vertical = Some("sub");
                }
            }
            _ => {}
        }
    }

    let mut open = String::new();
    let mut close = String::new();
    if bold {
        open.push_str("**");
        close.insert_str(0, "**");
    }
    if italic {
        open.push('*');
        close.insert(0, '*');
    }
    if strike {
        open.push_str("~~");
        close.insert_str(0, "~~");
    }
    if underline {
        open.push_str("<u>");
        close.insert_str(0, "</u>");
    }
    if let Some(tag) = vertical {
        open.push_str(&format!("<{}>", tag));
        close.insert_str(0, &format!("</{}>", tag));
    }
    (open, close)
}
