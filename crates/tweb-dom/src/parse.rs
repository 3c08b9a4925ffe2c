#![forbid(unsafe_code)]

//! Forgiving HTML fragment parser.
//!
//! Server fragments are produced by a trusted template engine, so this is a
//! tolerant tokenizer rather than a conforming HTML5 parser: unmatched end
//! tags are ignored, unclosed elements are closed at the end of input, and a
//! stray `<` that does not start a tag is kept as text. Hard errors are
//! limited to constructs that cannot be recovered without guessing
//! (an unterminated comment, tag, or quoted attribute).

use crate::DomError;
use crate::dom::{Dom, NodeId};

/// Parse `html` into a detached document whose root holds the fragment's
/// top-level nodes.
pub fn parse_fragment(html: &str) -> Result<Dom, DomError> {
    let mut dom = Dom::new();
    let root = dom.root();
    let mut stack: Vec<NodeId> = vec![root];
    let bytes = html.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == b'<' {
            if starts_with_at(bytes, i, b"<!--") {
                let end = find_subslice(bytes, i + 4, b"-->")
                    .ok_or_else(|| DomError::HtmlParse("unclosed comment".into()))?;
                i = end + 3;
                continue;
            }
            if starts_with_at(bytes, i, b"<!") || starts_with_at(bytes, i, b"<?") {
                let end = find_byte(bytes, i, b'>')
                    .ok_or_else(|| DomError::HtmlParse("unclosed declaration".into()))?;
                i = end + 1;
                continue;
            }
            if starts_with_at(bytes, i, b"</") {
                let (tag, next) = parse_end_tag(html, i)?;
                i = next;
                // Close up to the nearest matching open element; ignore strays.
                if let Some(pos) = stack
                    .iter()
                    .rposition(|&node| dom.tag_name(node) == Some(tag.as_str()))
                    && pos > 0
                {
                    stack.truncate(pos);
                }
                continue;
            }
            if bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
                let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
                i = next;
                let parent = stack.last().copied().unwrap_or(root);
                let node = dom.create_element(parent, &tag, attrs);

                if is_raw_text_tag(&tag) {
                    let close = find_end_tag_ci(bytes, i, tag.as_bytes())
                        .ok_or_else(|| DomError::HtmlParse(format!("unclosed <{tag}>")))?;
                    if let Some(body) = html.get(i..close)
                        && !body.is_empty()
                    {
                        let text = if tag == "textarea" {
                            decode_entities(body)
                        } else {
                            body.to_string()
                        };
                        dom.create_text(node, text);
                    }
                    let (_, after) = parse_end_tag(html, close)?;
                    i = after;
                    dom.sync_initial_value(node);
                    continue;
                }

                dom.sync_initial_value(node);
                if !self_closing && !is_void_tag(&tag) {
                    stack.push(node);
                }
                continue;
            }
        }

        let start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }
        if let Some(text) = html.get(start..i) {
            let parent = stack.last().copied().unwrap_or(root);
            dom.create_text(parent, decode_entities(text));
        }
    }

    // Options are only known once the whole select has been read.
    let selects: Vec<NodeId> = dom
        .descendants(root)
        .into_iter()
        .filter(|&n| dom.tag_name(n) == Some("select"))
        .collect();
    for select in selects {
        dom.sync_initial_value(select);
    }

    Ok(dom)
}

fn parse_start_tag(
    html: &str,
    at: usize,
) -> Result<(String, Vec<(String, String)>, bool, usize), DomError> {
    let bytes = html.as_bytes();
    let mut i = at + 1;
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| DomError::HtmlParse("invalid tag name".into()))?
        .to_ascii_lowercase();

    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(DomError::HtmlParse(format!("unclosed start tag <{tag}")));
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }
        if bytes[i] == b'/' {
            i += 1;
            if bytes.get(i) == Some(&b'>') {
                self_closing = true;
                i += 1;
                break;
            }
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            // Unexpected byte (e.g. a stray quote); skip it.
            i += 1;
            continue;
        }
        let name = html
            .get(name_start..i)
            .ok_or_else(|| DomError::HtmlParse("invalid attribute name".into()))?
            .to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, &mut i)?
        } else {
            String::new()
        };

        if !attrs.iter().any(|(existing, _)| *existing == name) {
            attrs.push((name, value));
        }
    }

    Ok((tag, attrs, self_closing, i))
}

fn parse_attr_value(html: &str, i: &mut usize) -> Result<String, DomError> {
    let bytes = html.as_bytes();
    let Some(&first) = bytes.get(*i) else {
        return Err(DomError::HtmlParse("missing attribute value".into()));
    };

    if first == b'"' || first == b'\'' {
        *i += 1;
        let start = *i;
        let end = find_byte(bytes, start, first)
            .ok_or_else(|| DomError::HtmlParse("unclosed quoted attribute value".into()))?;
        *i = end + 1;
        let raw = html
            .get(start..end)
            .ok_or_else(|| DomError::HtmlParse("invalid attribute value".into()))?;
        return Ok(decode_entities(raw));
    }

    let start = *i;
    while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
        *i += 1;
    }
    let raw = html
        .get(start..*i)
        .ok_or_else(|| DomError::HtmlParse("invalid attribute value".into()))?;
    Ok(decode_entities(raw))
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize), DomError> {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    skip_ws(bytes, &mut i);
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| DomError::HtmlParse("invalid end tag".into()))?
        .to_ascii_lowercase();
    let close = find_byte(bytes, i, b'>')
        .ok_or_else(|| DomError::HtmlParse("unclosed end tag".into()))?;
    Ok((tag, close + 1))
}

/// Decode the character references a template engine emits.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_reference(&tail[1..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Escape text content for serialization.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Escape an attribute value for serialization inside double quotes.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            other => out.push(other),
        }
    }
    out
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea")
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'=' | b'"' | b'\'' | b'<')
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes.get(at..at + needle.len()) == Some(needle)
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|pos| from + pos)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

fn find_end_tag_ci(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut i = from;
    while let Some(pos) = find_subslice(bytes, i, b"</") {
        let name = bytes.get(pos + 2..pos + 2 + tag.len())?;
        if name.eq_ignore_ascii_case(tag) {
            return Some(pos);
        }
        i = pos + 2;
    }
    None
}
