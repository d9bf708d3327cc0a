use crate::node::Node;

/// Void elements that never have closing tags.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
];

/// Escape HTML special characters in text content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(ch),
        }
    }
    result
}

/// Parse a single-rooted fragment like `<ul><li>a</li></ul>` and return its
/// first top-level element.
pub fn parse_html(html: &str) -> Option<Node> {
    parse_fragment(html).into_iter().find(Node::is_element)
}

/// Parse an HTML fragment into its top-level nodes.
///
/// This is a forgiving, minimal parser: whitespace-only text runs are
/// dropped, stray closing tags are skipped, `<!-- comments -->` are kept as
/// comment nodes and doctypes are ignored.
pub fn parse_fragment(html: &str) -> Vec<Node> {
    let (nodes, _) = parse_children_until(html, 0, None);
    nodes
}

/// Parse children from `start` until we encounter `close_tag` (or the end of input).
/// Returns the children and position after the close tag.
fn parse_children_until(html: &str, start: usize, close_tag: Option<&str>) -> (Vec<Node>, usize) {
    let mut nodes = Vec::new();
    let mut pos = start;
    let bytes = html.as_bytes();

    while pos < bytes.len() {
        if let Some(close) = close_tag {
            if html[pos..].starts_with(close) {
                return (nodes, pos + close.len());
            }
        }

        if bytes[pos] == b'<' {
            if html[pos..].starts_with("<!--") {
                let body_start = pos + 4;
                match html[body_start..].find("-->") {
                    Some(end) => {
                        nodes.push(Node::comment(&html[body_start..body_start + end]));
                        pos = body_start + end + 3;
                    }
                    None => pos = bytes.len(),
                }
                continue;
            }

            // Doctype or a closing tag for something else, skip it
            if pos + 1 < bytes.len() && (bytes[pos + 1] == b'!' || bytes[pos + 1] == b'/') {
                pos = html[pos..].find('>').map(|end| pos + end + 1).unwrap_or(bytes.len());
                continue;
            }

            if let Some((elem, end_pos)) = parse_element(html, pos) {
                nodes.push(elem);
                pos = end_pos;
            } else {
                // Can't parse, treat as text
                let text_end = html[pos + 1..].find('<').map(|p| pos + 1 + p).unwrap_or(bytes.len());
                push_text(&mut nodes, &html[pos..text_end]);
                pos = text_end;
            }
        } else {
            let text_end = html[pos..].find('<').map(|p| pos + p).unwrap_or(bytes.len());
            push_text(&mut nodes, &html[pos..text_end]);
            pos = text_end;
        }
    }

    // Ran out of input without finding close tag, return what we have
    (nodes, pos)
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if !text.trim().is_empty() {
        nodes.push(Node::text(&unescape_html(text)));
    }
}

/// Parse a single element starting at `pos` (which points to '<').
/// Returns the element and the position after its closing tag.
fn parse_element(html: &str, pos: usize) -> Option<(Node, usize)> {
    let rest = &html[pos..];
    let gt_pos = find_tag_end(rest)?;
    let tag_content = &rest[1..gt_pos];

    let self_closing = tag_content.ends_with('/');
    let tag_content = if self_closing {
        &tag_content[..tag_content.len() - 1]
    } else {
        tag_content
    };

    let tag_end = tag_content.find(|c: char| c.is_whitespace()).unwrap_or(tag_content.len());
    let tag_name = tag_content[..tag_end].to_lowercase();
    if tag_name.is_empty() || !tag_name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let element = Node::element(&tag_name);
    for (name, value) in parse_attrs(&tag_content[tag_end..]) {
        element.set_attribute(&name, &value);
    }

    let after_open = pos + gt_pos + 1;
    if self_closing || VOID_ELEMENTS.contains(&tag_name.as_str()) {
        return Some((element, after_open));
    }

    let close_tag = format!("</{}>", tag_name);
    let (children, end_pos) = parse_children_until(html, after_open, Some(&close_tag));
    for child in &children {
        element.append_child(child);
    }
    Some((element, end_pos))
}

/// Find the `>` that ends an opening tag, ignoring any inside quoted attribute values.
fn find_tag_end(rest: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in rest.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parse attributes from a tag's attribute string.
/// Handles: `key="value"`, `key='value'`, `key=value` and bare `key`.
fn parse_attrs(attr_str: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let s = attr_str.trim();
    let bytes = s.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        while pos < bytes.len() && (bytes[pos] as char).is_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let name_start = pos;
        while pos < bytes.len() && bytes[pos] != b'=' && !(bytes[pos] as char).is_whitespace() {
            pos += 1;
        }
        let name = s[name_start..pos].to_lowercase();
        if name.is_empty() {
            pos += 1;
            continue;
        }

        if pos < bytes.len() && bytes[pos] == b'=' {
            pos += 1;
            if pos < bytes.len() && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
                let quote = bytes[pos];
                pos += 1;
                let val_start = pos;
                while pos < bytes.len() && bytes[pos] != quote {
                    pos += 1;
                }
                attrs.push((name, unescape_html(&s[val_start..pos])));
                if pos < bytes.len() {
                    pos += 1;
                }
            } else {
                let val_start = pos;
                while pos < bytes.len() && !(bytes[pos] as char).is_whitespace() {
                    pos += 1;
                }
                attrs.push((name, unescape_html(&s[val_start..pos])));
            }
        } else {
            attrs.push((name, String::new()));
        }
    }

    attrs
}

/// Decode the entities produced by [`escape_html`].
fn unescape_html(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
