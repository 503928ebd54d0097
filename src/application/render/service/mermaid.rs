//! Mermaid diagram containers.
//!
//! Diagram source is emitted verbatim inside `<div class="mermaid">` so the
//! client-side library sees exactly what the author wrote (`A["<x>"]` keeps
//! its `<x>`). Only markup that could close the container or execute script
//! has its `<` escaped; the browser decodes `&lt;` back into the text node, so
//! the diagram text is unchanged.

/// Elements that must never be created from diagram source.
const DENIED_ELEMENTS: &[&str] = &[
    "a", "audio", "base", "body", "button", "div", "embed", "form", "frame", "frameset", "head",
    "html", "iframe", "img", "input", "link", "math", "meta", "noembed", "noscript", "object",
    "plaintext", "script", "select", "source", "style", "svg", "template", "textarea", "title",
    "video", "xmp",
];

pub(crate) fn mermaid_container(source: &str) -> String {
    format!("<div class=\"mermaid\">{}</div>", guard_literal(source))
}

/// Escape the `<` of any tag-like token that is not a bare, attribute-free
/// element outside the deny-list. `<x>`, `</x>` and `<x/>` pass through.
pub(crate) fn guard_literal(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut output = String::with_capacity(source.len());
    let mut last = 0usize;

    for (idx, byte) in bytes.iter().enumerate() {
        if *byte != b'<' {
            continue;
        }
        if needs_escape(&source[idx + 1..]) {
            output.push_str(&source[last..idx]);
            output.push_str("&lt;");
            last = idx + 1;
        }
    }
    output.push_str(&source[last..]);
    output
}

fn needs_escape(rest: &str) -> bool {
    let mut chars = rest.char_indices().peekable();

    match chars.peek() {
        Some((_, '!')) | Some((_, '?')) => return true,
        Some((_, '/')) => {
            chars.next();
        }
        _ => {}
    }

    let name_start = match chars.peek() {
        Some((idx, ch)) if ch.is_ascii_alphabetic() => *idx,
        // `a < b`, `<1>` and a trailing `<` are plain text to the HTML parser.
        _ => return false,
    };

    let mut name_end = rest.len();
    while let Some((idx, ch)) = chars.peek().copied() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            chars.next();
        } else {
            name_end = idx;
            break;
        }
    }

    let name = rest[name_start..name_end].to_ascii_lowercase();
    if DENIED_ELEMENTS.contains(&name.as_str()) {
        return true;
    }

    // Anything but an immediate close turns into attributes or an unterminated tag.
    let tail = &rest[name_end..];
    !(tail.starts_with('>') || tail.starts_with("/>"))
}
