//! Input cleaning for page titles and bodies.
//!
//! Both functions parse the input as an HTML fragment and work on the
//! resulting tree, so markup is judged the way a browser would read it.

use scraper::{ElementRef, Html, Node};

/// Elements removed together with everything inside them.
const BLOCKED_ELEMENTS: [&str; 5] = ["script", "style", "iframe", "object", "embed"];

const VOID_ELEMENTS: [&str; 15] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Clean a single-line text field such as a page title or key name.
///
/// Keeps only the text of the fragment. Blocked elements are dropped with
/// their contents, control characters are removed, runs of whitespace
/// collapse into one space and both ends are trimmed.
pub fn sanitize_text(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let mut text = String::with_capacity(input.len());
    collect_text(fragment.root_element(), &mut text);

    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if c.is_control() {
            continue;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }

    out
}

/// Clean page body HTML.
///
/// Ordinary markup is re-serialized from the parsed tree. Blocked elements
/// are removed with their contents, comments are dropped, elements with
/// malformed names are unwrapped to their children, and control characters
/// other than newlines and tabs are removed.
pub fn sanitize_content(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let mut html = String::with_capacity(input.len());
    write_children(fragment.root_element(), &mut html);

    html.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_blocked(name: &str) -> bool {
    BLOCKED_ELEMENTS
        .iter()
        .any(|blocked| blocked.eq_ignore_ascii_case(name))
}

/// `<scr<script>` parses as an element named `scr<script`; never echo such names.
fn is_well_formed_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn collect_text(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) if is_blocked(element.name()) => {}
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    collect_text(element, out);
                }
            }
            _ => {}
        }
    }
}

fn write_children(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => escape_into(text, false, out),
            Node::Element(element) if is_blocked(element.name()) => {}
            Node::Element(element) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = element.name();

                if !is_well_formed_name(name) {
                    write_children(child, out);
                    continue;
                }

                out.push('<');
                out.push_str(name);
                for (attr, value) in element.attrs() {
                    if !is_well_formed_name(attr) {
                        continue;
                    }
                    out.push(' ');
                    out.push_str(attr);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&name) {
                    continue;
                }

                write_children(child, out);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            _ => {}
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}
