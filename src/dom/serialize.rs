//! HTML serialization of arena nodes.

use html5ever::ns;

use super::arena::{ArenaDom, NodeData, NodeId};

/// Elements that never have an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text children are written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Serialize `id` and its subtree.
pub(crate) fn serialize_node(dom: &ArenaDom, id: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, &mut out);
    out
}

/// Serialize the children of `id`, as `innerHTML` does.
pub(crate) fn serialize_children(dom: &ArenaDom, id: NodeId) -> String {
    let mut out = String::new();
    for child in dom.children(id) {
        write_node(dom, child, &mut out);
    }
    out
}

fn write_node(dom: &ArenaDom, id: NodeId, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };
    match &node.data {
        NodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, out);
            }
        }
        NodeData::Element { name, attrs, .. } => {
            out.push('<');
            out.push_str(&name.local);
            for attr in attrs {
                out.push(' ');
                if let Some(prefix) = &attr.name.prefix {
                    out.push_str(prefix);
                    out.push(':');
                }
                out.push_str(&attr.name.local);
                out.push_str("=\"");
                out.push_str(&escape(&attr.value, true));
                out.push('"');
            }
            out.push('>');

            let tag = name.local.as_ref();
            if name.ns == ns!(html) && VOID_ELEMENTS.contains(&tag) {
                return;
            }
            for child in dom.children(id) {
                write_node(dom, child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeData::Text(text) => {
            let raw = dom
                .parent_element(id)
                .and_then(|p| dom.element_name(p))
                .is_some_and(|n| RAW_TEXT_ELEMENTS.contains(&n.as_ref()));
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&escape(text, false));
            }
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Doctype { name, .. } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
    }
}

/// Escape text content, or an attribute value when `attribute` is set.
fn escape(s: &str, attribute: bool) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '\u{a0}' => result.push_str("&nbsp;"),
            '"' if attribute => result.push_str("&quot;"),
            '<' if !attribute => result.push_str("&lt;"),
            '>' if !attribute => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}
