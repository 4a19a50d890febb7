//! Serialisation of [`XmlDocument`] trees, following the output conventions
//! of libxml2's `xmlsave` module.

use crate::doc::XmlDocument;
use crate::tree::{NodeId, Standalone, XmlDeclaration, XmlNodeType};
use libc::c_int;

/// Indent element-only content, two spaces per level.
pub const XML_SAVE_FORMAT: c_int = 1 << 0;
/// Do not emit the XML declaration.
pub const XML_SAVE_NO_DECL: c_int = 1 << 1;
/// Write empty elements as `<a></a>` rather than `<a/>`.
pub const XML_SAVE_NO_EMPTY: c_int = 1 << 2;

const INDENT: &str = "  ";

/// Serialise `doc` to a string.
///
/// The declaration, when present and not suppressed, is written first and
/// exactly once. Each top-level child is followed by a newline.
pub fn dump_document(doc: &XmlDocument, options: c_int) -> String {
    let mut out = String::new();

    if options & XML_SAVE_NO_DECL == 0
        && let Some(decl) = doc.declaration()
    {
        dump_declaration(decl, &mut out);
        out.push('\n');
    }

    for child in doc.children() {
        dump_node(doc, *child, options, 0, &mut out);
        out.push('\n');
    }

    out
}

/// Serialise a single subtree without declaration or trailing newline.
#[cfg(test)]
fn dump_node_to_string(doc: &XmlDocument, node: NodeId, options: c_int) -> String {
    let mut out = String::new();
    dump_node(doc, node, options, 0, &mut out);
    out
}

fn dump_declaration(decl: &XmlDeclaration, out: &mut String) {
    out.push_str("<?xml version=\"");
    out.push_str(&decl.version);
    out.push('"');
    if !decl.encoding.is_empty() {
        out.push_str(" encoding=\"");
        out.push_str(&decl.encoding);
        out.push('"');
    }
    if decl.standalone != Standalone::Unspecified {
        out.push_str(" standalone=\"");
        out.push_str(decl.standalone.as_str());
        out.push('"');
    }
    out.push_str("?>");
}

enum Frame {
    /// Write a node, preceded by a newline and indentation when `indent`.
    Enter {
        id: NodeId,
        depth: usize,
        indent: bool,
    },
    /// Close an element whose children were indented when `indent`.
    Leave {
        id: NodeId,
        depth: usize,
        indent: bool,
    },
}

// Walks the subtree with an explicit stack so nesting depth is bounded by
// memory rather than by the thread stack.
fn dump_node(doc: &XmlDocument, root: NodeId, options: c_int, depth: usize, out: &mut String) {
    let mut frames = vec![Frame::Enter {
        id: root,
        depth,
        indent: false,
    }];

    while let Some(frame) = frames.pop() {
        match frame {
            Frame::Enter { id, depth, indent } => {
                let Some(node) = doc.node(id) else {
                    continue;
                };
                if indent {
                    out.push('\n');
                    push_indent(out, depth);
                }

                match node.type_ {
                    XmlNodeType::TextNode => escape_text(&node.content, out),
                    XmlNodeType::CdataSectionNode => dump_cdata(&node.content, out),
                    XmlNodeType::ElementNode => {
                        out.push('<');
                        out.push_str(&node.name);
                        for attr in &node.attributes {
                            out.push(' ');
                            out.push_str(&attr.name);
                            out.push_str("=\"");
                            escape_attr(&attr.value, out);
                            out.push('"');
                        }

                        if node.children.is_empty() {
                            if options & XML_SAVE_NO_EMPTY != 0 {
                                out.push_str("></");
                                out.push_str(&node.name);
                                out.push('>');
                            } else {
                                out.push_str("/>");
                            }
                            continue;
                        }

                        out.push('>');

                        // Mixed content is never reindented; whitespace would change it.
                        let indent_children = options & XML_SAVE_FORMAT != 0
                            && node
                                .children
                                .iter()
                                .all(|child| doc.node(*child).is_some_and(|n| n.is_element()));

                        frames.push(Frame::Leave {
                            id,
                            depth,
                            indent: indent_children,
                        });
                        frames.extend(node.children.iter().rev().map(|child| Frame::Enter {
                            id: *child,
                            depth: depth + 1,
                            indent: indent_children,
                        }));
                    }
                }
            }
            Frame::Leave { id, depth, indent } => {
                let Some(node) = doc.node(id) else {
                    continue;
                };
                if indent {
                    out.push('\n');
                    push_indent(out, depth);
                }
                out.push_str("</");
                out.push_str(&node.name);
                out.push('>');
            }
        }
    }
}

fn dump_cdata(content: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    let mut rest = content;
    while let Some(pos) = rest.find("]]>") {
        // Split the terminator across two sections.
        out.push_str(&rest[..pos + 2]);
        out.push_str("]]><![CDATA[");
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out.push_str("]]>");
}

fn escape_text(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}
