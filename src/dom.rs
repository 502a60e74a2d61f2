//! Thin adapter over the HTML parser/serializer
//!
//! Parsing and serialization go through `html5ever` into the
//! `markup5ever_rcdom` reference tree. Everything else in the crate works on
//! [`Handle`]s through the helpers here.
//!
//! `<template>` contents are parsed into a separate document fragment that
//! the rcdom serializer never visits. [`parse_document`] hoists those
//! fragments back into the template's child list so that walking and
//! serializing the tree see the same nodes.
//!
//! Scripting is off on both sides, so `<noscript>` content is a tree of
//! elements like any other markup rather than one raw text node.

use crate::error::{RenderError, Result};
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{ns, Attribute, LocalName, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Elements that never have content or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Parse a complete HTML document.
pub fn parse_document(html: &str) -> Result<RcDom> {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let dom = html5ever::parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(RenderError::Parse)?;
    hoist_template_contents(&dom.document);
    Ok(dom)
}

/// Parse an HTML fragment as the content of a `<body>`, returning that body.
///
/// The body is detached from its document first: dropping an rcdom node
/// empties every node still below it, so it must not outlive the document
/// while attached.
pub fn parse_body_fragment(html: &str) -> Result<Handle> {
    let dom = parse_document(&format!("<!DOCTYPE html><html><head></head><body>{html}</body></html>"))?;
    let body = find_first(&dom.document, |node| is_html_element(node, "body"))
        .unwrap_or_else(|| create_element("body", vec![]));
    detach(&body);
    Ok(body)
}

/// Serialize a whole document, doctype included.
pub fn serialize_document(dom: &RcDom) -> Result<String> {
    serialize_handle(&dom.document, TraversalScope::ChildrenOnly(None))
}

/// Serialize the children of `node`, without the node itself.
pub fn serialize_children(node: &Handle) -> Result<String> {
    serialize_handle(node, TraversalScope::ChildrenOnly(None))
}

fn serialize_handle(node: &Handle, traversal_scope: TraversalScope) -> Result<String> {
    let mut output = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        scripting_enabled: false,
        ..Default::default()
    };
    let serializable = SerializableHandle::from(node.clone());
    serialize(&mut output, &serializable, opts).map_err(RenderError::Serialize)?;
    Ok(String::from_utf8(output)?)
}

fn hoist_template_contents(node: &Handle) {
    if let NodeData::Element {
        template_contents, ..
    } = &node.data
    {
        if let Some(fragment) = template_contents.borrow_mut().take() {
            let hoisted: Vec<Handle> = fragment.children.borrow_mut().drain(..).collect();
            for child in hoisted {
                append(node, child);
            }
        }
    }
    for child in node.children.borrow().iter() {
        hoist_template_contents(child);
    }
}

/// Create an HTML element with attributes
pub fn create_element(tag: &str, attrs: Vec<(&str, &str)>) -> Handle {
    let qual_name = QualName::new(None, ns!(html), LocalName::from(tag));
    let attributes = attrs
        .into_iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.to_string().into(),
        })
        .collect();

    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Element {
            name: qual_name,
            attrs: RefCell::new(attributes),
            template_contents: Default::default(),
            mathml_annotation_xml_integration_point: false,
        },
    })
}

/// Create a text node
pub fn create_text(text: &str) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Text {
            contents: RefCell::new(text.to_string().into()),
        },
    })
}

/// Append `child` as the last child of `parent`.
pub fn append(parent: &Handle, child: Handle) {
    adopt(parent, &child);
    parent.children.borrow_mut().push(child);
}

/// Point `child` at its new parent. The caller places it in the child list.
pub fn adopt(parent: &Handle, child: &Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
}

/// Replace every child of `parent` with `children`.
pub fn set_children(parent: &Handle, children: Vec<Handle>) {
    for child in &children {
        adopt(parent, child);
    }
    *parent.children.borrow_mut() = children;
}

/// Detach and return every child of `parent`.
pub fn take_children(parent: &Handle) -> Vec<Handle> {
    let children: Vec<Handle> = parent.children.borrow_mut().drain(..).collect();
    for child in &children {
        child.parent.set(None);
    }
    children
}

/// Parent of `node`, if it is attached.
pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    node.parent.set(weak);
    parent
}

/// Remove `node` from its parent's child list.
pub fn detach(node: &Handle) {
    if let Some(parent) = parent(node) {
        parent
            .children
            .borrow_mut()
            .retain(|sibling| !Rc::ptr_eq(sibling, node));
    }
    node.parent.set(None);
}

/// Replace `node` with its own children in its parent.
pub fn unwrap(node: &Handle) {
    let Some(parent) = parent(node) else {
        return;
    };
    let children = take_children(node);
    for child in &children {
        adopt(&parent, child);
    }
    let mut siblings = parent.children.borrow_mut();
    if let Some(index) = siblings.iter().position(|sibling| Rc::ptr_eq(sibling, node)) {
        siblings.splice(index..index + 1, children);
    }
    node.parent.set(None);
}

/// Local name of an element, in any namespace.
pub fn tag_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

/// Whether `node` is an element called `tag`, in any namespace.
pub fn is_element(node: &Handle, tag: &str) -> bool {
    tag_name(node) == Some(tag)
}

/// Whether `node` is the HTML element `tag` (excludes SVG/MathML look-alikes).
pub fn is_html_element(node: &Handle, tag: &str) -> bool {
    match &node.data {
        NodeData::Element { name, .. } => name.ns == ns!(html) && &*name.local == tag,
        _ => false,
    }
}

/// Contents of a text node.
pub fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Concatenated text of every descendant text node.
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, out: &mut String) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => collect_text(child, out),
            _ => {}
        }
    }
}

/// Attributes of an element as `(name, value)` pairs in source order.
pub fn attributes(node: &Handle) -> Vec<(String, String)> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|attr| {
                let name = match &attr.name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                    None => attr.name.local.to_string(),
                };
                (name, attr.value.to_string())
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn get_attr(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| attr.name.prefix.is_none() && &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Set an attribute, replacing an existing value. No-op on non-elements.
pub fn set_attr(node: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        match attrs
            .iter_mut()
            .find(|attr| attr.name.prefix.is_none() && &*attr.name.local == name)
        {
            Some(attr) => attr.value = value.to_string().into(),
            None => attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(name)),
                value: value.to_string().into(),
            }),
        }
    }
}

pub fn remove_attr(node: &Handle, name: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        attrs
            .borrow_mut()
            .retain(|attr| attr.name.prefix.is_some() || &*attr.name.local != name);
    }
}

/// Add a class to the element's `class` list unless already present.
pub fn add_class(node: &Handle, class: &str) {
    let existing = get_attr(node, "class").unwrap_or_default();
    if existing.split_ascii_whitespace().any(|c| c == class) {
        return;
    }
    let updated = if existing.trim().is_empty() {
        class.to_string()
    } else {
        format!("{} {}", existing.trim_end(), class)
    };
    set_attr(node, "class", &updated);
}

/// Escape text for use in markup or a quoted attribute value.
pub fn escape_html(text: &str) -> String {
    v_htmlescape::escape(text).to_string()
}

/// First descendant of `root` (document order) matching `predicate`.
pub fn find_first<F>(root: &Handle, predicate: F) -> Option<Handle>
where
    F: Fn(&Handle) -> bool,
{
    fn walk<F: Fn(&Handle) -> bool>(node: &Handle, predicate: &F) -> Option<Handle> {
        for child in node.children.borrow().iter() {
            if predicate(child) {
                return Some(child.clone());
            }
            if let Some(found) = walk(child, predicate) {
                return Some(found);
            }
        }
        None
    }
    walk(root, &predicate)
}

/// Every descendant of `root` matching `predicate`, in document order.
pub fn find_all<F>(root: &Handle, predicate: F) -> Vec<Handle>
where
    F: Fn(&Handle) -> bool,
{
    fn walk<F: Fn(&Handle) -> bool>(node: &Handle, predicate: &F, found: &mut Vec<Handle>) {
        for child in node.children.borrow().iter() {
            if predicate(child) {
                found.push(child.clone());
            }
            walk(child, predicate, found);
        }
    }
    let mut found = Vec::new();
    walk(root, &predicate, &mut found);
    found
}

/// Remove every comment node below `node`.
pub fn strip_comments(node: &Handle) {
    node.children
        .borrow_mut()
        .retain(|child| !matches!(child.data, NodeData::Comment { .. }));
    for child in node.children.borrow().iter() {
        strip_comments(child);
    }
}
