//! Protecting embedded code from the text diff
//!
//! The body diff works on words. Run over the raw text of a `<script>` or
//! `<style>`, it happily splices markers into code, or lets the start tag of
//! one script land inside another so that old code leaks out as page text.
//!
//! Before diffing, each protected element is detached into a
//! [`PlaceholderTable`] and replaced by an empty element of the same tag
//! whose only content is a single word, `$[<id>]$`, which the tokenizer can
//! never split. After the diff is rendered and reparsed, every placeholder
//! is swapped back for the element it stands for:
//!
//! - `new-N` elements are restored in place, live, with the
//!   `wm-diff-inserted-active` class;
//! - `old-N` elements get the `wm-diff-deleted-active` class and are wrapped
//!   in `<template class="wm-diff-deleted-inert">` so they neither run nor
//!   apply styles, but stay in the markup.

use crate::dom;
use crate::options::{
    RenderOptions, DELETED_ACTIVE_CLASS, DELETED_INERT_CLASS, INSERTED_ACTIVE_CLASS,
    REPLACEMENT_ATTR,
};
use markup5ever_rcdom::Handle;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Which side of the diff a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Old,
    New,
}

impl Version {
    pub fn prefix(self) -> &'static str {
        match self {
            Version::Old => "old",
            Version::New => "new",
        }
    }

    /// Version encoded in a placeholder id, if any.
    pub fn of_placeholder(id: &str) -> Option<Version> {
        let (prefix, index) = id.split_once('-')?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match prefix {
            "old" => Some(Version::Old),
            "new" => Some(Version::New),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Text content of the placeholder standing in for `id`.
pub fn placeholder_text(id: &str) -> String {
    format!("$[{id}]$")
}

/// Extracted elements keyed by placeholder id. Owns each element until it is
/// taken back during reinsertion.
#[derive(Debug, Default)]
pub struct PlaceholderTable {
    entries: HashMap<String, Handle>,
}

impl PlaceholderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Original element for `id`, without removing it.
    pub fn get(&self, id: &str) -> Option<&Handle> {
        self.entries.get(id)
    }

    /// Remove and return the original element for `id`.
    pub fn take(&mut self, id: &str) -> Option<Handle> {
        self.entries.remove(id)
    }

    /// Move every entry of `other` into this table.
    pub fn merge(&mut self, other: PlaceholderTable) {
        self.entries.extend(other.entries);
    }

    fn insert(&mut self, id: String, element: Handle) {
        self.entries.insert(id, element);
    }
}

/// Replace every protected element below `root` with a placeholder.
///
/// Ids are `<version>-<n>`, numbered in document order from zero. Any
/// replacement attribute already present in the input is dropped first, so
/// only placeholders made here carry one.
pub fn extract_undiffable(
    root: &Handle,
    version: Version,
    options: &RenderOptions,
) -> PlaceholderTable {
    for marked in dom::find_all(root, |n| dom::get_attr(n, REPLACEMENT_ATTR).is_some()) {
        dom::remove_attr(&marked, REPLACEMENT_ATTR);
    }

    let mut table = PlaceholderTable::new();
    let mut counter = 0;
    extract_from(root, version, options, &mut table, &mut counter);
    debug!(%version, extracted = table.len(), "replaced undiffable content with placeholders");
    table
}

fn extract_from(
    node: &Handle,
    version: Version,
    options: &RenderOptions,
    table: &mut PlaceholderTable,
    counter: &mut usize,
) {
    let mut children = node.children.borrow_mut();
    for slot in children.iter_mut() {
        let protected_tag = dom::tag_name(slot)
            .filter(|tag| options.is_undiffable(tag))
            .map(str::to_string);

        match protected_tag {
            Some(tag) => {
                let id = format!("{}-{}", version.prefix(), counter);
                *counter += 1;

                let placeholder = dom::create_element(&tag, vec![(REPLACEMENT_ATTR, &id)]);
                dom::append(&placeholder, dom::create_text(&placeholder_text(&id)));
                dom::adopt(node, &placeholder);

                let original = std::mem::replace(slot, placeholder);
                original.parent.set(None);
                table.insert(id, original);
            }
            None => extract_from(slot, version, options, table, counter),
        }
    }
}

/// Swap every placeholder below `root` back for its original element,
/// returning how many were restored.
///
/// Placeholders whose id is not in `table` keep their text but lose the
/// replacement attribute.
pub fn reinsert_undiffable(root: &Handle, table: &mut PlaceholderTable) -> usize {
    let mut restored = 0;
    reinsert_into(root, table, &mut restored);
    debug!(restored, unclaimed = table.len(), "reinserted undiffable content");
    restored
}

fn reinsert_into(node: &Handle, table: &mut PlaceholderTable, restored: &mut usize) {
    let mut children = node.children.borrow_mut();
    for slot in children.iter_mut() {
        let Some(id) = dom::get_attr(slot, REPLACEMENT_ATTR) else {
            reinsert_into(slot, table, restored);
            continue;
        };

        match table.take(&id) {
            Some(original) => {
                let replacement = restore(&id, original);
                dom::adopt(node, &replacement);
                *slot = replacement;
                *restored += 1;
            }
            None => {
                warn!(%id, "placeholder has no extracted element; dropping its marker");
                dom::remove_attr(slot, REPLACEMENT_ATTR);
            }
        }
    }
}

fn restore(id: &str, original: Handle) -> Handle {
    match Version::of_placeholder(id) {
        Some(Version::Old) => {
            dom::add_class(&original, DELETED_ACTIVE_CLASS);
            let wrapper = dom::create_element("template", vec![("class", DELETED_INERT_CLASS)]);
            dom::append(&wrapper, original);
            wrapper
        }
        _ => {
            dom::add_class(&original, INSERTED_ACTIVE_CLASS);
            original
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{find_all, parse_document, serialize_document};

    #[test]
    fn test_extract_numbers_in_document_order() {
        let dom = parse_document(
            "<head><style>p {}</style></head><body><script>a()</script><p><script>b()</script></p></body>",
        )
        .unwrap();
        let table = extract_undiffable(&dom.document, Version::New, &RenderOptions::default());

        assert_eq!(table.len(), 3);
        assert!(dom::is_element(table.get("new-0").unwrap(), "style"));
        assert_eq!(dom::text_content(table.get("new-1").unwrap()), "a()");
        assert_eq!(dom::text_content(table.get("new-2").unwrap()), "b()");

        let html = serialize_document(&dom).unwrap();
        assert!(html.contains(r#"<script wm-diff-replacement="new-1">$[new-1]$</script>"#));
        assert!(!html.contains("a()"));
    }

    #[test]
    fn test_reinsert_marks_versions() {
        let dom = parse_document(
            r#"<body><script wm-diff-replacement="old-0">$[old-0]$</script><script wm-diff-replacement="new-0">$[new-0]$</script></body>"#,
        )
        .unwrap();

        let mut table = PlaceholderTable::new();
        table.insert("old-0".into(), dom::create_element("script", vec![("src", "old.js")]));
        table.insert("new-0".into(), dom::create_element("script", vec![("src", "new.js")]));

        let restored = reinsert_undiffable(&dom.document, &mut table);
        assert_eq!(restored, 2);
        assert!(table.is_empty());

        let html = serialize_document(&dom).unwrap();
        assert!(html.contains(
            r#"<template class="wm-diff-deleted-inert"><script src="old.js" class="wm-diff-deleted-active"></script></template>"#
        ));
        assert!(html.contains(r#"<script src="new.js" class="wm-diff-inserted-active"></script>"#));
        assert!(!html.contains(REPLACEMENT_ATTR));
    }

    #[test]
    fn test_unknown_placeholder_loses_its_marker() {
        let dom = parse_document(
            r#"<body><style wm-diff-replacement="new-7">$[new-7]$</style></body>"#,
        )
        .unwrap();
        let mut table = PlaceholderTable::new();

        assert_eq!(reinsert_undiffable(&dom.document, &mut table), 0);
        let placeholders = find_all(&dom.document, |n| {
            dom::get_attr(n, REPLACEMENT_ATTR).is_some()
        });
        assert!(placeholders.is_empty());
        assert!(serialize_document(&dom).unwrap().contains("<style>$[new-7]$</style>"));
    }

    #[test]
    fn test_input_replacement_attrs_are_dropped() {
        let dom = parse_document(
            r#"<body><div wm-diff-replacement="new-0">hello</div><script>s()</script></body>"#,
        )
        .unwrap();
        let mut table = extract_undiffable(&dom.document, Version::New, &RenderOptions::default());
        assert_eq!(table.len(), 1);
        assert_eq!(reinsert_undiffable(&dom.document, &mut table), 1);

        let html = serialize_document(&dom).unwrap();
        assert!(html.contains("<div>hello</div>"));
        assert!(html.contains(r#"<script class="wm-diff-inserted-active">s()</script>"#));
        assert!(!html.contains(REPLACEMENT_ATTR));
    }

    #[test]
    fn test_extract_then_reinsert_restores_code() {
        let source = r#"<body><p>x</p><script type="module">let s = "<b>";</script></body>"#;
        let dom = parse_document(source).unwrap();
        let mut table = extract_undiffable(&dom.document, Version::New, &RenderOptions::default());
        reinsert_undiffable(&dom.document, &mut table);

        let html = serialize_document(&dom).unwrap();
        assert!(html.contains(
            r#"<script type="module" class="wm-diff-inserted-active">let s = "<b>";</script>"#
        ));
    }

    #[test]
    fn test_custom_protected_set() {
        let options = RenderOptions {
            undiffable_tags: vec!["noscript".to_string()],
            ..RenderOptions::default()
        };
        let dom = parse_document("<body><noscript>enable js</noscript><script>x</script></body>")
            .unwrap();
        let table = extract_undiffable(&dom.document, Version::Old, &options);
        assert_eq!(table.len(), 1);
        assert!(dom::is_element(table.get("old-0").unwrap(), "noscript"));
    }

    #[test]
    fn test_placeholder_version_parsing() {
        assert_eq!(Version::of_placeholder("old-12"), Some(Version::Old));
        assert_eq!(Version::of_placeholder("new-0"), Some(Version::New));
        assert_eq!(Version::of_placeholder("new-"), None);
        assert_eq!(Version::of_placeholder("other-1"), None);
    }
}
