//! Keep `<ins>`/`<del>` markers out of block structure
//!
//! A marker is phrasing content. When the rendered diff wraps a whole block
//! (`<ins><h1>..</h1></ins>`), the marker is pushed down into the blocks and
//! around their inline content instead, and the original marker is removed.

use crate::dom;
use crate::options::{DELETION_TAG, INSERTION_TAG};
use markup5ever_rcdom::Handle;
use tracing::trace;

const BLOCK_LEVEL_TAGS: &[&str] = &[
    "address",
    "blockquote",
    "center",
    "dir",
    "div",
    "dl",
    "fieldset",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "isindex",
    "menu",
    "noframes",
    "noscript",
    "ol",
    "p",
    "pre",
    "table",
    "ul",
];

const BLOCK_LEVEL_CONTAINER_TAGS: &[&str] = &[
    "dd", "dt", "frameset", "li", "tbody", "td", "tfoot", "th", "thead", "tr",
];

/// Rewrite every marker under `body` that contains block-level content.
pub fn fixup_ins_del_tags(body: &Handle) {
    for tag in [INSERTION_TAG, DELETION_TAG] {
        let markers = dom::find_all(body, |node| dom::is_html_element(node, tag));
        for marker in markers {
            if !contains_block_level_tag(&marker) {
                continue;
            }
            trace!(tag, "moving marker inside block content");
            move_inside_blocks(&marker, tag);
            dom::unwrap(&marker);
        }
    }
}

fn is_block_level(node: &Handle) -> bool {
    dom::tag_name(node).is_some_and(|tag| {
        BLOCK_LEVEL_TAGS.contains(&tag) || BLOCK_LEVEL_CONTAINER_TAGS.contains(&tag)
    })
}

fn contains_block_level_tag(node: &Handle) -> bool {
    is_block_level(node) || node.children.borrow().iter().any(contains_block_level_tag)
}

/// Wrap the inline content of `container` in `tag` markers, descending into
/// any child that holds block-level content.
fn move_inside_blocks(container: &Handle, tag: &str) {
    let children = dom::take_children(container);
    let mut rebuilt = Vec::with_capacity(children.len());
    let mut inline_run = Vec::new();

    for child in children {
        if contains_block_level_tag(&child) {
            flush_run(&mut inline_run, &mut rebuilt, tag);
            move_inside_blocks(&child, tag);
            rebuilt.push(child);
        } else {
            inline_run.push(child);
        }
    }
    flush_run(&mut inline_run, &mut rebuilt, tag);

    dom::set_children(container, rebuilt);
}

fn flush_run(run: &mut Vec<Handle>, out: &mut Vec<Handle>, tag: &str) {
    if run.is_empty() {
        return;
    }
    let nodes = std::mem::take(run);
    let blank = nodes
        .iter()
        .all(|node| dom::text_of(node).is_some_and(|text| text.trim().is_empty()));
    if blank {
        out.extend(nodes);
        return;
    }
    let marker = dom::create_element(tag, vec![]);
    dom::set_children(&marker, nodes);
    out.push(marker);
}
