//! The render pipeline
//!
//! Both documents are parsed, their script/style content is parked in a
//! [`PlaceholderTable`], the bodies and titles are diffed, and the result is
//! assembled on top of the new document:
//!
//! ```text
//! <head>
//!   ...new head...
//!   <meta name="wm-diff-title" content="<title diff>">
//!   <template id="wm-diff-old-head">...old head...</template>
//!   <style type="text/css" id="wm-diff-style">ins {..} del {..}</style>
//! </head>
//! <body>...rendered body diff...</body>
//! ```
//!
//! The body diff exists only as markup. It is parsed as a body fragment and
//! grafted in place of the new body's children, then the whole document is
//! serialized and parsed again before the placeholders are swapped back.

use crate::dom;
use crate::error::Result;
use crate::htmldiff::{self, BodyDiff};
use crate::options::{RenderOptions, CHANGE_STYLES, OLD_HEAD_ID, STYLE_ID, TITLE_META_NAME};
use crate::title;
use crate::undiffable::{self, PlaceholderTable, Version};
use markup5ever_rcdom::Handle;
use serde::Serialize;
use tracing::{debug, debug_span};

/// Outcome of one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDiff {
    /// The complete output document.
    pub html: String,
    /// Title diff, as stored in the `wm-diff-title` meta element.
    pub title_diff: String,
    /// `<ins>` elements in the rendered body.
    pub insertions: usize,
    /// `<del>` elements in the rendered body.
    pub deletions: usize,
}

/// Render the visual diff of two HTML documents with default options.
pub fn render(old_html: &str, new_html: &str) -> Result<String> {
    Ok(render_with(old_html, new_html, &RenderOptions::default())?.html)
}

/// Render the visual diff of two HTML documents.
pub fn render_with(old_html: &str, new_html: &str, options: &RenderOptions) -> Result<RenderedDiff> {
    let span = debug_span!("render", old_len = old_html.len(), new_len = new_html.len());
    let _enter = span.enter();

    let old_dom = dom::parse_document(old_html)?;
    let new_dom = dom::parse_document(new_html)?;
    if options.strip_comments {
        dom::strip_comments(&old_dom.document);
        dom::strip_comments(&new_dom.document);
    }

    let mut placeholders = undiffable::extract_undiffable(&old_dom.document, Version::Old, options);
    placeholders.merge(undiffable::extract_undiffable(
        &new_dom.document,
        Version::New,
        options,
    ));

    let old_body = find_html_element(&old_dom.document, "body");
    let new_body = find_html_element(&new_dom.document, "body");
    let body = htmldiff::diff_bodies(old_body.as_ref(), new_body.as_ref())?;

    let title_diff = title::diff_title(
        &title::document_title(&old_dom.document),
        &title::document_title(&new_dom.document),
    );
    debug!(%title_diff, "diffed titles");

    let new_head = ensure_head(&new_dom.document);
    let old_head = find_html_element(&old_dom.document, "head");
    append_diff_head(&new_head, old_head.as_ref(), &title_diff);

    if let Some(new_body) = &new_body {
        graft_body(new_body, &body)?;
    }

    let output = dom::parse_document(&dom::serialize_document(&new_dom)?)?;
    let restored = undiffable::reinsert_undiffable(&output.document, &mut placeholders);
    debug!(restored, unclaimed = placeholders.len(), "assembled output document");

    Ok(RenderedDiff {
        html: dom::serialize_document(&output)?,
        title_diff,
        insertions: body.insertions,
        deletions: body.deletions,
    })
}

/// Diff two body fragments, protecting their script/style content the same
/// way a full render does. Returns the rendered body markup.
pub fn diff_body_html(old_body_html: &str, new_body_html: &str) -> Result<String> {
    let options = RenderOptions::default();
    let old_body = dom::parse_body_fragment(old_body_html)?;
    let new_body = dom::parse_body_fragment(new_body_html)?;
    if options.strip_comments {
        dom::strip_comments(&old_body);
        dom::strip_comments(&new_body);
    }

    let mut placeholders = undiffable::extract_undiffable(&old_body, Version::Old, &options);
    placeholders.merge(undiffable::extract_undiffable(&new_body, Version::New, &options));

    let body = htmldiff::diff_bodies(Some(&old_body), Some(&new_body))?;
    reinsert_into_fragment(&body.html, &mut placeholders)
}

fn reinsert_into_fragment(html: &str, placeholders: &mut PlaceholderTable) -> Result<String> {
    let fragment = dom::parse_body_fragment(html)?;
    undiffable::reinsert_undiffable(&fragment, placeholders);
    dom::serialize_children(&fragment)
}

fn find_html_element(document: &Handle, tag: &str) -> Option<Handle> {
    dom::find_first(document, |node| dom::is_html_element(node, tag))
}

/// The document's `<head>`, created as the first child of `<html>` when
/// missing.
fn ensure_head(document: &Handle) -> Handle {
    if let Some(head) = find_html_element(document, "head") {
        return head;
    }

    debug!("new document has no head; synthesizing one");
    let head = dom::create_element("head", vec![]);
    let root = find_html_element(document, "html").unwrap_or_else(|| document.clone());
    dom::adopt(&root, &head);
    root.children.borrow_mut().insert(0, head.clone());
    head
}

fn append_diff_head(new_head: &Handle, old_head: Option<&Handle>, title_diff: &str) {
    dom::append(
        new_head,
        dom::create_element("meta", vec![("name", TITLE_META_NAME), ("content", title_diff)]),
    );

    let old_head_template = dom::create_element("template", vec![("id", OLD_HEAD_ID)]);
    if let Some(old_head) = old_head {
        for child in dom::take_children(old_head) {
            dom::append(&old_head_template, child);
        }
    }
    dom::append(new_head, old_head_template);

    let style = dom::create_element("style", vec![("type", "text/css"), ("id", STYLE_ID)]);
    dom::append(&style, dom::create_text(CHANGE_STYLES));
    dom::append(new_head, style);
}

/// Replace the children of `new_body` with the rendered body diff.
fn graft_body(new_body: &Handle, body: &BodyDiff) -> Result<()> {
    let fragment = dom::parse_body_fragment(&body.html)?;
    dom::set_children(new_body, dom::take_children(&fragment));
    Ok(())
}
