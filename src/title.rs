//! Character-level diff of the two page titles
//!
//! Titles are short plain text, so they are compared per character rather
//! than per word, and rendered as an escaped string with `<ins>`/`<del>`
//! spans. That string is stored in a `<meta>` attribute, not inserted as
//! markup.

use crate::dom;
use crate::options::{DELETION_TAG, INSERTION_TAG};
use markup5ever_rcdom::Handle;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Equal,
    Insert,
    Delete,
}

/// A run of title text and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffOperation {
    pub kind: ChangeKind,
    pub text: String,
}

/// Ordered operations turning `old` into `new`.
pub fn title_operations(old: &str, new: &str) -> Vec<DiffOperation> {
    dissimilar::diff(old, new)
        .into_iter()
        .map(|chunk| match chunk {
            dissimilar::Chunk::Equal(text) => DiffOperation {
                kind: ChangeKind::Equal,
                text: text.to_string(),
            },
            dissimilar::Chunk::Insert(text) => DiffOperation {
                kind: ChangeKind::Insert,
                text: text.to_string(),
            },
            dissimilar::Chunk::Delete(text) => DiffOperation {
                kind: ChangeKind::Delete,
                text: text.to_string(),
            },
        })
        .filter(|op| !op.text.is_empty())
        .collect()
}

/// Render the title diff as escaped HTML text with change markers.
///
/// ```text
/// diff_title("Paragraph", "Header") == "<del>Paragraph</del><ins>Header</ins>"
/// ```
pub fn diff_title(old: &str, new: &str) -> String {
    let mut out = String::with_capacity(old.len() + new.len());
    for op in title_operations(old, new) {
        let text = dom::escape_html(&op.text);
        match op.kind {
            ChangeKind::Equal => out.push_str(&text),
            ChangeKind::Insert => push_marked(&mut out, INSERTION_TAG, &text),
            ChangeKind::Delete => push_marked(&mut out, DELETION_TAG, &text),
        }
    }
    out
}

/// Text of the first `<title>` element in the document, or `""`.
pub fn document_title(document: &Handle) -> String {
    dom::find_first(document, |node| dom::is_html_element(node, "title"))
        .map(|title| dom::text_content(&title))
        .unwrap_or_default()
}

fn push_marked(out: &mut String, tag: &str, text: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(text);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    #[test]
    fn test_replaced_title() {
        insta::assert_snapshot!(diff_title("Paragraph", "Header"), @"<del>Paragraph</del><ins>Header</ins>");
    }

    #[test]
    fn test_identical_titles_have_no_markers() {
        assert_eq!(diff_title("Home", "Home"), "Home");
        assert_eq!(diff_title("", ""), "");
    }

    #[test]
    fn test_appended_text() {
        assert_eq!(diff_title("News", "News today"), "News<ins> today</ins>");
    }

    #[test]
    fn test_title_text_is_escaped() {
        assert_eq!(diff_title("", "A & <B>"), "<ins>A &amp; &lt;B&gt;</ins>");
        assert_eq!(diff_title("it's", "it's"), "it&#x27;s");
        assert_eq!(diff_title("a/b", "a/b"), "a&#x2f;b");
    }

    #[test]
    fn test_operations_rebuild_both_titles() {
        let ops = title_operations("Old title", "New title");
        let old: String = ops
            .iter()
            .filter(|op| op.kind != ChangeKind::Insert)
            .map(|op| op.text.as_str())
            .collect();
        let new: String = ops
            .iter()
            .filter(|op| op.kind != ChangeKind::Delete)
            .map(|op| op.text.as_str())
            .collect();
        assert_eq!(old, "Old title");
        assert_eq!(new, "New title");
    }

    #[test]
    fn test_document_title() {
        let dom = parse_document("<title>Hello &amp; bye</title><p>x</p>").unwrap();
        assert_eq!(document_title(&dom.document), "Hello & bye");

        let dom = parse_document("<p>no title</p>").unwrap();
        assert_eq!(document_title(&dom.document), "");
    }
}
