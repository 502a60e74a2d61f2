//! Word-level diff of two page bodies, rendered as balanced HTML
//!
//! The token sequences of both bodies are aligned with `similar`, then
//! rendered back to markup from the new side:
//!
//! - unchanged runs are emitted as-is;
//! - inserted runs are wrapped in `<ins>`, with any start/end tags that do not
//!   balance inside the run kept outside the marker;
//! - deleted runs are first parked between sentinels and resolved once the
//!   whole document is known: their balanced part is wrapped in `<del>`, and
//!   tags that only made sense in the old document are dropped or slid past
//!   identical tags next to the deletion.
//!
//! The resulting fragment then goes through [`crate::fixup`] so no marker
//! ends up wrapping block-level content.

use crate::dom;
use crate::error::Result;
use crate::fixup;
use crate::options::{DELETION_TAG, INSERTION_TAG};
use crate::tokens::{self, Token};
use markup5ever_rcdom::Handle;
use similar::{capture_diff_slices, Algorithm, DiffTag};
use std::collections::VecDeque;
use std::ops::Range;
use tracing::debug;

/// Rendered body diff plus how many markers it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyDiff {
    pub html: String,
    pub insertions: usize,
    pub deletions: usize,
}

/// One aligned span of the two token sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub tag: DiffTag,
    pub old: Range<usize>,
    pub new: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Markup(String),
    DelStart,
    DelEnd,
}

/// Diff the children of two body elements. Yields an empty diff unless both
/// bodies exist.
pub fn diff_bodies(old_body: Option<&Handle>, new_body: Option<&Handle>) -> Result<BodyDiff> {
    let (Some(old_body), Some(new_body)) = (old_body, new_body) else {
        debug!("body missing on one side; skipping body diff");
        return Ok(BodyDiff::default());
    };

    let old_tokens = tokens::tokenize(old_body);
    let new_tokens = tokens::tokenize(new_body);
    debug!(
        old_tokens = old_tokens.len(),
        new_tokens = new_tokens.len(),
        "tokenized bodies"
    );

    let rendered = htmldiff_tokens(&old_tokens, &new_tokens).concat();

    let fragment = dom::parse_body_fragment(rendered.trim())?;
    fixup::fixup_ins_del_tags(&fragment);

    let insertions = dom::find_all(&fragment, |n| dom::is_html_element(n, INSERTION_TAG)).len();
    let deletions = dom::find_all(&fragment, |n| dom::is_html_element(n, DELETION_TAG)).len();
    debug!(insertions, deletions, "rendered body diff");

    Ok(BodyDiff {
        html: dom::serialize_children(&fragment)?,
        insertions,
        deletions,
    })
}

/// Align two token sequences.
///
/// Tiny equal runs stranded among large changes read as noise ("the", "a"),
/// so matches no longer than `min(2, new.len() / 4)` tokens are folded into
/// the surrounding change.
pub fn opcodes(old: &[Token], new: &[Token]) -> Vec<Opcode> {
    let threshold = (new.len() as f64 / 4.0).min(2.0);
    let mut result: Vec<Opcode> = Vec::new();

    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        let (mut tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal && (old_range.len() as f64) <= threshold {
            tag = DiffTag::Replace;
        }

        let extends_change = tag != DiffTag::Equal
            && result.last().is_some_and(|last| last.tag != DiffTag::Equal);
        match result.last_mut() {
            Some(last) if extends_change => {
                last.old.end = old_range.end;
                last.new.end = new_range.end;
                last.tag = change_tag(&last.old, &last.new);
            }
            _ => {
                if tag != DiffTag::Equal {
                    tag = change_tag(&old_range, &new_range);
                }
                result.push(Opcode {
                    tag,
                    old: old_range,
                    new: new_range,
                });
            }
        }
    }
    result
}

fn change_tag(old: &Range<usize>, new: &Range<usize>) -> DiffTag {
    match (old.is_empty(), new.is_empty()) {
        (false, true) => DiffTag::Delete,
        (true, false) => DiffTag::Insert,
        _ => DiffTag::Replace,
    }
}

/// Render aligned token sequences into markup chunks.
pub fn htmldiff_tokens(old: &[Token], new: &[Token]) -> Vec<String> {
    let ops = opcodes(old, new);
    debug!(opcodes = ops.len(), "aligned token sequences");

    let mut doc: Vec<Piece> = Vec::new();
    for op in ops {
        match op.tag {
            DiffTag::Equal => {
                doc.extend(expand_tokens(&new[op.new], true).into_iter().map(Piece::Markup));
            }
            DiffTag::Insert => merge_insert(expand_tokens(&new[op.new], false), &mut doc),
            DiffTag::Delete => merge_delete(expand_tokens(&old[op.old], false), &mut doc),
            DiffTag::Replace => {
                merge_insert(expand_tokens(&new[op.new], false), &mut doc);
                merge_delete(expand_tokens(&old[op.old], false), &mut doc);
            }
        }
    }
    cleanup_delete(doc)
}

/// Tokens back to markup chunks: pre tags, content, post tags.
fn expand_tokens(tokens: &[Token], equal: bool) -> Vec<String> {
    let mut chunks = Vec::new();
    for token in tokens {
        chunks.extend(token.pre_tags.iter().cloned());
        if !equal || !token.hide_when_equal() {
            chunks.push(format!("{}{}", token.html(), token.trailing_whitespace));
        }
        chunks.extend(token.post_tags.iter().cloned());
    }
    chunks
}

fn merge_insert(ins_chunks: Vec<String>, doc: &mut Vec<Piece>) {
    let (unbalanced_start, mut balanced, unbalanced_end) = split_unbalanced(ins_chunks);
    doc.extend(unbalanced_start.into_iter().map(Piece::Markup));
    ensure_trailing_space(doc);
    doc.push(Piece::Markup(format!("<{INSERTION_TAG}>")));
    trim_trailing_space(&mut balanced);
    doc.extend(balanced.into_iter().map(Piece::Markup));
    doc.push(Piece::Markup(format!("</{INSERTION_TAG}> ")));
    doc.extend(unbalanced_end.into_iter().map(Piece::Markup));
}

fn merge_delete(del_chunks: Vec<String>, doc: &mut Vec<Piece>) {
    doc.push(Piece::DelStart);
    doc.extend(del_chunks.into_iter().map(Piece::Markup));
    doc.push(Piece::DelEnd);
}

/// Resolve each parked deletion, first to last, into `<del>` markup.
fn cleanup_delete(mut pieces: Vec<Piece>) -> Vec<String> {
    while let Some(start) = pieces.iter().position(|p| *p == Piece::DelStart) {
        let end = pieces[start..]
            .iter()
            .position(|p| *p == Piece::DelEnd)
            .map_or(pieces.len(), |offset| start + offset);

        let mut post: VecDeque<Piece> = pieces.split_off((end + 1).min(pieces.len())).into();
        let delete: Vec<String> = pieces
            .drain(start..)
            .filter_map(|p| match p {
                Piece::Markup(chunk) => Some(chunk),
                _ => None,
            })
            .collect();
        let mut pre = pieces;

        let (unbalanced_start, mut balanced, unbalanced_end) = split_unbalanced(delete);
        locate_unbalanced_start(unbalanced_start.into(), &mut pre, &mut post);
        locate_unbalanced_end(unbalanced_end, &mut pre, &mut post);

        ensure_trailing_space(&mut pre);
        pre.push(Piece::Markup(format!("<{DELETION_TAG}>")));
        trim_trailing_space(&mut balanced);
        pre.extend(balanced.into_iter().map(Piece::Markup));
        pre.push(Piece::Markup(format!("</{DELETION_TAG}> ")));
        pre.extend(post);
        pieces = pre;
    }

    pieces
        .into_iter()
        .filter_map(|p| match p {
            Piece::Markup(chunk) => Some(chunk),
            _ => None,
        })
        .collect()
}

/// Split chunks into (start tags left open, balanced run, end tags closing
/// something outside the run).
fn split_unbalanced(chunks: Vec<String>) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut start = Vec::new();
    let mut end = Vec::new();
    let mut tag_stack: Vec<(String, usize, String)> = Vec::new();
    let mut balanced: Vec<Option<String>> = Vec::new();

    for chunk in chunks {
        if !chunk.starts_with('<') {
            balanced.push(Some(chunk));
            continue;
        }
        let is_end_tag = chunk.starts_with("</");
        let name = chunk_tag_name(&chunk).to_string();
        if dom::VOID_ELEMENTS.contains(&name.as_str()) {
            balanced.push(Some(chunk));
            continue;
        }

        if !is_end_tag {
            tag_stack.push((name, balanced.len(), chunk));
            balanced.push(None);
        } else if matches!(tag_stack.last(), Some((open, _, _)) if *open == name) {
            balanced.push(Some(chunk));
            if let Some((_, pos, open_tag)) = tag_stack.pop() {
                balanced[pos] = Some(open_tag);
            }
        } else {
            start.extend(tag_stack.drain(..).map(|(_, _, open_tag)| open_tag));
            end.push(chunk);
        }
    }

    start.extend(tag_stack.into_iter().map(|(_, _, open_tag)| open_tag));
    (start, balanced.into_iter().flatten().collect(), end)
}

/// Drop unbalanced start tags of a deletion when the markup right after it
/// opens the same element, moving that start tag in front of the `<del>`.
fn locate_unbalanced_start(
    mut unbalanced_start: VecDeque<String>,
    pre: &mut Vec<Piece>,
    post: &mut VecDeque<Piece>,
) {
    loop {
        let (Some(finding), Some(Piece::Markup(next))) = (unbalanced_start.front(), post.front())
        else {
            break;
        };
        if !next.starts_with('<') || next.starts_with("</") {
            break;
        }
        let name = chunk_tag_name(next);
        if name == INSERTION_TAG || name == DELETION_TAG || name != chunk_tag_name(finding) {
            break;
        }
        unbalanced_start.pop_front();
        if let Some(moved) = post.pop_front() {
            pre.push(moved);
        }
    }
}

/// Mirror of [`locate_unbalanced_start`] for end tags before the deletion.
fn locate_unbalanced_end(
    mut unbalanced_end: Vec<String>,
    pre: &mut Vec<Piece>,
    post: &mut VecDeque<Piece>,
) {
    loop {
        let (Some(finding), Some(Piece::Markup(next))) = (unbalanced_end.last(), pre.last()) else {
            break;
        };
        if !next.starts_with("</") {
            break;
        }
        let name = chunk_tag_name(next);
        if name == INSERTION_TAG || name == DELETION_TAG || name != chunk_tag_name(finding) {
            break;
        }
        unbalanced_end.pop();
        if let Some(moved) = pre.pop() {
            post.push_front(moved);
        }
    }
}

/// `p` for `<p class="x">`, `</p> ` and `<p>`.
fn chunk_tag_name(chunk: &str) -> &str {
    chunk
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c| c == '<' || c == '>' || c == '/')
}

fn ensure_trailing_space(doc: &mut [Piece]) {
    if let Some(Piece::Markup(last)) = doc.last_mut() {
        if !last.ends_with(' ') {
            last.push(' ');
        }
    }
}

fn trim_trailing_space(chunks: &mut [String]) {
    if let Some(last) = chunks.last_mut() {
        if last.ends_with(' ') {
            last.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_body_fragment;

    fn diff(old: &str, new: &str) -> BodyDiff {
        let old = parse_body_fragment(old).unwrap();
        let new = parse_body_fragment(new).unwrap();
        diff_bodies(Some(&old), Some(&new)).unwrap()
    }

    #[test]
    fn test_identical_bodies_have_no_markers() {
        let result = diff("<p>Same <b>text</b> here</p>", "<p>Same <b>text</b> here</p>");
        assert_eq!(result.insertions, 0);
        assert_eq!(result.deletions, 0);
        assert_eq!(result.html, "<p>Same <b>text</b> here</p>");
    }

    #[test]
    fn test_changed_word() {
        let result = diff(
            "<p>The very quick brown fox jumps over the lazy dog</p>",
            "<p>The very quick red fox jumps over the lazy dog</p>",
        );
        assert_eq!(
            result.html,
            "<p>The very quick <ins>red</ins> <del>brown</del> fox jumps over the lazy dog</p>"
        );
        assert_eq!((result.insertions, result.deletions), (1, 1));
    }

    #[test]
    fn test_block_replacement_is_pushed_inside_blocks() {
        let result = diff("<p>Paragraph</p>", "<h1>Header</h1>");
        assert_eq!(
            result.html,
            "<h1><ins>Header</ins></h1> <p><del>Paragraph</del></p>"
        );
    }

    #[test]
    fn test_missing_body_yields_empty_diff() {
        let body = parse_body_fragment("<p>x</p>").unwrap();
        assert_eq!(diff_bodies(None, Some(&body)).unwrap(), BodyDiff::default());
        assert_eq!(diff_bodies(Some(&body), None).unwrap(), BodyDiff::default());
    }

    #[test]
    fn test_split_unbalanced() {
        let chunks = vec![
            "</p>".to_string(),
            "<b>".to_string(),
            "x".to_string(),
            "</b>".to_string(),
            "<br>".to_string(),
            "<i>".to_string(),
            "y".to_string(),
        ];
        let (start, balanced, end) = split_unbalanced(chunks);
        assert_eq!(start, vec!["<i>"]);
        assert_eq!(balanced, vec!["<b>", "x", "</b>", "<br>", "y"]);
        assert_eq!(end, vec!["</p>"]);
    }

    #[test]
    fn test_chunk_tag_name() {
        assert_eq!(chunk_tag_name(r#"<a href="x">"#), "a");
        assert_eq!(chunk_tag_name("</li> "), "li");
        assert_eq!(chunk_tag_name("<br>"), "br");
    }

    #[test]
    fn test_small_matches_among_changes_are_dropped() {
        let words = |s: &str| s.split(' ').map(Token::text).collect::<Vec<_>>();
        let old = words("alpha beta the gamma delta epsilon");
        let new = words("one two the three four five six seven");
        let ops = opcodes(&old, &new);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].tag, DiffTag::Replace);
        assert_eq!(ops[0].old, 0..6);
        assert_eq!(ops[0].new, 0..8);
    }

    #[test]
    fn test_opcodes_align_tokenized_bodies() {
        let old = parse_body_fragment("<p>one two three four five six seven eight</p>").unwrap();
        let new = parse_body_fragment("<p>one two three four 5 six seven eight</p>").unwrap();
        let ops = opcodes(&tokens::tokenize(&old), &tokens::tokenize(&new));
        assert_eq!(
            ops,
            vec![
                Opcode { tag: DiffTag::Equal, old: 0..4, new: 0..4 },
                Opcode { tag: DiffTag::Replace, old: 4..5, new: 4..5 },
                Opcode { tag: DiffTag::Equal, old: 5..8, new: 5..8 },
            ]
        );
    }
}
