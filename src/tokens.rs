//! Body tokenization for the word-level diff
//!
//! A [`Token`] is one comparable unit (usually a word) plus the markup that
//! surrounds it: the tags opened right before it (`pre_tags`) and the tags
//! closed right after it (`post_tags`). Only the token's kind and comparison
//! value take part in the diff; the markup rides along so the rendered output
//! can be stitched back together in order.
//!
//! Tokenizing happens in two passes:
//!
//! 1. [`flatten`] walks a body element and emits a flat stream of [`Chunk`]s
//!    (start tags, end tags, words, images, link URLs).
//! 2. [`fold_chunks`] attaches the tags to neighbouring words.

use crate::dom;
use markup5ever_rcdom::{Handle, NodeData};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+(?:\s+|$)").expect("valid regex"));

/// What a token stands for, and therefore how it renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A word of page text, already HTML-escaped.
    Text,
    /// A self-contained element (an `<img>`), rendered as its own markup.
    Tag { html: String },
    /// The URL of an anchor, rendered as ` Link: <url>`.
    Href,
    /// The URL of an anchor that is compared but never rendered.
    Link,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// What the diff compares.
    pub value: String,
    pub pre_tags: Vec<String>,
    pub post_tags: Vec<String>,
    pub trailing_whitespace: String,
}

impl Token {
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(TokenKind::Text, value)
    }

    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            pre_tags: Vec::new(),
            post_tags: Vec::new(),
            trailing_whitespace: String::new(),
        }
    }

    /// Markup for the token's own content, without surrounding tags.
    pub fn html(&self) -> String {
        match &self.kind {
            TokenKind::Text => self.value.clone(),
            TokenKind::Tag { html } => html.clone(),
            TokenKind::Href => format!(" Link: {}", self.value),
            TokenKind::Link => String::new(),
        }
    }

    /// Unchanged tokens of these kinds contribute only their tags.
    pub fn hide_when_equal(&self) -> bool {
        matches!(self.kind, TokenKind::Href | TokenKind::Link)
    }

    fn discriminant(&self) -> u8 {
        match self.kind {
            TokenKind::Text => 0,
            TokenKind::Tag { .. } => 1,
            TokenKind::Href | TokenKind::Link => 2,
        }
    }
}

// Markup context never takes part in comparison, and an anchor URL compares
// the same whether or not it has been customized.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.discriminant() == other.discriminant() && self.value == other.value
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        self.value.hash(state);
    }
}

// Ordered on the same key as equality, as the sequence matcher requires.
impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.discriminant(), &self.value).cmp(&(other.discriminant(), &other.value))
    }
}

/// Re-tag anchor URLs so they are compared but never rendered.
///
/// Link changes still count as changes (they can pull surrounding markup
/// into an insertion or deletion) but the URL text never shows up.
pub fn customize_token(token: Token) -> Token {
    match token.kind {
        TokenKind::Href => Token {
            kind: TokenKind::Link,
            ..token
        },
        _ => token,
    }
}

/// Flat unit of a body before words and tags are folded together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    StartTag(String),
    EndTag(String),
    /// An escaped word, with its trailing whitespace.
    Word(String),
    Image { src: String, html: String },
    Href(String),
}

/// Tokenize the children of `body`, customized and ready to diff.
pub fn tokenize(body: &Handle) -> Vec<Token> {
    fold_chunks(flatten(body))
        .into_iter()
        .map(customize_token)
        .collect()
}

/// Flatten the children of `root` (not `root` itself) into chunks.
pub fn flatten(root: &Handle) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    flatten_children(root, &mut chunks);
    chunks
}

fn flatten_children(node: &Handle, chunks: &mut Vec<Chunk>) {
    let children = node.children.borrow();
    for (index, child) in children.iter().enumerate() {
        match &child.data {
            NodeData::Text { contents } => {
                let text = contents.borrow();
                // Text split by an unwrapped marker or a stripped comment
                if text.starts_with(char::is_whitespace) {
                    if let Some(Chunk::Word(word)) = chunks.last_mut() {
                        if !word.ends_with(char::is_whitespace) {
                            word.push(' ');
                        }
                    }
                }
                chunks.extend(split_words(&text).map(|w| Chunk::Word(dom::escape_html(w))));
            }
            NodeData::Element { .. } => {
                // Markers already in the source would be confused with ours
                if dom::is_html_element(child, "ins") || dom::is_html_element(child, "del") {
                    flatten_children(child, chunks);
                    continue;
                }
                let tail_starts_with_space = children
                    .get(index + 1)
                    .and_then(dom::text_of)
                    .is_some_and(|tail| tail.starts_with([' ', '\t', '\n', '\r']));
                flatten_element(child, tail_starts_with_space, chunks);
            }
            _ => {}
        }
    }
}

fn flatten_element(el: &Handle, tail_starts_with_space: bool, chunks: &mut Vec<Chunk>) {
    let Some(tag) = dom::tag_name(el) else {
        return;
    };

    if tag == "img" {
        chunks.push(Chunk::Image {
            src: dom::get_attr(el, "src").unwrap_or_default(),
            html: start_tag(el),
        });
    } else {
        chunks.push(Chunk::StartTag(start_tag(el)));
    }

    if dom::VOID_ELEMENTS.contains(&tag) && el.children.borrow().is_empty() {
        return;
    }

    flatten_children(el, chunks);

    if tag == "a" {
        if let Some(href) = dom::get_attr(el, "href").filter(|href| !href.is_empty()) {
            chunks.push(Chunk::Href(href));
        }
    }

    let extra = if tail_starts_with_space { " " } else { "" };
    chunks.push(Chunk::EndTag(format!("</{tag}>{extra}")));
}

/// Fold a chunk stream into tokens.
///
/// Start tags wait for the next word; end tags stick to the word before them
/// unless start tags are already waiting. Tags left at the end belong to the
/// last token. A stream without words becomes one empty token holding all of
/// its tags.
pub fn fold_chunks(chunks: Vec<Chunk>) -> Vec<Token> {
    let mut tag_accum: Vec<String> = Vec::new();
    let mut result: Vec<Token> = Vec::new();

    for chunk in chunks {
        match chunk {
            Chunk::Image { src, html } => {
                let mut token = Token::new(TokenKind::Tag { html }, src);
                token.pre_tags = std::mem::take(&mut tag_accum);
                result.push(token);
            }
            Chunk::Href(href) => {
                let mut token = Token::new(TokenKind::Href, href);
                token.pre_tags = std::mem::take(&mut tag_accum);
                token.trailing_whitespace = " ".to_string();
                result.push(token);
            }
            Chunk::Word(word) => {
                let (word, trailing) = split_trailing_whitespace(&word);
                let mut token = Token::text(word);
                token.pre_tags = std::mem::take(&mut tag_accum);
                token.trailing_whitespace = trailing.to_string();
                result.push(token);
            }
            Chunk::StartTag(tag) => tag_accum.push(tag),
            Chunk::EndTag(tag) => match result.last_mut() {
                Some(last) if tag_accum.is_empty() => last.post_tags.push(tag),
                _ => tag_accum.push(tag),
            },
        }
    }

    match result.last_mut() {
        Some(last) => last.post_tags.extend(tag_accum),
        None => {
            let mut token = Token::text("");
            token.pre_tags = tag_accum;
            result.push(token);
        }
    }
    result
}

/// Words of `text`, each with the whitespace that follows it.
pub fn split_words(text: &str) -> impl Iterator<Item = &str> {
    WORD_RE.find_iter(text).map(|m| m.as_str())
}

fn split_trailing_whitespace(word: &str) -> (&str, &str) {
    let stripped = word.trim_end();
    (stripped, &word[stripped.len()..])
}

/// `<name attr="value" ...>` for an element, attributes in source order.
pub fn start_tag(el: &Handle) -> String {
    let tag = dom::tag_name(el).unwrap_or_default();
    let attrs: String = dom::attributes(el)
        .iter()
        .map(|(name, value)| format!(r#" {}="{}""#, name, dom::escape_html(value)))
        .collect();
    format!("<{tag}{attrs}>")
}
