//! # wmdiff
//!
//! Visual diffs of HTML documents.
//!
//! [`render`] takes two versions of a page and produces one document, built
//! on the new version, where added text is wrapped in `<ins>` and removed
//! text in `<del>`. The output head also carries the old head (inert, in
//! `<template id="wm-diff-old-head">`), the highlight stylesheet and a
//! `<meta name="wm-diff-title">` holding the diff of the two titles.
//!
//! ```no_run
//! let html = wmdiff::render(
//!     "<title>Paragraph</title><p>Paragraph</p>",
//!     "<title>Header</title><h1>Header</h1>",
//! )?;
//! # Ok::<(), wmdiff::RenderError>(())
//! ```
//!
//! Script and style elements never enter the text diff. Old ones come back
//! inside `<template class="wm-diff-deleted-inert">`, new ones come back live
//! with the `wm-diff-inserted-active` class. Inline code that exists in both
//! versions therefore appears twice in the output.
//!
//! ## Modules
//!
//! - [`dom`]: parsing, serializing and editing `markup5ever_rcdom` trees
//! - [`undiffable`]: placeholders for script/style content
//! - [`tokens`]: body tokenization
//! - [`htmldiff`] and [`fixup`]: the word-level body diff
//! - [`title`]: the character-level title diff
//! - [`assemble`]: the full pipeline

pub mod assemble;
pub mod dom;
pub mod error;
pub mod fixup;
pub mod htmldiff;
pub mod options;
pub mod title;
pub mod tokens;
pub mod undiffable;

pub use assemble::{diff_body_html, render, render_with, RenderedDiff};
pub use error::{RenderError, Result};
pub use options::RenderOptions;
pub use title::diff_title;
