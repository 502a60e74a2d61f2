//! Render options and the fixed markup contract of the output document
//!
//! The constants below are what downstream consumers key on (ids, attribute
//! names, classes). They never change at runtime; only [`RenderOptions`] does.

use serde::{Deserialize, Serialize};

/// `id` of the `<template>` holding the old document's `<head>`.
pub const OLD_HEAD_ID: &str = "wm-diff-old-head";

/// `id` of the `<style>` element carrying the highlight rules.
pub const STYLE_ID: &str = "wm-diff-style";

/// `name` of the `<meta>` element whose `content` is the title diff.
pub const TITLE_META_NAME: &str = "wm-diff-title";

/// Attribute marking a placeholder; its value is the placeholder id.
pub const REPLACEMENT_ATTR: &str = "wm-diff-replacement";

/// Class added to an old script/style restored into the output.
pub const DELETED_ACTIVE_CLASS: &str = "wm-diff-deleted-active";

/// Class of the `<template>` that keeps an old script/style inert.
pub const DELETED_INERT_CLASS: &str = "wm-diff-deleted-inert";

/// Class added to a new script/style restored into the output.
pub const INSERTED_ACTIVE_CLASS: &str = "wm-diff-inserted-active";

pub const INSERTION_TAG: &str = "ins";
pub const DELETION_TAG: &str = "del";

/// Highlight rules for insertion and deletion markers.
pub const CHANGE_STYLES: &str = "
ins {text-decoration: none; background-color: #d4fcbc;}
del {text-decoration: none; background-color: #fbb6c2;}";

/// Tags whose content is code rather than page text.
pub const DEFAULT_UNDIFFABLE_TAGS: &[&str] = &["script", "style"];

/// Knobs for a single render call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Drop comment nodes from both documents before diffing.
    pub strip_comments: bool,
    /// Elements replaced by placeholders so the text diff never sees their content.
    pub undiffable_tags: Vec<String>,
}

impl RenderOptions {
    pub fn is_undiffable(&self, tag: &str) -> bool {
        self.undiffable_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            strip_comments: true,
            undiffable_tags: DEFAULT_UNDIFFABLE_TAGS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}
