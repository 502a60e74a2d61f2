//! Errors surfaced by the rendering pipeline
//!
//! The HTML parser repairs malformed markup instead of rejecting it, so the
//! only failures left are I/O-level ones coming out of the parser and
//! serializer collaborators.

use std::string::FromUtf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTML parsing failed: {0}")]
    Parse(#[source] std::io::Error),

    #[error("HTML serialization failed: {0}")]
    Serialize(#[source] std::io::Error),

    #[error("serialized HTML is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}
