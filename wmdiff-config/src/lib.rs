//! Shared configuration loader for wmdiff.
//!
//! `defaults/wmdiff.default.toml` is embedded into every binary so that docs
//! and runtime behavior stay in sync. Applications layer user-specific files
//! on top of those defaults via [`Loader`] before deserializing into
//! [`WmdiffConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;
use wmdiff::RenderOptions;

const DEFAULT_TOML: &str = include_str!("../defaults/wmdiff.default.toml");

/// Top-level configuration consumed by wmdiff applications.
#[derive(Debug, Clone, Deserialize)]
pub struct WmdiffConfig {
    pub render: RenderConfig,
}

/// Mirrors the knobs of [`RenderOptions`].
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub strip_comments: bool,
    pub undiffable_tags: Vec<String>,
}

impl RenderConfig {
    pub fn to_options(&self) -> RenderOptions {
        RenderOptions {
            strip_comments: self.strip_comments,
            undiffable_tags: self
                .undiffable_tags
                .iter()
                .map(|tag| tag.trim().to_ascii_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect(),
        }
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (used for CLI flags).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<WmdiffConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<WmdiffConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_render_options() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.render.to_options(), RenderOptions::default());
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("render.strip_comments", false)
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert!(!config.render.strip_comments);
        assert_eq!(config.render.undiffable_tags, vec!["script", "style"]);
    }

    #[test]
    fn user_file_replaces_protected_tags() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(file, "[render]\nundiffable_tags = [\"SCRIPT\", \"noscript\", \" \"]")
            .expect("write config");

        let config = Loader::new()
            .with_file(file.path())
            .build()
            .expect("config to build");
        let options = config.render.to_options();
        assert!(options.strip_comments);
        assert_eq!(options.undiffable_tags, vec!["script", "noscript"]);
    }

    #[test]
    fn missing_optional_file_is_ignored() {
        let config = Loader::new()
            .with_optional_file("/nonexistent/wmdiff.toml")
            .build()
            .expect("config to build");
        assert!(config.render.strip_comments);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        assert!(Loader::new()
            .with_file("/nonexistent/wmdiff.toml")
            .build()
            .is_err());
    }
}
