//! Hierarchical setting paths (`ai.panel_width`, `shortcuts.new_tab`).

use crate::error::ValidationError;
use std::str::FromStr;

/// Ordered list of segments addressing a node in the settings tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingPath {
    segments: Vec<String>,
}

impl SettingPath {
    /// Parse a dotted path. Empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(ValidationError::InvalidPath(path.to_string()));
        }
        Ok(Self { segments })
    }

    /// Build a path from already-split segments
    pub fn from_segments<I, S>(segments: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(ValidationError::InvalidPath(segments.join(".")));
        }
        Ok(Self { segments })
    }

    /// Top-level segment; validators are keyed by it
    pub fn base(&self) -> &str {
        &self.segments[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Path is a single top-level key
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// Last segment (the key written by `set`)
    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// Segments leading to the leaf
    pub fn parents(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }
}

impl FromStr for SettingPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for SettingPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}
