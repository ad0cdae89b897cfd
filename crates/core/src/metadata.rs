//! Per-object HTTP metadata
//!
//! Content type, content encoding and cache control are resolved from their
//! own rule tables. Only the content type has a fallback, guessed from the
//! file extension.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::key::normalize_separators;
use crate::matcher::{MatchMode, RuleSetting, Rules};

/// Content type used when nothing better is known
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Headers and user metadata for one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMetadata {
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Raw rule settings, as read from configuration
#[derive(Debug, Clone, Default)]
pub struct MetadataSettings {
    pub content_type: Option<RuleSetting<String>>,
    pub content_encoding: Option<RuleSetting<String>>,
    pub cache_control: Option<RuleSetting<String>>,
    pub metadata: Option<RuleSetting<BTreeMap<String, String>>>,
}

/// Compiled rule tables for every metadata field
#[derive(Debug, Clone, Default)]
pub struct MetadataRules {
    content_type: Rules<String>,
    content_encoding: Rules<String>,
    cache_control: Rules<String>,
    metadata: Rules<BTreeMap<String, String>>,
}

impl MetadataRules {
    /// Compile all tables with the same match mode
    pub fn compile(settings: &MetadataSettings, mode: MatchMode) -> Result<Self> {
        Ok(Self {
            content_type: Rules::compile(settings.content_type.as_ref(), mode)?,
            content_encoding: Rules::compile(settings.content_encoding.as_ref(), mode)?,
            cache_control: Rules::compile(settings.cache_control.as_ref(), mode)?,
            metadata: Rules::compile(settings.metadata.as_ref(), mode)?,
        })
    }

    /// Resolve the metadata for a local file
    pub fn resolve(&self, local_path: &str) -> ObjectMetadata {
        let path = normalize_separators(local_path);

        let content_type = first_non_empty(&self.content_type, &path)
            .or_else(|| content_type_for_extension(&path))
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        ObjectMetadata {
            content_type,
            content_encoding: first_non_empty(&self.content_encoding, &path),
            cache_control: first_non_empty(&self.cache_control, &path),
            metadata: self.metadata.first_match(&path).cloned().unwrap_or_default(),
        }
    }
}

fn first_non_empty(rules: &Rules<String>, path: &str) -> Option<String> {
    rules
        .first_match(path)
        .filter(|value| !value.is_empty())
        .cloned()
}

/// Guess a MIME type from the file extension
pub fn content_type_for_extension(path: &str) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}
