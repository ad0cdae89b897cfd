//! Run configuration
//!
//! Settings arrive from three places: an optional TOML file, environment
//! variables and command-line flags. They are merged as [`Settings`] and then
//! converted once into an immutable [`UploadSpec`], which is where every
//! pattern is compiled and every value validated.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::key::{StripPattern, normalize_separators};
use crate::matcher::{MatchMode, Pattern, RuleSetting};
use crate::metadata::{MetadataRules, MetadataSettings};

/// Current settings file schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Canned ACL used when none is configured
pub const DEFAULT_ACL: &str = "private";

/// Unvalidated settings, every field optional so sources can be layered
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Schema version of a settings file
    pub schema_version: Option<u32>,

    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub acl: Option<String>,

    /// Include glob (upload) or remote prefix (download)
    pub source: Option<String>,
    /// Key root (upload) or local directory (download)
    pub target: Option<String>,
    pub strip_prefix: Option<String>,
    pub exclude: Vec<String>,

    pub content_type: Option<RuleSetting<String>>,
    pub content_encoding: Option<RuleSetting<String>>,
    pub cache_control: Option<RuleSetting<String>>,
    pub metadata: Option<RuleSetting<BTreeMap<String, String>>>,

    pub encryption: Option<String>,
    pub storage_class: Option<String>,
    pub path_style: Option<bool>,
    pub dry_run: Option<bool>,
    pub download: Option<bool>,

    /// Pattern selecting remote objects to delete before uploading
    pub target_remove: Option<String>,
    pub match_mode: Option<MatchMode>,
}

impl Settings {
    /// Layer `overrides` on top of `self`; any value set in `overrides` wins
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            schema_version: overrides.schema_version.or(self.schema_version),
            endpoint: overrides.endpoint.or(self.endpoint),
            access_key: overrides.access_key.or(self.access_key),
            secret_key: overrides.secret_key.or(self.secret_key),
            bucket: overrides.bucket.or(self.bucket),
            region: overrides.region.or(self.region),
            acl: overrides.acl.or(self.acl),
            source: overrides.source.or(self.source),
            target: overrides.target.or(self.target),
            strip_prefix: overrides.strip_prefix.or(self.strip_prefix),
            exclude: if overrides.exclude.is_empty() {
                self.exclude
            } else {
                overrides.exclude
            },
            content_type: overrides.content_type.or(self.content_type),
            content_encoding: overrides.content_encoding.or(self.content_encoding),
            cache_control: overrides.cache_control.or(self.cache_control),
            metadata: overrides.metadata.or(self.metadata),
            encryption: overrides.encryption.or(self.encryption),
            storage_class: overrides.storage_class.or(self.storage_class),
            path_style: overrides.path_style.or(self.path_style),
            dry_run: overrides.dry_run.or(self.dry_run),
            download: overrides.download.or(self.download),
            target_remove: overrides.target_remove.or(self.target_remove),
            match_mode: overrides.match_mode.or(self.match_mode),
        }
    }
}

/// Storage endpoint connection details
#[derive(Clone, Default)]
pub struct Connection {
    /// Custom endpoint URL; the SDK default when unset
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Use path-style addressing (MinIO and most self-hosted stores)
    pub path_style: bool,
}

impl Connection {
    /// Static credentials, if both halves are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(key), Some(secret)) => Some((key, secret)),
            _ => None,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

/// Validated, compiled configuration for one run
#[derive(Debug, Clone)]
pub struct UploadSpec {
    pub source: String,
    pub excludes: Vec<String>,
    pub target: String,
    pub strip: StripPattern,
    pub bucket: String,
    pub connection: Connection,
    pub acl: String,
    pub encryption: Option<String>,
    pub storage_class: Option<String>,
    pub match_mode: MatchMode,
    pub rules: MetadataRules,
    pub target_remove: Option<Pattern>,
    pub dry_run: bool,
    pub download: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reject a malformed file glob before anything touches the bucket
fn check_glob(pattern: &str) -> Result<()> {
    glob::Pattern::new(pattern)
        .map(|_| ())
        .map_err(|e| Error::invalid_pattern(pattern, e))
}

impl TryFrom<Settings> for UploadSpec {
    type Error = Error;

    fn try_from(settings: Settings) -> Result<Self> {
        let bucket = non_empty(settings.bucket)
            .ok_or_else(|| Error::Config("bucket is required".into()))?;
        let source = non_empty(settings.source)
            .ok_or_else(|| Error::Config("source is required".into()))?;

        let endpoint = non_empty(settings.endpoint);
        if let Some(endpoint) = &endpoint {
            let url = url::Url::parse(endpoint)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "endpoint '{endpoint}' must use http or https"
                )));
            }
        }

        let access_key = non_empty(settings.access_key);
        let secret_key = non_empty(settings.secret_key);
        if access_key.is_some() != secret_key.is_some() {
            return Err(Error::Config(
                "access key and secret key must be configured together".into(),
            ));
        }

        let download = settings.download.unwrap_or(false);
        let strip_prefix = settings.strip_prefix.unwrap_or_default();
        // Download mode prepends the prefix verbatim and never pattern-matches it.
        let strip = if download {
            StripPattern::Literal(normalize_separators(&strip_prefix))
        } else {
            StripPattern::parse(&strip_prefix)?
        };

        let match_mode = settings.match_mode.unwrap_or_default();
        let rules = MetadataRules::compile(
            &MetadataSettings {
                content_type: settings.content_type,
                content_encoding: settings.content_encoding,
                cache_control: settings.cache_control,
                metadata: settings.metadata,
            },
            match_mode,
        )?;

        let target_remove = non_empty(settings.target_remove)
            .map(|raw| Pattern::compile(&raw, match_mode))
            .transpose()?;

        let excludes: Vec<String> = settings
            .exclude
            .into_iter()
            .filter(|e| !e.trim().is_empty())
            .collect();
        // In download mode the source is a remote prefix, not a glob.
        if !download {
            check_glob(&source)?;
            excludes.iter().try_for_each(|e| check_glob(e))?;
        }

        Ok(UploadSpec {
            source,
            excludes,
            target: settings.target.unwrap_or_default(),
            strip,
            bucket,
            connection: Connection {
                endpoint,
                region: non_empty(settings.region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
                access_key,
                secret_key,
                path_style: settings.path_style.unwrap_or(false),
            },
            acl: non_empty(settings.acl).unwrap_or_else(|| DEFAULT_ACL.to_string()),
            encryption: non_empty(settings.encryption),
            storage_class: non_empty(settings.storage_class),
            match_mode,
            rules,
            target_remove,
            dry_run: settings.dry_run.unwrap_or(false),
            download,
        })
    }
}

/// Loads settings files
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager reading the given file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Load settings from disk
    ///
    /// A file written for a newer schema version is rejected rather than
    /// silently misread.
    pub fn load(&self) -> Result<Settings> {
        if !self.config_path.exists() {
            return Err(Error::Config(format!(
                "Configuration file not found: {}",
                self.config_path.display()
            )));
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let settings: Settings = toml::from_str(&content)?;

        if let Some(version) = settings.schema_version {
            if version > SCHEMA_VERSION {
                return Err(Error::Config(format!(
                    "Configuration file version {version} is newer than supported version {SCHEMA_VERSION}. Please upgrade s3up."
                )));
            }
        }

        Ok(settings)
    }
}
