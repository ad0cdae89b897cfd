//! s3up-core: Core library for the s3up artifact sync plugin
//!
//! This crate provides everything between configuration and the storage
//! backend:
//! - Settings loading, merging and validation
//! - Local file set expansion
//! - Object key and metadata resolution
//! - The ObjectStore trait and the sync orchestrator
//!
//! It does not depend on any S3 SDK, so the whole pipeline can be exercised
//! against mocks or an in-memory store.

pub mod config;
pub mod error;
pub mod fileset;
pub mod key;
pub mod matcher;
pub mod metadata;
pub mod sync;
pub mod traits;

pub use config::{ConfigManager, Connection, Settings, UploadSpec};
pub use error::{Error, ErrorKind, Result};
pub use key::{StripPattern, resolve_key, resolve_source};
pub use matcher::{MatchMode, Pattern, RuleSetting, RuleTable};
pub use metadata::{MetadataRules, ObjectMetadata};
pub use sync::{
    ResolvedFile, SyncEvent, SyncMode, SyncObserver, SyncReport, Syncer, TracingObserver,
};
pub use traits::{ObjectInfo, ObjectStore, PutOptions};
