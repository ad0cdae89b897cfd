//! Sync orchestration
//!
//! A run verifies the bucket, optionally removes stale remote objects, then
//! walks the resolved file set one entry at a time. Every transfer is awaited
//! before the next starts and the first failure ends the run.
//!
//! Run events go to an injected [`SyncObserver`]; [`TracingObserver`] turns
//! them into `tracing` events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{Connection, UploadSpec};
use crate::error::{Error, Result};
use crate::fileset::{self, LocalEntry};
use crate::key::{join_key, normalize_path, normalize_separators, resolve_key, resolve_source};
use crate::matcher::Pattern;
use crate::metadata::ObjectMetadata;
use crate::traits::{ObjectStore, PutOptions};

/// Direction of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Upload,
    Download,
}

/// Everything needed to upload one local path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFile {
    pub local_path: String,
    /// `/`-rooted object key; empty for skipped directories
    pub remote_key: String,
    #[serde(flatten)]
    pub metadata: ObjectMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_prefix: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_directory_skipped: bool,
}

/// Resolve the key and metadata for one matched path
pub fn resolve_file(spec: &UploadSpec, entry: &LocalEntry) -> Result<ResolvedFile> {
    let metadata = spec.rules.resolve(&entry.path);

    if entry.is_dir {
        return Ok(ResolvedFile {
            local_path: entry.path.clone(),
            remote_key: String::new(),
            metadata,
            removed_prefix: None,
            is_directory_skipped: true,
        });
    }

    let resolved = resolve_key(&spec.target, &entry.path, &spec.strip)?;
    Ok(ResolvedFile {
        local_path: entry.path.clone(),
        remote_key: resolved.key,
        metadata,
        removed_prefix: resolved.removed,
        is_directory_skipped: false,
    })
}

fn put_options(spec: &UploadSpec, file: &ResolvedFile) -> PutOptions {
    PutOptions {
        content_type: file.metadata.content_type.clone(),
        content_encoding: file.metadata.content_encoding.clone(),
        cache_control: file.metadata.cache_control.clone(),
        acl: Some(spec.acl.clone()),
        server_side_encryption: spec.encryption.clone(),
        storage_class: spec.storage_class.clone(),
        metadata: file.metadata.metadata.clone(),
    }
}

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Connecting {
        endpoint: Option<String>,
        region: String,
    },
    BucketFound {
        bucket: String,
    },
    TargetsRemoved {
        bucket: String,
        count: usize,
    },
    DirectorySkipped {
        path: String,
    },
    Uploading {
        local_path: String,
        remote_key: String,
        content_type: String,
        /// Span a wildcard strip prefix removed from the local path
        removed_prefix: Option<String>,
        dry_run: bool,
    },
    Downloading {
        remote_key: String,
        local_path: String,
        dry_run: bool,
    },
    TransferFailed {
        path: String,
        error: String,
    },
    /// A wildcard strip prefix matched none of the resolved files
    StripUnmatched {
        pattern: String,
        files: usize,
    },
}

/// Receives run events
pub trait SyncObserver: Send + Sync {
    fn notify(&self, event: &SyncEvent);
}

/// Emits run events as `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn notify(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Connecting { endpoint, region } => {
                tracing::info!(region = %region, endpoint = ?endpoint, "Attempting connection");
            }
            SyncEvent::BucketFound { bucket } => {
                tracing::info!(name = %bucket, "Found bucket");
            }
            SyncEvent::TargetsRemoved { bucket, count } => {
                tracing::info!(bucket = %bucket, count, "Removed target objects");
            }
            SyncEvent::DirectorySkipped { path } => {
                tracing::warn!(name = %path, "Skipping directory");
            }
            SyncEvent::Uploading {
                local_path,
                remote_key,
                content_type,
                removed_prefix,
                dry_run,
            } => {
                tracing::info!(
                    name = %local_path,
                    target = %remote_key,
                    content_type = %content_type,
                    removed_prefix = removed_prefix.as_deref(),
                    dry_run,
                    "Uploading file"
                );
            }
            SyncEvent::Downloading {
                remote_key,
                local_path,
                dry_run,
            } => {
                tracing::info!(key = %remote_key, target = %local_path, dry_run, "Downloading object");
            }
            SyncEvent::TransferFailed { path, error } => {
                tracing::error!(name = %path, error = %error, "Could not transfer file");
            }
            SyncEvent::StripUnmatched { pattern, files } => {
                tracing::warn!(
                    pattern = %pattern,
                    files,
                    "Strip prefix matched no files; keys keep their full paths"
                );
            }
        }
    }
}

/// One uploaded (or, in a dry run, planned) file
#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    #[serde(flatten)]
    pub file: ResolvedFile,
    pub size_bytes: u64,
}

/// One downloaded (or planned) object
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRecord {
    pub key: String,
    pub local_path: String,
    pub size_bytes: u64,
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub bucket: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uploads: Vec<UploadRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<DownloadRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_directories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
    pub total_bytes: u64,
    /// Files whose path the strip prefix actually shortened
    pub strip_matches: usize,
}

impl SyncReport {
    fn new(mode: SyncMode, spec: &UploadSpec) -> Self {
        Self {
            mode,
            bucket: spec.bucket.clone(),
            dry_run: spec.dry_run,
            uploads: Vec::new(),
            downloads: Vec::new(),
            skipped_directories: Vec::new(),
            deleted: Vec::new(),
            total_bytes: 0,
            strip_matches: 0,
        }
    }

    /// Number of files or objects transferred (or planned)
    pub fn transferred(&self) -> usize {
        self.uploads.len() + self.downloads.len()
    }
}

/// Runs uploads and downloads against an [`ObjectStore`]
pub struct Syncer<S> {
    store: S,
    observer: Arc<dyn SyncObserver>,
}

impl<S: ObjectStore> Syncer<S> {
    /// Create a syncer reporting through [`TracingObserver`]
    pub fn new(store: S) -> Self {
        Self {
            store,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn emit(&self, event: SyncEvent) {
        self.observer.notify(&event);
    }

    /// Execute one run
    pub async fn run(&self, spec: &UploadSpec) -> Result<SyncReport> {
        self.connect(&spec.connection, &spec.bucket).await?;

        if spec.download {
            self.download(spec).await
        } else {
            self.upload(spec).await
        }
    }

    async fn connect(&self, connection: &Connection, bucket: &str) -> Result<()> {
        self.emit(SyncEvent::Connecting {
            endpoint: connection.endpoint.clone(),
            region: connection.region.clone(),
        });
        self.verify_bucket(bucket).await
    }

    /// Fail unless `bucket` is visible to the configured credentials
    pub async fn verify_bucket(&self, bucket: &str) -> Result<()> {
        let buckets = self.store.list_buckets().await?;
        if !buckets.iter().any(|b| b.key == bucket) {
            return Err(Error::BucketNotFound(bucket.to_string()));
        }

        self.emit(SyncEvent::BucketFound {
            bucket: bucket.to_string(),
        });
        Ok(())
    }

    /// Delete every object in `bucket` whose key matches `pattern`
    pub async fn remove_targets(&self, bucket: &str, pattern: &Pattern) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .store
            .list_objects(bucket, "")
            .await?
            .into_iter()
            .map(|object| object.key)
            .filter(|key| pattern.is_match(key))
            .collect();

        if keys.is_empty() {
            tracing::debug!(pattern = %pattern, "No target objects to remove");
            return Ok(keys);
        }

        let deleted = self.store.delete_objects(bucket, keys).await?;
        self.emit(SyncEvent::TargetsRemoved {
            bucket: bucket.to_string(),
            count: deleted.len(),
        });
        Ok(deleted)
    }

    async fn upload(&self, spec: &UploadSpec) -> Result<SyncReport> {
        let mut report = SyncReport::new(SyncMode::Upload, spec);

        // Every key is resolved before the bucket is modified.
        let entries = fileset::resolve_files(&spec.source, &spec.excludes)?;
        tracing::debug!(source = %spec.source, count = entries.len(), "Resolved file set");
        let files = entries
            .iter()
            .map(|entry| resolve_file(spec, entry))
            .collect::<Result<Vec<_>>>()?;

        if let Some(pattern) = &spec.target_remove {
            if !spec.dry_run {
                report.deleted = self.remove_targets(&spec.bucket, pattern).await?;
            }
        }

        for file in files {
            if file.is_directory_skipped {
                self.emit(SyncEvent::DirectorySkipped {
                    path: file.local_path.clone(),
                });
                report.skipped_directories.push(file.local_path);
                continue;
            }

            if file.removed_prefix.is_some() {
                report.strip_matches += 1;
            }

            self.emit(SyncEvent::Uploading {
                local_path: file.local_path.clone(),
                remote_key: file.remote_key.clone(),
                content_type: file.metadata.content_type.clone(),
                removed_prefix: file.removed_prefix.clone(),
                dry_run: spec.dry_run,
            });

            let size_bytes = if spec.dry_run {
                tokio::fs::metadata(&file.local_path).await?.len()
            } else {
                self.put_file(spec, &file).await?
            };

            report.total_bytes += size_bytes;
            report.uploads.push(UploadRecord { file, size_bytes });
        }

        if spec.strip.is_wildcard() && !report.uploads.is_empty() && report.strip_matches == 0 {
            self.emit(SyncEvent::StripUnmatched {
                pattern: spec.strip.to_string(),
                files: report.uploads.len(),
            });
        }

        Ok(report)
    }

    async fn put_file(&self, spec: &UploadSpec, file: &ResolvedFile) -> Result<u64> {
        let result: Result<u64> = async {
            let body = tokio::fs::read(&file.local_path).await?;
            let size = body.len() as u64;
            self.store
                .put_object(&spec.bucket, &file.remote_key, body, &put_options(spec, file))
                .await?;
            Ok(size)
        }
        .await;

        if let Err(e) = &result {
            self.emit(SyncEvent::TransferFailed {
                path: file.local_path.clone(),
                error: e.to_string(),
            });
        }
        result
    }

    async fn download(&self, spec: &UploadSpec) -> Result<SyncReport> {
        let mut report = SyncReport::new(SyncMode::Download, spec);
        let prefix = normalize_path(&normalize_separators(&spec.source));

        let objects = self.store.list_objects(&spec.bucket, &prefix).await?;
        tracing::debug!(prefix = %prefix, count = objects.len(), "Listed remote objects");

        for object in objects.into_iter().filter(|o| !o.is_folder_marker()) {
            let local_path = local_path_for(&spec.target, &prefix, &object.key, spec.strip.as_str());
            let local_display = local_path.to_string_lossy().into_owned();

            self.emit(SyncEvent::Downloading {
                remote_key: object.key.clone(),
                local_path: local_display.clone(),
                dry_run: spec.dry_run,
            });

            let size_bytes = if spec.dry_run {
                object.size_bytes.unwrap_or(0).max(0) as u64
            } else {
                self.get_file(&spec.bucket, &object.key, &local_path).await?
            };

            report.total_bytes += size_bytes;
            report.downloads.push(DownloadRecord {
                key: object.key,
                local_path: local_display,
                size_bytes,
            });
        }

        Ok(report)
    }

    async fn get_file(&self, bucket: &str, key: &str, local_path: &Path) -> Result<u64> {
        let result: Result<u64> = async {
            let body = self.store.get_object(bucket, key).await?;
            if let Some(parent) = local_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(local_path, &body).await?;
            Ok(body.len() as u64)
        }
        .await;

        if let Err(e) = &result {
            self.emit(SyncEvent::TransferFailed {
                path: key.to_string(),
                error: e.to_string(),
            });
        }
        result
    }
}

/// Local destination for a downloaded object
///
/// The relative part is cleaned like an object key, so `..` segments in a key
/// cannot leave `target`. An object whose key equals the prefix lands under
/// its own file name.
fn local_path_for(target: &str, prefix: &str, key: &str, strip_prefix: &str) -> PathBuf {
    let relative = join_key("", &resolve_source(prefix, key, strip_prefix));
    let relative = match relative.trim_start_matches('/') {
        "" => key.rsplit('/').next().unwrap_or(key),
        rest => rest,
    };
    Path::new(target).join(relative)
}
