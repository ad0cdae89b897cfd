//! Local file set expansion
//!
//! Expands the include glob, removes everything produced by the exclude
//! globs and classifies directory matches. Exclusion compares path strings
//! exactly, so include and exclude patterns must share the same root form
//! (both relative or both absolute) to cancel each other out.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};

/// A path produced by expanding the include pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// Path exactly as produced by glob expansion
    pub path: String,
    /// Directory matched alongside other entries; nothing to upload
    pub is_dir: bool,
}

/// Expand one glob pattern into path strings, in glob traversal order
pub fn expand(pattern: &str) -> Result<Vec<String>> {
    let paths = glob::glob(pattern).map_err(|e| Error::invalid_pattern(pattern, e))?;

    paths
        .map(|entry| {
            entry
                .map(|path| path.to_string_lossy().into_owned())
                .map_err(|e| {
                    Error::Config(format!(
                        "Cannot read '{}' while expanding '{pattern}': {}",
                        e.path().display(),
                        e.error()
                    ))
                })
        })
        .collect()
}

/// `expand(include)` minus every path produced by the exclude patterns
///
/// The result has no duplicates and keeps expansion order.
pub fn matches(include: &str, excludes: &[String]) -> Result<Vec<String>> {
    let mut excluded = HashSet::new();
    for pattern in excludes {
        excluded.extend(expand(pattern)?);
    }

    let mut seen = HashSet::new();
    Ok(expand(include)?
        .into_iter()
        .filter(|path| !excluded.contains(path))
        .filter(|path| seen.insert(path.clone()))
        .collect())
}

/// Reject a directory given as the source without a glob
///
/// `source` pointing at a directory is only acceptable when more than one of
/// `matches` lives under it, meaning a glob picked up its contents. A source
/// that does not exist is left for expansion to report as an empty set.
pub fn check_directory_source(source: &str, matches: &[String]) -> Result<()> {
    let Ok(metadata) = std::fs::metadata(source) else {
        return Ok(());
    };

    if metadata.is_dir() {
        let under = matches.iter().filter(|m| m.starts_with(source)).count();
        if under <= 1 {
            return Err(Error::Resolution(format!(
                "directory '{source}' specified without glob pattern"
            )));
        }
    }

    Ok(())
}

/// Expand, exclude and classify the local file set
///
/// A directory that is the only match fails the same way a bare directory
/// source does, whatever glob produced it.
pub fn resolve_files(include: &str, excludes: &[String]) -> Result<Vec<LocalEntry>> {
    let paths = matches(include, excludes)?;
    check_directory_source(include, &paths)?;

    if let [only] = paths.as_slice() {
        if Path::new(only).is_dir() {
            return Err(Error::Resolution(format!(
                "directory '{only}' specified without glob pattern"
            )));
        }
    }

    Ok(paths
        .into_iter()
        .map(|path| {
            let is_dir = Path::new(&path).is_dir();
            LocalEntry { path, is_dir }
        })
        .collect())
}
