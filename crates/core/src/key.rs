//! Object key resolution
//!
//! Turns a local path into a remote object key by removing a strip prefix and
//! joining the remainder under a target root. All separator handling happens
//! here with plain string operations, so `\` and `/` inputs resolve to the
//! same key on every platform.
//!
//! A strip prefix comes in two flavours:
//! - literal: a plain string prefix, trimmed without regard to segment
//!   boundaries (`foo` strips `foobar/x` down to `bar/x`)
//! - wildcard: `/`-anchored and containing `*`, `**` or `?`, matched segment
//!   by segment

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};

/// Longest accepted wildcard strip prefix
pub const MAX_STRIP_PREFIX_LEN: usize = 256;

/// Maximum number of wildcard tokens in a strip prefix
pub const MAX_STRIP_WILDCARDS: usize = 20;

/// Replace every `\` with `/`
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Drop one leading `/`, turning an absolute-looking path into a key prefix
pub fn normalize_path(path: &str) -> String {
    path.strip_prefix('/').unwrap_or(path).to_string()
}

fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Check a wildcard strip prefix against the accepted shape
pub fn validate_strip_prefix(pattern: &str) -> Result<()> {
    let pattern = normalize_separators(pattern);

    if !pattern.starts_with('/') {
        return Err(Error::InvalidStripPrefix(format!(
            "'{pattern}' must start with '/'"
        )));
    }

    if pattern.len() > MAX_STRIP_PREFIX_LEN {
        return Err(Error::InvalidStripPrefix(format!(
            "pattern is too long ({} characters, max {MAX_STRIP_PREFIX_LEN})",
            pattern.len()
        )));
    }

    let wildcards = count_wildcards(&pattern);
    if wildcards > MAX_STRIP_WILDCARDS {
        return Err(Error::InvalidStripPrefix(format!(
            "'{pattern}' has too many wildcards ({wildcards}, max {MAX_STRIP_WILDCARDS})"
        )));
    }

    if pattern.contains("//") {
        return Err(Error::InvalidStripPrefix(format!(
            "'{pattern}' contains an empty segment"
        )));
    }

    if pattern
        .split('/')
        .any(|segment| segment.contains("**") && segment != "**")
    {
        return Err(Error::InvalidStripPrefix(format!(
            "'**' in '{pattern}' must be a standalone directory segment"
        )));
    }

    Ok(())
}

/// `**` counts as a single token
fn count_wildcards(pattern: &str) -> usize {
    let mut count = 0;
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                }
                count += 1;
            }
            '?' => count += 1,
            _ => {}
        }
    }
    count
}

/// Compile a wildcard strip prefix into a start-anchored regex
///
/// `*` matches one segment, `**` one or more segments and `?` a single
/// non-separator character. Everything else matches literally.
pub fn pattern_to_regex(pattern: &str) -> Result<Regex> {
    let pattern = normalize_separators(pattern);
    let mut re = String::with_capacity(pattern.len() * 2 + 1);
    re.push('^');

    let mut chars = pattern.chars().peekable();
    let mut literal = [0u8; 4];
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                re.push_str(".+");
            }
            '*' => re.push_str("[^/]+"),
            '?' => re.push_str("[^/]"),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }

    Regex::new(&re).map_err(|e| Error::invalid_pattern(pattern, e))
}

/// A validated, compiled wildcard prefix
#[derive(Debug, Clone)]
pub struct WildcardPrefix {
    source: String,
    regex: Regex,
}

impl WildcardPrefix {
    pub fn new(pattern: &str) -> Result<Self> {
        validate_strip_prefix(pattern)?;
        Ok(Self {
            source: normalize_separators(pattern),
            regex: pattern_to_regex(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// How the leading part of a local path is removed before keying
#[derive(Debug, Clone)]
pub enum StripPattern {
    /// Plain string prefix; empty means "strip nothing"
    Literal(String),
    /// Anchored segment-aware pattern
    Wildcard(WildcardPrefix),
}

impl Default for StripPattern {
    fn default() -> Self {
        StripPattern::Literal(String::new())
    }
}

/// Result of applying a [`StripPattern`] to a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    /// Whatever is left of the path
    pub remainder: String,
    /// The span that was removed, if the pattern matched
    pub removed: Option<String>,
}

impl StripPattern {
    /// Parse a configured strip prefix
    ///
    /// Wildcard mode applies only when the normalized prefix starts with `/`
    /// and contains `*` or `?`; everything else is a literal prefix.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_separators(raw);
        if normalized.starts_with('/') && has_wildcards(&normalized) {
            Ok(StripPattern::Wildcard(WildcardPrefix::new(&normalized)?))
        } else {
            Ok(StripPattern::Literal(normalized))
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, StripPattern::Wildcard(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, StripPattern::Literal(prefix) if prefix.is_empty())
    }

    pub fn as_str(&self) -> &str {
        match self {
            StripPattern::Literal(prefix) => prefix,
            StripPattern::Wildcard(wildcard) => wildcard.as_str(),
        }
    }

    /// Remove the prefix from an already normalized path
    ///
    /// A path the pattern does not match is returned unchanged. Removing
    /// everything but an optional `/` is an error: the key has to keep at
    /// least the file name.
    pub fn strip(&self, path: &str) -> Result<Stripped> {
        let removed = match self {
            StripPattern::Literal(prefix) if prefix.is_empty() => None,
            StripPattern::Literal(prefix) => path.starts_with(prefix.as_str()).then_some(prefix.len()),
            StripPattern::Wildcard(wildcard) => wildcard.regex.find(path).map(|m| m.end()),
        };

        let Some(end) = removed else {
            return Ok(Stripped {
                remainder: path.to_string(),
                removed: None,
            });
        };

        let remainder = &path[end..];
        if remainder.is_empty() || remainder == "/" {
            return Err(Error::Resolution(format!(
                "strip prefix '{}' removes entire path '{path}'",
                self.as_str()
            )));
        }

        Ok(Stripped {
            remainder: remainder.to_string(),
            removed: Some(path[..end].to_string()),
        })
    }
}

impl fmt::Display for StripPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    /// Key, always `/`-prefixed
    pub key: String,
    /// Portion of the local path removed by the strip prefix
    pub removed: Option<String>,
}

/// Compute the object key for `local_path` under `target`
pub fn resolve_key(target: &str, local_path: &str, strip: &StripPattern) -> Result<ResolvedKey> {
    let path = normalize_separators(local_path);
    let stripped = strip.strip(&path)?;
    Ok(ResolvedKey {
        key: join_key(&normalize_separators(target), &stripped.remainder),
        removed: stripped.removed,
    })
}

/// Join `target` and `rest` into a clean, `/`-rooted key
///
/// Empty and `.` segments are dropped and `..` removes the previous segment,
/// never climbing above the root.
pub fn join_key(target: &str, rest: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in target.split('/').chain(rest.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Compute the local relative path for a downloaded object
///
/// `source_dir` is removed as a plain string prefix along with one leading
/// `/`, then `strip_prefix` is prepended verbatim, without a separator.
pub fn resolve_source(source_dir: &str, object_key: &str, strip_prefix: &str) -> String {
    let rest = object_key.strip_prefix(source_dir).unwrap_or(object_key);
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    format!("{strip_prefix}{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(target: &str, path: &str, strip: &str) -> String {
        resolve_key(target, path, &StripPattern::parse(strip).unwrap())
            .unwrap()
            .key
    }

    fn strip(path: &str, pattern: &str) -> Result<String> {
        StripPattern::parse(pattern)?
            .strip(&normalize_separators(path))
            .map(|s| s.remainder)
    }

    #[test]
    fn test_resolve_key_literal() {
        assert_eq!(key("hello", "/foo/bar", "/foo"), "/hello/bar");
        assert_eq!(key("", "/foo/bar", "/foo"), "/bar");
        assert_eq!(key("/hello", "/foo/bar", ""), "/hello/foo/bar");
    }

    #[test]
    fn test_resolve_key_backslashes() {
        assert_eq!(key("hello", r"foo\bar", ""), "/hello/foo/bar");
        assert_eq!(key("hello", r"foo\bar\world", r"foo\bar"), "/hello/world");
        assert_eq!(key("hello", r"foo\bar\world", "foo/bar"), "/hello/world");
        assert_eq!(key("hello", "foo/bar/world", r"foo\bar"), "/hello/world");
        assert_eq!(key(r"releases\v1", "app.zip", ""), "/releases/v1/app.zip");
    }

    #[test]
    fn test_literal_strip_is_not_segment_aware() {
        assert_eq!(key("", "foobar/baz.txt", "foo"), "/bar/baz.txt");
        assert_eq!(key("out", "dist/app.js", "di"), "/out/st/app.js");
    }

    #[test]
    fn test_literal_strip_no_match_leaves_path() {
        assert_eq!(key("t", "src/app.js", "dist/"), "/t/src/app.js");
    }

    #[test]
    fn test_relative_wildcard_is_literal() {
        let pattern = StripPattern::parse("build/*/").unwrap();
        assert!(!pattern.is_wildcard());
        assert_eq!(key("t", "build/x/app.zip", "build/*/"), "/t/build/x/app.zip");
    }

    #[test]
    fn test_resolve_key_wildcards() {
        let cases = [
            (
                "deployment",
                "/harness/artifacts/build-123/module1/app.zip",
                "/harness/artifacts/*/",
                "/deployment/module1/app.zip",
            ),
            (
                "releases",
                "/harness/artifacts/build-456/services/auth/v1.0/auth-service.zip",
                "/harness/artifacts/**/services/",
                "/releases/auth/v1.0/auth-service.zip",
            ),
            (
                "upload",
                "/harness/artifacts/build1/app.zip",
                "/harness/artifacts/build?/",
                "/upload/app.zip",
            ),
            (
                "backup",
                "/harness/artifacts/build123/lib.zip",
                "/harness/artifacts/",
                "/backup/build123/lib.zip",
            ),
            (
                "fallback",
                "/different/location/file.zip",
                "/harness/artifacts/*/",
                "/fallback/different/location/file.zip",
            ),
        ];

        for (target, path, pattern, want) in cases {
            assert_eq!(key(target, path, pattern), want, "{pattern} on {path}");
        }
    }

    #[test]
    fn test_resolve_key_reports_removed_span() {
        let pattern = StripPattern::parse("/harness/artifacts/*/").unwrap();
        let resolved =
            resolve_key("deploy", "/harness/artifacts/b-9/mod/app.zip", &pattern).unwrap();
        assert_eq!(resolved.key, "/deploy/mod/app.zip");
        assert_eq!(resolved.removed.as_deref(), Some("/harness/artifacts/b-9/"));

        let resolved = resolve_key("deploy", "/elsewhere/app.zip", &pattern).unwrap();
        assert_eq!(resolved.removed, None);
    }

    #[test]
    fn test_strip_wildcard_prefix() {
        let cases = [
            ("/harness/artifacts/9f2c1b/module/app.zip", "/harness/artifacts/*/", "module/app.zip"),
            ("/harness/artifacts/hash/nightly/lib.zip", "/harness/artifacts/*/*/", "lib.zip"),
            ("/harness/artifacts/a/b/c/doc.zip", "/harness/artifacts/*/*/*/", "doc.zip"),
            ("/harness/artifacts/x/y/z/file.zip", "/harness/artifacts/**/", "file.zip"),
            ("/different/path/file.zip", "/harness/artifacts/*/", "/different/path/file.zip"),
            ("/harness/artifacts/build123/services/app.zip", "/harness/artifacts/*/services/", "app.zip"),
            ("/harness/artifacts/build1/app.zip", "/harness/artifacts/build?/", "app.zip"),
            ("/harness/artifacts/build/app.zip", "/harness/artifacts/", "build/app.zip"),
            ("/build/app.zip", "/*/", "app.zip"),
            (
                "/harness/artifacts/build-123/services/auth/v1.2/auth-service.zip",
                "/harness/artifacts/*/services/*/",
                "v1.2/auth-service.zip",
            ),
            (
                "/harness/artifacts/very/deep/nested/structure/file.zip",
                "/harness/artifacts/**/structure/",
                "file.zip",
            ),
            ("/harness/artifacts/build123/app.zip", "/harness/artifacts/build???/", "app.zip"),
            ("/harness/artifacts/build/app.zip", "", "/harness/artifacts/build/app.zip"),
        ];

        for (path, pattern, want) in cases {
            assert_eq!(strip(path, pattern).unwrap(), want, "{pattern} on {path}");
        }
    }

    #[test]
    fn test_strip_entire_path_is_error() {
        let err = strip(
            "/harness/artifacts/build/app.zip",
            "/harness/artifacts/build/app.zip",
        )
        .unwrap_err();
        assert!(err.to_string().contains("removes entire path"), "{err}");

        let err = strip("/build/app.zip", "/*/*").unwrap_err();
        assert!(err.to_string().contains("removes entire path"), "{err}");
    }

    #[test]
    fn test_pattern_to_regex() {
        let cases = [
            ("/harness/artifacts/*/", "/harness/artifacts/build123/", true),
            ("/harness/artifacts/**/", "/harness/artifacts/build123/module1/deep/", true),
            ("/harness/artifacts/build?/", "/harness/artifacts/build1/", true),
            ("/harness/artifacts/build?/", "/harness/artifacts/build123/", false),
            ("/a.b/*/", "/aXb/c/", false),
            ("/harness/*/", "/other/harness/x/", false),
        ];

        for (pattern, path, want) in cases {
            let re = pattern_to_regex(pattern).unwrap();
            assert_eq!(re.is_match(path), want, "{pattern} on {path}");
        }
    }

    #[test]
    fn test_validate_strip_prefix() {
        let cases = [
            ("harness/artifacts/*/".to_string(), "must start with '/'"),
            (
                format!("/{}*/", "very-long-directory-name/".repeat(15)),
                "too long",
            ),
            (format!("/{}", "*/".repeat(21)), "too many wildcards"),
            ("/harness//artifacts/*/".to_string(), "empty segment"),
            (
                "/harness/**artifacts/*/".to_string(),
                "standalone directory segment",
            ),
        ];

        for (pattern, want) in cases {
            let err = validate_strip_prefix(&pattern).unwrap_err();
            assert!(err.to_string().contains(want), "{pattern}: {err}");
        }

        assert!(validate_strip_prefix(&format!("/{}", "*/".repeat(20))).is_ok());
        assert!(validate_strip_prefix("/harness/**/services/").is_ok());
    }

    #[test]
    fn test_invalid_wildcard_prefix_rejected_at_parse() {
        assert!(matches!(
            StripPattern::parse("/harness//artifacts/*/"),
            Err(Error::InvalidStripPrefix(_))
        ));
    }

    #[test]
    fn test_windows_style_patterns() {
        assert!(validate_strip_prefix(r"\harness\artifacts\*/").is_ok());
        assert!(validate_strip_prefix(r"\\harness\\artifacts\\*/").is_err());
        assert!(validate_strip_prefix(r"C:\\harness\\artifacts\\*/").is_err());

        assert_eq!(
            strip("/harness/artifacts/abc123/module/app.zip", r"\harness\artifacts\*/").unwrap(),
            "module/app.zip"
        );
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key("", ""), "/");
        assert_eq!(join_key("a/", "/b//c/"), "/a/b/c");
        assert_eq!(join_key("a/./b", "../c"), "/a/c");
        assert_eq!(join_key("", "../../x"), "/x");
    }

    #[test]
    fn test_normalize_path() {
        let cases = [
            ("/path/to/file.txt", "path/to/file.txt"),
            (r"C:\Users\username\Documents\file.doc", r"C:\Users\username\Documents\file.doc"),
            ("relative/path/to/file", "relative/path/to/file"),
            ("file.txt", "file.txt"),
            ("/root/directory/", "root/directory/"),
            ("no_slash", "no_slash"),
        ];

        for (input, want) in cases {
            assert_eq!(normalize_path(input), want);
        }
    }

    #[test]
    fn test_resolve_source() {
        let cases = [
            ("/home/user/documents", "/home/user/documents/file.txt", "output-", "output-file.txt"),
            ("assets", "assets/images/logo.png", "", "images/logo.png"),
            ("/var/www/html", "/var/www/html/pages/index.html", "web", "webpages/index.html"),
            ("dist", "dist/js/app.js", "public", "publicjs/app.js"),
        ];

        for (source_dir, object_key, prefix, want) in cases {
            assert_eq!(resolve_source(source_dir, object_key, prefix), want);
        }
    }
}
