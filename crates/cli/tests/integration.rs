//! Integration tests for s3up
//!
//! These tests require a running S3-compatible server with an existing
//! bucket.
//!
//! Run with:
//! ```bash
//! # Start RustFS container
//! docker run -d --name rustfs -p 9000:9000 \
//!     -e RUSTFS_ACCESS_KEY=accesskey \
//!     -e RUSTFS_SECRET_KEY=secretkey \
//!     rustfs/rustfs:1.0.0-alpha.81
//!
//! # Run tests
//! TEST_S3_ENDPOINT=http://localhost:9000 TEST_S3_ACCESS_KEY=accesskey \
//!     TEST_S3_SECRET_KEY=secretkey TEST_S3_BUCKET=s3up-test \
//!     cargo test --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

struct TestConfig {
    endpoint: String,
    access_key: String,
    secret_key: String,
    bucket: String,
}

/// Get S3 test configuration from environment
fn get_test_config() -> Option<TestConfig> {
    Some(TestConfig {
        endpoint: std::env::var("TEST_S3_ENDPOINT").ok()?,
        access_key: std::env::var("TEST_S3_ACCESS_KEY").ok()?,
        secret_key: std::env::var("TEST_S3_SECRET_KEY").ok()?,
        bucket: std::env::var("TEST_S3_BUCKET").ok()?,
    })
}

/// Run s3up against the test server with a clean plugin environment
fn run_s3up(config: &TestConfig, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_s3up"));
    for (key, _) in std::env::vars() {
        if key.starts_with("PLUGIN_") {
            cmd.env_remove(key);
        }
    }
    cmd.args([
        "--endpoint",
        &config.endpoint,
        "--access-key",
        &config.access_key,
        "--secret-key",
        &config.secret_key,
        "--bucket",
        &config.bucket,
        "--path-style",
    ]);
    cmd.args(args);
    cmd.output().expect("Failed to execute s3up")
}

/// Generate unique suffix for test resources
fn uuid_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}", duration.as_nanos() % 0xFFFFFFFF)
}

fn write_site(root: &Path) {
    std::fs::create_dir_all(root.join("dist/css")).unwrap();
    std::fs::write(root.join("dist/index.html"), "<html></html>").unwrap();
    std::fs::write(root.join("dist/css/site.css"), "body{}").unwrap();
    std::fs::write(root.join("dist/app.js.map"), "{}").unwrap();
}

/// Remove everything the test uploaded under `prefix`
fn cleanup(config: &TestConfig, prefix: &str) {
    let empty = TempDir::new().unwrap();
    let _ = run_s3up(
        config,
        &[
            "--source",
            &format!("{}/*", empty.path().display()),
            "--target-remove",
            &format!("^{prefix}/"),
            "--match-mode",
            "regex",
        ],
    );
}

#[test]
fn test_upload_then_download_round_trip() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping: S3 test config not available");
        return;
    };

    let prefix = format!("s3up-it-{}", uuid_suffix());
    let workspace = TempDir::new().unwrap();
    write_site(workspace.path());
    let root = workspace.path().display().to_string();

    let output = run_s3up(
        &config,
        &[
            "--source",
            &format!("{root}/dist/**/*"),
            "--exclude",
            &format!("{root}/dist/*.map"),
            "--strip-prefix",
            &format!("{root}/dist"),
            "--target",
            &prefix,
            "--cache-control",
            "max-age=60",
            "--json",
        ],
    );
    assert!(
        output.status.success(),
        "Upload failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let mut keys: Vec<&str> = report["uploads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["remote_key"].as_str().unwrap())
        .collect();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            format!("/{prefix}/css/site.css"),
            format!("/{prefix}/index.html")
        ]
    );

    let download_dir = TempDir::new().unwrap();
    let output = run_s3up(
        &config,
        &[
            "--download",
            "--source",
            &prefix,
            "--target",
            &download_dir.path().display().to_string(),
        ],
    );
    assert!(
        output.status.success(),
        "Download failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        std::fs::read_to_string(download_dir.path().join("index.html")).unwrap(),
        "<html></html>"
    );
    assert_eq!(
        std::fs::read_to_string(download_dir.path().join("css/site.css")).unwrap(),
        "body{}"
    );
    assert!(!download_dir.path().join("app.js.map").exists());

    cleanup(&config, &prefix);
}

#[test]
fn test_unknown_bucket_exit_code() {
    let Some(mut config) = get_test_config() else {
        eprintln!("Skipping: S3 test config not available");
        return;
    };
    config.bucket = format!("s3up-missing-{}", uuid_suffix());

    let workspace = TempDir::new().unwrap();
    write_site(workspace.path());

    let output = run_s3up(
        &config,
        &[
            "--source",
            &format!("{}/dist/*.html", workspace.path().display()),
            "--dry-run",
        ],
    );
    assert_eq!(output.status.code(), Some(5));
}
