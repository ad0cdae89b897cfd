//! sync command - Upload build artifacts or download them back
//!
//! Every flag can also be set through a `PLUGIN_*` environment variable, the
//! way CI runners pass plugin settings.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use clap::builder::FalseyValueParser;
use s3up_core::{
    ConfigManager, MatchMode, Result, RuleSetting, Settings, Syncer, UploadSpec,
};
use s3up_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ReportView};

/// Sync files between the local workspace and a bucket
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// TOML settings file; flags and environment override its values
    #[arg(long, env = "PLUGIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Custom endpoint URL (MinIO, RustFS, ...)
    #[arg(long, env = "PLUGIN_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, env = "PLUGIN_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    #[arg(long, env = "PLUGIN_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, env = "PLUGIN_BUCKET")]
    pub bucket: Option<String>,

    /// Bucket region [default: us-east-1]
    #[arg(long, env = "PLUGIN_REGION")]
    pub region: Option<String>,

    /// Canned ACL for uploaded objects [default: private]
    #[arg(long, env = "PLUGIN_ACL")]
    pub acl: Option<String>,

    /// Files to upload (glob), or the remote prefix to download
    #[arg(long, env = "PLUGIN_SOURCE")]
    pub source: Option<String>,

    /// Key prefix to upload under, or the local directory to download into
    #[arg(long, env = "PLUGIN_TARGET")]
    pub target: Option<String>,

    /// Prefix removed from local paths; `/`-rooted prefixes may use `*`, `**` and `?`
    #[arg(long, env = "PLUGIN_STRIP_PREFIX")]
    pub strip_prefix: Option<String>,

    /// Glob of files to leave out
    #[arg(long, env = "PLUGIN_EXCLUDE", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Content type: a value, or a JSON object of pattern to value
    #[arg(long, env = "PLUGIN_CONTENT_TYPE")]
    pub content_type: Option<String>,

    /// Content encoding: a value, or a JSON object of pattern to value
    #[arg(long, env = "PLUGIN_CONTENT_ENCODING")]
    pub content_encoding: Option<String>,

    /// Cache control: a value, or a JSON object of pattern to value
    #[arg(long, env = "PLUGIN_CACHE_CONTROL")]
    pub cache_control: Option<String>,

    /// User metadata: a JSON map, or a JSON object of pattern to map
    #[arg(long, env = "PLUGIN_METADATA")]
    pub metadata: Option<String>,

    /// Server-side encryption, e.g. AES256 or aws:kms
    #[arg(long, env = "PLUGIN_ENCRYPTION")]
    pub encryption: Option<String>,

    #[arg(long, env = "PLUGIN_STORAGE_CLASS")]
    pub storage_class: Option<String>,

    /// Use path-style addressing
    #[arg(long, env = "PLUGIN_PATH_STYLE", value_parser = FalseyValueParser::new())]
    pub path_style: bool,

    /// Resolve and report without transferring anything
    #[arg(long, env = "PLUGIN_DRY_RUN", value_parser = FalseyValueParser::new())]
    pub dry_run: bool,

    /// Download objects under SOURCE into TARGET instead of uploading
    #[arg(long, env = "PLUGIN_DOWNLOAD", value_parser = FalseyValueParser::new())]
    pub download: bool,

    /// Delete remote objects whose key matches this pattern before uploading
    #[arg(long, env = "PLUGIN_TARGET_REMOVE")]
    pub target_remove: Option<String>,

    /// How rule table patterns are interpreted: regex or glob [default: regex]
    #[arg(long, env = "PLUGIN_MATCH_MODE")]
    pub match_mode: Option<MatchMode>,
}

impl SyncArgs {
    /// Settings given on the command line or through the environment
    ///
    /// Boolean flags can only switch a setting on.
    pub fn to_settings(&self) -> Result<Settings> {
        let metadata = self
            .metadata
            .as_deref()
            .map(RuleSetting::<BTreeMap<String, String>>::from_json)
            .transpose()?;

        Ok(Settings {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            acl: self.acl.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            strip_prefix: self.strip_prefix.clone(),
            exclude: self.exclude.clone(),
            content_type: self.content_type.as_deref().map(RuleSetting::<String>::from_flag),
            content_encoding: self
                .content_encoding
                .as_deref()
                .map(RuleSetting::<String>::from_flag),
            cache_control: self.cache_control.as_deref().map(RuleSetting::<String>::from_flag),
            metadata,
            encryption: self.encryption.clone(),
            storage_class: self.storage_class.clone(),
            path_style: self.path_style.then_some(true),
            dry_run: self.dry_run.then_some(true),
            download: self.download.then_some(true),
            target_remove: self.target_remove.clone(),
            match_mode: self.match_mode,
            schema_version: None,
        })
    }

    /// Load the settings file, layer flags on top and validate
    pub fn load_spec(&self) -> Result<UploadSpec> {
        let file = match &self.config {
            Some(path) => ConfigManager::with_path(path).load()?,
            None => Settings::default(),
        };
        UploadSpec::try_from(file.merge(self.to_settings()?))
    }
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let spec = match args.load_spec() {
        Ok(spec) => spec,
        Err(e) => {
            formatter.error(&format!("Invalid configuration: {e}"));
            return ExitCode::from(&e);
        }
    };

    tracing::debug!(?spec, "Loaded configuration");

    let client = match S3Client::new(&spec.connection).await {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to create S3 client: {e}"));
            return ExitCode::from(&e);
        }
    };

    match Syncer::new(client).run(&spec).await {
        Ok(report) => {
            if report.transferred() == 0 {
                formatter.warning(&format!("Nothing matched source '{}'", spec.source));
            }
            formatter.output(&ReportView::new(&report));
            ExitCode::Success
        }
        Err(e) => {
            tracing::error!(error = %e, bucket = %spec.bucket, "Sync failed");
            formatter.error(&e.to_string());
            ExitCode::from(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use s3up_core::Error;
    use std::io::Write;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        args: SyncArgs,
    }

    fn parse(argv: &[&str]) -> SyncArgs {
        TestCli::try_parse_from(std::iter::once("s3up").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_flags_to_settings() {
        let args = parse(&[
            "--bucket",
            "artifacts",
            "--source",
            "dist/**/*",
            "--exclude",
            "dist/*.map,dist/tmp/*",
            "--content-type",
            r#"{"*.cgz": "text/css"}"#,
            "--cache-control",
            "public, max-age=300",
            "--metadata",
            r#"{"team": "web"}"#,
            "--match-mode",
            "glob",
            "--dry-run",
        ]);

        let settings = args.to_settings().unwrap();
        assert_eq!(settings.exclude, vec!["dist/*.map", "dist/tmp/*"]);
        assert_eq!(
            settings.cache_control,
            Some(RuleSetting::Scalar("public, max-age=300".into()))
        );
        assert!(matches!(settings.content_type, Some(RuleSetting::Table(_))));
        assert!(matches!(settings.metadata, Some(RuleSetting::Scalar(_))));
        assert_eq!(settings.dry_run, Some(true));
        assert_eq!(settings.download, None);
        assert_eq!(settings.match_mode, Some(MatchMode::Glob));
    }

    #[test]
    fn test_invalid_metadata_json() {
        let args = parse(&["--metadata", "{not json"]);
        assert!(matches!(args.to_settings(), Err(Error::Json(_))));
    }

    #[test]
    fn test_invalid_match_mode_rejected_by_parser() {
        let result =
            TestCli::try_parse_from(["s3up", "--bucket", "b", "--match-mode", "fnmatch"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bucket = \"from-file\"\nsource = \"dist/*\"\nregion = \"eu-central-1\"\nacl = \"public-read\""
        )
        .unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let args = parse(&["--config", &path, "--bucket", "from-flag"]);
        let spec = args.load_spec().unwrap();

        assert_eq!(spec.bucket, "from-flag");
        assert_eq!(spec.source, "dist/*");
        assert_eq!(spec.connection.region, "eu-central-1");
        assert_eq!(spec.acl, "public-read");
    }

    #[test]
    fn test_missing_config_file() {
        let args = parse(&["--config", "/non/existent/s3up.toml"]);
        let err = args.load_spec().unwrap_err();
        assert_eq!(ExitCode::from(&err), ExitCode::ConfigError);
    }
}
