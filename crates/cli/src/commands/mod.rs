//! CLI command definitions and execution

use clap::Parser;
use clap::builder::FalseyValueParser;

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

pub mod sync;

/// s3up - sync build artifacts with S3-compatible object storage
///
/// Uploads files matching a glob to a bucket, with per-file content type,
/// encoding, cache control and metadata rules. With --download, fetches
/// objects under a prefix instead.
#[derive(Parser, Debug)]
#[command(name = "s3up")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, env = "PLUGIN_JSON", value_parser = FalseyValueParser::new())]
    pub json: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub no_color: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, env = "PLUGIN_DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    #[command(flatten)]
    pub sync: sync::SyncArgs,
}

impl Cli {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color,
            quiet: self.quiet,
        }
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = cli.output_config();
    sync::execute(cli.sync, output_config).await
}
