//! s3up - sync build artifacts with S3-compatible object storage
//!
//! Runs as a CI pipeline step: settings come from flags, `PLUGIN_*`
//! environment variables or a TOML file.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use s3up::commands::{self, Cli};
use s3up::exit_code::ExitCode;

fn init_tracing(cli: &Cli) {
    let fallback = if cli.debug {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color && !cli.json),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let exit_code = commands::execute(cli).await;
    if exit_code != ExitCode::Success {
        tracing::debug!(%exit_code, "Exiting");
    }

    std::process::exit(exit_code.into());
}
