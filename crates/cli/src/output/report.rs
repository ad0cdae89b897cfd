//! Rendering of sync reports
//!
//! Dry runs print the full plan as a table; real runs print a one-line
//! summary since every transfer is already in the log.

use std::fmt;

use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use serde::Serialize;

use s3up_core::{SyncMode, SyncReport};

fn human_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// A report plus derived display fields
#[derive(Debug, Serialize)]
pub struct ReportView<'a> {
    #[serde(flatten)]
    report: &'a SyncReport,
    total_size_human: String,
}

impl<'a> ReportView<'a> {
    pub fn new(report: &'a SyncReport) -> Self {
        Self {
            report,
            total_size_human: human_size(report.total_bytes),
        }
    }

    /// Plan table for the transferred (or planned) entries
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);

        match self.report.mode {
            SyncMode::Upload => {
                table.set_header(vec![
                    "source",
                    "key",
                    "content type",
                    "encoding",
                    "cache control",
                    "stripped",
                    "size",
                ]);
                for upload in &self.report.uploads {
                    let meta = &upload.file.metadata;
                    table.add_row(vec![
                        upload.file.local_path.clone(),
                        upload.file.remote_key.clone(),
                        meta.content_type.clone(),
                        meta.content_encoding.clone().unwrap_or_default(),
                        meta.cache_control.clone().unwrap_or_default(),
                        upload.file.removed_prefix.clone().unwrap_or_default(),
                        human_size(upload.size_bytes),
                    ]);
                }
            }
            SyncMode::Download => {
                table.set_header(vec!["key", "destination", "size"]);
                for download in &self.report.downloads {
                    table.add_row(vec![
                        download.key.clone(),
                        download.local_path.clone(),
                        human_size(download.size_bytes),
                    ]);
                }
            }
        }

        table
    }

    /// One-line summary of the run
    pub fn summary(&self) -> String {
        let report = self.report;
        let (verb, direction) = match (report.mode, report.dry_run) {
            (SyncMode::Upload, false) => ("Uploaded", "to"),
            (SyncMode::Upload, true) => ("Would upload", "to"),
            (SyncMode::Download, false) => ("Downloaded", "from"),
            (SyncMode::Download, true) => ("Would download", "from"),
        };

        let count = report.transferred();
        let noun = if count == 1 { "file" } else { "files" };
        let mut summary = format!(
            "{verb} {count} {noun} ({}) {direction} bucket '{}'",
            self.total_size_human, report.bucket
        );

        if !report.deleted.is_empty() {
            summary.push_str(&format!(", removed {} existing", report.deleted.len()));
        }
        if !report.skipped_directories.is_empty() {
            summary.push_str(&format!(
                ", skipped {} {}",
                report.skipped_directories.len(),
                if report.skipped_directories.len() == 1 {
                    "directory"
                } else {
                    "directories"
                }
            ));
        }
        summary
    }
}

impl fmt::Display for ReportView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.report.dry_run && self.report.transferred() > 0 {
            writeln!(f, "{}", self.table())?;
        }
        write!(f, "{}", self.summary())
    }
}
