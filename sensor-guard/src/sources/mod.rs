//! Tabular sensor log ingestion.
//!
//! Sensor exports arrive as delimited text files with inconsistent layouts:
//! some carry a title line above the header, column names vary between
//! exporters, and individual cells may be blank, `null`, or garbage. This
//! module reads such files in bounded batches with [`TabularSource`] and turns
//! every usable `(timestamp, column, value)` triple into a
//! [`SensorEvent`](crate::events::SensorEvent).
//!
//! Everything below the file level is forgiving: malformed rows and cells are
//! skipped, and a file that cannot be read at all yields no events.

use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GuardError, Result};

mod csv;
mod timestamp;

pub use csv::{coerce_cell, FileLayout, RowReader, TabularSource, TimestampedRow};
pub use timestamp::parse_timestamp;

/// Rows per decoded batch.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Rows read to discover column names.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// Options controlling how tabular files are found and read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Rows decoded per batch; bounds memory per file
    pub batch_size: usize,
    /// Rows used to discover the column layout
    pub preview_rows: usize,
    /// Columns that never carry sensor values (matched case-insensitively)
    pub ignored_columns: Vec<String>,
    /// File extension considered tabular, without the dot
    pub extension: String,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            ignored_columns: vec!["Mission_Milestone".to_string()],
            extension: "csv".to_string(),
            delimiter: b',',
        }
    }
}

impl IngestOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_preview_rows(mut self, preview_rows: usize) -> Self {
        self.preview_rows = preview_rows;
        self
    }

    pub fn with_ignored_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether `column` is configured as ignorable.
    pub fn is_ignored(&self, column: &str) -> bool {
        let column = column.trim();
        self.ignored_columns
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(column))
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(GuardError::Configuration(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.preview_rows == 0 {
            return Err(GuardError::Configuration(
                "preview_rows must be greater than zero".to_string(),
            ));
        }
        if self.extension.is_empty() {
            return Err(GuardError::Configuration(
                "extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Recursively finds files with `extension` (case-insensitive) under `root`.
///
/// The result is sorted so that repeated runs visit files in the same order.
///
/// # Errors
///
/// Returns [`GuardError::Configuration`] if `root` is not an existing directory.
pub fn discover_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(GuardError::Configuration(format!(
            "Input root '{}' does not exist or is not a directory",
            root.display()
        )));
    }

    let root_str = root.to_str().ok_or_else(|| {
        GuardError::Configuration("Input root contains invalid UTF-8".to_string())
    })?;
    let pattern = format!(
        "{}/**/*.{}",
        Pattern::escape(root_str.trim_end_matches('/')),
        Pattern::escape(extension)
    );
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let matches = glob_with(&pattern, options).map_err(|e| {
        GuardError::Configuration(format!("Invalid glob pattern '{pattern}': {e}"))
    })?;

    let mut paths = Vec::new();
    for entry in matches {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Skipping unreadable path during discovery"),
        }
    }
    paths.sort();

    debug!(root = %root.display(), files = paths.len(), "Discovered tabular files");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_options() {
        let options = IngestOptions::default();
        assert_eq!(options.batch_size, 10_000);
        assert_eq!(options.preview_rows, 5);
        assert_eq!(options.extension(), "csv");
        assert!(options.is_ignored("Mission_Milestone"));
        assert!(options.is_ignored("mission_milestone "));
        assert!(!options.is_ignored("Temp"));
        options.validate().unwrap();
    }

    #[test]
    fn test_with_extension_strips_dot() {
        let options = IngestOptions::default().with_extension(".tsv");
        assert_eq!(options.extension(), "tsv");
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let options = IngestOptions::default().with_batch_size(0);
        assert!(matches!(
            options.validate(),
            Err(GuardError::Configuration(_))
        ));
    }

    #[test]
    fn test_discover_files_recursive_sorted_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("edeniss2020").join("ams-feg");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("b.csv"), "t,v\n").unwrap();
        fs::write(dir.path().join("a.CSV"), "t,v\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(nested.join("co2.csv"), "t,v\n").unwrap();

        let files = discover_files(dir.path(), "csv").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        assert_eq!(names.len(), 3);
        assert!(names.contains(&"a.CSV".to_string()));
        assert!(names.contains(&"b.csv".to_string()));
        assert!(names.iter().any(|n| n.ends_with("co2.csv")));

        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn test_discover_files_missing_root() {
        let err = discover_files(Path::new("/definitely/not/here"), "csv").unwrap_err();
        assert!(matches!(err, GuardError::Configuration(_)));
    }

    #[test]
    fn test_discover_files_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(discover_files(dir.path(), "csv").unwrap().is_empty());
    }
}
