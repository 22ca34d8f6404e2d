//! Canonical sensor identifiers derived from file paths and column names.

use std::path::{Component, Path};

/// Marker directory of the archival dataset whose files are grouped by subsystem.
pub const DEFAULT_ARCHIVE_MARKER: &str = "edeniss2020";

/// Suffix some exported files carry in their stem (e.g. `VEG_01_EDA.csv`).
pub const DEFAULT_SUFFIX_MARKER: &str = "_EDA";

/// Trailing characters left behind by joined exports (`co2.x`, `rh.y`).
const COLUMN_FILLER: &[char] = &['.', 'x', 'y'];

/// Provenance of a file: its dataset source and optional subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTag {
    pub source: String,
    pub subsystem: Option<String>,
}

/// Derives canonical lowercase sensor ids.
///
/// Resolution is pure: the same `(path, column)` pair always yields the same id.
#[derive(Debug, Clone)]
pub struct SensorIdentityResolver {
    archive_marker: String,
    suffix_marker: String,
}

impl Default for SensorIdentityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_MARKER, DEFAULT_SUFFIX_MARKER)
    }
}

impl SensorIdentityResolver {
    pub fn new(archive_marker: impl Into<String>, suffix_marker: impl Into<String>) -> Self {
        Self {
            archive_marker: archive_marker.into().to_lowercase(),
            suffix_marker: suffix_marker.into().to_lowercase(),
        }
    }

    pub fn archive_marker(&self) -> &str {
        &self.archive_marker
    }

    /// Determines the source (and subsystem, for archival files) of `path`.
    pub fn source_for(&self, path: &Path) -> SourceTag {
        let lowered = path.to_string_lossy().to_lowercase();
        if !self.archive_marker.is_empty() && lowered.contains(&self.archive_marker) {
            return SourceTag {
                source: self.archive_marker.clone(),
                subsystem: self.archive_subsystem(path),
            };
        }

        SourceTag {
            source: self.stem_source(path),
            subsystem: None,
        }
    }

    /// Returns the canonical sensor id for `column` of the file at `path`.
    pub fn resolve(&self, path: &Path, column: &str) -> String {
        self.resolve_with(&self.source_for(path), column)
    }

    /// Like [`resolve`](Self::resolve) but reuses an already computed source tag.
    pub fn resolve_with(&self, tag: &SourceTag, column: &str) -> String {
        let column = clean_column(column);
        match &tag.subsystem {
            Some(subsystem) => format!("{}-{subsystem}-{column}", tag.source),
            None => format!("{}-{column}", tag.source),
        }
    }

    /// Directory directly below the marker component, if the file lives under one.
    fn archive_subsystem(&self, path: &Path) -> Option<String> {
        let parts: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().to_lowercase()),
                _ => None,
            })
            .collect();

        let marker_idx = parts.iter().position(|p| *p == self.archive_marker)?;
        // The last component is the file itself, never a subsystem.
        let dirs_end = parts.len().saturating_sub(1);
        if marker_idx + 1 < dirs_end {
            Some(parts[marker_idx + 1].clone())
        } else {
            None
        }
    }

    fn stem_source(&self, path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let stem = if self.suffix_marker.is_empty() {
            stem
        } else {
            stem.replace(&self.suffix_marker, "")
        };

        let tokens: Vec<&str> = stem.split('_').collect();
        let numeric_tail = tokens
            .last()
            .is_some_and(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()));
        if tokens.len() > 2 && numeric_tail {
            tokens[..2].join("_")
        } else {
            stem
        }
    }
}

/// Normalizes a raw column header into the sensor part of an id.
pub fn clean_column(column: &str) -> String {
    column
        .trim_end_matches(COLUMN_FILLER)
        .trim()
        .replace(' ', "_")
        .to_lowercase()
}
