//! Manifest listing discovery and parsing.
//!
//! Manifests are two-column, header-less CSV files mapping product file names
//! to their remote locators. File names embed a date
//! (`prefix_YYYY-MM-..._...csv`), so descending lexicographic order is
//! newest-first. A partition restricts a run to a fixed month range, allowing
//! the archive to be sharded across parallel invocations.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{IngestError, IngestResult};

/// Extension of manifest listing files.
pub const MANIFEST_EXTENSION: &str = "csv";

/// One row of a manifest listing.
///
/// `name` is the canonical product file name, used for de-duplication and as
/// the destination filename; `path` is the remote locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub name: String,
    pub path: String,
}

/// Month-range bucket sharding manifest processing across invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// January through April.
    One,
    /// May through August.
    Two,
    /// September through December.
    Three,
}

impl Partition {
    /// The months this partition covers.
    pub fn months(&self) -> [u32; 4] {
        match self {
            Partition::One => [1, 2, 3, 4],
            Partition::Two => [5, 6, 7, 8],
            Partition::Three => [9, 10, 11, 12],
        }
    }

    /// Whether `month` (1-12) belongs to this partition.
    pub fn covers(&self, month: u32) -> bool {
        self.months().contains(&month)
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Partition::One),
            "2" => Ok(Partition::Two),
            "3" => Ok(Partition::Three),
            other => Err(format!("partition must be 1, 2 or 3, got '{}'", other)),
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::One => write!(f, "1"),
            Partition::Two => write!(f, "2"),
            Partition::Three => write!(f, "3"),
        }
    }
}

/// Reads manifest listings from a directory into one ordered record table.
#[derive(Debug)]
pub struct ManifestReader {
    dir: PathBuf,
}

impl ManifestReader {
    /// Create a reader over the given manifest directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read all manifest listings, optionally restricted to a partition.
    ///
    /// Listings are processed newest-first (descending filename order); rows
    /// keep their in-file order. A listing that cannot be parsed is skipped
    /// with a diagnostic. An empty result is valid: callers must handle zero
    /// candidates.
    ///
    /// # Errors
    ///
    /// Only failure to list the manifest directory itself is an error.
    pub fn read(&self, partition: Option<Partition>) -> IngestResult<Vec<ManifestRecord>> {
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .map_err(|e| IngestError::ReadFailed {
                path: self.dir.clone(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                Path::new(name)
                    .extension()
                    .is_some_and(|ext| ext == MANIFEST_EXTENSION)
            })
            .collect();

        if let Some(partition) = partition {
            names.retain(|name| match embedded_month(name) {
                Some(month) => partition.covers(month),
                None => {
                    warn!(manifest = %name, "manifest filename has no parseable month, skipping");
                    false
                }
            });
        }

        // Names are date-prefixed, so descending order is newest-first.
        names.sort_by(|a, b| b.cmp(a));

        let mut records = Vec::new();
        for name in &names {
            let path = self.dir.join(name);
            match read_listing(&path) {
                Some(rows) => records.extend(rows),
                None => debug!(manifest = %path.display(), "no data in manifest listing"),
            }
        }

        Ok(records)
    }
}

/// Extract the month from a manifest filename (`prefix_YYYY-MM-..._...`).
///
/// The date is the second underscore-delimited field; the month is its second
/// hyphen-delimited field.
fn embedded_month(filename: &str) -> Option<u32> {
    let date = filename.split('_').nth(1)?;
    let month: u32 = date.split('-').nth(1)?.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

/// Parse one listing as two-column header-less CSV.
///
/// Returns `None` for an empty or malformed listing; the caller skips it.
fn read_listing(path: &Path) -> Option<Vec<ManifestRecord>> {
    debug!(manifest = %path.display(), "reading manifest listing");

    let mut reader = match csv::ReaderBuilder::new().has_headers(false).from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            debug!(manifest = %path.display(), error = %e, "cannot open manifest listing");
            return None;
        }
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(manifest = %path.display(), error = %e, "malformed manifest row");
                return None;
            }
        };
        let (Some(name), Some(path_field)) = (record.get(0), record.get(1)) else {
            debug!(manifest = %path.display(), "manifest row is missing a column");
            return None;
        };
        rows.push(ManifestRecord {
            name: name.to_string(),
            path: path_field.to_string(),
        });
    }

    if rows.is_empty() {
        return None;
    }
    Some(rows)
}
