//! Candidate selection from manifest records.
//!
//! Product file names carry a data-type code at bytes 4..8 (e.g. `OFFL`,
//! `NRTI`) and a day token at bytes 20..28 (`YYYYMMDD`). Records are grouped
//! by day; a day is downloadable when it has exactly one product variant, or
//! exactly two where only the offline variant is taken.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::manifest::ManifestRecord;

/// Byte range of the data-type code within a product name.
const DATA_TYPE_RANGE: std::ops::Range<usize> = 4..8;

/// Byte range of the day token within a product name.
const DAY_RANGE: std::ops::Range<usize> = 20..28;

/// A manifest record with its derived name fields.
#[derive(Debug, Clone)]
pub struct DerivedRecord {
    pub record: ManifestRecord,
    /// Four-character product variant code.
    pub data_type: String,
    /// Eight-character `YYYYMMDD` day bucket.
    pub day: String,
}

impl DerivedRecord {
    /// Derive the data-type and day fields from a record's name.
    ///
    /// Returns `None` when the name is too short to carry both fields; such
    /// records are malformed and cannot be classified.
    pub fn derive(record: ManifestRecord) -> Option<Self> {
        let data_type = record.name.get(DATA_TYPE_RANGE)?.to_string();
        let day = record.name.get(DAY_RANGE)?.to_string();
        Some(Self {
            record,
            data_type,
            day,
        })
    }
}

/// A single pending download: remote locator plus local destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub remote_url: String,
    pub local_path: PathBuf,
}

/// Selects downloadable candidates from manifest records.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    offline_type: String,
}

impl CandidateFilter {
    /// Create a filter preferring the given variant code on two-variant days.
    pub fn new(offline_type: impl Into<String>) -> Self {
        Self {
            offline_type: offline_type.into(),
        }
    }

    /// Filter records down to the download work list.
    ///
    /// A record is kept iff its day has exactly two distinct variants and the
    /// record is the offline variant, or its day has exactly one variant.
    /// Days with three or more variants yield nothing. Input order is
    /// preserved; malformed names are dropped with a warning.
    pub fn filter(&self, records: Vec<ManifestRecord>, incoming_dir: &Path) -> Vec<Candidate> {
        let derived: Vec<DerivedRecord> = records
            .into_iter()
            .filter_map(|record| match DerivedRecord::derive(record.clone()) {
                Some(derived) => Some(derived),
                None => {
                    warn!(name = %record.name, "malformed product name, skipping");
                    None
                }
            })
            .collect();

        let mut types_per_day: HashMap<&str, HashSet<&str>> = HashMap::new();
        for d in &derived {
            types_per_day
                .entry(d.day.as_str())
                .or_default()
                .insert(d.data_type.as_str());
        }

        derived
            .iter()
            .filter(|d| {
                let count = types_per_day[d.day.as_str()].len();
                (count == 2 && d.data_type == self.offline_type) || count == 1
            })
            .map(|d| Candidate {
                remote_url: d.record.path.clone(),
                local_path: incoming_dir.join(&d.record.name),
            })
            .collect()
    }
}
