//! Run orchestration.
//!
//! Composes the pipeline: local inventory and integrity gate, manifest
//! resolution, candidate filtering, then the download engine. Data flows one
//! direction; the orchestrator owns the work list and the concurrency gate.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::info;

use crate::candidate::CandidateFilter;
use crate::config::IngestConfig;
use crate::download::{DownloadEngine, Transport};
use crate::error::{IngestError, IngestResult};
use crate::integrity::{IntegrityChecker, IntegrityProbe};
use crate::manifest::ManifestReader;

/// End-of-run accounting.
#[derive(Debug)]
pub struct RunSummary {
    /// Manifest rows skipped because the file was already present and valid.
    pub already_valid: usize,
    /// Candidates handed to the download engine.
    pub attempted: usize,
    /// Candidates downloaded to completion.
    pub completed: usize,
    /// Candidates abandoned after retry exhaustion.
    pub abandoned: usize,
    /// Bytes written by successful downloads.
    pub bytes: u64,
    /// Wall-clock duration of the whole run.
    pub elapsed: Duration,
}

/// Composes manifest resolution, integrity checking, and downloading.
pub struct Ingestor<T, P> {
    config: IngestConfig,
    transport: Arc<T>,
    checker: IntegrityChecker<P>,
}

impl<T: Transport + 'static, P: IntegrityProbe> Ingestor<T, P> {
    pub fn new(config: IngestConfig, transport: T, probe: P) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            checker: IntegrityChecker::new(probe),
        }
    }

    /// Execute one ingestion run.
    ///
    /// Per-candidate failures never fail the run; the summary and the logs
    /// are the only record of them. Errors are limited to setup problems
    /// (unlistable directories, unreadable manifest directory).
    pub async fn run(&self) -> IngestResult<RunSummary> {
        let start = Instant::now();
        let config = &self.config;

        // Local inventory: everything with the product prefix in either
        // directory, then the integrity gate over the incoming files.
        let processed = list_with_prefix(&config.processed_dir, &config.file_prefix)?;
        let incoming = list_with_prefix(&config.incoming_dir, &config.file_prefix)?;

        let mut validated: HashSet<String> = self
            .checker
            .check(&incoming, &config.incoming_dir)
            .into_iter()
            .collect();
        if config.trust_processed {
            // Processed files are immutable once handed off; trusted as-is.
            validated.extend(processed);
        } else {
            validated.extend(self.checker.check(&processed, &config.processed_dir));
        }
        info!(validated = validated.len(), "local inventory validated");

        let records = ManifestReader::new(&config.manifest_dir).read(Some(config.partition))?;
        let total_records = records.len();
        let records: Vec<_> = records
            .into_iter()
            .filter(|r| !validated.contains(&r.name))
            .collect();
        let already_valid = total_records - records.len();

        let candidates = CandidateFilter::new(config.offline_type.as_str())
            .filter(records, &config.incoming_dir);
        info!(
            manifest_rows = total_records,
            already_valid,
            candidates = candidates.len(),
            "work list resolved"
        );

        let gate = Arc::new(Semaphore::new(config.max_concurrent_downloads));
        let engine = DownloadEngine::new(
            Arc::clone(&self.transport),
            gate,
            config.retry.clone(),
            config.value_suffix.as_str(),
        );
        let report = engine.run(candidates).await;

        let summary = RunSummary {
            already_valid,
            attempted: report.outcomes.len(),
            completed: report.completed(),
            abandoned: report.abandoned(),
            bytes: report.total_bytes(),
            elapsed: start.elapsed(),
        };
        info!(
            completed = summary.completed,
            abandoned = summary.abandoned,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "ingestion run finished"
        );
        Ok(summary)
    }
}

/// List filenames in `dir` starting with `prefix`.
fn list_with_prefix(dir: &Path, prefix: &str) -> IngestResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| IngestError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_with_prefix() {
        let dir = TempDir::new().unwrap();
        fs::File::create(dir.path().join("S5P_a.nc")).unwrap();
        fs::File::create(dir.path().join("S5P_b.nc")).unwrap();
        fs::File::create(dir.path().join("other.nc")).unwrap();

        let mut names = list_with_prefix(dir.path(), "S5P_").unwrap();
        names.sort();
        assert_eq!(names, vec!["S5P_a.nc", "S5P_b.nc"]);
    }

    #[test]
    fn test_list_with_prefix_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(list_with_prefix(&dir.path().join("missing"), "S5P_").is_err());
    }
}
