//! s5psync - Sentinel-5P archive ingestion.
//!
//! Resolves the set of product files a partition is responsible for from CSV
//! manifests, downloads the ones not yet held locally over authenticated HTTP
//! under a bounded concurrency gate with per-file retry, and gates completion
//! on a structural integrity check of the downloaded files.
//!
//! # Pipeline
//!
//! ```text
//! ManifestReader ──► CandidateFilter ──► minus validated set ──► DownloadEngine ──► incoming/
//!                                              ▲
//!                                       IntegrityChecker
//! ```

pub mod candidate;
pub mod config;
pub mod download;
pub mod error;
pub mod ingest;
pub mod integrity;
pub mod manifest;
pub mod telemetry;

pub use candidate::{Candidate, CandidateFilter, DerivedRecord};
pub use config::{Credentials, IngestConfig};
pub use download::{
    DownloadEngine, DownloadOutcome, DownloadReport, DownloadStatus, ReqwestTransport,
    RetryPolicy, Transport,
};
pub use error::{IngestError, IngestResult};
pub use ingest::{Ingestor, RunSummary};
pub use integrity::{IntegrityChecker, IntegrityProbe, NetcdfProbe};
pub use manifest::{ManifestReader, ManifestRecord, Partition};
