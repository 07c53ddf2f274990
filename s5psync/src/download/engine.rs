//! Concurrency-bounded download engine.
//!
//! Executes a work list of candidates, each as an independent task. A shared
//! semaphore caps how many HTTP attempts are in flight at once; the permit is
//! held for the duration of one attempt (request plus streaming write) and
//! released before any backoff sleep, so a retrying candidate does not occupy
//! a slot while it waits.
//!
//! Failures never escalate: a candidate that exhausts its retry budget is
//! logged and abandoned, and shows up again on the next run because it never
//! enters the validated set.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::policy::RetryPolicy;
use super::transport::{Transport, TransportError};
use crate::candidate::Candidate;

/// Write buffer size for streaming response bodies to disk (64 KiB).
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Terminal state of one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// The full body was streamed to the destination.
    Success { bytes: u64 },
    /// Every attempt failed; the candidate was abandoned.
    Exhausted,
}

/// Terminal record of one candidate, for end-of-run accounting only.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub candidate: Candidate,
    pub status: DownloadStatus,
}

/// Aggregate result of one engine run.
#[derive(Debug)]
pub struct DownloadReport {
    pub outcomes: Vec<DownloadOutcome>,
    pub elapsed: Duration,
}

impl DownloadReport {
    /// Number of candidates downloaded to completion.
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DownloadStatus::Success { .. }))
            .count()
    }

    /// Number of candidates abandoned after retry exhaustion.
    pub fn abandoned(&self) -> usize {
        self.outcomes.len() - self.completed()
    }

    /// Total bytes written across successful downloads.
    pub fn total_bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                DownloadStatus::Success { bytes } => bytes,
                DownloadStatus::Exhausted => 0,
            })
            .sum()
    }
}

/// Why a single attempt failed. Every variant is retryable.
#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Any status other than 200 means the product is not ready to stream;
    /// no finer interpretation is attempted.
    #[error("response status {0}")]
    NotAvailable(u16),

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Concurrency-bounded, retrying download engine.
pub struct DownloadEngine<T> {
    transport: Arc<T>,
    gate: Arc<Semaphore>,
    retry: RetryPolicy,
    value_suffix: String,
}

impl<T: Transport + 'static> DownloadEngine<T> {
    /// Create an engine.
    ///
    /// The `gate` is injected rather than owned so the caller controls the
    /// concurrency budget; `value_suffix` is appended to each candidate URL
    /// to request the raw content stream.
    pub fn new(
        transport: Arc<T>,
        gate: Arc<Semaphore>,
        retry: RetryPolicy,
        value_suffix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            gate,
            retry,
            value_suffix: value_suffix.into(),
        }
    }

    /// Attempt every candidate, each independently, and report the outcomes.
    ///
    /// Candidates are dispatched in list order; completion order is
    /// unconstrained. The run itself cannot fail.
    pub async fn run(&self, candidates: Vec<Candidate>) -> DownloadReport {
        let start = Instant::now();
        let total = candidates.len();
        info!(candidates = total, "starting downloads");

        let mut tasks = Vec::with_capacity(total);
        for candidate in candidates {
            let transport = Arc::clone(&self.transport);
            let gate = Arc::clone(&self.gate);
            let retry = self.retry.clone();
            let url = format!("{}{}", candidate.remote_url, self.value_suffix);
            tasks.push(tokio::spawn(download_candidate(
                transport, gate, retry, url, candidate,
            )));
        }

        let mut outcomes = Vec::with_capacity(total);
        for task in tasks {
            match task.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "download task panicked"),
            }
        }

        let report = DownloadReport {
            outcomes,
            elapsed: start.elapsed(),
        };
        info!(
            completed = report.completed(),
            abandoned = report.abandoned(),
            bytes = report.total_bytes(),
            elapsed_secs = report.elapsed.as_secs_f64(),
            "downloads finished"
        );
        report
    }
}

/// Drive one candidate through its retry budget.
async fn download_candidate<T: Transport>(
    transport: Arc<T>,
    gate: Arc<Semaphore>,
    retry: RetryPolicy,
    url: String,
    candidate: Candidate,
) -> DownloadOutcome {
    let mut attempt: u32 = 1;
    loop {
        // Slot held for this attempt only, released before any backoff sleep.
        let permit = gate.acquire().await.expect("download gate closed");
        let result = attempt_download(transport.as_ref(), &url, &candidate).await;
        drop(permit);

        match result {
            Ok(bytes) => {
                debug!(url = %url, bytes, "downloaded");
                return DownloadOutcome {
                    candidate,
                    status: DownloadStatus::Success { bytes },
                };
            }
            Err(e) => {
                debug!(
                    url = %url,
                    path = %candidate.local_path.display(),
                    attempt,
                    error = %e,
                    "download attempt failed"
                );
                match retry.delay_for_attempt(attempt) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(
                            url = %url,
                            path = %candidate.local_path.display(),
                            attempts = attempt,
                            "abandoning candidate"
                        );
                        return DownloadOutcome {
                            candidate,
                            status: DownloadStatus::Exhausted,
                        };
                    }
                }
            }
        }
    }
}

/// One authenticated streaming attempt.
///
/// The destination is created with truncation on every attempt so a previous
/// partial write never blocks a fresh one.
async fn attempt_download<T: Transport>(
    transport: &T,
    url: &str,
    candidate: &Candidate,
) -> Result<u64, AttemptError> {
    let response = transport.fetch(url).await?;
    if response.status != 200 {
        return Err(AttemptError::NotAvailable(response.status));
    }

    let dest = &candidate.local_path;
    let write_err = |source| AttemptError::Write {
        path: dest.clone(),
        source,
    };

    let file = tokio::fs::File::create(dest).await.map_err(write_err)?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
    let mut body = response.body;
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await.map_err(write_err)?;
        written += chunk.len() as u64;
    }
    writer.flush().await.map_err(write_err)?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::transport::tests::{Script, ScriptedTransport};
    use std::path::Path;
    use tempfile::TempDir;

    const SUFFIX: &str = "/$value";

    fn candidate(url: &str, dir: &Path, name: &str) -> Candidate {
        Candidate {
            remote_url: url.to_string(),
            local_path: dir.join(name),
        }
    }

    fn engine(
        transport: Arc<ScriptedTransport>,
        permits: usize,
        retry: RetryPolicy,
    ) -> DownloadEngine<ScriptedTransport> {
        DownloadEngine::new(transport, Arc::new(Semaphore::new(permits)), retry, SUFFIX)
    }

    fn quick_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_single_download_success() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(Duration::ZERO));
        transport.script(format!("http://hub/a{}", SUFFIX), Script::ok("payload"));

        let report = engine(Arc::clone(&transport), 5, quick_retry(15))
            .run(vec![candidate("http://hub/a", dir.path(), "a.nc")])
            .await;

        assert_eq!(report.completed(), 1);
        assert_eq!(report.total_bytes(), 7);
        assert_eq!(std::fs::read(dir.path().join("a.nc")).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_appends_value_suffix() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(Duration::ZERO));
        // Scripted under the bare URL only: the engine must not find it.
        transport.script("http://hub/a", Script::ok("payload"));

        let report = engine(Arc::clone(&transport), 5, quick_retry(2))
            .run(vec![candidate("http://hub/a", dir.path(), "a.nc")])
            .await;

        assert_eq!(report.abandoned(), 1);
    }

    #[tokio::test]
    async fn test_success_on_final_attempt() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(Duration::ZERO));
        transport.script(
            format!("http://hub/a{}", SUFFIX),
            Script::failing_then_ok(14, "full contents"),
        );

        let report = engine(Arc::clone(&transport), 5, quick_retry(15))
            .run(vec![candidate("http://hub/a", dir.path(), "a.nc")])
            .await;

        assert_eq!(report.completed(), 1);
        assert_eq!(
            std::fs::read(dir.path().join("a.nc")).unwrap(),
            b"full contents"
        );
    }

    #[tokio::test]
    async fn test_exhaustion_abandons_without_error() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(Duration::ZERO));
        transport.script(format!("http://hub/a{}", SUFFIX), Script::always_failing());

        let report = engine(Arc::clone(&transport), 5, quick_retry(15))
            .run(vec![candidate("http://hub/a", dir.path(), "a.nc")])
            .await;

        assert_eq!(report.completed(), 0);
        assert_eq!(report.abandoned(), 1);
        // Transport never produced a body, so no destination file exists.
        assert!(!dir.path().join("a.nc").exists());
    }

    #[tokio::test]
    async fn test_non_200_status_is_retried() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(Duration::ZERO));
        transport.script(format!("http://hub/a{}", SUFFIX), Script::status_only(503));

        let report = engine(Arc::clone(&transport), 5, quick_retry(3))
            .run(vec![candidate("http://hub/a", dir.path(), "a.nc")])
            .await;

        assert_eq!(report.abandoned(), 1);
    }

    #[tokio::test]
    async fn test_gate_bounds_in_flight_attempts() {
        for count in [1usize, 5, 20] {
            let dir = TempDir::new().unwrap();
            let transport = Arc::new(ScriptedTransport::new(Duration::from_millis(10)));
            let candidates: Vec<Candidate> = (0..count)
                .map(|i| {
                    let url = format!("http://hub/{}", i);
                    transport.script(format!("{}{}", url, SUFFIX), Script::ok("x"));
                    candidate(&url, dir.path(), &format!("{}.nc", i))
                })
                .collect();

            let report = engine(Arc::clone(&transport), 5, quick_retry(2))
                .run(candidates)
                .await;

            assert_eq!(report.completed(), count);
            assert!(
                transport.max_in_flight() <= 5,
                "{} candidates drove {} in flight",
                count,
                transport.max_in_flight()
            );
        }
    }

    #[tokio::test]
    async fn test_truncates_previous_partial_write() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a.nc");
        std::fs::write(&dest, b"stale partial data that is longer").unwrap();

        let transport = Arc::new(ScriptedTransport::new(Duration::ZERO));
        transport.script(format!("http://hub/a{}", SUFFIX), Script::ok("new"));

        engine(Arc::clone(&transport), 5, quick_retry(2))
            .run(vec![candidate("http://hub/a", dir.path(), "a.nc")])
            .await;

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }
}
