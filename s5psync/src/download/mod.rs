//! Download engine: retry policy, transport seam, and the concurrency-bounded
//! fetch loop.

mod engine;
mod policy;
mod transport;

pub use engine::{DownloadEngine, DownloadOutcome, DownloadReport, DownloadStatus};
pub use policy::RetryPolicy;
pub use transport::{ByteStream, RawResponse, ReqwestTransport, Transport, TransportError};

#[cfg(test)]
pub use transport::tests::{Script, ScriptedTransport};
