//! Structural integrity gate for downloaded products.
//!
//! A download only counts as "already have it" once the file proves openable
//! as the domain format. The probe is a seam: the pipeline consumes nothing
//! but pass/fail, so the real parser stays an external collaborator. Files
//! that fail are excluded but left on disk for out-of-band inspection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

/// Why a file failed the structural probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot open: {0}")]
    Open(std::io::Error),

    #[error("file too short to carry a format signature")]
    Truncated,

    #[error("unrecognized format signature")]
    BadSignature,
}

/// Opaque "can this file be opened" check.
pub trait IntegrityProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<(), ProbeError>;
}

/// HDF5 file signature, carried by netCDF-4 products.
const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', 0x0d, 0x0a, 0x1a, 0x0a];

/// Probe for netCDF products.
///
/// Accepts the netCDF-4 (HDF5) signature and the classic CDF magic. A
/// zero-byte or truncated file fails, which is exactly how an interrupted
/// download presents.
#[derive(Debug, Default)]
pub struct NetcdfProbe;

impl IntegrityProbe for NetcdfProbe {
    fn probe(&self, path: &Path) -> Result<(), ProbeError> {
        let mut file = File::open(path).map_err(ProbeError::Open)?;
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)
            .map_err(|_| ProbeError::Truncated)?;

        if magic == HDF5_SIGNATURE {
            return Ok(());
        }
        match &magic[..4] {
            b"CDF\x01" | b"CDF\x02" => Ok(()),
            _ => Err(ProbeError::BadSignature),
        }
    }
}

/// Runs the probe over candidate filenames and keeps the ones that pass.
#[derive(Debug)]
pub struct IntegrityChecker<P> {
    probe: P,
}

impl<P: IntegrityProbe> IntegrityChecker<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    /// Return the subset of `names` that open successfully under `dir`.
    ///
    /// Failures are logged and excluded; the files stay on disk.
    pub fn check(&self, names: &[String], dir: &Path) -> Vec<String> {
        let mut good = Vec::new();
        for name in names {
            let path = dir.join(name);
            match self.probe.probe(&path) {
                Ok(()) => good.push(name.clone()),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "integrity check failed, excluding");
                }
            }
        }
        info!(checked = names.len(), valid = good.len(), "integrity check complete");
        good
    }
}
