//! Pact files: the contract a mock server served, written out for the
//! provider side to verify.

use crate::error::MockServerError;
use crate::model::Contract;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Held for each read-merge-write cycle so concurrent writers in this
/// process do not lose interactions.
static WRITE_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Write `contract` to `<directory>/<consumer>-<provider>.json`.
///
/// Unless `overwrite` is set, an existing file is read and `contract` is
/// merged into it. Returns the path written.
pub fn write_pact_file(
    contract: &Contract,
    directory: &Path,
    overwrite: bool,
) -> Result<PathBuf, MockServerError> {
    let path = directory.join(contract.file_name());
    let failed = |message: String| MockServerError::WritePact {
        path: path.clone(),
        message,
    };
    let _lock = WRITE_LOCK.lock();

    let pact = if !overwrite && path.exists() {
        let text = fs::read_to_string(&path).map_err(|e| failed(e.to_string()))?;
        let mut existing = Contract::from_json_str(&text).map_err(|e| failed(e.to_string()))?;
        existing.merge(contract).map_err(|e| failed(e.to_string()))?;
        debug!("Merged into existing pact file {}", path.display());
        Cow::Owned(existing)
    } else {
        Cow::Borrowed(contract)
    };

    fs::create_dir_all(directory).map_err(|e| failed(e.to_string()))?;
    let json = serde_json::to_string_pretty(&pact.to_json()).map_err(|e| failed(e.to_string()))?;
    fs::write(&path, json).map_err(|e| failed(e.to_string()))?;

    info!(
        "Wrote pact file {} ({} interaction(s))",
        path.display(),
        pact.interactions.len()
    );
    Ok(path)
}
