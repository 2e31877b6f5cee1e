//! frigate_common
//!
//! Small filesystem helpers shared by the event log and snapshot crates:
//! - SHA-256 digests in the `sha256:<hex>` form used in operator logs
//! - atomic whole-file replacement (temp file in the same dir + rename)

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Return "sha256:<hex>" of raw bytes.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Return "sha256:<hex>" of a file's contents, streamed.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String, CommonError> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut f, &mut hasher)?;
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Replace `path` with `bytes` so readers only ever see the old or the new content.
///
/// The temp file lives next to the target so the final rename stays on one filesystem.
/// Missing parent directories are created. The replacement keeps the mode of
/// the file it replaces; a new file gets 0644 so other readers of the publish
/// tree can open it.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), CommonError> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let perms = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => new_file_permissions(),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    if let Some(perms) = perms {
        tmp.as_file().set_permissions(perms)?;
    }
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CommonError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}
