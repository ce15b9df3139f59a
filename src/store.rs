//! Record persistence
//!
//! Input and output files hold a JSON array of records. Every save rewrites
//! the whole array; the new content goes to a temporary file in the same
//! directory which is then renamed over the target, so a reader never sees a
//! half-written checkpoint.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::models::LocationRecord;
use crate::{GeocoderError, Result};

/// Loads and saves record sequences
pub trait RecordStore {
    /// Read all records; absent or malformed files are errors
    fn load(&self, path: &Path) -> Result<Vec<LocationRecord>>;

    /// Replace whatever is stored at `path` with `records`
    fn save(&self, path: &Path, records: &[LocationRecord]) -> Result<()>;
}

/// JSON array on the local file system, two-space indented
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileStore;

impl JsonFileStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Serialize records exactly as they are written to disk
    pub fn to_json(records: &[LocationRecord]) -> Result<String> {
        let mut output = serde_json::to_string_pretty(records)?;
        output.push('\n');
        Ok(output)
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self, path: &Path) -> Result<Vec<LocationRecord>> {
        let content = fs::read_to_string(path).map_err(|e| {
            GeocoderError::input(format!("cannot read {}: {e}", path.display()))
        })?;

        let records: Vec<LocationRecord> = serde_json::from_str(&content).map_err(|e| {
            GeocoderError::input(format!("malformed records in {}: {e}", path.display()))
        })?;

        debug!("Loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }

    fn save(&self, path: &Path, records: &[LocationRecord]) -> Result<()> {
        let output = Self::to_json(records)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(output.as_bytes())?;
        if let Some(permissions) = target_permissions(path) {
            file.as_file().set_permissions(permissions)?;
        }
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| {
            GeocoderError::storage(format!("cannot replace {}: {}", path.display(), e.error))
        })?;

        debug!("Saved {} records to {}", records.len(), path.display());
        Ok(())
    }
}

/// Mode for the replacement file: keep the existing file's, else 0644.
///
/// Temp files are created owner-only, which would otherwise leak onto the output.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    if let Ok(metadata) = fs::metadata(path) {
        return Some(metadata.permissions());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(fs::Permissions::from_mode(0o644))
    }
    #[cfg(not(unix))]
    {
        None
    }
}

/// Prior output for resume or retry, `None` when there is nothing usable
pub fn load_existing<S: RecordStore + ?Sized>(
    store: &S,
    path: &Path,
) -> Option<Vec<LocationRecord>> {
    if !path.exists() {
        return None;
    }

    match store.load(path) {
        Ok(records) => {
            info!("Found existing results with {} entries", records.len());
            Some(records)
        }
        Err(e) => {
            warn!("Ignoring unreadable previous output: {}", e);
            None
        }
    }
}
