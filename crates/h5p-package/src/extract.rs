//! Uploaded-archive extraction
//!
//! Packages arrive as zip archives. Extraction unpacks into an exclusive
//! scratch directory; any downstream validation failure must remove that
//! directory again, so callers pair this with
//! [`h5p_core::fsutil::delete_tree`].

use h5p_core::error::{Error, Result};
use h5p_core::fsutil;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Unpacks uploaded package archives into scratch space.
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract `archive` into `scratch`, returning the number of file
    /// entries written.
    ///
    /// Entries that would escape the scratch root are skipped. A corrupt
    /// or non-zip archive fails with [`Error::Extraction`].
    pub fn extract(archive: &Path, scratch: &Path) -> Result<usize> {
        let file = File::open(archive).map_err(|e| {
            Error::extraction(format!("cannot open uploaded package {}: {e}", archive.display()))
        })?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| Error::extraction(format!("not a valid package archive: {e}")))?;

        fsutil::dir_ready(scratch)?;

        let mut written = 0;
        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| Error::extraction(format!("corrupt archive entry: {e}")))?;

            // enclosed_name rejects absolute paths and parent traversal
            let Some(relative) = entry.enclosed_name() else {
                warn!(entry = entry.name(), "skipping archive entry escaping the scratch root");
                continue;
            };
            let target = scratch.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|e| Error::extraction(format!("cannot create {}: {e}", target.display())))?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| {
                        Error::extraction(format!("cannot create {}: {e}", parent.display()))
                    })?;
                }
                let mut out = File::create(&target)
                    .map_err(|e| Error::extraction(format!("cannot write {}: {e}", target.display())))?;
                io::copy(&mut entry, &mut out)
                    .map_err(|e| Error::extraction(format!("cannot write {}: {e}", target.display())))?;
                written += 1;
            }
        }

        debug!(files = written, scratch = %scratch.display(), "package extracted");
        Ok(written)
    }
}
