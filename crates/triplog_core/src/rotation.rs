//! Rotation of the active journal into numbered, compressed chunks.
//!
//! Rotation happens in two phases:
//!
//! 1. Synchronously, inside the commit that crossed the threshold: the
//!    active file is synced and renamed to `<base>.<N>`, where `N` is one
//!    more than the highest chunk number on disk. The writer then recreates
//!    a fresh active file.
//! 2. On a background thread: `<base>.<N>` is gzipped into the archive
//!    directory as `<base>.<N>.gz`. The uncompressed chunk is removed only
//!    after the compressed copy has been synced and renamed into place.
//!
//! A failed compression is logged and leaves the uncompressed chunk, which
//! the reader accepts just the same.

use crate::config::RotationConfig;
use crate::error::{JournalError, JournalResult};
use crate::layout::JournalLayout;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Suffix of a compressed chunk that has not been renamed into place yet.
const TEMP_SUFFIX: &str = ".tmp";

/// Decides when to rotate and carries out the rename and compression steps.
#[derive(Debug)]
pub struct RotationManager {
    config: RotationConfig,
    layout: JournalLayout,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl RotationManager {
    /// Creates a rotation manager for the given active file.
    pub fn new(config: RotationConfig, active: impl Into<PathBuf>) -> Self {
        let layout = JournalLayout::new(active).with_archive_dir(config.archive_dir.clone());
        Self {
            config,
            layout,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Returns the rotation settings.
    #[must_use]
    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Returns the layout chunks are named by.
    #[must_use]
    pub fn layout(&self) -> &JournalLayout {
        &self.layout
    }

    /// Returns whether a file of `size` bytes must be rotated.
    #[must_use]
    pub fn should_rotate(&self, size: u64) -> bool {
        self.config.enabled && size > self.config.chunk_size
    }

    /// Renames the active file to the next chunk number and returns it.
    ///
    /// The caller must have synced the file and must recreate the active
    /// file afterwards.
    pub(crate) fn retire(&self) -> JournalResult<u32> {
        let active = self.layout.active_path();
        let chunk = self
            .layout
            .max_chunk_number()
            .map_err(|e| JournalError::could_not_close(active, e))?
            + 1;

        let target = self.layout.chunk_path(chunk);
        fs::rename(active, &target).map_err(|e| JournalError::could_not_close(active, e))?;

        debug!(chunk, path = %target.display(), "retired active journal");
        Ok(chunk)
    }

    /// Compresses `chunk` on a background thread.
    pub(crate) fn compress_in_background(&self, chunk: u32) {
        let source = self.layout.chunk_path(chunk);
        let dest = self.layout.compressed_chunk_path(chunk);

        let spawned = thread::Builder::new()
            .name(format!("journal-gzip-{chunk}"))
            .spawn(move || match compress_chunk(&source, &dest) {
                Ok(()) => debug!(chunk, path = %dest.display(), "compressed journal chunk"),
                Err(e) => error!(
                    chunk,
                    path = %source.display(),
                    error = %e,
                    "failed to compress journal chunk, keeping it uncompressed"
                ),
            });

        match spawned {
            Ok(handle) => {
                let mut pending = self.pending.lock();
                pending.retain(|handle| !handle.is_finished());
                pending.push(handle);
            }
            Err(e) => warn!(chunk, error = %e, "could not start journal compression"),
        }
    }

    /// Returns the number of compressions that have not finished.
    #[must_use]
    pub fn pending_compressions(&self) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Blocks until every background compression has finished.
    pub fn wait_for_compression(&self) {
        let handles: Vec<_> = self.pending.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("journal compression thread panicked");
            }
        }
    }
}

/// Gzips `source` into `dest`, then removes `source`.
///
/// The compressed bytes are written to a temporary sibling of `dest` and
/// synced before being renamed into place, so `dest` is either absent or
/// complete.
///
/// # Errors
///
/// Returns an error if any step fails. `source` is left untouched unless
/// `dest` was completely written.
pub fn compress_chunk(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = dest.as_os_str().to_owned();
    temp_name.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp_name);

    if let Err(e) = write_compressed(source, &temp) {
        match fs::remove_file(&temp) {
            Err(cleanup) if cleanup.kind() != ErrorKind::NotFound => warn!(
                path = %temp.display(),
                error = %cleanup,
                "could not remove partial compressed chunk"
            ),
            _ => {}
        }
        return Err(e);
    }

    fs::rename(&temp, dest)?;
    fs::remove_file(source)
}

fn write_compressed(source: &Path, temp: &Path) -> io::Result<()> {
    let mut input = BufReader::new(File::open(source)?);
    let output = BufWriter::new(File::create(temp)?);

    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;

    let file = encoder
        .finish()?
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?;
    file.sync_all()
}
