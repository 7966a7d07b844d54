//! Journal directory layout.
//!
//! ```text
//! <journal_dir>/
//! ├─ tracker-store.journal            # active data journal
//! ├─ tracker-store.ontology.journal   # active ontology journal
//! └─ tracker-store.journal.<N>        # rotated chunk, awaiting compression
//! <archive_dir>/                      # journal_dir unless configured
//! └─ tracker-store.journal.<N>.gz     # rotated chunk, compressed
//! ```
//!
//! Chunk numbers start at 1 and are contiguous. The reader resolves chunk
//! `N` by probing the uncompressed name first, then the `.gz` name.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// File name of the active data journal.
pub const DATA_JOURNAL_FILE: &str = "tracker-store.journal";

/// File name of the active ontology journal.
pub const ONTOLOGY_JOURNAL_FILE: &str = "tracker-store.ontology.journal";

/// Extension of compressed chunks.
const COMPRESSED_EXTENSION: &str = "gz";

/// Resolves the paths of an active journal and its chunk chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalLayout {
    active: PathBuf,
    archive_dir: Option<PathBuf>,
}

impl JournalLayout {
    /// Creates a layout around the given active file.
    pub fn new(active: impl Into<PathBuf>) -> Self {
        Self {
            active: active.into(),
            archive_dir: None,
        }
    }

    /// Creates a layout for the data journal in `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DATA_JOURNAL_FILE))
    }

    /// Sets the directory compressed chunks live in.
    #[must_use]
    pub fn with_archive_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.archive_dir = dir;
        self
    }

    /// Path of the active file.
    #[must_use]
    pub fn active_path(&self) -> &Path {
        &self.active
    }

    /// Directory holding the active file and uncompressed chunks.
    #[must_use]
    pub fn journal_dir(&self) -> &Path {
        match self.active.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Directory holding compressed chunks.
    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        self.archive_dir.as_deref().unwrap_or_else(|| self.journal_dir())
    }

    /// Path of the ontology journal next to the active file.
    #[must_use]
    pub fn ontology_path(&self) -> PathBuf {
        self.journal_dir().join(ONTOLOGY_JOURNAL_FILE)
    }

    fn base_name(&self) -> String {
        self.active.file_name().map_or_else(
            || DATA_JOURNAL_FILE.to_owned(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    /// Path of uncompressed chunk `n`.
    #[must_use]
    pub fn chunk_path(&self, n: u32) -> PathBuf {
        self.journal_dir().join(format!("{}.{n}", self.base_name()))
    }

    /// Path of compressed chunk `n`.
    #[must_use]
    pub fn compressed_chunk_path(&self, n: u32) -> PathBuf {
        self.archive_dir()
            .join(format!("{}.{n}.{COMPRESSED_EXTENSION}", self.base_name()))
    }

    /// Returns the path chunk `n` can be read from, if it exists.
    #[must_use]
    pub fn resolve_chunk(&self, n: u32) -> Option<PathBuf> {
        let plain = self.chunk_path(n);
        if plain.exists() {
            return Some(plain);
        }
        let compressed = self.compressed_chunk_path(n);
        compressed.exists().then_some(compressed)
    }

    /// Counts the contiguous run of chunks starting at 1.
    #[must_use]
    pub fn count_chunks(&self) -> u32 {
        let mut count = 0;
        while self.resolve_chunk(count + 1).is_some() {
            count += 1;
        }
        count
    }

    /// Returns the highest chunk number present in the journal or archive
    /// directory, or 0 when there are none.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal directory cannot be listed.
    pub fn max_chunk_number(&self) -> io::Result<u32> {
        let prefix = format!("{}.", self.base_name());
        let mut max = scan_chunk_numbers(self.journal_dir(), &prefix)?;

        if self.archive_dir() != self.journal_dir() {
            match scan_chunk_numbers(self.archive_dir(), &prefix) {
                Ok(found) => max = max.max(found),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(max)
    }
}

fn scan_chunk_numbers(dir: &Path, prefix: &str) -> io::Result<u32> {
    let mut max = 0;
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        if let Some(n) = name.to_str().and_then(|name| parse_chunk_number(name, prefix)) {
            max = max.max(n);
        }
    }
    Ok(max)
}

/// Parses `N` from `<base>.N`, `<base>.N.gz` or any other `<base>.N...` name.
fn parse_chunk_number(name: &str, prefix: &str) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?;
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    rest[..digits_len].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_follow_base_name() {
        let layout = JournalLayout::in_dir(Path::new("/data"));
        assert_eq!(
            layout.active_path(),
            Path::new("/data/tracker-store.journal")
        );
        assert_eq!(
            layout.chunk_path(3),
            PathBuf::from("/data/tracker-store.journal.3")
        );
        assert_eq!(
            layout.compressed_chunk_path(3),
            PathBuf::from("/data/tracker-store.journal.3.gz")
        );
        assert_eq!(
            layout.ontology_path(),
            PathBuf::from("/data/tracker-store.ontology.journal")
        );
    }

    #[test]
    fn archive_dir_moves_compressed_chunks_only() {
        let layout = JournalLayout::in_dir(Path::new("/data"))
            .with_archive_dir(Some(PathBuf::from("/archive")));
        assert_eq!(
            layout.chunk_path(1),
            PathBuf::from("/data/tracker-store.journal.1")
        );
        assert_eq!(
            layout.compressed_chunk_path(1),
            PathBuf::from("/archive/tracker-store.journal.1.gz")
        );
    }

    #[test]
    fn bare_file_name_uses_current_dir() {
        let layout = JournalLayout::new("tracker-store.journal");
        assert_eq!(layout.journal_dir(), Path::new("."));
    }

    #[test]
    fn parse_chunk_numbers() {
        let prefix = "tracker-store.journal.";
        assert_eq!(parse_chunk_number("tracker-store.journal.7", prefix), Some(7));
        assert_eq!(
            parse_chunk_number("tracker-store.journal.12.gz", prefix),
            Some(12)
        );
        assert_eq!(parse_chunk_number("tracker-store.journal", prefix), None);
        assert_eq!(
            parse_chunk_number("tracker-store.ontology.journal", prefix),
            None
        );
        assert_eq!(parse_chunk_number("tracker-store.journal.x", prefix), None);
    }

    #[test]
    fn max_chunk_scans_both_dirs() {
        let dir = tempdir().unwrap();
        let archive = tempdir().unwrap();
        let layout = JournalLayout::in_dir(dir.path())
            .with_archive_dir(Some(archive.path().to_path_buf()));

        assert_eq!(layout.max_chunk_number().unwrap(), 0);

        fs::write(layout.chunk_path(2), b"").unwrap();
        fs::write(layout.compressed_chunk_path(5), b"").unwrap();
        fs::write(dir.path().join(ONTOLOGY_JOURNAL_FILE), b"").unwrap();

        assert_eq!(layout.max_chunk_number().unwrap(), 5);
    }

    #[test]
    fn resolve_prefers_uncompressed() {
        let dir = tempdir().unwrap();
        let layout = JournalLayout::in_dir(dir.path());

        assert_eq!(layout.resolve_chunk(1), None);

        fs::write(layout.compressed_chunk_path(1), b"").unwrap();
        assert_eq!(layout.resolve_chunk(1), Some(layout.compressed_chunk_path(1)));

        fs::write(layout.chunk_path(1), b"").unwrap();
        assert_eq!(layout.resolve_chunk(1), Some(layout.chunk_path(1)));
    }

    #[test]
    fn count_stops_at_gap() {
        let dir = tempdir().unwrap();
        let layout = JournalLayout::in_dir(dir.path());

        fs::write(layout.chunk_path(1), b"").unwrap();
        fs::write(layout.compressed_chunk_path(2), b"").unwrap();
        fs::write(layout.chunk_path(4), b"").unwrap();

        assert_eq!(layout.count_chunks(), 2);
    }
}
