//! Corruption and crash simulation.
//!
//! A crash can only leave a torn tail; bit rot can hit any byte. These
//! helpers produce both on a journal file, and locate transactions by
//! walking their size words without going through the reader.

use std::fs::{self, OpenOptions};
use std::io;
use std::ops::Range;
use std::path::Path;

/// Size of the journal file header.
const FILE_HEADER: u64 = 8;

/// XORs the byte at `offset` with `mask`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written, or `offset` is
/// past its end.
pub fn flip_byte(path: &Path, offset: u64, mask: u8) -> io::Result<()> {
    let mut bytes = fs::read(path)?;
    let index = usize::try_from(offset)
        .ok()
        .filter(|&i| i < bytes.len())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset past end of file"))?;
    bytes[index] ^= mask;
    fs::write(path, bytes)
}

/// Cuts the file to `len` bytes, as a crash in the middle of a write would.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or resized.
pub fn truncate_file(path: &Path, len: u64) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

/// Appends raw bytes to the file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn append_garbage(path: &Path, garbage: &[u8]) -> io::Result<()> {
    let mut bytes = fs::read(path)?;
    bytes.extend_from_slice(garbage);
    fs::write(path, bytes)
}

/// Returns the byte range of every transaction in an intact file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a size word does not fit.
pub fn transaction_spans(path: &Path) -> io::Result<Vec<Range<u64>>> {
    let bytes = fs::read(path)?;
    let mut spans = Vec::new();
    let mut offset = FILE_HEADER as usize;

    while offset < bytes.len() {
        let word = bytes.get(offset..offset + 4).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "truncated size word")
        })?;
        let size = u32::from_be_bytes([word[0], word[1], word[2], word[3]]) as usize;
        if size == 0 || offset + size > bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad transaction size {size} at offset {offset}"),
            ));
        }
        spans.push(offset as u64..(offset + size) as u64);
        offset += size;
    }

    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn flip_and_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, [0u8, 1, 2, 3]).unwrap();

        flip_byte(&path, 1, 0xFF).unwrap();
        assert_eq!(fs::read(&path).unwrap(), [0, 0xFE, 2, 3]);
        assert!(flip_byte(&path, 4, 1).is_err());

        truncate_file(&path, 2).unwrap();
        assert_eq!(fs::read(&path).unwrap(), [0, 0xFE]);

        append_garbage(&path, &[9]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), [0, 0xFE, 9]);
    }

    #[test]
    fn spans_follow_size_words() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        let mut bytes = b"trlog\x0004".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 8, 0, 0, 0, 8]);
        bytes.extend_from_slice(&[0, 0, 0, 4]);
        fs::write(&path, &bytes).unwrap();

        assert_eq!(transaction_spans(&path).unwrap(), vec![8..16, 16..20]);
    }
}
