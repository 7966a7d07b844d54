//! Journal configuration.

use std::path::PathBuf;
use triplog_codec::FormatVersion;

/// Default size above which the active file is rotated.
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024; // 50 MB

/// When and where the active journal is rotated into numbered chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    /// Whether commits may trigger rotation.
    pub enabled: bool,

    /// Rotate once the active file grows beyond this many bytes.
    pub chunk_size: u64,

    /// Where compressed chunks are stored (defaults to the journal directory).
    pub archive_dir: Option<PathBuf>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            archive_dir: None,
        }
    }
}

impl RotationConfig {
    /// Creates a configuration with rotation disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether rotation is enabled.
    #[must_use]
    pub const fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }

    /// Sets the rotation threshold.
    #[must_use]
    pub const fn chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets the directory compressed chunks are written to.
    #[must_use]
    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }
}

/// Configuration for opening a journal writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalConfig {
    /// Rotation settings.
    pub rotation: RotationConfig,

    /// Version written to newly created files. Existing files keep theirs.
    pub format_version: FormatVersion,
}

impl JournalConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets rotation settings.
    #[must_use]
    pub fn rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the version for newly created files.
    #[must_use]
    pub const fn format_version(mut self, version: FormatVersion) -> Self {
        self.format_version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = JournalConfig::default();
        assert!(!config.rotation.enabled);
        assert_eq!(config.rotation.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.rotation.archive_dir, None);
        assert_eq!(config.format_version, FormatVersion::V04);
    }

    #[test]
    fn builder_pattern() {
        let config = JournalConfig::new()
            .rotation(
                RotationConfig::new()
                    .enabled(true)
                    .chunk_size(1024)
                    .archive_dir("/var/archive"),
            )
            .format_version(FormatVersion::V03);

        assert!(config.rotation.enabled);
        assert_eq!(config.rotation.chunk_size, 1024);
        assert_eq!(
            config.rotation.archive_dir,
            Some(PathBuf::from("/var/archive"))
        );
        assert_eq!(config.format_version, FormatVersion::V03);
    }
}
