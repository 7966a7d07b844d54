//! Journal writer.

use crate::config::JournalConfig;
use crate::error::{JournalError, JournalResult};
use crate::rotation::RotationManager;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use triplog_codec::{
    FormatVersion, JournalEntry, ObjectRef, StatementOp, TransactionEncoder, TransactionFormat,
    FILE_HEADER_SIZE,
};

/// Appends transactions to the active journal file.
///
/// Entries are buffered in memory between [`start_transaction`] and
/// [`commit_transaction`]; the commit frames them and appends the whole
/// transaction with a single write. Durability is left to the caller, who
/// decides when to call [`fsync`].
///
/// At most one writer may have a given file open. This is not enforced.
///
/// [`start_transaction`]: Self::start_transaction
/// [`commit_transaction`]: Self::commit_transaction
/// [`fsync`]: Self::fsync
#[derive(Debug)]
pub struct JournalWriter {
    path: PathBuf,
    file: File,
    size: u64,
    version: FormatVersion,
    new_file_version: FormatVersion,
    rotation: RotationManager,
    transaction: Option<TransactionEncoder>,
}

impl JournalWriter {
    /// Opens the journal at `path` with rotation disabled.
    ///
    /// A missing or empty file (or any file when `truncate` is set) gets a
    /// fresh header. An existing file keeps its format version.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::CouldNotWrite`] on I/O failure and
    /// [`JournalError::BeginOfJournal`] if an existing header is unreadable.
    pub fn open(path: impl AsRef<Path>, truncate: bool) -> JournalResult<Self> {
        Self::open_with_config(path, truncate, JournalConfig::default())
    }

    /// Opens the journal at `path` with the given configuration.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_with_config(
        path: impl AsRef<Path>,
        truncate: bool,
        config: JournalConfig,
    ) -> JournalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (file, size, version) = init_file(&path, truncate, config.format_version)?;

        debug!(path = %path.display(), size, %version, "opened journal for writing");

        Ok(Self {
            rotation: RotationManager::new(config.rotation, &path),
            path,
            file,
            size,
            version,
            new_file_version: config.format_version,
            transaction: None,
        })
    }

    /// Returns the path of the active file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the size of the active file, header included.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the format version of the active file.
    #[must_use]
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Returns whether a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Returns the rotation manager.
    #[must_use]
    pub fn rotation(&self) -> &RotationManager {
        &self.rotation
    }

    /// Begins buffering a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidOperation`] if a transaction is
    /// already open.
    pub fn start_transaction(
        &mut self,
        timestamp: u32,
        format: TransactionFormat,
    ) -> JournalResult<()> {
        if self.transaction.is_some() {
            return Err(JournalError::invalid_operation(
                "a transaction is already open",
            ));
        }
        self.transaction = Some(TransactionEncoder::new(timestamp, format, self.version));
        Ok(())
    }

    /// Begins an ontology transaction. Its entries are not journaled here.
    ///
    /// # Errors
    ///
    /// See [`start_transaction`](Self::start_transaction).
    pub fn start_ontology_transaction(&mut self, timestamp: u32) -> JournalResult<()> {
        self.start_transaction(timestamp, TransactionFormat::Ontology)
    }

    /// Buffers a resource entry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidOperation`] without an open
    /// transaction, or [`JournalError::Unsupported`] if `uri` contains NUL.
    pub fn append_resource(&mut self, subject_id: u32, uri: &str) -> JournalResult<()> {
        let Some(txn) = self.data_transaction()? else {
            return Ok(());
        };
        txn.push_resource(subject_id, uri)
            .map_err(|e| JournalError::from_encode(&self.path, e))
    }

    /// Buffers an insert with a string object.
    ///
    /// # Errors
    ///
    /// See [`append_entry`](Self::append_entry).
    pub fn append_insert_statement(
        &mut self,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object: &str,
    ) -> JournalResult<()> {
        self.append_statement(
            StatementOp::Insert,
            graph_id,
            subject_id,
            predicate_id,
            ObjectRef::Str(object),
        )
    }

    /// Buffers an insert with an id object.
    ///
    /// # Errors
    ///
    /// See [`append_entry`](Self::append_entry).
    pub fn append_insert_statement_id(
        &mut self,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object_id: u32,
    ) -> JournalResult<()> {
        self.append_statement(
            StatementOp::Insert,
            graph_id,
            subject_id,
            predicate_id,
            ObjectRef::Id(object_id),
        )
    }

    /// Buffers a delete with a string object.
    ///
    /// # Errors
    ///
    /// See [`append_entry`](Self::append_entry).
    pub fn append_delete_statement(
        &mut self,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object: &str,
    ) -> JournalResult<()> {
        self.append_statement(
            StatementOp::Delete,
            graph_id,
            subject_id,
            predicate_id,
            ObjectRef::Str(object),
        )
    }

    /// Buffers a delete with an id object.
    ///
    /// # Errors
    ///
    /// See [`append_entry`](Self::append_entry).
    pub fn append_delete_statement_id(
        &mut self,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object_id: u32,
    ) -> JournalResult<()> {
        self.append_statement(
            StatementOp::Delete,
            graph_id,
            subject_id,
            predicate_id,
            ObjectRef::Id(object_id),
        )
    }

    /// Buffers an update with a string object.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Unsupported`] if the file is format 03. See
    /// also [`append_entry`](Self::append_entry).
    pub fn append_update_statement(
        &mut self,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object: &str,
    ) -> JournalResult<()> {
        self.append_statement(
            StatementOp::Update,
            graph_id,
            subject_id,
            predicate_id,
            ObjectRef::Str(object),
        )
    }

    /// Buffers an update with an id object.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Unsupported`] if the file is format 03. See
    /// also [`append_entry`](Self::append_entry).
    pub fn append_update_statement_id(
        &mut self,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object_id: u32,
    ) -> JournalResult<()> {
        self.append_statement(
            StatementOp::Update,
            graph_id,
            subject_id,
            predicate_id,
            ObjectRef::Id(object_id),
        )
    }

    /// Buffers any entry. Does nothing inside an ontology transaction.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidOperation`] without an open
    /// transaction, or [`JournalError::Unsupported`] if the entry cannot be
    /// represented in this file's format.
    pub fn append_entry(&mut self, entry: &JournalEntry) -> JournalResult<()> {
        let Some(txn) = self.data_transaction()? else {
            return Ok(());
        };
        txn.push(entry)
            .map_err(|e| JournalError::from_encode(&self.path, e))
    }

    fn append_statement(
        &mut self,
        op: StatementOp,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object: ObjectRef<'_>,
    ) -> JournalResult<()> {
        let Some(txn) = self.data_transaction()? else {
            return Ok(());
        };
        txn.push_statement(op, graph_id, subject_id, predicate_id, object)
            .map_err(|e| JournalError::from_encode(&self.path, e))
    }

    /// Returns the open transaction, or `None` if it is an ontology one.
    fn data_transaction(&mut self) -> JournalResult<Option<&mut TransactionEncoder>> {
        match self.transaction.as_mut() {
            None => Err(JournalError::invalid_operation("no transaction is open")),
            Some(txn) if txn.format() == TransactionFormat::Ontology => Ok(None),
            Some(txn) => Ok(Some(txn)),
        }
    }

    /// Discards the open transaction, if any. Nothing reaches the disk.
    ///
    /// # Errors
    ///
    /// This never fails; it returns a result for symmetry with commit.
    pub fn rollback_transaction(&mut self) -> JournalResult<()> {
        if let Some(txn) = self.transaction.take() {
            debug!(entries = txn.entry_count(), "rolled back journal transaction");
        }
        Ok(())
    }

    /// Frames the open transaction and appends it with a single write.
    ///
    /// If rotation is enabled and the file has grown past the threshold,
    /// the file is rotated before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidOperation`] without an open
    /// transaction. Returns [`JournalError::CouldNotWrite`] if the write
    /// fails; the transaction is then not committed, and the file is cut
    /// back to its previous size when possible. Returns
    /// [`JournalError::CouldNotClose`] if the commit succeeded but the
    /// following rotation failed.
    pub fn commit_transaction(&mut self) -> JournalResult<()> {
        let Some(txn) = self.transaction.take() else {
            return Err(JournalError::invalid_operation("no transaction is open"));
        };
        let bytes = txn
            .finish()
            .map_err(|e| JournalError::from_encode(&self.path, e))?;

        if let Err(e) = self.append_bytes(&bytes) {
            if let Err(restore) = self.file.set_len(self.size) {
                warn!(
                    path = %self.path.display(),
                    size = self.size,
                    error = %restore,
                    "could not cut journal back after failed commit"
                );
            }
            return Err(JournalError::could_not_write(&self.path, e));
        }
        self.size += bytes.len() as u64;

        if self.rotation.should_rotate(self.size) {
            self.rotate()?;
        }
        Ok(())
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.size))?;
        self.file.write_all(bytes)
    }

    /// Retires the active file and recreates it.
    ///
    /// `std::fs::File` has no fallible close, so the final `sync_all` is the
    /// last point where an error on the retired file can be seen. Its
    /// handle is released once the fresh file replaces it.
    fn rotate(&mut self) -> JournalResult<()> {
        info!(path = %self.path.display(), size = self.size, "rotating journal");

        self.file
            .sync_all()
            .map_err(|e| JournalError::could_not_close(&self.path, e))?;
        let chunk = self.rotation.retire()?;

        let (file, size, version) = match init_file(&self.path, true, self.new_file_version) {
            Ok(opened) => opened,
            Err(e) => {
                let chunk_path = self.rotation.layout().chunk_path(chunk);
                if let Err(restore) = fs::rename(&chunk_path, &self.path) {
                    warn!(
                        chunk,
                        error = %restore,
                        "could not restore journal after failed rotation"
                    );
                }
                return Err(e);
            }
        };
        drop(std::mem::replace(&mut self.file, file));
        self.size = size;
        self.version = version;

        self.rotation.compress_in_background(chunk);
        info!(chunk, "journal rotated");
        Ok(())
    }

    /// Flushes the active file to durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::CouldNotWrite`] if the sync fails.
    pub fn fsync(&self) -> JournalResult<()> {
        self.file
            .sync_all()
            .map_err(|e| JournalError::could_not_write(&self.path, e))
    }

    /// Cuts the active file back to `new_size`, usually the offset a
    /// reader reported as the end of the last verified transaction.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidOperation`] if `new_size` would cut
    /// into the file header or is beyond the end of the file, or
    /// [`JournalError::CouldNotWrite`] on I/O failure.
    pub fn truncate(&mut self, new_size: u64) -> JournalResult<()> {
        if new_size < FILE_HEADER_SIZE as u64 {
            return Err(JournalError::invalid_operation(format!(
                "cannot truncate to {new_size} bytes, the header needs {FILE_HEADER_SIZE}"
            )));
        }
        if new_size > self.size {
            return Err(JournalError::invalid_operation(format!(
                "cannot truncate to {new_size} bytes, file has {}",
                self.size
            )));
        }

        self.file
            .set_len(new_size)
            .and_then(|()| self.file.sync_all())
            .map_err(|e| JournalError::could_not_write(&self.path, e))?;
        self.size = new_size;
        Ok(())
    }

    /// Blocks until background chunk compression has finished.
    pub fn wait_for_compression(&self) {
        self.rotation.wait_for_compression();
    }

    /// Syncs and closes the active file. An open transaction is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::CouldNotClose`] if the final sync fails.
    pub fn close(self) -> JournalResult<()> {
        self.file
            .sync_all()
            .map_err(|e| JournalError::could_not_close(&self.path, e))
    }
}

/// Opens or creates `path`, writing a header if the file is empty.
///
/// Returns the file, its size and its format version.
fn init_file(
    path: &Path,
    truncate: bool,
    new_file_version: FormatVersion,
) -> JournalResult<(File, u64, FormatVersion)> {
    let write_err = |e| JournalError::could_not_write(path, e);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(write_err)?;

    if truncate {
        file.set_len(0).map_err(write_err)?;
    }

    let len = file.metadata().map_err(write_err)?.len();
    if len == 0 {
        file.write_all(&new_file_version.file_header())
            .map_err(write_err)?;
        return Ok((file, FILE_HEADER_SIZE as u64, new_file_version));
    }

    let mut header = [0u8; FILE_HEADER_SIZE];
    file.read_exact(&mut header).map_err(|e| {
        JournalError::begin_of_journal(path, format!("could not read header: {e}"))
    })?;

    let version = FormatVersion::from_file_header(&header)
        .map_err(|e| JournalError::begin_of_journal(path, e.to_string()))?;
    Ok((file, len, version))
}
