//! Journal reader.
//!
//! The reader walks a journal file one event at a time:
//!
//! ```text
//! AwaitingTransaction --size,count,crc,ts,format--> InTransaction(count)
//! InTransaction(n > 0) --entry--> InTransaction(n - 1)
//! InTransaction(0) --footer--> AwaitingTransaction
//! ```
//!
//! Uncompressed files are memory-mapped, and every transaction is checked
//! against the file end, its footer and its checksum before any of its
//! entries are decoded. Compressed chunks are streamed; only the footer and
//! the consumed length are checked for them.
//!
//! In chain mode the reader starts at chunk 1 and moves to the next chunk
//! at each clean end of file, finishing with the active file.

use crate::error::{JournalError, JournalResult};
use crate::layout::JournalLayout;
use flate2::read::GzDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use triplog_codec::{
    decode_entry, read_u32, transaction_crc, ByteSource, CodecError, CodecResult, FormatVersion,
    JournalEntry, SliceSource, StatementOp, StreamSource, StringOrId, TransactionFormat,
    CRC_SPAN_OFFSET, FILE_HEADER_SIZE, MIN_TRANSACTION_SIZE, WORD_SIZE,
};

/// Kind of the event the reader is positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Nothing has been read yet.
    Start,
    /// A data transaction began.
    StartTransaction,
    /// An ontology transaction began.
    StartOntologyTransaction,
    /// The current transaction ended and was verified.
    EndTransaction,
    /// A resource was inserted.
    Resource,
    /// A statement with a string object was inserted.
    InsertStatement,
    /// A statement with an id object was inserted.
    InsertStatementId,
    /// A statement with a string object was deleted.
    DeleteStatement,
    /// A statement with an id object was deleted.
    DeleteStatementId,
    /// A statement with a string object was updated.
    UpdateStatement,
    /// A statement with an id object was updated.
    UpdateStatementId,
}

impl EntryType {
    fn of(entry: &JournalEntry) -> Self {
        match entry {
            JournalEntry::Resource { .. } => Self::Resource,
            JournalEntry::Statement(statement) => {
                let is_id = matches!(statement.object, StringOrId::Id(_));
                match (statement.op, is_id) {
                    (StatementOp::Insert, false) => Self::InsertStatement,
                    (StatementOp::Insert, true) => Self::InsertStatementId,
                    (StatementOp::Delete, false) => Self::DeleteStatement,
                    (StatementOp::Delete, true) => Self::DeleteStatementId,
                    (StatementOp::Update, false) => Self::UpdateStatement,
                    (StatementOp::Update, true) => Self::UpdateStatementId,
                }
            }
        }
    }
}

/// An owned reader event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    /// A transaction began.
    StartTransaction {
        /// Commit timestamp.
        timestamp: u32,
        /// Data or ontology.
        format: TransactionFormat,
    },
    /// One entry of the current transaction.
    Entry(JournalEntry),
    /// The current transaction ended and was verified.
    EndTransaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    AwaitingTransaction,
    InTransaction { remaining: u32 },
}

type CompressedStream = StreamSource<GzDecoder<BufReader<File>>>;

/// Bytes of one journal file, mapped or decompressed.
#[derive(Debug)]
enum FileSource {
    Mapped(SliceSource<Mmap>),
    Compressed {
        stream: CompressedStream,
        compressed_len: u64,
    },
}

impl FileSource {
    /// Restricts reads to bytes before `end`. Streams are not bounded.
    fn bound(&mut self, end: Option<u64>) {
        if let Self::Mapped(source) = self {
            source.set_limit(end.and_then(|end| usize::try_from(end).ok()));
        }
    }

    /// Fraction of this file consumed so far.
    fn fraction(&self) -> f64 {
        match self {
            Self::Mapped(source) if source.is_empty() => 1.0,
            Self::Mapped(source) => source.position() as f64 / source.len() as f64,
            Self::Compressed {
                stream,
                compressed_len,
            } => {
                let mut file: &File = stream.get_ref().get_ref().get_ref();
                match file.stream_position() {
                    Ok(pos) if *compressed_len > 0 => pos as f64 / *compressed_len as f64,
                    _ => 0.0,
                }
            }
        }
    }
}

impl ByteSource for FileSource {
    fn peek(&mut self, n: usize) -> CodecResult<&[u8]> {
        match self {
            Self::Mapped(source) => source.peek(n),
            Self::Compressed { stream, .. } => stream.peek(n),
        }
    }

    fn advance(&mut self, n: usize) {
        match self {
            Self::Mapped(source) => source.advance(n),
            Self::Compressed { stream, .. } => stream.advance(n),
        }
    }

    fn remaining(&self) -> Option<usize> {
        match self {
            Self::Mapped(source) => source.remaining(),
            Self::Compressed { stream, .. } => stream.remaining(),
        }
    }

    fn position(&self) -> u64 {
        match self {
            Self::Mapped(source) => source.position(),
            Self::Compressed { stream, .. } => stream.position(),
        }
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Opens `path` and consumes its file header.
fn open_source(path: &Path) -> JournalResult<(FileSource, FormatVersion)> {
    let file = File::open(path).map_err(|e| JournalError::open(path, e))?;

    if is_compressed(path) {
        let compressed_len = file.metadata().map_err(|e| JournalError::open(path, e))?.len();
        let mut stream = StreamSource::new(GzDecoder::new(BufReader::new(file)));
        let header = stream
            .peek(FILE_HEADER_SIZE)
            .map_err(|e| JournalError::begin_of_journal(path, e.to_string()))?;
        let version = FormatVersion::from_file_header(header)
            .map_err(|e| JournalError::begin_of_journal(path, e.to_string()))?;
        stream.advance(FILE_HEADER_SIZE);
        return Ok((
            FileSource::Compressed {
                stream,
                compressed_len,
            },
            version,
        ));
    }

    let len = file.metadata().map_err(|e| JournalError::open(path, e))?.len();
    if len < FILE_HEADER_SIZE as u64 {
        return Err(JournalError::begin_of_journal(
            path,
            format!("file has {len} bytes, the header needs {FILE_HEADER_SIZE}"),
        ));
    }

    // SAFETY: Journal files are append-only and a file is never read while
    // a writer holds it open, so the mapped bytes do not change underneath.
    #[allow(unsafe_code)]
    let map = unsafe { Mmap::map(&file) }.map_err(|e| JournalError::open(path, e))?;

    let mut source = SliceSource::new(map);
    let version = FormatVersion::from_file_header(&source.as_slice()[..FILE_HEADER_SIZE])
        .map_err(|e| JournalError::begin_of_journal(path, e.to_string()))?;
    source.seek(FILE_HEADER_SIZE);
    Ok((FileSource::Mapped(source), version))
}

/// Reads events from a journal file or a whole chunk chain.
///
/// [`next`](Self::next) advances by one event; accessors describe the
/// event the reader is positioned on. After an error the reader stops.
///
/// # Example
///
/// ```no_run
/// use triplog_core::{EntryType, JournalReader};
///
/// let mut reader = JournalReader::open_chain("/data/tracker-store.journal", None).unwrap();
/// while reader.next().unwrap() {
///     if reader.entry_type() == EntryType::Resource {
///         let (id, uri) = reader.get_resource().unwrap();
///         println!("{id} = {uri}");
///     }
/// }
/// ```
#[derive(Debug)]
pub struct JournalReader {
    layout: JournalLayout,
    chained: bool,
    /// Chunk being read, 0 for the active file.
    current_chunk: u32,
    total_chunks: u32,
    path: PathBuf,
    source: FileSource,
    version: FormatVersion,
    state: ReaderState,
    entry_type: EntryType,
    /// Offset of the current transaction in the current file.
    entry_begin: u64,
    declared_size: u32,
    timestamp: u32,
    format: TransactionFormat,
    current: Option<JournalEntry>,
    /// End of the last verified transaction in the current file.
    last_success: u64,
    finished: bool,
    halted: bool,
}

impl JournalReader {
    /// Opens a single journal file. The reader stops at its end.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Open`] if the file cannot be opened and
    /// [`JournalError::BeginOfJournal`] if its header is unreadable.
    pub fn open(path: impl AsRef<Path>) -> JournalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (source, version) = open_source(&path)?;
        Ok(Self::with_source(
            JournalLayout::new(&path),
            false,
            0,
            0,
            path,
            source,
            version,
        ))
    }

    /// Opens the chunk chain of the active file at `active`, starting at
    /// chunk 1 and ending with the active file itself.
    ///
    /// `archive_dir` is where compressed chunks live, if not next to the
    /// active file.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_chain(
        active: impl AsRef<Path>,
        archive_dir: Option<PathBuf>,
    ) -> JournalResult<Self> {
        let layout = JournalLayout::new(active.as_ref()).with_archive_dir(archive_dir);
        let total_chunks = layout.count_chunks();

        let (chunk, path) = match layout.resolve_chunk(1) {
            Some(path) => (1, path),
            None => (0, layout.active_path().to_path_buf()),
        };
        let (source, version) = open_source(&path)?;

        debug!(
            path = %path.display(),
            chunks = total_chunks,
            "opened journal chain for replay"
        );

        Ok(Self::with_source(
            layout,
            true,
            chunk,
            total_chunks,
            path,
            source,
            version,
        ))
    }

    fn with_source(
        layout: JournalLayout,
        chained: bool,
        current_chunk: u32,
        total_chunks: u32,
        path: PathBuf,
        source: FileSource,
        version: FormatVersion,
    ) -> Self {
        Self {
            layout,
            chained,
            current_chunk,
            total_chunks,
            path,
            source,
            version,
            state: ReaderState::AwaitingTransaction,
            entry_type: EntryType::Start,
            entry_begin: FILE_HEADER_SIZE as u64,
            declared_size: 0,
            timestamp: 0,
            format: TransactionFormat::Data,
            current: None,
            last_success: FILE_HEADER_SIZE as u64,
            finished: false,
            halted: false,
        }
    }

    /// Advances to the next event.
    ///
    /// Returns `Ok(false)` at the clean end of the file (or of the chain).
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::DamagedJournalEntry`] when a transaction
    /// fails validation. The reader does not skip past damage: every later
    /// call returns [`JournalError::InvalidOperation`], and
    /// [`size_of_correct`](Self::size_of_correct) reports where the
    /// verified prefix of the current file ends.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> JournalResult<bool> {
        if self.halted {
            return Err(JournalError::invalid_operation(
                "reader stopped after an error",
            ));
        }
        if self.finished {
            return Ok(false);
        }

        let result = self.step();
        match &result {
            Ok(true) => {}
            Ok(false) => self.finished = true,
            Err(e) => {
                self.halted = true;
                self.current = None;
                if e.is_damaged() {
                    warn!(
                        path = %self.path.display(),
                        offset = self.entry_begin,
                        last_success = self.last_success,
                        error = %e,
                        "damaged journal entry"
                    );
                }
            }
        }
        result
    }

    fn step(&mut self) -> JournalResult<bool> {
        match self.state {
            ReaderState::AwaitingTransaction => self.read_transaction_header(),
            ReaderState::InTransaction { remaining: 0 } => self.read_footer(),
            ReaderState::InTransaction { remaining } => self.read_entry(remaining),
        }
    }

    fn decode_err(&self, error: CodecError) -> JournalError {
        JournalError::from_decode(&self.path, self.entry_begin, error)
    }

    fn damaged(&self, message: impl Into<String>) -> JournalError {
        JournalError::damaged(&self.path, self.entry_begin, message)
    }

    fn read_transaction_header(&mut self) -> JournalResult<bool> {
        while self.source.at_end().map_err(|e| self.decode_err(e))? {
            if !(self.chained && self.current_chunk != 0 && self.advance_file()?) {
                return Ok(false);
            }
        }

        self.entry_begin = self.source.position();
        let size = read_u32(&mut self.source).map_err(|e| self.decode_err(e))?;
        if (size as usize) < MIN_TRANSACTION_SIZE {
            return Err(self.damaged(format!(
                "declared size {size} is below the minimum of {MIN_TRANSACTION_SIZE}"
            )));
        }

        if matches!(self.source, FileSource::Mapped(_)) {
            self.check_mapped_transaction(size)?;
            self.source.bound(Some(self.entry_begin + u64::from(size)));
        }

        let count = read_u32(&mut self.source).map_err(|e| self.decode_err(e))?;
        read_u32(&mut self.source).map_err(|e| self.decode_err(e))?;
        let timestamp = read_u32(&mut self.source).map_err(|e| self.decode_err(e))?;
        let format_tag = read_u32(&mut self.source).map_err(|e| self.decode_err(e))?;
        let format = TransactionFormat::from_u32(format_tag)
            .ok_or_else(|| self.damaged(format!("unknown transaction format {format_tag}")))?;

        self.declared_size = size;
        self.timestamp = timestamp;
        self.format = format;
        self.current = None;
        self.state = ReaderState::InTransaction { remaining: count };
        self.entry_type = match format {
            TransactionFormat::Data => EntryType::StartTransaction,
            TransactionFormat::Ontology => EntryType::StartOntologyTransaction,
        };
        Ok(true)
    }

    /// Checks bounds, footer and checksum of a transaction whose size word
    /// has just been read from a mapped file.
    fn check_mapped_transaction(&self, size: u32) -> JournalResult<()> {
        let FileSource::Mapped(source) = &self.source else {
            return Ok(());
        };

        let start = usize::try_from(source.position()).unwrap_or(usize::MAX);
        let rest = size as usize - WORD_SIZE;
        if rest > source.len().saturating_sub(start) {
            return Err(self.damaged(format!(
                "transaction of {size} bytes runs past the end of the file"
            )));
        }

        let body = &source.as_slice()[start..start + rest];
        let footer = word_at(body, rest - WORD_SIZE);
        let stored_crc = word_at(body, WORD_SIZE);
        let actual_crc = transaction_crc(&body[CRC_SPAN_OFFSET - WORD_SIZE..]);

        if footer != size {
            return Err(self.damaged(format!(
                "footer {footer} does not match declared size {size}"
            )));
        }
        if stored_crc != actual_crc {
            return Err(self.damaged(format!(
                "crc mismatch: stored {stored_crc:#010x}, computed {actual_crc:#010x}"
            )));
        }
        Ok(())
    }

    fn read_entry(&mut self, remaining: u32) -> JournalResult<bool> {
        let entry = decode_entry(&mut self.source, self.version).map_err(|e| self.decode_err(e))?;
        self.entry_type = EntryType::of(&entry);
        self.current = Some(entry);
        self.state = ReaderState::InTransaction {
            remaining: remaining - 1,
        };
        Ok(true)
    }

    fn read_footer(&mut self) -> JournalResult<bool> {
        let footer = read_u32(&mut self.source).map_err(|e| self.decode_err(e))?;
        let end = self.entry_begin + u64::from(self.declared_size);

        if footer != self.declared_size {
            return Err(self.damaged(format!(
                "footer {footer} does not match declared size {}",
                self.declared_size
            )));
        }
        if self.source.position() != end {
            return Err(self.damaged(format!(
                "transaction ends at offset {}, its size puts the end at {end}",
                self.source.position()
            )));
        }

        self.source.bound(None);
        self.current = None;
        self.entry_type = EntryType::EndTransaction;
        self.state = ReaderState::AwaitingTransaction;
        self.last_success = end;
        Ok(true)
    }

    /// Moves to the next chunk, or to the active file after the last one.
    ///
    /// Returns `false` when there is nothing left to read.
    fn advance_file(&mut self) -> JournalResult<bool> {
        let next = self.current_chunk + 1;
        let (chunk, path) = match self.layout.resolve_chunk(next) {
            Some(path) => (next, path),
            None => {
                let active = self.layout.active_path();
                if !active.exists() {
                    return Ok(false);
                }
                (0, active.to_path_buf())
            }
        };

        let (source, version) = open_source(&path)?;
        debug!(chunk, path = %path.display(), "switching journal file");

        self.source = source;
        self.version = version;
        self.path = path;
        self.current_chunk = chunk;
        self.entry_begin = FILE_HEADER_SIZE as u64;
        self.last_success = FILE_HEADER_SIZE as u64;
        Ok(true)
    }

    /// Positions a mapped reader on the last transaction of its file,
    /// using the size stored in the file's final word.
    ///
    /// Returns `false` if the file holds no transactions.
    pub(crate) fn seek_to_last_transaction(&mut self) -> JournalResult<bool> {
        let FileSource::Mapped(source) = &mut self.source else {
            return Err(JournalError::invalid_operation(
                "only uncompressed files can be verified from the tail",
            ));
        };

        let len = source.len();
        if len == FILE_HEADER_SIZE {
            return Ok(false);
        }

        let tail_offset = len.saturating_sub(WORD_SIZE);
        let size = word_at(source.as_slice(), tail_offset) as usize;
        if size < MIN_TRANSACTION_SIZE || size > len - FILE_HEADER_SIZE {
            return Err(JournalError::damaged(
                &self.path,
                tail_offset as u64,
                format!("last transaction size {size} does not fit a {len} byte file"),
            ));
        }

        let begin = len - size;
        source.seek(begin);
        self.entry_begin = begin as u64;
        self.last_success = begin as u64;
        Ok(true)
    }

    /// Returns the kind of event the reader is positioned on.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Returns the resource id and URI of a [`EntryType::Resource`] event.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidOperation`] for any other event.
    pub fn get_resource(&self) -> JournalResult<(u32, &str)> {
        match &self.current {
            Some(JournalEntry::Resource { subject_id, uri }) => Ok((*subject_id, uri.as_str())),
            _ => Err(self.mismatch("a resource")),
        }
    }

    /// Returns graph, subject, predicate and string object of a statement
    /// event with a string object.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidOperation`] for any other event.
    pub fn get_statement(&self) -> JournalResult<(Option<u32>, u32, u32, &str)> {
        match &self.current {
            Some(JournalEntry::Statement(statement)) => match &statement.object {
                StringOrId::Str(object) => Ok((
                    statement.graph_id,
                    statement.subject_id,
                    statement.predicate_id,
                    object.as_str(),
                )),
                StringOrId::Id(_) => Err(self.mismatch("a statement with a string object")),
            },
            _ => Err(self.mismatch("a statement with a string object")),
        }
    }

    /// Returns graph, subject, predicate and object id of a statement
    /// event with an id object.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidOperation`] for any other event.
    pub fn get_statement_id(&self) -> JournalResult<(Option<u32>, u32, u32, u32)> {
        match &self.current {
            Some(JournalEntry::Statement(statement)) => match statement.object {
                StringOrId::Id(object_id) => Ok((
                    statement.graph_id,
                    statement.subject_id,
                    statement.predicate_id,
                    object_id,
                )),
                StringOrId::Str(_) => Err(self.mismatch("a statement with an id object")),
            },
            _ => Err(self.mismatch("a statement with an id object")),
        }
    }

    fn mismatch(&self, expected: &str) -> JournalError {
        JournalError::invalid_operation(format!(
            "current event is {:?}, not {expected}",
            self.entry_type
        ))
    }

    /// Returns the entry the reader is positioned on, if any.
    #[must_use]
    pub fn current_entry(&self) -> Option<&JournalEntry> {
        self.current.as_ref()
    }

    /// Returns the current event as an owned value.
    #[must_use]
    pub fn event(&self) -> Option<JournalEvent> {
        match self.entry_type {
            EntryType::Start => None,
            EntryType::StartTransaction | EntryType::StartOntologyTransaction => {
                Some(JournalEvent::StartTransaction {
                    timestamp: self.timestamp,
                    format: self.format,
                })
            }
            EntryType::EndTransaction => Some(JournalEvent::EndTransaction),
            _ => self.current.clone().map(JournalEvent::Entry),
        }
    }

    /// Timestamp of the current transaction.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Format of the current transaction.
    #[must_use]
    pub fn format(&self) -> TransactionFormat {
        self.format
    }

    /// Format version of the current file.
    #[must_use]
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Offset in the current file where the last verified transaction
    /// ends. Truncating the file here drops only unverified data.
    #[must_use]
    pub fn size_of_correct(&self) -> u64 {
        self.last_success
    }

    /// Path of the file being read.
    #[must_use]
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Chunk being read, 0 for the active file.
    #[must_use]
    pub fn current_chunk(&self) -> u32 {
        self.current_chunk
    }

    /// Fraction of the input consumed so far, between 0 and 1.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.finished {
            return 1.0;
        }

        let files = if self.chained { self.total_chunks + 1 } else { 1 };
        let index = match self.current_chunk {
            0 => files - 1,
            chunk => (chunk - 1).min(files - 1),
        };
        let within = self.source.fraction().clamp(0.0, 1.0);
        ((f64::from(index) + within) / f64::from(files)).clamp(0.0, 1.0)
    }

    /// Returns an iterator over owned events.
    ///
    /// The iterator ends at the clean end of input, or after yielding the
    /// first error.
    pub fn events(&mut self) -> Events<'_> {
        Events {
            reader: self,
            done: false,
        }
    }
}

fn word_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Iterator over a reader's events. See [`JournalReader::events`].
#[derive(Debug)]
pub struct Events<'a> {
    reader: &'a mut JournalReader,
    done: bool,
}

impl Iterator for Events<'_> {
    type Item = JournalResult<JournalEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next() {
            Ok(true) => {
                let event = self.reader.event();
                if event.is_none() {
                    self.done = true;
                }
                event.map(Ok)
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Events<'_> {}
