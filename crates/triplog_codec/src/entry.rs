//! Journal entry types and their flag words.

use crate::error::{CodecError, CodecResult};
use crate::format::{FormatVersion, TransactionFormat, WORD_SIZE};

/// Flag word preceding every entry.
///
/// ```text
/// bit0  resource insert (all other bits must be clear)
/// bit1  object is an id (clear: NUL-terminated string)
/// bit2  delete
/// bit3  named graph present
/// bit4  update (format 04 only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataFlags(u32);

impl DataFlags {
    /// Resource creation.
    pub const RESOURCE_INSERT: Self = Self(1 << 0);
    /// Object is stored as an id word.
    pub const OBJECT_ID: Self = Self(1 << 1);
    /// Statement delete.
    pub const DELETE: Self = Self(1 << 2);
    /// Graph id word present.
    pub const GRAPH: Self = Self(1 << 3);
    /// Statement update.
    pub const UPDATE: Self = Self(1 << 4);

    const KNOWN_V03: u32 = 0x0F;
    const KNOWN_V04: u32 = 0x1F;

    /// Returns the raw flag word.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Validates a flag word read from a file of the given version.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Damaged`] for bits the version does not define,
    /// a resource flag combined with other bits, or delete combined with
    /// update.
    pub fn from_bits(bits: u32, version: FormatVersion) -> CodecResult<Self> {
        let known = if version.supports_update() {
            Self::KNOWN_V04
        } else {
            Self::KNOWN_V03
        };

        if bits & !known != 0 {
            return Err(CodecError::damaged(format!(
                "unknown flag bits {bits:#x} for format {version}"
            )));
        }

        let flags = Self(bits);
        if flags.contains(Self::RESOURCE_INSERT) && flags != Self::RESOURCE_INSERT {
            return Err(CodecError::damaged(format!(
                "resource flag combined with statement bits {bits:#x}"
            )));
        }
        if flags.contains(Self::DELETE) && flags.contains(Self::UPDATE) {
            return Err(CodecError::damaged("delete and update both set"));
        }

        Ok(flags)
    }
}

impl std::ops::BitOr for DataFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for DataFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Object of a statement: literal text or a resolved id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StringOrId {
    /// UTF-8 text, NUL-terminated on disk.
    Str(String),
    /// Resolved 32-bit id.
    Id(u32),
}

impl StringOrId {
    /// Borrows the object.
    #[must_use]
    pub fn as_object_ref(&self) -> ObjectRef<'_> {
        match self {
            Self::Str(text) => ObjectRef::Str(text),
            Self::Id(id) => ObjectRef::Id(*id),
        }
    }
}

impl From<&str> for StringOrId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for StringOrId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<u32> for StringOrId {
    fn from(value: u32) -> Self {
        Self::Id(value)
    }
}

/// Borrowed form of [`StringOrId`] used on the encode path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef<'a> {
    /// UTF-8 text.
    Str(&'a str),
    /// Resolved id.
    Id(u32),
}

impl ObjectRef<'_> {
    /// Converts to an owned object.
    #[must_use]
    pub fn to_owned_object(self) -> StringOrId {
        match self {
            Self::Str(text) => StringOrId::Str(text.to_owned()),
            Self::Id(id) => StringOrId::Id(id),
        }
    }

    pub(crate) fn encoded_len(self) -> usize {
        match self {
            Self::Str(text) => text.len() + 1,
            Self::Id(_) => WORD_SIZE,
        }
    }
}

/// Kind of statement change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementOp {
    /// Statement inserted.
    Insert,
    /// Statement deleted.
    Delete,
    /// Statement value replaced. Requires format 04.
    Update,
}

/// A single triple change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    /// Named graph, or `None` for the default graph.
    pub graph_id: Option<u32>,
    /// Subject id.
    pub subject_id: u32,
    /// Predicate id.
    pub predicate_id: u32,
    /// Object value.
    pub object: StringOrId,
    /// Change kind.
    pub op: StatementOp,
}

/// One mutation record inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JournalEntry {
    /// A resource was created.
    Resource {
        /// Id assigned to the resource.
        subject_id: u32,
        /// The resource URI.
        uri: String,
    },
    /// A statement was inserted, deleted or updated.
    Statement(Statement),
}

impl JournalEntry {
    /// Creates a resource entry.
    pub fn resource(subject_id: u32, uri: impl Into<String>) -> Self {
        Self::Resource {
            subject_id,
            uri: uri.into(),
        }
    }

    /// Creates a statement entry.
    pub fn statement(
        op: StatementOp,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object: impl Into<StringOrId>,
    ) -> Self {
        Self::Statement(Statement {
            graph_id,
            subject_id,
            predicate_id,
            object: object.into(),
            op,
        })
    }

    /// Returns the flag word this entry is encoded with.
    #[must_use]
    pub fn flags(&self) -> DataFlags {
        match self {
            Self::Resource { .. } => DataFlags::RESOURCE_INSERT,
            Self::Statement(statement) => {
                statement_flags(statement.op, statement.graph_id, statement.object.as_object_ref())
            }
        }
    }

    /// Returns the number of bytes this entry occupies on disk.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Resource { uri, .. } => 2 * WORD_SIZE + uri.len() + 1,
            Self::Statement(statement) => {
                let graph = if statement.graph_id.is_some() { WORD_SIZE } else { 0 };
                3 * WORD_SIZE + graph + statement.object.as_object_ref().encoded_len()
            }
        }
    }
}

pub(crate) fn statement_flags(
    op: StatementOp,
    graph_id: Option<u32>,
    object: ObjectRef<'_>,
) -> DataFlags {
    let mut flags = match op {
        StatementOp::Insert => DataFlags::default(),
        StatementOp::Delete => DataFlags::DELETE,
        StatementOp::Update => DataFlags::UPDATE,
    };
    if graph_id.is_some() {
        flags |= DataFlags::GRAPH;
    }
    if matches!(object, ObjectRef::Id(_)) {
        flags |= DataFlags::OBJECT_ID;
    }
    flags
}

/// A committed group of entries as seen on replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Seconds since the Unix epoch, truncated to 32 bits.
    pub timestamp: u32,
    /// Data or ontology transaction.
    pub format: TransactionFormat,
    /// Entries in commit order.
    pub entries: Vec<JournalEntry>,
}

impl Transaction {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new(timestamp: u32, format: TransactionFormat) -> Self {
        Self {
            timestamp,
            format,
            entries: Vec::new(),
        }
    }
}
