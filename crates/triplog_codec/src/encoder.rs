//! Entry encoder and transaction framing.

use crate::entry::{statement_flags, DataFlags, JournalEntry, ObjectRef, StatementOp};
use crate::error::{CodecError, CodecResult};
use crate::format::{
    transaction_crc, FormatVersion, TransactionFormat, CRC_SPAN_OFFSET, TRANSACTION_FOOTER_SIZE,
    TRANSACTION_HEADER_SIZE, WORD_SIZE,
};
use bytes::{BufMut, BytesMut};

/// Initial capacity of a transaction buffer.
const MIN_BLOCK_SIZE: usize = 1024;

fn check_cstring(text: &str, what: &str) -> CodecResult<()> {
    if text.as_bytes().contains(&0) {
        return Err(CodecError::unsupported(format!(
            "{what} contains an interior NUL byte"
        )));
    }
    Ok(())
}

fn put_cstring(buf: &mut impl BufMut, text: &str) {
    buf.put_slice(text.as_bytes());
    buf.put_u8(0);
}

/// Encodes a resource entry.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedOperation`] if `uri` contains a NUL byte.
pub fn encode_resource(buf: &mut impl BufMut, subject_id: u32, uri: &str) -> CodecResult<()> {
    check_cstring(uri, "resource uri")?;

    buf.put_u32(DataFlags::RESOURCE_INSERT.bits());
    buf.put_u32(subject_id);
    put_cstring(buf, uri);
    Ok(())
}

/// Encodes a statement entry for a file of the given version.
///
/// Nothing is written when an error is returned.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedOperation`] for an update in a format 03
/// file or a string object containing a NUL byte.
pub fn encode_statement(
    buf: &mut impl BufMut,
    version: FormatVersion,
    op: StatementOp,
    graph_id: Option<u32>,
    subject_id: u32,
    predicate_id: u32,
    object: ObjectRef<'_>,
) -> CodecResult<()> {
    if op == StatementOp::Update && !version.supports_update() {
        return Err(CodecError::unsupported(format!(
            "update statements cannot be written to format {version} journals"
        )));
    }
    if let ObjectRef::Str(text) = object {
        check_cstring(text, "statement object")?;
    }

    buf.put_u32(statement_flags(op, graph_id, object).bits());
    if let Some(graph_id) = graph_id {
        buf.put_u32(graph_id);
    }
    buf.put_u32(subject_id);
    buf.put_u32(predicate_id);
    match object {
        ObjectRef::Str(text) => put_cstring(buf, text),
        ObjectRef::Id(id) => buf.put_u32(id),
    }
    Ok(())
}

/// Encodes any entry.
///
/// # Errors
///
/// See [`encode_resource`] and [`encode_statement`].
pub fn encode_entry(
    buf: &mut impl BufMut,
    version: FormatVersion,
    entry: &JournalEntry,
) -> CodecResult<()> {
    match entry {
        JournalEntry::Resource { subject_id, uri } => encode_resource(buf, *subject_id, uri),
        JournalEntry::Statement(statement) => encode_statement(
            buf,
            version,
            statement.op,
            statement.graph_id,
            statement.subject_id,
            statement.predicate_id,
            statement.object.as_object_ref(),
        ),
    }
}

/// Buffers one in-flight transaction and frames it on [`finish`](Self::finish).
///
/// ```text
/// | size | count | crc | timestamp | format | entries... | size |
///                      ^---------------- crc span -------------^
/// ```
#[derive(Debug)]
pub struct TransactionEncoder {
    buf: BytesMut,
    entry_count: u32,
    format: TransactionFormat,
    version: FormatVersion,
}

impl TransactionEncoder {
    /// Starts a transaction. Size, count and crc are filled in on finish.
    #[must_use]
    pub fn new(timestamp: u32, format: TransactionFormat, version: FormatVersion) -> Self {
        let mut buf = BytesMut::with_capacity(MIN_BLOCK_SIZE);
        buf.put_bytes(0, CRC_SPAN_OFFSET);
        buf.put_u32(timestamp);
        buf.put_u32(format.as_u32());

        Self {
            buf,
            entry_count: 0,
            format,
            version,
        }
    }

    /// Returns the transaction format.
    #[must_use]
    pub fn format(&self) -> TransactionFormat {
        self.format
    }

    /// Returns the number of buffered entries.
    #[must_use]
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Returns the framed size the transaction would have if finished now.
    #[must_use]
    pub fn framed_len(&self) -> usize {
        self.buf.len() + TRANSACTION_FOOTER_SIZE
    }

    /// Appends a resource entry.
    ///
    /// # Errors
    ///
    /// See [`encode_resource`].
    pub fn push_resource(&mut self, subject_id: u32, uri: &str) -> CodecResult<()> {
        encode_resource(&mut self.buf, subject_id, uri)?;
        self.entry_count += 1;
        Ok(())
    }

    /// Appends a statement entry.
    ///
    /// # Errors
    ///
    /// See [`encode_statement`].
    pub fn push_statement(
        &mut self,
        op: StatementOp,
        graph_id: Option<u32>,
        subject_id: u32,
        predicate_id: u32,
        object: ObjectRef<'_>,
    ) -> CodecResult<()> {
        encode_statement(
            &mut self.buf,
            self.version,
            op,
            graph_id,
            subject_id,
            predicate_id,
            object,
        )?;
        self.entry_count += 1;
        Ok(())
    }

    /// Appends any entry.
    ///
    /// # Errors
    ///
    /// See [`encode_entry`].
    pub fn push(&mut self, entry: &JournalEntry) -> CodecResult<()> {
        encode_entry(&mut self.buf, self.version, entry)?;
        self.entry_count += 1;
        Ok(())
    }

    /// Writes the footer, size, count and crc, returning the framed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedOperation`] if the transaction does
    /// not fit the 32-bit size field.
    pub fn finish(mut self) -> CodecResult<Vec<u8>> {
        let size = u32::try_from(self.framed_len()).map_err(|_| {
            CodecError::unsupported(format!(
                "transaction of {} bytes exceeds the 32-bit size field",
                self.framed_len()
            ))
        })?;

        self.buf.put_u32(size);
        self.buf[0..WORD_SIZE].copy_from_slice(&size.to_be_bytes());
        self.buf[WORD_SIZE..2 * WORD_SIZE].copy_from_slice(&self.entry_count.to_be_bytes());

        let crc = transaction_crc(&self.buf[CRC_SPAN_OFFSET..]);
        self.buf[2 * WORD_SIZE..CRC_SPAN_OFFSET].copy_from_slice(&crc.to_be_bytes());

        debug_assert!(self.buf.len() >= TRANSACTION_HEADER_SIZE + TRANSACTION_FOOTER_SIZE);
        Ok(self.buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_layout() {
        let mut buf = Vec::new();
        encode_resource(&mut buf, 1, "ab").unwrap();
        assert_eq!(buf, [0, 0, 0, 1, 0, 0, 0, 1, b'a', b'b', 0]);
    }

    #[test]
    fn statement_with_graph_and_id_layout() {
        let mut buf = Vec::new();
        encode_statement(
            &mut buf,
            FormatVersion::V04,
            StatementOp::Delete,
            Some(7),
            1,
            2,
            ObjectRef::Id(3),
        )
        .unwrap();
        assert_eq!(
            buf,
            [0, 0, 0, 0x0E, 0, 0, 0, 7, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]
        );
    }

    #[test]
    fn update_refused_for_legacy_format() {
        let mut buf = Vec::new();
        let result = encode_statement(
            &mut buf,
            FormatVersion::V03,
            StatementOp::Update,
            None,
            1,
            2,
            ObjectRef::Str("x"),
        );
        assert!(matches!(result, Err(CodecError::UnsupportedOperation { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn interior_nul_refused() {
        let mut buf = Vec::new();
        assert!(encode_resource(&mut buf, 1, "a\0b").is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_transaction_frame() {
        let encoder = TransactionEncoder::new(1000, TransactionFormat::Data, FormatVersion::V04);
        let bytes = encoder.finish().unwrap();

        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], &24u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &0u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &1000u32.to_be_bytes());
        assert_eq!(&bytes[16..20], &1u32.to_be_bytes());
        assert_eq!(&bytes[20..24], &24u32.to_be_bytes());

        let crc = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        assert_eq!(crc, transaction_crc(&bytes[12..]));
    }

    #[test]
    fn frame_counts_entries() {
        let mut encoder =
            TransactionEncoder::new(5, TransactionFormat::Data, FormatVersion::V04);
        encoder.push_resource(1, "http://a").unwrap();
        encoder
            .push_statement(StatementOp::Insert, None, 1, 2, ObjectRef::Str("v"))
            .unwrap();
        assert_eq!(encoder.entry_count(), 2);

        let expected_len = encoder.framed_len();
        let bytes = encoder.finish().unwrap();
        assert_eq!(bytes.len(), expected_len);
        assert_eq!(&bytes[4..8], &2u32.to_be_bytes());
        assert_eq!(&bytes[bytes.len() - 4..], &(expected_len as u32).to_be_bytes());
    }

    #[test]
    fn failed_push_does_not_count() {
        let mut encoder =
            TransactionEncoder::new(5, TransactionFormat::Data, FormatVersion::V03);
        let before = encoder.framed_len();
        assert!(encoder
            .push_statement(StatementOp::Update, None, 1, 2, ObjectRef::Id(1))
            .is_err());
        assert_eq!(encoder.entry_count(), 0);
        assert_eq!(encoder.framed_len(), before);
    }
}
