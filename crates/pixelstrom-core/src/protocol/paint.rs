//! Paint record batches (panic-free).
//!
//! Layout per record, big-endian, 8 bytes:
//! `x:u16, y:u16, r:u8, g:u8, b:u8, a:u8`.
//!
//! A batch is validated once (length check) and then read lazily; iteration
//! order is stream order and is the order records must be applied in.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, ViewerError};

/// Size of one encoded paint record.
pub const PAINT_RECORD_LEN: usize = 8;

/// One incremental pixel update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintRecord {
    pub x: u16,
    pub y: u16,
    /// Color as sent. The store ignores the alpha byte.
    pub rgba: [u8; 4],
}

impl PaintRecord {
    pub fn new(x: u16, y: u16, rgba: [u8; 4]) -> Self {
        Self { x, y, rgba }
    }
}

/// A validated batch of paint records (zero-copy over the message bytes).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaintBatch {
    raw: Bytes,
}

impl PaintBatch {
    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.raw.len() / PAINT_RECORD_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Fresh iterator from the first record. Can be called any number of times.
    pub fn iter(&self) -> PaintRecords {
        PaintRecords {
            buf: self.raw.clone(),
        }
    }

    /// Encoded form, as carried on the wire.
    pub fn as_bytes(&self) -> &Bytes {
        &self.raw
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PaintRecord>,
    {
        Self {
            raw: encode_paint_batch(records),
        }
    }
}

impl<'a> IntoIterator for &'a PaintBatch {
    type Item = PaintRecord;
    type IntoIter = PaintRecords;

    fn into_iter(self) -> PaintRecords {
        self.iter()
    }
}

/// Lazy reader over an encoded batch.
#[derive(Debug, Clone)]
pub struct PaintRecords {
    buf: Bytes,
}

impl Iterator for PaintRecords {
    type Item = PaintRecord;

    fn next(&mut self) -> Option<PaintRecord> {
        if self.buf.remaining() < PAINT_RECORD_LEN {
            return None;
        }
        let x = self.buf.get_u16();
        let y = self.buf.get_u16();
        let mut rgba = [0u8; 4];
        self.buf.copy_to_slice(&mut rgba);
        Some(PaintRecord { x, y, rgba })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.buf.remaining() / PAINT_RECORD_LEN;
        (n, Some(n))
    }
}

impl ExactSizeIterator for PaintRecords {}

/// Validate an encoded batch. A length that is not a multiple of
/// [`PAINT_RECORD_LEN`] is `Truncated`.
pub fn decode_paint_batch(raw: Bytes) -> Result<PaintBatch> {
    if raw.len() % PAINT_RECORD_LEN != 0 {
        return Err(ViewerError::Truncated { len: raw.len() });
    }
    Ok(PaintBatch { raw })
}

/// Encode records in order.
pub fn encode_paint_batch<I>(records: I) -> Bytes
where
    I: IntoIterator<Item = PaintRecord>,
{
    let iter = records.into_iter();
    let mut out = BytesMut::with_capacity(iter.size_hint().0 * PAINT_RECORD_LEN);
    for r in iter {
        out.put_u16(r.x);
        out.put_u16(r.y);
        out.put_slice(&r.rgba);
    }
    out.freeze()
}
