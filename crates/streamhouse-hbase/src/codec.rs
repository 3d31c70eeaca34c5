//! Chunk wire format.
//!
//! Each flat record is encoded with bincode (varint integers). Encodings are
//! self-delimiting, so a chunk is simply the concatenation of the records
//! formatted into it and is read back one record at a time.
//!
//! ```text
//! +----------+----------+----------+
//! | record 0 | record 1 | record 2 | ...
//! +----------+----------+----------+
//! ```

use std::io::Cursor;

use bincode::Options;

use crate::error::{ConnectorError, Result};
use crate::transform::FlatRecord;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
}

/// Encode a single record.
pub fn encode_record(record: &FlatRecord) -> Result<Vec<u8>> {
    Ok(options().serialize(record)?)
}

/// Iterates over the records of a chunk in order.
///
/// Stops after the first decode error.
pub struct RecordDecoder<'a> {
    cursor: Cursor<&'a [u8]>,
    failed: bool,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(chunk: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(chunk),
            failed: false,
        }
    }

    fn remaining(&self) -> u64 {
        self.cursor.get_ref().len() as u64 - self.cursor.position()
    }
}

impl Iterator for RecordDecoder<'_> {
    type Item = Result<FlatRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining() == 0 {
            return None;
        }

        let offset = self.cursor.position();
        // A record can never be larger than what is left of the chunk.
        let limit = self.remaining();
        match options()
            .with_limit(limit)
            .deserialize_from::<_, FlatRecord>(&mut self.cursor)
        {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.failed = true;
                Some(Err(ConnectorError::SerializationError(format!(
                    "failed to decode record at byte {}: {}",
                    offset, e
                ))))
            }
        }
    }
}

/// Decode every record in a chunk.
pub fn decode_records(chunk: &[u8]) -> Result<Vec<FlatRecord>> {
    RecordDecoder::new(chunk).collect()
}
