#![no_main]

use libfuzzer_sys::fuzz_target;
use streamhouse_hbase::codec::{encode_record, RecordDecoder};

fuzz_target!(|data: &[u8]| {
    // Fuzz chunk decoding with arbitrary bytes.
    // Tests handling of:
    // - Truncated records
    // - Length prefixes larger than the chunk
    // - Invalid enum tags and UTF-8
    // - Deeply nested values
    let mut decoded = Vec::new();
    for record in RecordDecoder::new(data) {
        match record {
            Ok(record) => decoded.push(record),
            Err(_) => break,
        }
    }

    // Anything that decoded must encode again and decode to the same shape
    for record in &decoded {
        if let Ok(bytes) = encode_record(record) {
            let again: Vec<_> = RecordDecoder::new(&bytes).collect();
            assert_eq!(again.len(), 1);
            let again = again.into_iter().next().unwrap().unwrap();
            assert_eq!(again.len(), record.len());
        }
    }
});
