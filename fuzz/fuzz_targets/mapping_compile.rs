#![no_main]

use libfuzzer_sys::fuzz_target;
use streamhouse_hbase::RoutingTable;

fuzz_target!(|data: &[u8]| {
    // Fuzz mapping compilation with arbitrary strings.
    // Compilation and family derivation must fail cleanly, never panic.
    let Ok(mapping) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(routing) = RoutingTable::compile(mapping, Some("event:tag"), None) {
        assert!(routing.routes().count() <= routing.fields().len());
        let _ = routing.column_families();
    }
});
