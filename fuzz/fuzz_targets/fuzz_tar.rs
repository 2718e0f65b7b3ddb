#![no_main]
use libfuzzer_sys::fuzz_target;
use omaha_payload::pipeline::{list_entries, locate_tar};
use omaha_payload::TarHeaderParser;

fuzz_target!(|data: &[u8]| {
    // Fuzz a single header block
    let _ = TarHeaderParser::parse(data);

    // Fuzz the full scan, names must never escape the root
    let (entries, _) = list_entries(data, locate_tar(data, true));
    for entry in entries {
        assert!(!entry.path.starts_with('/'));
        assert!(!entry.path.contains(".."));
    }
});
