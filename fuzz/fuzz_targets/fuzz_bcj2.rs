#![no_main]
use libfuzzer_sys::fuzz_target;
use omaha_payload::pipeline::unpack_payload;

fuzz_target!(|data: &[u8]| {
    if let Ok(unpacked) = unpack_payload(data) {
        assert!(unpacked.outcome.data().len() <= unpacked.header.original_size as usize);
    }
});
