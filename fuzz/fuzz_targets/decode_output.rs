#![no_main]

use bofrt_core::output::decode_records;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 64 * 1024 {
        &data[..64 * 1024]
    } else {
        data
    };

    if let Ok(records) = decode_records(data) {
        let total: usize = records.iter().map(|(_, d)| 8 + d.len()).sum();
        assert_eq!(total, data.len());
    }
});
