#![no_main]

use bofrt_core::{printf, PrintfArg};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 4096 { &data[..4096] } else { data };
    let Ok(template) = std::str::from_utf8(data) else {
        return;
    };

    let args = [
        PrintfArg::Int(-42),
        PrintfArg::UInt(7),
        PrintfArg::Str("svc"),
        PrintfArg::Char('x'),
        PrintfArg::Ptr(0x1000),
    ];
    let _ = printf::render(template, &args);
});
