#![no_main]

use bofrt_core::{BufferCursor, FieldKind, Schema};
use libfuzzer_sys::fuzz_target;

const KINDS: [FieldKind; 5] = [
    FieldKind::Int,
    FieldKind::Short,
    FieldKind::Blob,
    FieldKind::Str,
    FieldKind::WideStr,
];

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 64 * 1024 {
        &data[..64 * 1024]
    } else {
        data
    };
    let Some((&head, rest)) = data.split_first() else {
        return;
    };

    // Low nibble picks the field count, each following byte a kind.
    let n = usize::from(head & 0x0f).min(rest.len());
    let (kinds, buffer) = rest.split_at(n);
    let schema = Schema::new(
        kinds
            .iter()
            .map(|&b| KINDS[usize::from(b) % KINDS.len()])
            .collect(),
    );

    if let Ok(fields) = schema.decode(buffer) {
        assert_eq!(fields.len(), schema.len());
    }

    let mut cursor = BufferCursor::parse(buffer);
    loop {
        let before = cursor.remaining_length();
        if cursor.extract_blob().is_err() {
            assert_eq!(cursor.remaining_length(), 0);
            break;
        }
        assert!(cursor.remaining_length() < before);
    }
    assert_eq!(cursor.consumed(), buffer.len());
});
