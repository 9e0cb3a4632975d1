//! Append-only result encoder.
//!
//! Produces the same framing [`BufferCursor`](crate::cursor::BufferCursor)
//! reads: little-endian fixed-size fields and `u32`-length-prefixed blobs.

use std::fmt;

use crate::error::{EncodeError, FormatError};
use crate::printf::{self, PrintfArg};

#[derive(Clone, Debug, Default)]
pub struct FormatBuilder {
    storage: Vec<u8>,
    capacity_hint: usize,
}

impl FormatBuilder {
    /// Creates an empty builder with at least `capacity_hint` bytes reserved.
    /// The hint never limits how much can be appended.
    pub fn allocate(capacity_hint: usize) -> Self {
        Self {
            storage: Vec::with_capacity(capacity_hint),
            capacity_hint,
        }
    }

    pub fn capacity_hint(&self) -> usize {
        self.capacity_hint
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.storage
    }

    pub fn append_raw(&mut self, data: &[u8]) {
        self.storage.extend_from_slice(data);
    }

    pub fn append_int(&mut self, value: i32) {
        self.storage.extend_from_slice(&value.to_le_bytes());
    }

    pub fn append_short(&mut self, value: i16) {
        self.storage.extend_from_slice(&value.to_le_bytes());
    }

    pub fn append_blob(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        let len = u32::try_from(data.len())
            .map_err(|_| EncodeError::FieldTooLarge { len: data.len() })?;
        self.storage.reserve(4 + data.len());
        self.storage.extend_from_slice(&len.to_le_bytes());
        self.storage.extend_from_slice(data);
        Ok(())
    }

    /// Appends `text` as a NUL-terminated blob.
    pub fn append_str(&mut self, text: &str) -> Result<(), EncodeError> {
        let mut body = Vec::with_capacity(text.len() + 1);
        body.extend_from_slice(text.as_bytes());
        body.push(0);
        self.append_blob(&body)
    }

    /// Appends `text` as a NUL-terminated UTF-16LE blob.
    pub fn append_wstr(&mut self, text: &str) -> Result<(), EncodeError> {
        let mut body = Vec::with_capacity((text.len() + 1) * 2);
        for unit in text.encode_utf16().chain(std::iter::once(0)) {
            body.extend_from_slice(&unit.to_le_bytes());
        }
        self.append_blob(&body)
    }

    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) {
        match args.as_str() {
            Some(s) => self.storage.extend_from_slice(s.as_bytes()),
            None => self
                .storage
                .extend_from_slice(fmt::format(args).as_bytes()),
        }
    }

    /// Renders a printf-style template and appends the result. On a rendering
    /// error nothing is appended.
    pub fn append_printf(
        &mut self,
        template: &str,
        args: &[PrintfArg<'_>],
    ) -> Result<(), FormatError> {
        let rendered = printf::render(template, args)?;
        self.storage.extend_from_slice(rendered.as_bytes());
        Ok(())
    }

    /// Drops all appended bytes but keeps the backing allocation.
    pub fn reset(&mut self) {
        self.storage.clear();
    }

    /// Returns a copy of everything appended so far. The builder stays usable.
    pub fn finalize(&self) -> Vec<u8> {
        self.storage.clone()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.storage
    }

    pub fn release(self) {
        log::trace!(
            "releasing format builder: {} bytes, capacity {}",
            self.storage.len(),
            self.storage.capacity()
        );
    }
}

impl fmt::Write for FormatBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.storage.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::BufferCursor;
    use std::fmt::Write as _;

    #[test]
    fn concrete_int_and_manual_blob() {
        let mut b = FormatBuilder::allocate(16);
        b.append_int(42);
        b.append_raw(&[0x02, 0x00, 0x00, 0x00]);
        b.append_raw(b"AB");
        let bytes = b.finalize();

        let mut c = BufferCursor::parse(&bytes);
        assert_eq!(c.read_int().unwrap(), 42);
        let blob = c.extract_blob().unwrap();
        assert_eq!((blob, blob.len()), (&b"AB"[..], 2));
        assert!(c.finish().is_ok());
    }

    #[test]
    fn grows_past_the_hint() {
        let mut b = FormatBuilder::allocate(2);
        b.append_raw(&[7u8; 100]);
        assert_eq!(b.len(), 100);
        assert!(b.capacity() >= 100);
        assert_eq!(b.capacity_hint(), 2);
    }

    #[test]
    fn int_and_short_are_little_endian() {
        let mut b = FormatBuilder::allocate(0);
        b.append_int(-2);
        b.append_short(0x0102);
        assert_eq!(b.as_bytes(), &[0xfe, 0xff, 0xff, 0xff, 0x02, 0x01]);
    }

    #[test]
    fn strings_carry_terminators() {
        let mut b = FormatBuilder::allocate(0);
        b.append_str("hi").unwrap();
        b.append_wstr("A").unwrap();
        assert_eq!(
            b.as_bytes(),
            &[3, 0, 0, 0, b'h', b'i', 0, 4, 0, 0, 0, b'A', 0, 0, 0]
        );
    }

    #[test]
    fn reset_matches_a_fresh_builder() {
        let mut reused = FormatBuilder::allocate(8);
        reused.append_int(1);
        reused.append_raw(b"garbage");
        let cap = reused.capacity();
        reused.reset();
        assert!(reused.is_empty());
        assert_eq!(reused.capacity(), cap);

        let mut fresh = FormatBuilder::allocate(8);
        for b in [&mut reused, &mut fresh] {
            b.append_short(9);
            b.append_blob(b"xyz").unwrap();
        }
        assert_eq!(reused.finalize(), fresh.finalize());
    }

    #[test]
    fn snapshot_survives_further_appends() {
        let mut b = FormatBuilder::allocate(0);
        b.append_raw(b"one");
        let snap = b.finalize();
        b.append_raw(b"two");
        assert_eq!(snap, b"one");
        assert_eq!(b.as_bytes(), b"onetwo");
        b.release();
    }

    #[test]
    fn formatted_text() {
        let mut b = FormatBuilder::allocate(0);
        b.append_fmt(format_args!("pid={} ", 10));
        write!(b, "ok").unwrap();
        b.append_printf(" %s:%d", &[PrintfArg::Str("port"), PrintfArg::Int(445)])
            .unwrap();
        assert_eq!(b.as_bytes(), b"pid=10 ok port:445");
    }

    #[test]
    fn failed_printf_leaves_bytes_untouched() {
        let mut b = FormatBuilder::allocate(0);
        b.append_raw(b"keep");
        assert!(b.append_printf("%d %d", &[PrintfArg::Int(1)]).is_err());
        assert_eq!(b.as_bytes(), b"keep");
    }
}
