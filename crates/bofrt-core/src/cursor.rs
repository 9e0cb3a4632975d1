//! Sequential decoder over a host-supplied argument buffer.
//!
//! Fields carry no tags: the reader must pull them in the order the packer
//! wrote them. Fixed-size fields are little-endian; variable-length fields are
//! a `u32` little-endian length followed by that many bytes.

use crate::error::DecodeError;

pub const INT_LEN: usize = 4;
pub const SHORT_LEN: usize = 2;
pub const LEN_PREFIX_LEN: usize = 4;

#[derive(Clone, Debug)]
pub struct BufferCursor<'a> {
    remaining: &'a [u8],
    original_length: usize,
}

impl<'a> BufferCursor<'a> {
    pub fn parse(buffer: &'a [u8]) -> Self {
        Self {
            remaining: buffer,
            original_length: buffer.len(),
        }
    }

    /// Re-points the cursor at `buffer` with the consumed offset back at zero.
    pub fn reset(&mut self, buffer: &'a [u8]) {
        *self = Self::parse(buffer);
    }

    pub fn remaining_length(&self) -> usize {
        self.remaining.len()
    }

    pub fn original_length(&self) -> usize {
        self.original_length
    }

    pub fn consumed(&self) -> usize {
        self.original_length - self.remaining.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Unconsumed bytes, without advancing.
    pub fn remaining(&self) -> &'a [u8] {
        self.remaining
    }

    pub fn read_int(&mut self) -> Result<i32, DecodeError> {
        let b = self.take(INT_LEN)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_short(&mut self) -> Result<i16, DecodeError> {
        let b = self.take(SHORT_LEN)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a length-prefixed blob. The returned slice borrows the argument
    /// buffer; its length is the decoded prefix.
    pub fn extract_blob(&mut self) -> Result<&'a [u8], DecodeError> {
        let prefix_at = self.consumed();
        let Some(len) = read_u32_le(self.remaining, 0) else {
            return Err(self.truncate(LEN_PREFIX_LEN));
        };
        let len = len as usize;
        let end = LEN_PREFIX_LEN.saturating_add(len);
        let Some(body) = self.remaining.get(LEN_PREFIX_LEN..end) else {
            let err = DecodeError::Truncated {
                offset: prefix_at,
                needed: end,
                remaining: self.remaining.len(),
            };
            log::debug!("argument buffer truncated: {err}");
            self.drain();
            return Err(err);
        };
        self.remaining = &self.remaining[end..];
        Ok(body)
    }

    /// Like [`extract_blob`](Self::extract_blob) with a single trailing NUL
    /// removed, for strings packed with a C terminator.
    pub fn extract_str(&mut self) -> Result<&'a [u8], DecodeError> {
        let blob = self.extract_blob()?;
        Ok(blob.strip_suffix(&[0]).unwrap_or(blob))
    }

    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.remaining.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes {
                remaining: self.remaining.len(),
            })
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining.len() < n {
            return Err(self.truncate(n));
        }
        let (head, tail) = self.remaining.split_at(n);
        self.remaining = tail;
        Ok(head)
    }

    fn truncate(&mut self, needed: usize) -> DecodeError {
        let err = DecodeError::Truncated {
            offset: self.consumed(),
            needed,
            remaining: self.remaining.len(),
        };
        log::debug!("argument buffer truncated: {err}");
        self.drain();
        err
    }

    fn drain(&mut self) {
        self.remaining = &self.remaining[self.remaining.len()..];
    }
}

pub fn read_u32_le(b: &[u8], off: usize) -> Option<u32> {
    let slice = b.get(off..off.checked_add(4)?)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_valid() {
        let c = BufferCursor::parse(&[]);
        assert_eq!(c.remaining_length(), 0);
        assert_eq!(c.consumed(), 0);
        assert!(c.finish().is_ok());
    }

    #[test]
    fn reads_fixed_fields_little_endian() {
        let buf = [0x2a, 0, 0, 0, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff];
        let mut c = BufferCursor::parse(&buf);
        assert_eq!(c.read_int().unwrap(), 42);
        assert_eq!(c.read_int().unwrap(), -2);
        assert_eq!(c.read_short().unwrap(), -1);
        assert_eq!(c.remaining_length(), 0);
        assert_eq!(c.consumed(), buf.len());
    }

    #[test]
    fn blob_borrows_the_argument_buffer() {
        let buf = [2, 0, 0, 0, b'A', b'B', 7];
        let mut c = BufferCursor::parse(&buf);
        let blob = c.extract_blob().unwrap();
        assert_eq!(blob, b"AB");
        assert_eq!(blob.as_ptr(), buf[4..].as_ptr());
        assert_eq!(c.remaining_length(), 1);
        assert_eq!(
            c.finish(),
            Err(DecodeError::TrailingBytes { remaining: 1 })
        );
    }

    #[test]
    fn zero_length_blob() {
        let mut c = BufferCursor::parse(&[0, 0, 0, 0]);
        assert_eq!(c.extract_blob().unwrap(), b"");
        assert!(c.is_exhausted());
    }

    #[test]
    fn str_strips_one_terminator() {
        let buf = [4, 0, 0, 0, b'h', b'i', 0, 0];
        let mut c = BufferCursor::parse(&buf);
        assert_eq!(c.extract_str().unwrap(), b"hi\0");
    }

    #[test]
    fn short_read_of_int_is_truncated() {
        let mut c = BufferCursor::parse(&[1, 2, 3]);
        assert_eq!(
            c.read_int(),
            Err(DecodeError::Truncated {
                offset: 0,
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn oversized_prefix_is_truncated() {
        let buf = [5, 0, 0, 0, b'a', b'b'];
        let mut c = BufferCursor::parse(&buf);
        assert_eq!(
            c.extract_blob(),
            Err(DecodeError::Truncated {
                offset: 0,
                needed: 9,
                remaining: 6
            })
        );
    }

    #[test]
    fn huge_prefix_does_not_overflow() {
        let buf = [0xff, 0xff, 0xff, 0xff, 0];
        let mut c = BufferCursor::parse(&buf);
        assert!(matches!(
            c.extract_blob(),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn cursor_is_drained_after_truncation() {
        let buf = [9, 0, 0, 0, 1, 0];
        let mut c = BufferCursor::parse(&buf);
        assert!(c.extract_blob().is_err());
        assert_eq!(c.remaining_length(), 0);
        assert!(c.read_short().is_err());
    }

    #[test]
    fn reset_rewinds_to_a_new_buffer() {
        let a = [1, 0];
        let b = [2, 0, 0, 0];
        let mut c = BufferCursor::parse(&a);
        assert_eq!(c.read_short().unwrap(), 1);
        c.reset(&b);
        assert_eq!(c.consumed(), 0);
        assert_eq!(c.original_length(), 4);
        assert_eq!(c.read_int().unwrap(), 2);
    }

    #[test]
    fn read_u32_le_bounds() {
        assert_eq!(read_u32_le(&[1, 0, 0, 0], 0), Some(1));
        assert_eq!(read_u32_le(&[1, 0, 0], 0), None);
        assert_eq!(read_u32_le(&[1, 0, 0, 0], usize::MAX), None);
    }
}
