use crate::error::WideError;

/// Converts `src` (UTF-8, invalid sequences replaced) to NUL-terminated
/// UTF-16 in `dst`. Returns the units written including the terminator;
/// `dst` is untouched on failure.
pub fn to_wide(src: &[u8], dst: &mut [u16]) -> Result<usize, WideError> {
    let text = String::from_utf8_lossy(src);
    let needed = text.encode_utf16().count() + 1;
    if needed > dst.len() {
        return Err(WideError::DoesNotFit {
            needed,
            capacity: dst.len(),
        });
    }
    for (slot, unit) in dst.iter_mut().zip(text.encode_utf16().chain(std::iter::once(0))) {
        *slot = unit;
    }
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_with_terminator() {
        let mut dst = [0xffffu16; 8];
        assert_eq!(to_wide(b"svc", &mut dst), Ok(4));
        assert_eq!(&dst[..5], &[b's' as u16, b'v' as u16, b'c' as u16, 0, 0xffff]);
    }

    #[test]
    fn non_bmp_uses_surrogates() {
        let mut dst = [0u16; 3];
        assert_eq!(to_wide("\u{1F600}".as_bytes(), &mut dst), Ok(3));
        assert_eq!(dst, [0xd83d, 0xde00, 0]);
    }

    #[test]
    fn refuses_when_terminator_does_not_fit() {
        let mut dst = [7u16; 3];
        assert_eq!(
            to_wide(b"abc", &mut dst),
            Err(WideError::DoesNotFit {
                needed: 4,
                capacity: 3
            })
        );
        assert_eq!(dst, [7, 7, 7]);
    }
}
