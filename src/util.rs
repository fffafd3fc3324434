//! Miscellaneous utilities.

use std::fmt;

/// Wrapper to force a `&[u8]` to display as nicely-formatted hexadecimal
/// bytes with only the the first line or so of bytes shown.
pub struct BytesFormatter<'a>(pub &'a [u8]);

impl fmt::Debug for BytesFormatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let BytesFormatter(bytes) = *self;
        for byte in bytes.iter().take(16) {
            write!(f, "{byte:02x} ")?;
        }
        write!(f, "({} bytes)", bytes.len())?;
        Ok(())
    }
}

/// Read a big-endian `u16` at `pos`, if the buffer is long enough.
pub fn be_u16_at(buff: &[u8], pos: usize) -> Option<u16> {
    let bytes = buff.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_formatter_truncates() {
        let data = [0xab; 20];
        let out = format!("{:?}", BytesFormatter(&data));
        assert!(out.starts_with("ab ab "));
        assert!(out.ends_with("(20 bytes)"));
    }

    #[test]
    fn read_be_u16() {
        assert_eq!(be_u16_at(&[0x12, 0x34, 0x56], 1), Some(0x3456));
        assert_eq!(be_u16_at(&[0x12, 0x34], 1), None);
        assert_eq!(be_u16_at(&[], usize::MAX), None);
    }
}
