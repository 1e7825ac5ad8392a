use core::ops::Range;

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use crate::error::{AmlParseError, AmlParseErrorKind};

/// Position saved by [`Cursor::mark`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

/// The decoded extent of a `PkgLength` prefixed construct.
///
/// `start` is the offset of the `PkgLength` field itself, and `end` is
/// `start + length`, i.e. one past the last byte of the construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PkgLength {
    pub start: usize,
    pub end: usize,
    /// Number of bytes the `PkgLength` field occupies (1 to 4)
    pub encoded_len: u8,
}

impl PkgLength {
    /// The length value as written in the stream
    pub fn length(&self) -> usize {
        self.end - self.start
    }

    pub fn extent(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The first byte after the `PkgLength` field
    pub fn body_start(&self) -> usize {
        self.start + self.encoded_len as usize
    }
}

/// Bounds checked reader over the whole AML buffer.
///
/// All offsets are absolute into the buffer, so nested scopes are handled by
/// comparing against their end offset instead of creating sub-slices.
pub(crate) struct Cursor<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn remaining(&self) -> usize {
        self.code.len() - self.pos
    }

    pub fn mark(&self) -> Mark {
        Mark(self.pos)
    }

    /// Number of bytes consumed since `mark`
    pub fn position_from(&self, mark: Mark) -> usize {
        self.pos - mark.0
    }

    /// Move to an absolute offset, only used to re-enter a term list during fix-up
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.code.len());
    }

    fn truncated(&self) -> AmlParseError {
        AmlParseError::new(AmlParseErrorKind::Truncated, self.pos)
    }

    pub fn peek(&self, n: usize) -> Result<&'a [u8], AmlParseError> {
        if n > self.remaining() {
            return Err(self.truncated());
        }
        Ok(&self.code[self.pos..self.pos + n])
    }

    pub fn peek_u8(&self) -> Result<u8, AmlParseError> {
        self.code
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.truncated())
    }

    pub fn read(&mut self, n: usize) -> Result<&'a [u8], AmlParseError> {
        let data = self.peek(n)?;
        self.pos += n;
        Ok(data)
    }

    /// Read everything up to the absolute offset `end`
    pub fn read_until(&mut self, end: usize) -> Result<&'a [u8], AmlParseError> {
        if end < self.pos {
            return Err(AmlParseError::new(
                AmlParseErrorKind::ScopeLengthMismatch {
                    expected_end: end,
                    actual_end: self.pos,
                },
                self.pos,
            ));
        }
        self.read(end - self.pos)
    }

    pub fn read_u8(&mut self) -> Result<u8, AmlParseError> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, AmlParseError> {
        self.read(2).map(LittleEndian::read_u16)
    }

    pub fn read_u32(&mut self) -> Result<u32, AmlParseError> {
        self.read(4).map(LittleEndian::read_u32)
    }

    pub fn read_u64(&mut self) -> Result<u64, AmlParseError> {
        self.read(8).map(LittleEndian::read_u64)
    }

    /// Decode the raw `PkgLength` value, returns it with the number of bytes used
    /// to encode it.
    fn read_pkg_length_value(&mut self) -> Result<(usize, u8), AmlParseError> {
        let start = self.pos;
        let lead_byte = self.read_u8()?;
        let following_bytes = lead_byte >> 6;

        trace!("pkglen: lead byte: {lead_byte:#x} at {start:#x}");

        if following_bytes == 0 {
            return Ok(((lead_byte & 0b0011_1111) as usize, 1));
        }

        // bits 4-5 must be zero
        if (lead_byte >> 4) & 0b11 != 0 {
            return Err(AmlParseError::new(
                AmlParseErrorKind::MalformedLength,
                start,
            ));
        }

        let mut length = (lead_byte & 0b0000_1111) as usize;
        for (i, byte) in self.read(following_bytes as usize)?.iter().enumerate() {
            length |= (*byte as usize) << (8 * i + 4);
        }

        Ok((length, following_bytes + 1))
    }

    /// Decode a `PkgLength` that bounds a scope, and validate it against the
    /// stream and the field's own size.
    pub fn read_pkg_length(&mut self) -> Result<PkgLength, AmlParseError> {
        let start = self.pos;
        let (length, encoded_len) = self.read_pkg_length_value()?;

        if length < encoded_len as usize {
            return Err(AmlParseError::new(
                AmlParseErrorKind::MalformedLength,
                start,
            ));
        }

        let end = start + length;
        if end > self.code.len() {
            return Err(AmlParseError::new(AmlParseErrorKind::Truncated, start));
        }

        Ok(PkgLength {
            start,
            end,
            encoded_len,
        })
    }

    /// Decode a `PkgLength` used as a bit count in field lists, it doesn't
    /// describe an extent so only the encoding is checked.
    pub fn read_field_length(&mut self) -> Result<u32, AmlParseError> {
        let start = self.pos;
        let (length, _) = self.read_pkg_length_value()?;
        u32::try_from(length)
            .map_err(|_| AmlParseError::new(AmlParseErrorKind::MalformedLength, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    testing::test! {
        fn test_pkg_length_single_byte() {
            let code = [0x05, 1, 2, 3, 4];
            let mut cursor = Cursor::new(&code);
            let pkg = cursor.read_pkg_length().unwrap();
            assert_eq!(pkg.extent(), 0..5);
            assert_eq!(pkg.body_start(), 1);
            assert_eq!(cursor.position(), 1);
        }

        fn test_pkg_length_multi_byte() {
            // 0x4A, 0x01 => 0x1A with one following byte
            let mut code = [0u8; 0x1A];
            code[0] = 0x4A;
            code[1] = 0x01;
            let mut cursor = Cursor::new(&code);
            let pkg = cursor.read_pkg_length().unwrap();
            assert_eq!(pkg.length(), 0x1A);
            assert_eq!(pkg.encoded_len, 2);
            assert_eq!(cursor.position(), 2);
        }

        fn test_pkg_length_reserved_bits() {
            let code = [0x5A, 0x01, 0, 0];
            let mut cursor = Cursor::new(&code);
            let err = cursor.read_pkg_length().unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::MalformedLength);
            assert_eq!(err.offset(), 0);
        }

        fn test_pkg_length_smaller_than_encoding() {
            let code = [0x40, 0x00, 0, 0];
            let mut cursor = Cursor::new(&code);
            let err = cursor.read_pkg_length().unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::MalformedLength);

            let code = [0x00];
            let mut cursor = Cursor::new(&code);
            let err = cursor.read_pkg_length().unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::MalformedLength);
        }

        fn test_pkg_length_past_end() {
            let code = [0x06, 1, 2, 3, 4];
            let mut cursor = Cursor::new(&code);
            let err = cursor.read_pkg_length().unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::Truncated);
        }

        fn test_reads() {
            let code = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFF];
            let mut cursor = Cursor::new(&code);
            let mark = cursor.mark();
            assert_eq!(cursor.read_u16().unwrap(), 0x1234);
            assert_eq!(cursor.read_u32().unwrap(), 0x1234_5678);
            assert_eq!(cursor.position_from(mark), 6);
            assert_eq!(cursor.remaining(), 1);
            assert_eq!(cursor.read_u16().unwrap_err().kind(), &AmlParseErrorKind::Truncated);
            // failed reads don't move
            assert_eq!(cursor.read_u8().unwrap(), 0xFF);
            assert_eq!(cursor.peek(1).unwrap_err().offset(), 7);
        }
    }

    #[macro_rules_attribute::apply(testing::test)]
    fn test_field_length() {
        // bit counts don't bound anything, so a length past the buffer is fine
        let code = [0x41, 0x10];
        let mut cursor = Cursor::new(&code);
        assert_eq!(cursor.read_field_length().unwrap(), 0x101);
        assert_eq!(cursor.position(), 2);

        let mut cursor = Cursor::new(&[0x20]);
        assert_eq!(cursor.read_field_length().unwrap(), 0x20);
    }
}
