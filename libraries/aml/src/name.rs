use core::fmt;

use alloc::vec::Vec;

use crate::{
    cursor::Cursor,
    error::{AmlParseError, AmlParseErrorKind},
};

mod consts {
    pub const NULL_NAME: u8 = 0x00;
    pub const DUAL_NAME_PREFIX: u8 = 0x2E;
    pub const MULTI_NAME_PREFIX: u8 = 0x2F;
    pub const ROOT_CHAR: u8 = b'\\';
    pub const PARENT_PREFIX_CHAR: u8 = b'^';
}

pub(crate) fn is_lead_name_char(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'_')
}

fn is_name_char(byte: u8) -> bool {
    is_lead_name_char(byte) || byte.is_ascii_digit()
}

/// Whether `byte` can start a `NameString`
pub(crate) fn is_name_string_start(byte: u8) -> bool {
    is_lead_name_char(byte)
        || matches!(
            byte,
            consts::ROOT_CHAR
                | consts::PARENT_PREFIX_CHAR
                | consts::DUAL_NAME_PREFIX
                | consts::MULTI_NAME_PREFIX
        )
}

/// A 4 character name segment, always valid: `[A-Z_][A-Z_0-9]{3}`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameSeg([u8; 4]);

impl NameSeg {
    pub fn new(bytes: [u8; 4]) -> Option<Self> {
        if is_lead_name_char(bytes[0]) && bytes[1..].iter().all(|b| is_name_char(*b)) {
            Some(Self(bytes))
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // only ascii is allowed in `new`
        core::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub(crate) fn parse(cursor: &mut Cursor) -> Result<Self, AmlParseError> {
        let start = cursor.position();
        let bytes = cursor.read(4)?;
        let mut seg = [0; 4];
        seg.copy_from_slice(bytes);

        Self::new(seg).ok_or_else(|| AmlParseError::new(AmlParseErrorKind::MalformedName, start))
    }
}

impl fmt::Display for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameSeg({:?})", self.as_str())
    }
}

/// Canonical form of a short ASL name: upper case, padded with `_` to 4 characters.
///
/// Returns `None` if `asl` is empty, longer than 4 characters, or has characters
/// that can't be in a `NameSeg`.
pub fn canonicalize(asl: &str) -> Option<NameSeg> {
    let bytes = asl.as_bytes();
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }

    let mut seg = [b'_'; 4];
    for (dst, src) in seg.iter_mut().zip(bytes) {
        *dst = src.to_ascii_uppercase();
    }

    NameSeg::new(seg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum NamePrefix {
    #[default]
    None,
    /// `\`
    Root,
    /// number of `^`
    Parent(usize),
}

/// A decoded `NameString`, a `NullName` has no segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NameString {
    prefix: NamePrefix,
    segments: Vec<NameSeg>,
}

impl NameString {
    pub fn new(prefix: NamePrefix, segments: Vec<NameSeg>) -> Self {
        Self { prefix, segments }
    }

    pub fn from_seg(seg: NameSeg) -> Self {
        Self {
            prefix: NamePrefix::None,
            segments: alloc::vec![seg],
        }
    }

    /// Parse an ASL path like `\_SB.PCI0.LPC`, `^^FOO` or `dev`, each segment is
    /// canonicalized.
    pub fn from_asl(asl: &str) -> Option<Self> {
        let (prefix, rest) = if let Some(rest) = asl.strip_prefix('\\') {
            (NamePrefix::Root, rest)
        } else {
            let rest = asl.trim_start_matches('^');
            match asl.len() - rest.len() {
                0 => (NamePrefix::None, rest),
                n => (NamePrefix::Parent(n), rest),
            }
        };

        let segments = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('.').map(canonicalize).collect::<Option<Vec<_>>>()?
        };

        if segments.is_empty() && prefix == NamePrefix::None {
            return None;
        }

        Some(Self { prefix, segments })
    }

    pub fn prefix(&self) -> NamePrefix {
        self.prefix
    }

    pub fn segments(&self) -> &[NameSeg] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<NameSeg> {
        self.segments.last().copied()
    }

    pub fn is_null(&self) -> bool {
        self.prefix == NamePrefix::None && self.segments.is_empty()
    }

    /// A bare single segment name, the only kind that is searched in parent scopes
    pub fn is_single_segment(&self) -> bool {
        self.prefix == NamePrefix::None && self.segments.len() == 1
    }

    pub(crate) fn parse(cursor: &mut Cursor) -> Result<Self, AmlParseError> {
        let mut prefix = NamePrefix::None;

        match cursor.peek_u8()? {
            consts::ROOT_CHAR => {
                cursor.read_u8()?;
                prefix = NamePrefix::Root;
            }
            consts::PARENT_PREFIX_CHAR => {
                let mut count = 0;
                while cursor.peek_u8()? == consts::PARENT_PREFIX_CHAR {
                    cursor.read_u8()?;
                    count += 1;
                }
                prefix = NamePrefix::Parent(count);
            }
            _ => {}
        }

        let path_start = cursor.position();
        let segments = match cursor.peek_u8()? {
            consts::NULL_NAME => {
                cursor.read_u8()?;
                Vec::new()
            }
            consts::DUAL_NAME_PREFIX => {
                cursor.read_u8()?;
                let first = NameSeg::parse(cursor)?;
                let second = NameSeg::parse(cursor)?;
                alloc::vec![first, second]
            }
            consts::MULTI_NAME_PREFIX => {
                cursor.read_u8()?;
                let count = cursor.read_u8()? as usize;
                if count == 0 || count * 4 > cursor.remaining() {
                    return Err(AmlParseError::new(
                        AmlParseErrorKind::MalformedName,
                        path_start,
                    ));
                }
                let mut segments = Vec::new();
                segments
                    .try_reserve_exact(count)
                    .map_err(|_| AmlParseError::new(AmlParseErrorKind::AllocationFailure, path_start))?;
                for _ in 0..count {
                    segments.push(NameSeg::parse(cursor)?);
                }
                segments
            }
            byte if is_lead_name_char(byte) => alloc::vec![NameSeg::parse(cursor)?],
            _ => {
                return Err(AmlParseError::new(
                    AmlParseErrorKind::MalformedName,
                    path_start,
                ))
            }
        };

        Ok(Self { prefix, segments })
    }
}

impl fmt::Display for NameString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            NamePrefix::None => {}
            NamePrefix::Root => f.write_str("\\")?,
            NamePrefix::Parent(n) => {
                for _ in 0..n {
                    f.write_str("^")?;
                }
            }
        }

        for (i, seg) in self.segments.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            fmt::Display::fmt(seg, f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;
    use crate::testing;

    fn parse(code: &[u8]) -> Result<(NameString, usize), AmlParseError> {
        let mut cursor = Cursor::new(code);
        let name = NameString::parse(&mut cursor)?;
        Ok((name, cursor.position()))
    }

    testing::test! {
        fn test_canonicalize() {
            let dev = canonicalize("DEV").unwrap();
            assert_eq!(dev.as_bytes(), b"DEV_");
            assert_eq!(canonicalize("DEV_"), Some(dev));
            assert_eq!(canonicalize("dev"), Some(dev));
            assert_eq!(canonicalize(dev.as_str()), Some(dev));
            assert_eq!(canonicalize("_SB"), canonicalize("_sb_"));

            assert_eq!(canonicalize(""), None);
            assert_eq!(canonicalize("TOOLONG"), None);
            assert_eq!(canonicalize("1ABC"), None);
            assert_eq!(canonicalize("A-B"), None);
        }

        fn test_canonicalize_idempotent() {
            for name in ["a", "Ab", "x_1", "PCI0", "_T_0", "z"] {
                let once = canonicalize(name).unwrap();
                assert_eq!(canonicalize(once.as_str()), Some(once));
            }
        }

        fn test_parse_names() {
            let (name, len) = parse(b"ABCD").unwrap();
            assert_eq!(name.to_string(), "ABCD");
            assert_eq!(len, 4);

            let (name, len) = parse(b"\\_SB_").unwrap();
            assert_eq!(name.prefix(), NamePrefix::Root);
            assert_eq!(name.to_string(), "\\_SB_");
            assert_eq!(len, 5);

            let (name, _) = parse(b"^^\x2EPCI0LPCB").unwrap();
            assert_eq!(name.prefix(), NamePrefix::Parent(2));
            assert_eq!(name.to_string(), "^^PCI0.LPCB");

            let (name, len) = parse(b"\\\x2F\x03_SB_PCI0LPCB").unwrap();
            assert_eq!(name.segments().len(), 3);
            assert_eq!(name.to_string(), "\\_SB_.PCI0.LPCB");
            assert_eq!(len, 15);

            let (name, len) = parse(b"\\\x00").unwrap();
            assert!(name.segments().is_empty());
            assert!(!name.is_null());
            assert_eq!(len, 2);

            let (name, _) = parse(b"\x00").unwrap();
            assert!(name.is_null());
        }

        fn test_parse_malformed_names() {
            let err = parse(b"Abcd").unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::MalformedName);
            assert_eq!(err.offset(), 0);

            let err = parse(b"\\1ABC").unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::MalformedName);

            // multi name path claiming more segments than available
            let err = parse(b"\x2F\x04AAAABBBB").unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::MalformedName);

            let err = parse(b"AB").unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::Truncated);
        }

        fn test_from_asl() {
            let name = NameString::from_asl("\\_sb.pci0.lpc").unwrap();
            assert_eq!(name.to_string(), "\\_SB_.PCI0.LPC_");
            assert_eq!(NameString::from_asl("^^foo").unwrap().prefix(), NamePrefix::Parent(2));
            assert_eq!(NameString::from_asl("\\").unwrap().segments().len(), 0);
            assert!(NameString::from_asl("").is_none());
            assert!(NameString::from_asl("a..b").is_none());
        }
    }
}
