use core::fmt;

use crate::{name::NameString, opcode::OpCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmlParseErrorKind {
    /// The stream ended before an expected field or extent
    Truncated,
    /// A `PkgLength` is shorter than its own encoding, or uses reserved bits
    MalformedLength,
    /// A `NameString` doesn't follow the `NameSeg` character or structure rules
    MalformedName,
    UnknownOpcode {
        opcode: u8,
        sub_opcode: Option<u8>,
    },
    /// A scope didn't consume exactly its declared extent
    ScopeLengthMismatch {
        expected_end: usize,
        actual_end: usize,
    },
    /// A name in an invocation position that was never declared
    UnresolvedReference(NameString),
    NestingTooDeep {
        limit: u32,
    },
    AllocationFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmlParseError {
    kind: AmlParseErrorKind,
    offset: usize,
}

impl AmlParseError {
    pub fn new(kind: AmlParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    pub fn kind(&self) -> &AmlParseErrorKind {
        &self.kind
    }

    /// Byte offset into the parsed buffer where the failing construct starts
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for AmlParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmlParseErrorKind::Truncated => f.write_str("unexpected end of code"),
            AmlParseErrorKind::MalformedLength => f.write_str("malformed package length"),
            AmlParseErrorKind::MalformedName => f.write_str("malformed name string"),
            AmlParseErrorKind::UnknownOpcode { opcode, sub_opcode } => {
                write!(f, "unknown opcode {}", OpCode::new(*opcode, *sub_opcode))
            }
            AmlParseErrorKind::ScopeLengthMismatch {
                expected_end,
                actual_end,
            } => write!(
                f,
                "scope should end at {expected_end:#X}, but ended at {actual_end:#X}"
            ),
            AmlParseErrorKind::UnresolvedReference(name) => {
                write!(f, "unresolved reference to {name}")
            }
            AmlParseErrorKind::NestingTooDeep { limit } => {
                write!(f, "nesting deeper than {limit} levels")
            }
            AmlParseErrorKind::AllocationFailure => f.write_str("failed to allocate node"),
        }
    }
}

impl fmt::Display for AmlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {:#X}", self.kind, self.offset)
    }
}
