//! Structural parser for ACPI Machine Language (AML).
//!
//! The input is the body of a definition block (`DSDT`/`SSDT` without the table
//! header), the output is a [`Root`] that owns the whole tree of parsed terms.
//!
//! The parser does not execute anything, but it does keep track of the namespace
//! while parsing, since the encoding of a method call doesn't say how many
//! arguments follow the method name. Calls to methods declared later in the
//! stream are resolved by a fix-up pass once their declaration is seen.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod config;
mod cursor;
mod display;
mod error;
mod name;
mod namespace;
mod node;
pub mod opcode;
mod parser;
mod resource;
#[doc(hidden)]
pub mod testing;

pub use config::ParserConfig;
pub use cursor::PkgLength;
pub use error::{AmlParseError, AmlParseErrorKind};
pub use name::{canonicalize, NamePrefix, NameSeg, NameString};
pub use node::{DataNode, DataType, DataValue, Node, ObjectNode, ResourceDataNode, Root};
pub use opcode::OpCode;
pub use resource::{ResourceDescriptor, ResourceType};

/// Parse `code` as a complete term list with the default configuration.
pub fn parse(code: &[u8]) -> Result<Root, AmlParseError> {
    parse_with(code, &ParserConfig::default())
}

/// Parse `code` as a complete term list.
///
/// On failure nothing of the partially built tree is returned, the error carries
/// the byte offset of the failing construct.
pub fn parse_with(code: &[u8], config: &ParserConfig) -> Result<Root, AmlParseError> {
    parser::Parser::new(code, config).parse_root()
}
