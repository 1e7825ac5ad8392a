//! Static opcode metadata.
//!
//! Every opcode the parser accepts has an entry here describing its fixed
//! arguments and what follows them, the parser never guesses arity for an
//! opcode missing from this table.

use core::fmt;

/// An opcode, `sub_op` is set for the `0x5B` extended opcodes and for the
/// field-list pseudo opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpCode {
    pub op: u8,
    pub sub_op: Option<u8>,
}

impl OpCode {
    pub const EXT_PREFIX: u8 = 0x5B;

    pub const ZERO: Self = Self::single(0x00);
    pub const ONE: Self = Self::single(0x01);
    pub const ALIAS: Self = Self::single(0x06);
    pub const NAME: Self = Self::single(0x08);
    pub const BYTE_PREFIX: Self = Self::single(0x0A);
    pub const WORD_PREFIX: Self = Self::single(0x0B);
    pub const DWORD_PREFIX: Self = Self::single(0x0C);
    pub const STRING_PREFIX: Self = Self::single(0x0D);
    pub const QWORD_PREFIX: Self = Self::single(0x0E);
    pub const SCOPE: Self = Self::single(0x10);
    pub const BUFFER: Self = Self::single(0x11);
    pub const PACKAGE: Self = Self::single(0x12);
    pub const VAR_PACKAGE: Self = Self::single(0x13);
    pub const METHOD: Self = Self::single(0x14);
    pub const EXTERNAL: Self = Self::single(0x15);
    pub const LOCAL0: Self = Self::single(0x60);
    pub const ARG0: Self = Self::single(0x68);
    pub const STORE: Self = Self::single(0x70);
    pub const ADD: Self = Self::single(0x72);
    pub const LNOT: Self = Self::single(0x92);
    pub const LEQUAL: Self = Self::single(0x93);
    pub const IF: Self = Self::single(0xA0);
    pub const ELSE: Self = Self::single(0xA1);
    pub const WHILE: Self = Self::single(0xA2);
    pub const RETURN: Self = Self::single(0xA4);
    pub const ONES: Self = Self::single(0xFF);

    pub const MUTEX: Self = Self::ext(0x01);
    pub const CREATE_FIELD: Self = Self::ext(0x13);
    pub const DEBUG: Self = Self::ext(0x31);
    pub const OP_REGION: Self = Self::ext(0x80);
    pub const FIELD: Self = Self::ext(0x81);
    pub const DEVICE: Self = Self::ext(0x82);
    pub const PROCESSOR: Self = Self::ext(0x83);
    pub const POWER_RES: Self = Self::ext(0x84);
    pub const THERMAL_ZONE: Self = Self::ext(0x85);
    pub const INDEX_FIELD: Self = Self::ext(0x86);
    pub const BANK_FIELD: Self = Self::ext(0x87);

    /// Call of a user method: fixed args are the name and the resolved argument
    /// count, the call arguments are the variable args.
    pub const METHOD_INVOCATION: Self = Self::single(0xD0);

    pub const FIELD_ELEMENT_PREFIX: u8 = 0xD1;
    pub const RESERVED_FIELD: Self = Self::pseudo_field(0x00);
    pub const ACCESS_FIELD: Self = Self::pseudo_field(0x01);
    pub const CONNECT_FIELD: Self = Self::pseudo_field(0x02);
    pub const EXTENDED_ACCESS_FIELD: Self = Self::pseudo_field(0x03);
    pub const NAMED_FIELD: Self = Self::pseudo_field(0x04);

    pub const fn new(op: u8, sub_op: Option<u8>) -> Self {
        Self { op, sub_op }
    }

    pub const fn single(op: u8) -> Self {
        Self { op, sub_op: None }
    }

    pub const fn ext(sub_op: u8) -> Self {
        Self {
            op: Self::EXT_PREFIX,
            sub_op: Some(sub_op),
        }
    }

    const fn pseudo_field(sub_op: u8) -> Self {
        Self {
            op: Self::FIELD_ELEMENT_PREFIX,
            sub_op: Some(sub_op),
        }
    }

    pub fn info(&self) -> Option<&'static OpcodeInfo> {
        lookup(*self)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04X}", self.op)?;
        if let Some(sub_op) = self.sub_op {
            write!(f, " {sub_op:#04X}")?;
        }
        Ok(())
    }
}

/// What is expected in a fixed argument slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Byte,
    Word,
    DWord,
    QWord,
    /// Null terminated ascii string
    String,
    NameString,
    /// A bare 4 character name, only used in field lists
    NameSeg,
    /// Any expression, may be a method invocation
    TermArg,
    /// A data object or a name used as a reference, never an invocation
    DataRefObject,
    /// A name, `Arg` or `Local`
    SimpleName,
    /// A `SimpleName`, `Debug` or a reference producing expression
    SuperName,
    /// A `SuperName` or a `NullName`
    Target,
    /// `PkgLength` encoded bit count of a field list element
    FieldPkgLen,
}

/// What follows the fixed arguments, up to the end of the `PkgLength` extent
/// (or the argument count of an invocation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarArgs {
    None,
    TermList,
    ByteList,
    PackageElements,
    FieldList,
    Invocation,
}

pub mod flags {
    /// A `PkgLength` follows the opcode
    pub const HAS_PKG_LENGTH: u8 = 1 << 0;
    /// The fixed argument at `name_index` declares a new object in the namespace
    pub const DECLARES_NAME: u8 = 1 << 1;
    /// The variable args are parsed inside the scope named at `name_index`
    pub const OPENS_SCOPE: u8 = 1 << 2;
    /// The opcode is only a prefix for a literal, parsed into a data node
    pub const DATA_PREFIX: u8 = 1 << 3;
    /// Not an AML encoding, used to represent method calls and field elements
    pub const PSEUDO: u8 = 1 << 4;
}

#[derive(Debug)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub opcode: OpCode,
    pub fixed_args: &'static [ArgKind],
    pub var_args: VarArgs,
    pub flags: u8,
    /// Which fixed argument is the name of the object
    pub name_index: Option<u8>,
}

impl OpcodeInfo {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn arity(&self) -> usize {
        self.fixed_args.len()
    }
}

use flags::*;
use ArgKind::*;

const fn simple(name: &'static str, opcode: OpCode, fixed_args: &'static [ArgKind]) -> OpcodeInfo {
    OpcodeInfo {
        name,
        opcode,
        fixed_args,
        var_args: VarArgs::None,
        flags: 0,
        name_index: None,
    }
}

const fn named(
    name: &'static str,
    opcode: OpCode,
    fixed_args: &'static [ArgKind],
    name_index: u8,
) -> OpcodeInfo {
    OpcodeInfo {
        name,
        opcode,
        fixed_args,
        var_args: VarArgs::None,
        flags: DECLARES_NAME,
        name_index: Some(name_index),
    }
}

const fn scoped(
    name: &'static str,
    opcode: OpCode,
    fixed_args: &'static [ArgKind],
    var_args: VarArgs,
    flags: u8,
    name_index: Option<u8>,
) -> OpcodeInfo {
    OpcodeInfo {
        name,
        opcode,
        fixed_args,
        var_args,
        flags: HAS_PKG_LENGTH | flags,
        name_index,
    }
}

const fn data_prefix(name: &'static str, opcode: OpCode, arg: &'static [ArgKind]) -> OpcodeInfo {
    OpcodeInfo {
        name,
        opcode,
        fixed_args: arg,
        var_args: VarArgs::None,
        flags: DATA_PREFIX,
        name_index: None,
    }
}

const fn pseudo(
    name: &'static str,
    opcode: OpCode,
    fixed_args: &'static [ArgKind],
    var_args: VarArgs,
    name_index: Option<u8>,
) -> OpcodeInfo {
    OpcodeInfo {
        name,
        opcode,
        fixed_args,
        var_args,
        flags: PSEUDO,
        name_index,
    }
}

const BINARY: &[ArgKind] = &[TermArg, TermArg, Target];
const UNARY_CONVERT: &[ArgKind] = &[TermArg, Target];
const LOGICAL: &[ArgKind] = &[TermArg, TermArg];
const CREATE_FIELD: &[ArgKind] = &[TermArg, TermArg, NameString];

/// Sorted by opcode, checked by a test.
static OPCODES: &[OpcodeInfo] = &[
    simple("Zero", OpCode::ZERO, &[]),
    simple("One", OpCode::ONE, &[]),
    named("Alias", OpCode::ALIAS, &[NameString, NameString], 1),
    named("Name", OpCode::NAME, &[NameString, DataRefObject], 0),
    data_prefix("BytePrefix", OpCode::BYTE_PREFIX, &[Byte]),
    data_prefix("WordPrefix", OpCode::WORD_PREFIX, &[Word]),
    data_prefix("DWordPrefix", OpCode::DWORD_PREFIX, &[DWord]),
    data_prefix("StringPrefix", OpCode::STRING_PREFIX, &[String]),
    data_prefix("QWordPrefix", OpCode::QWORD_PREFIX, &[QWord]),
    scoped("Scope", OpCode::SCOPE, &[NameString], VarArgs::TermList, OPENS_SCOPE, Some(0)),
    scoped("Buffer", OpCode::BUFFER, &[TermArg], VarArgs::ByteList, 0, None),
    scoped("Package", OpCode::PACKAGE, &[Byte], VarArgs::PackageElements, 0, None),
    scoped("VarPackage", OpCode::VAR_PACKAGE, &[TermArg], VarArgs::PackageElements, 0, None),
    scoped(
        "Method",
        OpCode::METHOD,
        &[NameString, Byte],
        VarArgs::TermList,
        DECLARES_NAME | OPENS_SCOPE,
        Some(0),
    ),
    named("External", OpCode::EXTERNAL, &[NameString, Byte, Byte], 0),
    // extended opcodes, `0x5B` prefix
    named("Mutex", OpCode::MUTEX, &[NameString, Byte], 0),
    named("Event", OpCode::ext(0x02), &[NameString], 0),
    simple("CondRefOf", OpCode::ext(0x12), &[SuperName, Target]),
    named("CreateField", OpCode::CREATE_FIELD, &[TermArg, TermArg, TermArg, NameString], 3),
    simple(
        "LoadTable",
        OpCode::ext(0x1F),
        &[TermArg, TermArg, TermArg, TermArg, TermArg, TermArg],
    ),
    simple("Load", OpCode::ext(0x20), &[NameString, Target]),
    simple("Stall", OpCode::ext(0x21), &[TermArg]),
    simple("Sleep", OpCode::ext(0x22), &[TermArg]),
    simple("Acquire", OpCode::ext(0x23), &[SuperName, Word]),
    simple("Signal", OpCode::ext(0x24), &[SuperName]),
    simple("Wait", OpCode::ext(0x25), &[SuperName, TermArg]),
    simple("Reset", OpCode::ext(0x26), &[SuperName]),
    simple("Release", OpCode::ext(0x27), &[SuperName]),
    simple("FromBCD", OpCode::ext(0x28), UNARY_CONVERT),
    simple("ToBCD", OpCode::ext(0x29), UNARY_CONVERT),
    simple("Unload", OpCode::ext(0x2A), &[SuperName]),
    simple("Revision", OpCode::ext(0x30), &[]),
    simple("Debug", OpCode::DEBUG, &[]),
    simple("Fatal", OpCode::ext(0x32), &[Byte, DWord, TermArg]),
    simple("Timer", OpCode::ext(0x33), &[]),
    named("OperationRegion", OpCode::OP_REGION, &[NameString, Byte, TermArg, TermArg], 0),
    scoped("Field", OpCode::FIELD, &[NameString, Byte], VarArgs::FieldList, 0, Some(0)),
    scoped(
        "Device",
        OpCode::DEVICE,
        &[NameString],
        VarArgs::TermList,
        DECLARES_NAME | OPENS_SCOPE,
        Some(0),
    ),
    scoped(
        "Processor",
        OpCode::PROCESSOR,
        &[NameString, Byte, DWord, Byte],
        VarArgs::TermList,
        DECLARES_NAME | OPENS_SCOPE,
        Some(0),
    ),
    scoped(
        "PowerResource",
        OpCode::POWER_RES,
        &[NameString, Byte, Word],
        VarArgs::TermList,
        DECLARES_NAME | OPENS_SCOPE,
        Some(0),
    ),
    scoped(
        "ThermalZone",
        OpCode::THERMAL_ZONE,
        &[NameString],
        VarArgs::TermList,
        DECLARES_NAME | OPENS_SCOPE,
        Some(0),
    ),
    scoped(
        "IndexField",
        OpCode::INDEX_FIELD,
        &[NameString, NameString, Byte],
        VarArgs::FieldList,
        0,
        Some(0),
    ),
    scoped(
        "BankField",
        OpCode::BANK_FIELD,
        &[NameString, NameString, TermArg, Byte],
        VarArgs::FieldList,
        0,
        Some(0),
    ),
    named("DataTableRegion", OpCode::ext(0x88), &[NameString, TermArg, TermArg, TermArg], 0),
    // back to single byte opcodes
    simple("Local0", OpCode::LOCAL0, &[]),
    simple("Local1", OpCode::single(0x61), &[]),
    simple("Local2", OpCode::single(0x62), &[]),
    simple("Local3", OpCode::single(0x63), &[]),
    simple("Local4", OpCode::single(0x64), &[]),
    simple("Local5", OpCode::single(0x65), &[]),
    simple("Local6", OpCode::single(0x66), &[]),
    simple("Local7", OpCode::single(0x67), &[]),
    simple("Arg0", OpCode::ARG0, &[]),
    simple("Arg1", OpCode::single(0x69), &[]),
    simple("Arg2", OpCode::single(0x6A), &[]),
    simple("Arg3", OpCode::single(0x6B), &[]),
    simple("Arg4", OpCode::single(0x6C), &[]),
    simple("Arg5", OpCode::single(0x6D), &[]),
    simple("Arg6", OpCode::single(0x6E), &[]),
    simple("Store", OpCode::STORE, &[TermArg, SuperName]),
    simple("RefOf", OpCode::single(0x71), &[SuperName]),
    simple("Add", OpCode::ADD, BINARY),
    simple("Concatenate", OpCode::single(0x73), BINARY),
    simple("Subtract", OpCode::single(0x74), BINARY),
    simple("Increment", OpCode::single(0x75), &[SuperName]),
    simple("Decrement", OpCode::single(0x76), &[SuperName]),
    simple("Multiply", OpCode::single(0x77), BINARY),
    simple("Divide", OpCode::single(0x78), &[TermArg, TermArg, Target, Target]),
    simple("ShiftLeft", OpCode::single(0x79), BINARY),
    simple("ShiftRight", OpCode::single(0x7A), BINARY),
    simple("And", OpCode::single(0x7B), BINARY),
    simple("NAnd", OpCode::single(0x7C), BINARY),
    simple("Or", OpCode::single(0x7D), BINARY),
    simple("NOr", OpCode::single(0x7E), BINARY),
    simple("XOr", OpCode::single(0x7F), BINARY),
    simple("Not", OpCode::single(0x80), UNARY_CONVERT),
    simple("FindSetLeftBit", OpCode::single(0x81), UNARY_CONVERT),
    simple("FindSetRightBit", OpCode::single(0x82), UNARY_CONVERT),
    simple("DerefOf", OpCode::single(0x83), &[TermArg]),
    simple("ConcatenateResTemplate", OpCode::single(0x84), BINARY),
    simple("Mod", OpCode::single(0x85), BINARY),
    simple("Notify", OpCode::single(0x86), &[SuperName, TermArg]),
    simple("SizeOf", OpCode::single(0x87), &[SuperName]),
    simple("Index", OpCode::single(0x88), BINARY),
    simple(
        "Match",
        OpCode::single(0x89),
        &[TermArg, Byte, TermArg, Byte, TermArg, TermArg],
    ),
    named("CreateDWordField", OpCode::single(0x8A), CREATE_FIELD, 2),
    named("CreateWordField", OpCode::single(0x8B), CREATE_FIELD, 2),
    named("CreateByteField", OpCode::single(0x8C), CREATE_FIELD, 2),
    named("CreateBitField", OpCode::single(0x8D), CREATE_FIELD, 2),
    simple("ObjectType", OpCode::single(0x8E), &[SuperName]),
    named("CreateQWordField", OpCode::single(0x8F), CREATE_FIELD, 2),
    simple("LAnd", OpCode::single(0x90), LOGICAL),
    simple("LOr", OpCode::single(0x91), LOGICAL),
    simple("LNot", OpCode::LNOT, &[TermArg]),
    simple("LEqual", OpCode::LEQUAL, LOGICAL),
    simple("LGreater", OpCode::single(0x94), LOGICAL),
    simple("LLess", OpCode::single(0x95), LOGICAL),
    simple("ToBuffer", OpCode::single(0x96), UNARY_CONVERT),
    simple("ToDecimalString", OpCode::single(0x97), UNARY_CONVERT),
    simple("ToHexString", OpCode::single(0x98), UNARY_CONVERT),
    simple("ToInteger", OpCode::single(0x99), UNARY_CONVERT),
    simple("ToString", OpCode::single(0x9C), BINARY),
    simple("CopyObject", OpCode::single(0x9D), &[TermArg, SimpleName]),
    simple("Mid", OpCode::single(0x9E), &[TermArg, TermArg, TermArg, Target]),
    simple("Continue", OpCode::single(0x9F), &[]),
    scoped("If", OpCode::IF, &[TermArg], VarArgs::TermList, 0, None),
    scoped("Else", OpCode::ELSE, &[], VarArgs::TermList, 0, None),
    scoped("While", OpCode::WHILE, &[TermArg], VarArgs::TermList, 0, None),
    simple("Noop", OpCode::single(0xA3), &[]),
    simple("Return", OpCode::RETURN, &[TermArg]),
    simple("Break", OpCode::single(0xA5), &[]),
    simple("BreakPoint", OpCode::single(0xCC), &[]),
    pseudo(
        "MethodInvocation",
        OpCode::METHOD_INVOCATION,
        &[NameString, Byte],
        VarArgs::Invocation,
        Some(0),
    ),
    pseudo("ReservedField", OpCode::RESERVED_FIELD, &[FieldPkgLen], VarArgs::None, None),
    pseudo("AccessField", OpCode::ACCESS_FIELD, &[Byte, Byte], VarArgs::None, None),
    pseudo("Connection", OpCode::CONNECT_FIELD, &[DataRefObject], VarArgs::None, None),
    pseudo(
        "ExtendedAccessField",
        OpCode::EXTENDED_ACCESS_FIELD,
        &[Byte, Byte, Byte],
        VarArgs::None,
        None,
    ),
    OpcodeInfo {
        name: "NamedField",
        opcode: OpCode::NAMED_FIELD,
        fixed_args: &[NameSeg, FieldPkgLen],
        var_args: VarArgs::None,
        flags: PSEUDO | DECLARES_NAME,
        name_index: Some(0),
    },
    simple("Ones", OpCode::ONES, &[]),
];

pub fn lookup(opcode: OpCode) -> Option<&'static OpcodeInfo> {
    OPCODES
        .binary_search_by_key(&opcode, |info| info.opcode)
        .ok()
        .map(|i| &OPCODES[i])
}

/// Lookup only opcodes that can appear in the byte stream
pub(crate) fn lookup_encoded(opcode: OpCode) -> Option<&'static OpcodeInfo> {
    lookup(opcode).filter(|info| !info.has_flag(PSEUDO))
}

/// All known opcodes, sorted
pub fn all() -> &'static [OpcodeInfo] {
    OPCODES
}
