use core::mem;

use alloc::{string::String, vec::Vec};
use tracing::{debug, trace};

use super::{push_node, Interrupt, ParseResult, Parser, TermMode};
use crate::{
    error::{AmlParseError, AmlParseErrorKind},
    name::{NameSeg, NameString},
    namespace::{absolute_path, NamespaceObject, PathDisplay},
    node::{DataNode, DataValue, Node, ObjectNode, Slot},
    opcode::{flags, lookup, ArgKind, OpCode, OpcodeInfo, VarArgs},
    resource,
};

mod consts {
    /// `External` object type of methods
    pub const EXTERNAL_METHOD_TYPE: u64 = 8;
    pub const ARG_COUNT_MASK: u64 = 0b111;
    /// Lead bytes of the field elements that aren't named fields
    pub const LAST_FIELD_ELEMENT_LEAD: u8 = 0x03;
}

fn integer_arg(node: &ObjectNode, index: usize) -> Option<u64> {
    node.fixed_args.get(index)?.as_data()?.as_integer()
}

impl Parser<'_> {
    /// Parse an object whose opcode at `start` was consumed
    pub(super) fn parse_object(
        &mut self,
        info: &'static OpcodeInfo,
        start: usize,
    ) -> ParseResult<ObjectNode> {
        let outer_end = self.scope_end;
        let mut node = ObjectNode::new(info.opcode, start);
        let result = self.parse_object_contents(info, &mut node);
        self.scope_end = outer_end;
        result?;

        node.span = start..self.cursor.position();
        Ok(node)
    }

    fn parse_object_contents(
        &mut self,
        info: &'static OpcodeInfo,
        node: &mut ObjectNode,
    ) -> ParseResult<()> {
        let mark = self.cursor.mark();
        let mut pkg_length = None;
        if info.has_flag(flags::HAS_PKG_LENGTH) {
            let pkg = self.cursor.read_pkg_length()?;
            if pkg.end > self.scope_end {
                return Err(AmlParseError::new(
                    AmlParseErrorKind::ScopeLengthMismatch {
                        expected_end: self.scope_end,
                        actual_end: pkg.end,
                    },
                    node.span.start,
                )
                .into());
            }
            trace!("{} extent {:#x}..{:#x}", info.name, pkg.start, pkg.end);

            self.scope_end = pkg.end;
            node.pkg_length = Some(pkg);
            pkg_length = Some(pkg);
        }

        for (i, kind) in info.fixed_args.iter().enumerate() {
            let arg_start = self.cursor.position();
            let arg = self.with_slot(Slot::Fixed(i), |p| p.parse_fixed_arg(*kind))?;
            push_node(&mut node.fixed_args, arg, arg_start)?;
        }

        let scope = if info.has_flag(flags::DECLARES_NAME) || info.has_flag(flags::OPENS_SCOPE) {
            self.declare(info, node)?
        } else {
            None
        };

        let Some(pkg) = pkg_length else {
            return Ok(());
        };
        let end = pkg.end;

        let outer_scope = match scope {
            Some(path) if info.has_flag(flags::OPENS_SCOPE) => {
                debug!("entering scope {}", PathDisplay(&path));
                Some(mem::replace(&mut self.scope, path))
            }
            _ => None,
        };
        let result = self.parse_var_args(info, node, end);
        if let Some(outer_scope) = outer_scope {
            self.scope = outer_scope;
        }
        result?;

        // `mark` is at the `PkgLength` field, where the extent is counted from
        if self.cursor.position_from(mark) != pkg.length() {
            let actual_end = self.cursor.position();
            return Err(AmlParseError::new(
                AmlParseErrorKind::ScopeLengthMismatch {
                    expected_end: end,
                    actual_end,
                },
                actual_end,
            )
            .into());
        }

        Ok(())
    }

    /// Add the object named by `node` to the namespace, returns its absolute path
    fn declare(
        &mut self,
        info: &'static OpcodeInfo,
        node: &ObjectNode,
    ) -> Result<Option<Vec<NameSeg>>, AmlParseError> {
        let Some(name) = node.name() else {
            return Ok(None);
        };
        let Some(path) = absolute_path(name, &self.scope) else {
            return Err(AmlParseError::new(
                AmlParseErrorKind::MalformedName,
                node.span.start,
            ));
        };

        if !info.has_flag(flags::DECLARES_NAME) || name.is_null() {
            return Ok(Some(path));
        }

        let mut object = NamespaceObject::new(info.opcode, node.span.start);
        match info.opcode {
            OpCode::METHOD => {
                let method_flags = integer_arg(node, 1).unwrap_or(0);
                object.arg_count = Some((method_flags & consts::ARG_COUNT_MASK) as u8);
            }
            OpCode::EXTERNAL => {
                object.external = true;
                if integer_arg(node, 1) == Some(consts::EXTERNAL_METHOD_TYPE) {
                    let count = integer_arg(node, 2).unwrap_or(0);
                    object.arg_count = Some((count & consts::ARG_COUNT_MASK) as u8);
                }
            }
            OpCode::ALIAS => {
                object.arg_count = node
                    .fixed_args
                    .first()
                    .and_then(Node::as_data)
                    .and_then(|data| data.as_name())
                    .and_then(|source| self.namespace.lookup(source, &self.scope))
                    .and_then(|source| source.arg_count);
            }
            _ => {}
        }

        if self.namespace.declare(path.clone(), object) {
            debug!("declared {} as {}", PathDisplay(&path), info.name);
            if let Some(seg) = path.last() {
                self.pending.wake(*seg, &self.namespace);
            }
        }

        Ok(Some(path))
    }

    pub(super) fn parse_fixed_arg(&mut self, kind: ArgKind) -> ParseResult<Node> {
        let start = self.cursor.position();

        let value = match kind {
            ArgKind::Byte => self.read_integer(1)?,
            ArgKind::Word => self.read_integer(2)?,
            ArgKind::DWord => self.read_integer(4)?,
            ArgKind::QWord => self.read_integer(8)?,
            ArgKind::String => DataValue::String(self.read_string()?),
            ArgKind::NameString => DataValue::NameString(NameString::parse(&mut self.cursor)?),
            ArgKind::NameSeg => {
                DataValue::NameString(NameString::from_seg(NameSeg::parse(&mut self.cursor)?))
            }
            ArgKind::FieldPkgLen => DataValue::FieldPkgLen(self.cursor.read_field_length()?),
            ArgKind::TermArg => return self.parse_term(TermMode::TermArg),
            ArgKind::DataRefObject => return self.parse_term(TermMode::Data),
            ArgKind::SimpleName | ArgKind::SuperName => {
                return self.parse_term(TermMode::SuperName)
            }
            ArgKind::Target => {
                if self.cursor.peek_u8()? != 0 {
                    return self.parse_term(TermMode::SuperName);
                }
                // `NullName`, no target
                self.cursor.read_u8()?;
                DataValue::NameString(NameString::default())
            }
        };

        Ok(Node::Data(DataNode::new(
            value,
            start..self.cursor.position(),
        )))
    }

    fn read_integer(&mut self, width: u8) -> Result<DataValue, AmlParseError> {
        let value = match width {
            1 => self.cursor.read_u8()? as u64,
            2 => self.cursor.read_u16()? as u64,
            4 => self.cursor.read_u32()? as u64,
            _ => self.cursor.read_u64()?,
        };
        Ok(DataValue::Integer { value, width })
    }

    /// Null terminated string, invalid utf8 sequences become U+FFFD
    fn read_string(&mut self) -> Result<String, AmlParseError> {
        let start = self.cursor.position();
        let mut len = 0;
        while self.cursor.peek(len + 1)?[len] != 0 {
            len += 1;
        }
        let bytes = self.cursor.read(len)?;
        self.cursor.read_u8()?;

        let allocation_failure =
            |_| AmlParseError::new(AmlParseErrorKind::AllocationFailure, start);
        let mut string = String::new();
        string.try_reserve(len).map_err(allocation_failure)?;
        for chunk in bytes.utf8_chunks() {
            string.push_str(chunk.valid());
            if !chunk.invalid().is_empty() {
                // the replacement is 3 bytes, more than the 1 reserved for it
                string
                    .try_reserve(char::REPLACEMENT_CHARACTER.len_utf8())
                    .map_err(allocation_failure)?;
                string.push(char::REPLACEMENT_CHARACTER);
            }
        }
        Ok(string)
    }

    fn parse_var_args(
        &mut self,
        info: &'static OpcodeInfo,
        node: &mut ObjectNode,
        end: usize,
    ) -> ParseResult<()> {
        match info.var_args {
            VarArgs::None | VarArgs::Invocation => Ok(()),
            VarArgs::TermList => self.parse_term_list(end, &mut node.var_args),
            VarArgs::ByteList => Ok(self.parse_byte_list(end, &mut node.var_args)?),
            VarArgs::PackageElements => {
                while self.cursor.position() < end {
                    let start = self.cursor.position();
                    let index = node.var_args.len();
                    let element =
                        self.with_slot(Slot::Var(index), |p| p.parse_term(TermMode::Data))?;
                    push_node(&mut node.var_args, element, start)?;
                }
                Ok(())
            }
            VarArgs::FieldList => self.parse_field_list(end, &mut node.var_args),
        }
    }

    /// Buffer contents, decoded into resource descriptors if they form a
    /// resource template
    fn parse_byte_list(&mut self, end: usize, list: &mut Vec<Node>) -> Result<(), AmlParseError> {
        let start = self.cursor.position();
        let bytes = self.cursor.read_until(end)?;
        if bytes.is_empty() {
            return Ok(());
        }

        if self.config.resource_data {
            if let Some(descriptors) =
                resource::parse_template(bytes, start, self.config.check_resource_checksum)?
            {
                trace!("buffer at {start:#x} holds {} descriptors", descriptors.len());
                list.try_reserve(descriptors.len()).map_err(|_| {
                    AmlParseError::new(AmlParseErrorKind::AllocationFailure, start)
                })?;
                list.extend(descriptors.into_iter().map(Node::ResourceData));
                return Ok(());
            }
        }

        let mut raw = Vec::new();
        raw.try_reserve_exact(bytes.len())
            .map_err(|_| AmlParseError::new(AmlParseErrorKind::AllocationFailure, start))?;
        raw.extend_from_slice(bytes);

        push_node(
            list,
            Node::Data(DataNode::new(DataValue::Raw(raw), start..end)),
            start,
        )
    }

    /// Elements of `Field`, `IndexField` and `BankField`, each one becomes an
    /// object node with one of the field element pseudo opcodes
    fn parse_field_list(&mut self, end: usize, list: &mut Vec<Node>) -> ParseResult<()> {
        while self.cursor.position() < end {
            let start = self.cursor.position();
            let lead = self.cursor.peek_u8()?;

            let opcode = if lead <= consts::LAST_FIELD_ELEMENT_LEAD {
                self.cursor.read_u8()?;
                OpCode::new(OpCode::FIELD_ELEMENT_PREFIX, Some(lead))
            } else {
                OpCode::NAMED_FIELD
            };
            let info = lookup(opcode).ok_or_else(|| {
                Interrupt::from(AmlParseError::new(
                    AmlParseErrorKind::UnknownOpcode {
                        opcode: lead,
                        sub_opcode: None,
                    },
                    start,
                ))
            })?;

            let index = list.len();
            let element = self.with_slot(Slot::Var(index), |p| p.parse_object(info, start))?;
            push_node(list, Node::Object(element), start)?;
        }

        Ok(())
    }
}
