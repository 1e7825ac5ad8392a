use core::ops::Range;

use alloc::{string::String, vec::Vec};

use crate::{
    cursor::PkgLength,
    name::{NamePrefix, NameSeg, NameString},
    namespace::absolute_path,
    opcode::{flags, lookup, OpCode, OpcodeInfo, VarArgs},
    resource::{ResourceDescriptor, ResourceType},
};

/// A parsed term, every node owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Object(ObjectNode),
    Data(DataNode),
    ResourceData(ResourceDataNode),
}

impl Node {
    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataNode> {
        match self {
            Node::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_resource_data(&self) -> Option<&ResourceDataNode> {
        match self {
            Node::ResourceData(res) => Some(res),
            _ => None,
        }
    }

    pub(crate) fn as_object_mut(&mut self) -> Option<&mut ObjectNode> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Byte range of the buffer this node was decoded from
    pub fn span(&self) -> Range<usize> {
        match self {
            Node::Object(obj) => obj.span.clone(),
            Node::Data(data) => data.span.clone(),
            Node::ResourceData(res) => res.span.clone(),
        }
    }

    pub fn has_op(&self, opcode: OpCode) -> bool {
        matches!(self, Node::Object(obj) if obj.has_op(opcode))
    }

    pub fn has_data_type(&self, ty: DataType) -> bool {
        matches!(self, Node::Data(data) if data.data_type() == ty)
    }

    pub fn has_resource_type(&self, ty: ResourceType) -> bool {
        matches!(self, Node::ResourceData(res) if res.descriptor_type() == ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectNode {
    pub(crate) opcode: OpCode,
    pub(crate) fixed_args: Vec<Node>,
    pub(crate) var_args: Vec<Node>,
    pub(crate) span: Range<usize>,
    pub(crate) pkg_length: Option<PkgLength>,
}

impl ObjectNode {
    pub(crate) fn new(opcode: OpCode, start: usize) -> Self {
        Self {
            opcode,
            fixed_args: Vec::new(),
            var_args: Vec::new(),
            span: start..start,
            pkg_length: None,
        }
    }

    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn has_op(&self, opcode: OpCode) -> bool {
        self.opcode == opcode
    }

    pub fn info(&self) -> Option<&'static OpcodeInfo> {
        lookup(self.opcode)
    }

    pub fn fixed_args(&self) -> &[Node] {
        &self.fixed_args
    }

    pub fn var_args(&self) -> &[Node] {
        &self.var_args
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// The `PkgLength` of scope-bearing opcodes, its extent always ends where
    /// the node ends.
    pub fn pkg_length(&self) -> Option<PkgLength> {
        self.pkg_length
    }

    /// The name this object declares or refers to, for opcodes that have one
    pub fn name(&self) -> Option<&NameString> {
        let index = self.info()?.name_index?;
        match self.fixed_args.get(index as usize)?.as_data()?.value() {
            DataValue::NameString(name) => Some(name),
            _ => None,
        }
    }

    /// Compare the name of this object with an ASL style name.
    ///
    /// A bare short name like `abc` is compared with the last segment of the
    /// object name, anything with a prefix or more segments must match fully.
    pub fn is_named(&self, asl: &str) -> bool {
        let (Some(name), Some(asl)) = (self.name(), NameString::from_asl(asl)) else {
            return false;
        };

        if asl.is_single_segment() {
            name.last_segment() == asl.last_segment()
        } else {
            *name == asl
        }
    }

    /// The resolved argument count of a method invocation
    pub fn invocation_arg_count(&self) -> Option<u8> {
        if self.opcode != OpCode::METHOD_INVOCATION {
            return None;
        }
        match self.fixed_args.get(1)?.as_data()?.value() {
            DataValue::Integer { value, .. } => u8::try_from(*value).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    String,
    NameString,
    /// Bytes with no further structure, like a buffer body
    Raw,
    FieldPkgLen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// `width` is the size in bytes it was encoded with
    Integer { value: u64, width: u8 },
    String(String),
    NameString(NameString),
    Raw(Vec<u8>),
    /// Bit length of a field list element
    FieldPkgLen(u32),
}

impl DataValue {
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::Integer { .. } => DataType::Integer,
            DataValue::String(_) => DataType::String,
            DataValue::NameString(_) => DataType::NameString,
            DataValue::Raw(_) => DataType::Raw,
            DataValue::FieldPkgLen(_) => DataType::FieldPkgLen,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNode {
    pub(crate) value: DataValue,
    pub(crate) span: Range<usize>,
}

impl DataNode {
    pub(crate) fn new(value: DataValue, span: Range<usize>) -> Self {
        Self { value, span }
    }

    pub fn value(&self) -> &DataValue {
        &self.value
    }

    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self.value {
            DataValue::Integer { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&NameString> {
        match &self.value {
            DataValue::NameString(name) => Some(name),
            _ => None,
        }
    }
}

/// One descriptor of a resource template found in a `Buffer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDataNode {
    pub(crate) descriptor: ResourceDescriptor,
    pub(crate) bytes: Vec<u8>,
    pub(crate) span: Range<usize>,
}

impl ResourceDataNode {
    pub fn descriptor_type(&self) -> ResourceType {
        self.descriptor.resource_type()
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// The whole descriptor including its tag and length
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }
}

/// The top level term list of a definition block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Root {
    pub(crate) terms: Vec<Node>,
}

impl Root {
    pub fn terms(&self) -> &[Node] {
        &self.terms
    }

    /// Find a named object by absolute ASL path, like `\_SB.PCI0`.
    ///
    /// The first object declaring that path in the tree is returned, so for a
    /// `Scope` reopened several times only the first one is found.
    pub fn find(&self, asl_path: &str) -> Option<&ObjectNode> {
        let path = NameString::from_asl(asl_path)?;
        if path.prefix() != NamePrefix::Root {
            return None;
        }
        find_in(&self.terms, &[], path.segments())
    }

    /// Walk to the term list of the node at `path`, `path` indexes the fixed and
    /// variable args from the root.
    pub(crate) fn term_list_mut(&mut self, path: &[Slot]) -> Option<&mut Vec<Node>> {
        let Some((first, rest)) = path.split_first() else {
            return Some(&mut self.terms);
        };
        let Slot::Var(i) = first else {
            return None;
        };

        let mut node = self.terms.get_mut(*i)?.as_object_mut()?;
        for slot in rest {
            let child = match slot {
                Slot::Fixed(i) => node.fixed_args.get_mut(*i)?,
                Slot::Var(i) => node.var_args.get_mut(*i)?,
            };
            node = child.as_object_mut()?;
        }
        Some(&mut node.var_args)
    }
}

/// Position of a child in its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Fixed(usize),
    Var(usize),
}

fn find_in<'a>(terms: &'a [Node], scope: &[NameSeg], target: &[NameSeg]) -> Option<&'a ObjectNode> {
    for obj in terms.iter().filter_map(Node::as_object) {
        let Some(info) = obj.info() else {
            continue;
        };

        let declares = info.has_flag(flags::DECLARES_NAME) || info.has_flag(flags::OPENS_SCOPE);
        let path = obj
            .name()
            .filter(|_| declares)
            .and_then(|name| absolute_path(name, scope));

        if let Some(path) = path {
            if path == target {
                return Some(obj);
            }
            if info.has_flag(flags::OPENS_SCOPE) && target.starts_with(&path) {
                if let Some(found) = find_in(&obj.var_args, &path, target) {
                    return Some(found);
                }
            }
        } else if matches!(info.var_args, VarArgs::TermList | VarArgs::FieldList) {
            // `If`/`While` bodies and field lists declare in the current scope
            if let Some(found) = find_in(&obj.var_args, scope, target) {
                return Some(found);
            }
        }
    }

    None
}
