//! Structural AML parser.
//!
//! Every term is decoded from the opcode table, the only thing that can't be
//! known from the encoding is the number of arguments of a method call, for
//! that the parser keeps a namespace of everything declared so far.
//!
//! When a name in a call position isn't declared yet, the term list holding it
//! is suspended at that term: a [`PendingReference`] remembers where the list
//! is in the tree and where it was in the stream. The rest of the list is still
//! walked ahead so that declarations following the call are seen. While walking
//! ahead an undeclared name gets a guessed argument count, starting at zero,
//! and a statement that fails is parsed again with the next guesses until one
//! fits. Once the name is declared the list is truncated back to the suspended
//! term and parsed again.
//!
//! An error the walk can't get past is kept on the pending reference, it is the
//! error reported if the name is never declared.

mod args;

use alloc::{collections::BTreeMap, vec::Vec};
use tracing::{debug, trace, warn};

use crate::{
    config::ParserConfig,
    cursor::Cursor,
    error::{AmlParseError, AmlParseErrorKind},
    name::{is_name_string_start, NameSeg, NameString},
    namespace::{Namespace, PendingReference, PendingReferences},
    node::{DataNode, DataValue, Node, ObjectNode, Root, Slot},
    opcode::{flags, lookup_encoded, OpCode, OpcodeInfo},
};

/// Why parsing of a term stopped
#[derive(Debug)]
pub(crate) enum Interrupt {
    Error(AmlParseError),
    /// A name in a call position that isn't declared yet
    Pending { name: NameString, offset: usize },
}

impl Interrupt {
    fn into_error(self) -> AmlParseError {
        match self {
            Interrupt::Error(err) => err,
            Interrupt::Pending { name, offset } => {
                AmlParseError::new(AmlParseErrorKind::UnresolvedReference(name), offset)
            }
        }
    }
}

impl From<AmlParseError> for Interrupt {
    fn from(err: AmlParseError) -> Self {
        Interrupt::Error(err)
    }
}

pub(crate) type ParseResult<T> = Result<T, Interrupt>;

/// Where a term appears, decides what a bare name means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TermMode {
    /// An element of a term list
    Statement,
    /// An operand, may be a method call
    TermArg,
    /// A package element or the value of a `Name`, names are references only
    Data,
    /// The destination of a store, names are references only
    SuperName,
}

impl TermMode {
    fn allows_invocation(self) -> bool {
        matches!(self, TermMode::Statement | TermMode::TermArg)
    }
}

mod consts {
    /// Method argument counts are 3 bits
    pub const MAX_ARG_COUNT: u8 = 7;
    /// Statement retries allowed for one walk
    pub const GUESS_ATTEMPTS: u32 = 256;
}

/// State of the walk over the rest of a suspended term list
struct Lookahead {
    pending_id: usize,
    error: Option<AmlParseError>,
    attempts_left: u32,
}

fn push_node(list: &mut Vec<Node>, node: Node, offset: usize) -> Result<(), AmlParseError> {
    list.try_reserve(1)
        .map_err(|_| AmlParseError::new(AmlParseErrorKind::AllocationFailure, offset))?;
    list.push(node);
    Ok(())
}

pub(crate) struct Parser<'a> {
    cursor: Cursor<'a>,
    config: &'a ParserConfig,
    namespace: Namespace,
    pending: PendingReferences,
    /// Absolute path of the current namespace scope
    scope: Vec<NameSeg>,
    /// Where the node being built will be in the tree
    path: Vec<Slot>,
    depth: u32,
    /// End of the innermost `PkgLength` extent
    scope_end: usize,
    /// Walking the rest of a suspended term list, see the module docs
    lookahead: Option<Lookahead>,
    /// Argument count guessed for undeclared names while walking ahead
    guesses: BTreeMap<NameSeg, u8>,
    /// Names guessed in the statements being parsed, innermost last
    guessed: Vec<NameSeg>,
    /// Names that never got declared are parsed as plain names
    lax: bool,
}

impl<'a> Parser<'a> {
    pub fn new(code: &'a [u8], config: &'a ParserConfig) -> Self {
        Self {
            cursor: Cursor::new(code),
            config,
            namespace: Namespace::with_predefined(),
            pending: PendingReferences::default(),
            scope: Vec::new(),
            path: Vec::new(),
            depth: 0,
            scope_end: code.len(),
            lookahead: None,
            guesses: BTreeMap::new(),
            guessed: Vec::new(),
            lax: false,
        }
    }

    pub fn parse_root(mut self) -> Result<Root, AmlParseError> {
        let mut root = Root::default();
        let end = self.cursor.len();
        debug!("parsing {end:#x} bytes of AML");

        self.scope_end = end;
        self.parse_term_list(end, &mut root.terms)
            .map_err(Interrupt::into_error)?;
        self.resolve_pending(&mut root)?;

        debug!(
            "parsed {} top level terms, {} objects in the namespace",
            root.terms.len(),
            self.namespace.len()
        );
        Ok(root)
    }

    /// Run `f` with `slot` pushed to the tree path
    fn with_slot<T>(
        &mut self,
        slot: Slot,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        self.path.push(slot);
        let result = f(self);
        self.path.pop();
        result
    }

    fn parse_term(&mut self, mode: TermMode) -> ParseResult<Node> {
        if self.depth >= self.config.max_depth {
            return Err(AmlParseError::new(
                AmlParseErrorKind::NestingTooDeep {
                    limit: self.config.max_depth,
                },
                self.cursor.position(),
            )
            .into());
        }

        self.depth += 1;
        let result = self.parse_term_inner(mode);
        self.depth -= 1;
        result
    }

    fn parse_term_inner(&mut self, mode: TermMode) -> ParseResult<Node> {
        let start = self.cursor.position();

        if is_name_string_start(self.cursor.peek_u8()?) {
            return self.parse_name_term(mode);
        }

        let (info, opcode_len) = self.peek_opcode()?;
        self.cursor.read(opcode_len)?;
        trace!("{} at {start:#x}", info.name);

        if info.has_flag(flags::DATA_PREFIX) {
            if let [kind] = info.fixed_args {
                let mut literal = self.parse_fixed_arg(*kind)?;
                if let Node::Data(data) = &mut literal {
                    // the prefix is part of the data
                    data.span.start = start;
                }
                return Ok(literal);
            }
        }

        Ok(Node::Object(self.parse_object(info, start)?))
    }

    /// Find the opcode at the cursor without consuming it
    fn peek_opcode(&self) -> Result<(&'static OpcodeInfo, usize), AmlParseError> {
        let start = self.cursor.position();
        let op = self.cursor.peek_u8()?;

        let (opcode, len) = if op == OpCode::EXT_PREFIX {
            let bytes = self.cursor.peek(2)?;
            (OpCode::ext(bytes[1]), 2)
        } else {
            (OpCode::single(op), 1)
        };

        let info = lookup_encoded(opcode).ok_or_else(|| {
            AmlParseError::new(
                AmlParseErrorKind::UnknownOpcode {
                    opcode: opcode.op,
                    sub_opcode: opcode.sub_op,
                },
                start,
            )
        })?;

        Ok((info, len))
    }

    fn parse_name_term(&mut self, mode: TermMode) -> ParseResult<Node> {
        let start = self.cursor.position();
        let name = NameString::parse(&mut self.cursor)?;
        let name_node = DataNode::new(
            DataValue::NameString(name.clone()),
            start..self.cursor.position(),
        );

        if !mode.allows_invocation() || name.is_null() {
            return Ok(Node::Data(name_node));
        }

        let arg_count = match self.namespace.lookup(&name, &self.scope) {
            Some(object) => object.arg_count,
            None if self.lax => {
                warn!("{name} at {start:#x} is never declared, using it as a name");
                None
            }
            None if self.lookahead.is_some() => self.guess_arg_count(&name),
            None => return Err(Interrupt::Pending { name, offset: start }),
        };

        let Some(arg_count) = arg_count else {
            return Ok(Node::Data(name_node));
        };
        trace!("calling {name} with {arg_count} args");

        let name_end = self.cursor.position();
        let mut node = ObjectNode::new(OpCode::METHOD_INVOCATION, start);
        push_node(&mut node.fixed_args, Node::Data(name_node), start)?;
        push_node(
            &mut node.fixed_args,
            Node::Data(DataNode::new(
                DataValue::Integer {
                    value: arg_count as u64,
                    width: 1,
                },
                name_end..name_end,
            )),
            start,
        )?;

        for i in 0..arg_count as usize {
            let arg_start = self.cursor.position();
            let arg = self.with_slot(Slot::Var(i), |p| p.parse_term(TermMode::TermArg))?;
            push_node(&mut node.var_args, arg, arg_start)?;
        }

        node.span = start..self.cursor.position();
        Ok(Node::Object(node))
    }

    /// Argument count to try for an undeclared `name` while walking ahead
    fn guess_arg_count(&mut self, name: &NameString) -> Option<u8> {
        let seg = name.last_segment()?;
        if !self.guessed.contains(&seg) {
            self.guessed.push(seg);
        }
        let guess = self.guesses.get(&seg).copied().unwrap_or(0);
        (guess != 0).then_some(guess)
    }

    /// Move to the next combination of guesses for the names used since
    /// `mark`, the last one changing fastest. `false` once all were tried.
    fn next_guess(&mut self, mark: usize) -> bool {
        let Some(lookahead) = &mut self.lookahead else {
            return false;
        };
        if self.guessed.len() <= mark || lookahead.attempts_left == 0 {
            return false;
        }
        lookahead.attempts_left -= 1;

        for seg in self.guessed[mark..].iter().rev() {
            let guess = self.guesses.entry(*seg).or_default();
            if *guess < consts::MAX_ARG_COUNT {
                *guess += 1;
                return true;
            }
            *guess = 0;
        }
        false
    }

    /// Parse one element of a term list, retrying with other guesses when
    /// walking ahead.
    fn parse_statement(&mut self) -> ParseResult<Node> {
        let Some(had_error) = self.lookahead.as_ref().map(|l| l.error.is_some()) else {
            return self.parse_term(TermMode::Statement);
        };
        let start = self.cursor.position();
        let mark = self.guessed.len();
        let mut first_error = None;

        let result = loop {
            let err = match self.parse_term(TermMode::Statement) {
                Err(Interrupt::Error(err)) => err,
                result => break result,
            };
            // lists inside a failed attempt don't count
            if let Some(lookahead) = &mut self.lookahead {
                if !had_error {
                    lookahead.error = None;
                }
            }
            // report the error of the first attempt, later ones are guesses
            let err = first_error.take().unwrap_or(err);
            if !self.next_guess(mark) {
                break Err(err.into());
            }
            first_error = Some(err);

            trace!("parsing statement at {start:#x} again with other argument counts");
            self.cursor.seek(start);
        };

        self.guessed.truncate(mark);
        result
    }

    /// Parse the terms up to `end` into `list`.
    ///
    /// Suspends the list on the first undeclared call target. When walking
    /// ahead an error skips the rest of the list, the first one is kept for
    /// the pending reference that started the walk.
    fn parse_term_list(&mut self, end: usize, list: &mut Vec<Node>) -> ParseResult<()> {
        let walking = self.lookahead.is_some();
        let result = match self.parse_term_list_inner(end, list) {
            Err(Interrupt::Error(err)) if self.lookahead.is_some() => {
                debug!("look-ahead stopped by {err}, skipping to {end:#x}");
                if let Some(lookahead) = &mut self.lookahead {
                    lookahead.error.get_or_insert(err);
                }
                self.cursor.seek(end);
                Ok(())
            }
            result => result,
        };

        if !walking {
            if let Some(Lookahead {
                pending_id,
                error: Some(err),
                ..
            }) = self.lookahead.take()
            {
                self.pending.set_walk_error(pending_id, err);
            }
        }
        result
    }

    fn parse_term_list_inner(&mut self, end: usize, list: &mut Vec<Node>) -> ParseResult<()> {
        while self.cursor.position() < end {
            let start = self.cursor.position();
            let index = list.len();

            match self.with_slot(Slot::Var(index), Self::parse_statement) {
                Ok(term) => push_node(list, term, start)?,
                Err(Interrupt::Pending { name, offset }) => {
                    debug!("{name} at {offset:#x} is not declared yet, suspending list at {start:#x}");
                    let pending_id = self.pending.insert(PendingReference {
                        name,
                        name_offset: offset,
                        scope: self.scope.clone(),
                        path: self.path.clone(),
                        index,
                        offset: start,
                        end,
                        depth: self.depth,
                        walk_error: None,
                    });
                    self.lookahead = Some(Lookahead {
                        pending_id,
                        error: None,
                        attempts_left: consts::GUESS_ATTEMPTS,
                    });
                    self.cursor.seek(start);
                }
                Err(err) => return Err(err),
            }
        }

        let actual_end = self.cursor.position();
        if actual_end != end {
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

    fn resolve_pending(&mut self, root: &mut Root) -> Result<(), AmlParseError> {
        loop {
            while let Some(pending) = self.pending.take_ready() {
                self.resume(root, pending)?;
            }

            let Some(first) = self.pending.first() else {
                return Ok(());
            };

            if !self.config.unresolved_as_name || self.lax {
                return Err(first.walk_error.clone().unwrap_or_else(|| {
                    AmlParseError::new(
                        AmlParseErrorKind::UnresolvedReference(first.name.clone()),
                        first.name_offset,
                    )
                }));
            }

            warn!(
                "{} term lists wait for names that are never declared",
                self.pending.len()
            );
            self.lax = true;
            self.pending.wake_all();
        }
    }

    fn resume(&mut self, root: &mut Root, pending: PendingReference) -> Result<(), AmlParseError> {
        debug!(
            "resuming list at {:#x} after {} got declared",
            pending.offset, pending.name
        );

        let Some(list) = root.term_list_mut(&pending.path) else {
            return Err(AmlParseError::new(
                AmlParseErrorKind::UnresolvedReference(pending.name),
                pending.name_offset,
            ));
        };
        list.truncate(pending.index);

        self.cursor.seek(pending.offset);
        self.scope = pending.scope;
        self.path = pending.path;
        self.depth = pending.depth;
        self.scope_end = pending.end;
        self.lookahead = None;

        self.parse_term_list(pending.end, list)
            .map_err(Interrupt::into_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn parse(code: &[u8]) -> Result<Root, AmlParseError> {
        Parser::new(code, &ParserConfig::default()).parse_root()
    }

    testing::test! {
        fn test_name_and_literals() {
            // Name (ABC, 0x1234)
            let code = [0x08, b'A', b'B', b'C', b'_', 0x0B, 0x34, 0x12];
            let root = parse(&code).unwrap();
            let name = root.terms()[0].as_object().unwrap();
            assert!(name.has_op(OpCode::NAME));
            assert_eq!(name.span(), 0..8);

            let value = name.fixed_args()[1].as_data().unwrap();
            assert_eq!(
                value.value(),
                &DataValue::Integer {
                    value: 0x1234,
                    width: 2
                }
            );
            // prefix included
            assert_eq!(value.span(), 5..8);
        }

        fn test_string_literal() {
            let code = [0x08, b'S', b'T', b'R', b'_', 0x0D, b'h', b'i', 0x00];
            let root = parse(&code).unwrap();
            let value = root.terms()[0].as_object().unwrap().fixed_args()[1].as_data().unwrap();
            assert_eq!(value.value(), &DataValue::String("hi".into()));

            let err = parse(&code[..8]).unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::Truncated);
        }

        fn test_unknown_opcode() {
            let code = [0xA3, 0x02];
            let err = parse(&code).unwrap_err();
            assert_eq!(
                err.kind(),
                &AmlParseErrorKind::UnknownOpcode {
                    opcode: 0x02,
                    sub_opcode: None
                }
            );
            assert_eq!(err.offset(), 1);

            let code = [0x5B, 0x90];
            let err = parse(&code).unwrap_err();
            assert_eq!(
                err.kind(),
                &AmlParseErrorKind::UnknownOpcode {
                    opcode: 0x5B,
                    sub_opcode: Some(0x90)
                }
            );
            assert_eq!(err.offset(), 0);
        }

        fn test_known_call() {
            // Method (FOO, 1) { }  FOO (One)
            let method = [0x14, 0x06, b'F', b'O', b'O', b'_', 0x01];
            let code = [&method[..], &[b'F', b'O', b'O', b'_', 0x01]].concat();
            let root = parse(&code).unwrap();

            let call = root.terms()[1].as_object().unwrap();
            assert!(call.has_op(OpCode::METHOD_INVOCATION));
            assert_eq!(call.invocation_arg_count(), Some(1));
            assert_eq!(call.var_args().len(), 1);
            assert!(call.var_args()[0].has_op(OpCode::ONE));
            assert_eq!(call.span(), method.len()..code.len());
        }

        fn test_forward_call_in_root() {
            // FOO (One, One)  Method (FOO, 2) { }
            let method = [0x14, 0x06, b'F', b'O', b'O', b'_', 0x02];
            let code = [&[b'F', b'O', b'O', b'_', 0x01, 0x01][..], &method].concat();
            let root = parse(&code).unwrap();

            assert_eq!(root.terms().len(), 2);
            let call = root.terms()[0].as_object().unwrap();
            assert_eq!(call.invocation_arg_count(), Some(2));
            assert!(root.terms()[1].has_op(OpCode::METHOD));
        }

        fn test_unresolved_reference() {
            let code = [0xA4, b'N', b'O', b'N', b'E'];
            let err = parse(&code).unwrap_err();
            assert_eq!(
                err.kind(),
                &AmlParseErrorKind::UnresolvedReference(NameString::from_asl("NONE").unwrap())
            );
            assert_eq!(err.offset(), 1);

            let config = ParserConfig {
                unresolved_as_name: true,
                ..ParserConfig::default()
            };
            let root = Parser::new(&code, &config).parse_root().unwrap();
            let ret = root.terms()[0].as_object().unwrap();
            assert!(ret.fixed_args()[0].as_data().unwrap().as_name().is_some());
        }

        fn test_scope_mismatch() {
            // Scope (\) ending at 5, but its body is a DWord literal ending at 9
            let code = [0x10, 0x04, b'\\', 0x00, 0x0C, 0x00, 0x00, 0x00, 0x00];
            let err = parse(&code).unwrap_err();
            assert_eq!(
                err.kind(),
                &AmlParseErrorKind::ScopeLengthMismatch {
                    expected_end: 5,
                    actual_end: 9
                }
            );
        }

        fn test_depth_limit() {
            let config = ParserConfig {
                max_depth: 3,
                ..ParserConfig::default()
            };
            // Return (LNot (LNot (LNot (Zero))))
            let code = [0xA4, 0x92, 0x92, 0x92, 0x00];
            let err = Parser::new(&code, &config).parse_root().unwrap_err();
            assert_eq!(err.kind(), &AmlParseErrorKind::NestingTooDeep { limit: 3 });
            assert_eq!(err.offset(), 3);
        }
    }
}
