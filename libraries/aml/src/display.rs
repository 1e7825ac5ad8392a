use core::{
    cell::Cell,
    fmt::{self, Display, Write},
};

use crate::{
    node::{DataNode, DataValue, Node, ObjectNode, Root},
    opcode::{OpCode, VarArgs},
};

/// Indents everything written through it by one level
struct Indented<'a> {
    out: &'a mut dyn fmt::Write,
    line_start: bool,
}

impl fmt::Write for Indented<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for line in s.split_inclusive('\n') {
            if self.line_start {
                self.out.write_str("    ")?;
            }
            self.line_start = line.ends_with('\n');
            self.out.write_str(line)?;
        }
        Ok(())
    }
}

/// A one-shot closure formatted through `format_args!`, the only way to get a
/// `Formatter` that writes into [`Indented`]
struct Deferred<F>(Cell<Option<F>>);

impl<F> fmt::Display for Deferred<F>
where
    F: FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write = self.0.take().ok_or(fmt::Error)?;
        write(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Nothing after the name yet
    Name,
    /// Inside `( .. )`
    Args,
    /// `( .. )` is closed
    AfterArgs,
    /// Inside `{ .. }`
    Body,
    Done,
}

/// Writes ASL-like `Name (args) { body }` output.
///
/// With `{:#}` the body is written one field per line and indented.
pub struct AmlDisplayer<'a, 'b: 'a> {
    fmt: &'a mut fmt::Formatter<'b>,
    result: fmt::Result,
    section: Section,
    /// Body fields are list elements separated by commas
    list: bool,
}

impl<'a, 'b: 'a> AmlDisplayer<'a, 'b> {
    pub fn start(fmt: &'a mut fmt::Formatter<'b>, name: &str) -> Self {
        let result = fmt.write_str(name);
        Self {
            fmt,
            result,
            section: Section::Name,
            list: false,
        }
    }

    pub fn set_list(&mut self, value: bool) -> &mut Self {
        self.list = value;
        self
    }

    pub fn paren_arg<F>(&mut self, value_fmt: F) -> &mut Self
    where
        F: FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
    {
        let prefix = match self.section {
            Section::Name => " (",
            Section::Args => ", ",
            // args can't be reopened
            _ => {
                self.result = Err(fmt::Error);
                return self;
            }
        };
        self.section = Section::Args;
        self.result = self.result.and_then(|_| {
            self.fmt.write_str(prefix)?;
            value_fmt(self.fmt)
        });
        self
    }

    pub fn finish_paren_arg(&mut self) -> &mut Self {
        if self.section == Section::Args {
            self.section = Section::AfterArgs;
            self.result = self.result.and_then(|_| self.fmt.write_str(")"));
        }
        self
    }

    pub fn body_field<F>(&mut self, value_fmt: F) -> &mut Self
    where
        F: FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
    {
        self.finish_paren_arg();
        let first = self.section != Section::Body;
        self.section = Section::Body;

        let alternate = self.fmt.alternate();
        let separator = match (first, alternate, self.list) {
            (true, true, _) => " {\n",
            (true, false, _) => " { ",
            (false, true, true) => ",\n",
            (false, true, false) => "\n",
            (false, false, true) => ", ",
            (false, false, false) => "; ",
        };

        self.result = self.result.and_then(|_| {
            self.fmt.write_str(separator)?;
            if alternate {
                let mut out = Indented {
                    out: &mut *self.fmt,
                    line_start: true,
                };
                write!(out, "{:#}", Deferred(Cell::new(Some(value_fmt))))
            } else {
                value_fmt(self.fmt)
            }
        });
        self
    }

    pub fn at_least_empty_paren_arg(&mut self) -> &mut Self {
        if self.section == Section::Name {
            self.section = Section::AfterArgs;
            self.result = self.result.and_then(|_| self.fmt.write_str(" ()"));
        }
        self
    }

    pub fn at_least_empty_body(&mut self) -> &mut Self {
        self.finish_paren_arg();
        if self.section != Section::Body {
            self.section = Section::Done;
            self.result = self.result.and_then(|_| self.fmt.write_str(" { }"));
        }
        self
    }

    pub fn finish(&mut self) -> fmt::Result {
        self.finish_paren_arg();
        if self.section == Section::Body {
            let close = if self.fmt.alternate() { "\n}" } else { " }" };
            self.result = self.result.and_then(|_| self.fmt.write_str(close));
        }
        self.section = Section::Done;
        self.result
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            fmt::Display::fmt(term, f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Object(obj) => obj.fmt(f),
            Node::Data(data) => data.fmt(f),
            Node::ResourceData(res) => res.descriptor().fmt(f),
        }
    }
}

impl fmt::Display for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode == OpCode::METHOD_INVOCATION {
            let mut d = match self.name() {
                Some(name) => {
                    let mut d = AmlDisplayer::start(f, "");
                    d.result = name.fmt(d.fmt);
                    d
                }
                None => AmlDisplayer::start(f, "UnknownMethod"),
            };
            for arg in &self.var_args {
                d.paren_arg(|f| arg.fmt(f));
            }
            return d.at_least_empty_paren_arg().finish();
        }

        let Some(info) = self.info() else {
            return write!(f, "Unknown({})", self.opcode);
        };

        let mut d = AmlDisplayer::start(f, info.name);
        for arg in &self.fixed_args {
            d.paren_arg(|f| arg.fmt(f));
        }

        match info.var_args {
            VarArgs::None | VarArgs::Invocation => {}
            VarArgs::TermList => {
                for term in &self.var_args {
                    d.body_field(|f| term.fmt(f));
                }
                d.at_least_empty_body();
            }
            VarArgs::ByteList | VarArgs::PackageElements | VarArgs::FieldList => {
                d.set_list(true);
                for element in &self.var_args {
                    d.body_field(|f| element.fmt(f));
                }
                d.at_least_empty_body();
            }
        }

        d.finish()
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            DataValue::Integer { value, .. } => write!(f, "0x{value:X}"),
            DataValue::String(s) => write!(f, "\"{}\"", s.escape_debug()),
            DataValue::NameString(name) => name.fmt(f),
            DataValue::Raw(bytes) => {
                let mut d = AmlDisplayer::start(f, "RawData");
                d.set_list(true);
                for byte in bytes {
                    d.body_field(|f| write!(f, "0x{byte:02X}"));
                }
                d.at_least_empty_body().finish()
            }
            DataValue::FieldPkgLen(bits) => write!(f, "{bits}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{format, string::ToString};

    use super::*;
    use crate::testing;

    struct Sample;

    impl fmt::Display for Sample {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let mut d = AmlDisplayer::start(f, "Device");
            d.paren_arg(|f| f.write_str("DEV_"));
            d.body_field(|f| f.write_str("Name (ABC_, 0x10)"));
            d.body_field(|f| {
                AmlDisplayer::start(f, "Method")
                    .paren_arg(|f| f.write_str("_STA"))
                    .body_field(|f| f.write_str("Return (0xF)"))
                    .finish()
            });
            d.finish()
        }
    }

    testing::test! {
        fn test_inline() {
            assert_eq!(
                Sample.to_string(),
                "Device (DEV_) { Name (ABC_, 0x10); Method (_STA) { Return (0xF) } }"
            );
        }

        fn test_alternate_indents() {
            assert_eq!(
                format!("{Sample:#}"),
                "Device (DEV_) {\n    Name (ABC_, 0x10)\n    Method (_STA) {\n        Return (0xF)\n    }\n}"
            );
        }
    }
}
