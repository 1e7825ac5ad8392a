use core::{fmt, num::ParseIntError};

use super::tokenizer::Tokenizer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind<'a> {
    Unexpected { need: &'a str, got: Option<&'a str> },
    ParseIntError(ParseIntError),
    UnexpectedId(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError<'a> {
    kind: ConfigErrorKind<'a>,
    loc: usize,
}

impl<'a> ConfigError<'a> {
    pub fn new(kind: ConfigErrorKind<'a>, loc: usize) -> Self {
        Self { kind, loc }
    }

    pub fn kind(&self) -> &ConfigErrorKind<'a> {
        &self.kind
    }

    /// Index into the config string
    pub fn loc(&self) -> usize {
        self.loc
    }
}

impl fmt::Display for ConfigError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConfigErrorKind::Unexpected { need, got: Some(got) } => {
                write!(f, "expected {need}, got {got:?}")?
            }
            ConfigErrorKind::Unexpected { need, got: None } => write!(f, "expected {need}")?,
            ConfigErrorKind::ParseIntError(e) => write!(f, "{e}")?,
            ConfigErrorKind::UnexpectedId(id) => write!(f, "unknown option {id:?}")?,
        }
        write!(f, " at {}", self.loc)
    }
}

pub type Result<'a, T> = core::result::Result<T, ConfigError<'a>>;

pub trait ConfigParse<'a>
where
    Self: Sized,
{
    fn parse_config(tokenizer: &mut Tokenizer<'a>) -> Result<'a, Self>;
}

impl<'a> ConfigParse<'a> for bool {
    fn parse_config(tokenizer: &mut Tokenizer<'a>) -> Result<'a, Self> {
        let (loc, value) = tokenizer.next_value().ok_or_else(|| {
            ConfigError::new(
                ConfigErrorKind::Unexpected {
                    need: "true/false",
                    got: None,
                },
                tokenizer.current_index(),
            )
        })?;

        match value {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::new(
                ConfigErrorKind::Unexpected {
                    need: "true/false",
                    got: Some(value),
                },
                loc,
            )),
        }
    }
}

impl<'a> ConfigParse<'a> for u32 {
    fn parse_config(tokenizer: &mut Tokenizer<'a>) -> Result<'a, Self> {
        let (loc, value) = tokenizer.next_value().ok_or_else(|| {
            ConfigError::new(
                ConfigErrorKind::Unexpected {
                    need: "<number>",
                    got: None,
                },
                tokenizer.current_index(),
            )
        })?;

        value
            .parse()
            .map_err(|e| ConfigError::new(ConfigErrorKind::ParseIntError(e), loc))
    }
}
