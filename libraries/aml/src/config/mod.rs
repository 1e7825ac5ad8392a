//! Parser options.
//!
//! [`ParserConfig`] is normally built in code. As a convenience it can also be
//! read from a string of `ident=value` pairs, for embedders that keep their
//! options as text:
//!
//! ```
//! use emerald_aml::ParserConfig;
//!
//! let config = ParserConfig::from_str_config("max_depth=64 resource_data=false").unwrap();
//! assert_eq!(config.max_depth, 64);
//! assert!(!config.resource_data);
//! assert!(config.check_resource_checksum);
//! ```

use parser::ConfigParse;
use tokenizer::Tokenizer;

mod macros;
pub(crate) mod parser;
pub(crate) mod tokenizer;

pub use parser::{ConfigError, ConfigErrorKind};

macros::config_struct! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ParserConfig {
        /// Maximum nesting of terms, deeper input fails with `NestingTooDeep`
        #[default = 128]
        pub max_depth: u32,
        /// Decode `Buffer` bodies holding a resource template into resource data nodes
        #[default = true]
        pub resource_data: bool,
        /// Names that are never declared are parsed as plain name references
        /// instead of failing with `UnresolvedReference`
        #[default = false]
        pub unresolved_as_name: bool,
        /// Only treat a buffer as a resource template if its end tag checksum is valid
        #[default = true]
        pub check_resource_checksum: bool,
    }
}

impl ParserConfig {
    /// Start from the defaults and override the options named in `inp`
    pub fn from_str_config(inp: &str) -> Result<Self, ConfigError<'_>> {
        let mut tokenizer = Tokenizer::new(inp);
        Self::parse_config(&mut tokenizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    testing::test! {
        fn test_defaults() {
            assert_eq!(ParserConfig::from_str_config("").unwrap(), ParserConfig::default());
            let config = ParserConfig::default();
            assert_eq!(config.max_depth, 128);
            assert!(config.resource_data);
            assert!(!config.unresolved_as_name);
            assert!(config.check_resource_checksum);
        }

        fn test_parse_config() {
            let config =
                ParserConfig::from_str_config("unresolved_as_name=true, max_depth=16").unwrap();
            assert_eq!(config.max_depth, 16);
            assert!(config.unresolved_as_name);
            assert!(config.resource_data);
        }

        fn test_parse_config_errors() {
            let err = ParserConfig::from_str_config("max_depth=true").unwrap_err();
            assert!(matches!(err.kind(), ConfigErrorKind::ParseIntError(_)));
            assert_eq!(err.loc(), 10);

            let err = ParserConfig::from_str_config("resource_data=yes").unwrap_err();
            assert_eq!(
                err.kind(),
                &ConfigErrorKind::Unexpected {
                    need: "true/false",
                    got: Some("yes")
                }
            );

            let err = ParserConfig::from_str_config("max_depth=1 colors=true").unwrap_err();
            assert_eq!(err.kind(), &ConfigErrorKind::UnexpectedId("colors"));
            assert_eq!(err.loc(), 12);

            let err = ParserConfig::from_str_config("max_depth=").unwrap_err();
            assert!(matches!(
                err.kind(),
                ConfigErrorKind::Unexpected { got: None, .. }
            ));
        }
    }
}
