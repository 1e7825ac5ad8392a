/// Build a config struct together with its `Default` and `ConfigParse`
/// implementations.
///
/// Every field needs a type implementing `Default` and `ConfigParse`, the
/// `#[default = ...]` attribute overrides the value used when the field is
/// missing from the input.
macro_rules! config_struct {
    (
        $(#[$struct_attr: meta])*
        $vis:vis struct $struct_name: ident {
            $(
                $(#[$($field_attrs: tt)*])*
                $f_vis:vis $field_name: ident: $field_type: ty
            ),* $(,)?
        }
    ) => {
        $crate::config::macros::config_struct!(@build_struct $vis [$struct_name] {
            $(
                $(#[$($field_attrs)*])*
                $f_vis $field_name: $field_type,
            )*
        } => [$(#[$struct_attr])*] => []);

        $crate::config::macros::config_struct!(@build_parser [$struct_name] {
            $(
                $(#[$($field_attrs)*])*
                $field_name: $field_type,
            )*
        });
    };

    // all fields processed, `$attribs` are the struct attributes
    (
        @build_struct $vis:vis [$name_ident: ident] { } => [$($attribs: tt)*] => [$($built: tt)*]
    ) => {
        $($attribs)*
        $vis struct $name_ident {
            $($built)*
        }
    };
    // `default` is only used by the parser
    (
        @build_struct $vis:vis [$name_ident: ident] {
            #[default = $default: expr]
            $($rest:tt)*
        } => [$($attribs: tt)*] => [$($built: tt)*]
    ) => {
        $crate::config::macros::config_struct!(@build_struct $vis [$name_ident] {
            $($rest)*
        } => [$($attribs)*] => [$($built)*]);
    };
    // other field attributes (docs) are kept on the field
    (
        @build_struct $vis:vis [$name_ident: ident] {
            #[$($field_attrs: tt)*]
            $($rest:tt)*
        } => [$($attribs: tt)*] => [$($built: tt)*]
    ) => {
        $crate::config::macros::config_struct!(@build_struct $vis [$name_ident] {
            $($rest)*
        } => [$($attribs)*] => [
            $($built)*
            #[$($field_attrs)*]
        ]);
    };
    (
        @build_struct $vis:vis [$name_ident: ident] {
            $f_vis:vis $field_name: ident: $field_type: ty,
            $($rest:tt)*
        } => [$($attribs: tt)*]  => [$($built: tt)*]
    ) => {
        $crate::config::macros::config_struct!(@build_struct $vis [$name_ident] {
            $($rest)*
        } => [$($attribs)*] => [
            $($built)*
            $f_vis $field_name: $field_type,
        ]);
    };

    // every field starts from its default, then each `ident=value` pair found
    // replaces the matching field
    (
        @build_parser [$name_ident: ident] {
            $(
                $(#[$($field_attrs: tt)*])*
                $field_name: ident: $field_type: ty,
            )*
        }
    ) => {
        impl Default for $name_ident {
            #[allow(unused_assignments, unused_mut)]
            fn default() -> Self {
                $(
                    let mut $field_name: $field_type = Default::default();
                )*
                $(
                    $(
                        $crate::config::macros::config_struct!(
                            @build_parser_attr
                            #[$($field_attrs)*]
                            $field_name: $field_type
                        );
                    )*
                )*

                Self {
                    $(
                        $field_name,
                    )*
                }
            }
        }

        impl<'a> $crate::config::parser::ConfigParse<'a> for $name_ident {
            fn parse_config(
                tokenizer: &mut $crate::config::tokenizer::Tokenizer<'a>,
            ) -> $crate::config::parser::Result<'a, Self> {
                let mut config = Self::default();

                while let Some((i, ident)) = tokenizer.next_ident() {
                    match ident {
                        $(
                            stringify!($field_name) => {
                                config.$field_name =
                                    $crate::config::parser::ConfigParse::parse_config(tokenizer)?;
                            }
                        )*
                        unknown => {
                            return Err($crate::config::parser::ConfigError::new(
                                $crate::config::parser::ConfigErrorKind::UnexpectedId(unknown),
                                i,
                            ))
                        }
                    }
                }

                Ok(config)
            }
        }
    };

    (
        @build_parser_attr
        #[default = $expr: expr]
        $field_name: ident: $field_type: ty
    ) => {
        $field_name = $expr;
    };
    (
        @build_parser_attr
        #[$($field_attrs: tt)*]
        $field_name: ident: $field_type: ty
    ) => {
        // handled by `build_struct`
    };
}

pub(crate) use config_struct;
