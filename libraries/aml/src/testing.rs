//! The test macro shared by the unit tests of this crate and its integration tests.

/// Declare one or more tests.
///
/// Works both as a block:
///
/// ```ignore
/// testing::test! {
///     fn test_a() { }
///
///     #[should_panic]
///     fn test_b() { panic!() }
/// }
/// ```
///
/// and as an attribute with `#[macro_rules_attribute::apply(testing::test)]`.
#[doc(hidden)]
#[macro_export]
macro_rules! test {
    (@meta should_panic fn $name:ident() $body:block) => {
        #[cfg(test)]
        #[::core::prelude::v1::test]
        #[should_panic]
        fn $name() $body
    };
    (@meta ignore fn $name:ident() $body:block) => {
        #[cfg(test)]
        #[::core::prelude::v1::test]
        #[ignore]
        fn $name() $body
    };
    (@meta fn $name:ident() $body:block) => {
        #[cfg(test)]
        #[::core::prelude::v1::test]
        fn $name() $body
    };
    ($($(#[$attr:tt])? fn $name:ident() $body:block)*) => {
        $($crate::testing::test!(@meta $($attr)? fn $name() $body);)*
    };
    ($($other:tt)*) => {
        compile_error!("Invalid test syntax");
    };
}

pub use test;
