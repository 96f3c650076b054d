//! Module: sky-primitives
//! Responsibility: small scalar newtypes shared by every other Sky crate.
//! Does not own: schema validation, storage encoding, or query semantics.

mod id;
mod timestamp;

pub use id::PropertyId;
pub use timestamp::Timestamp;

/// Declares a `Copy` newtype wrapping an integer, with the comparison and
/// display impls every id type in this crate needs.
#[macro_export]
macro_rules! int_newtype {
    ($name:ident, $inner:ty) => {
        #[derive(
            Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            #[must_use]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}
