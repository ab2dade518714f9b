//! Domain-specific ID newtypes.

/// Declares a newtype over [`SnowflakeId`] for one kind of entity, so that
/// IDs of different entities cannot be mixed up.
///
/// The generated type parses from and prints as decimal, converts to and
/// from [`SnowflakeId`], and draws new values from a [`LeasedGenerator`].
/// With the `serde` feature it (de)serializes as a decimal string, matching
/// how text-based APIs and string-typed `BIGINT UNSIGNED` columns carry IDs.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use core::time::Duration;
/// use leaseflake::{Layout, LeasedGenerator, WallClock, WorkerIdentity, snowflake_newtype};
///
/// snowflake_newtype! {
///     /// Primary key of a member row.
///     pub struct MemberId;
/// }
///
/// let generator = LeasedGenerator::new(
///     Layout::TWITTER,
///     Arc::new(WorkerIdentity::new(1)),
///     WallClock::default(),
///     Duration::from_millis(5),
/// )
/// .unwrap();
///
/// let id = MemberId::next(&generator).unwrap();
/// assert_eq!(id.to_string().parse::<MemberId>().unwrap(), id);
/// assert_eq!(MemberId::from_raw(42).to_string(), "42");
/// ```
///
/// [`SnowflakeId`]: crate::SnowflakeId
/// [`LeasedGenerator`]: crate::LeasedGenerator
#[macro_export]
macro_rules! snowflake_newtype {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        $vis struct $name($crate::SnowflakeId);

        #[allow(dead_code)]
        impl $name {
            pub const fn from_raw(raw: u64) -> Self {
                Self($crate::SnowflakeId::from_raw(raw))
            }

            pub const fn to_raw(&self) -> u64 {
                self.0.to_raw()
            }

            pub const fn as_snowflake(&self) -> $crate::SnowflakeId {
                self.0
            }

            /// Draws a fresh ID from `generator`.
            pub fn next<T: $crate::TimeSource>(
                generator: &$crate::LeasedGenerator<T>,
            ) -> $crate::Result<Self> {
                generator.next_id().map(Self)
            }
        }

        impl ::core::convert::From<$crate::SnowflakeId> for $name {
            fn from(id: $crate::SnowflakeId) -> Self {
                Self(id)
            }
        }

        impl ::core::convert::From<$name> for $crate::SnowflakeId {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::ParseIdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.parse::<$crate::SnowflakeId>().map(Self)
            }
        }

        $crate::cfg_serde! {
            impl $crate::__private::serde::Serialize for $name {
                fn serialize<S>(&self, s: S) -> ::core::result::Result<S::Ok, S::Error>
                where
                    S: $crate::__private::serde::Serializer,
                {
                    $crate::as_decimal_string::serialize(&self.0, s)
                }
            }

            impl<'de> $crate::__private::serde::Deserialize<'de> for $name {
                fn deserialize<D>(d: D) -> ::core::result::Result<Self, D::Error>
                where
                    D: $crate::__private::serde::Deserializer<'de>,
                {
                    $crate::as_decimal_string::deserialize(d).map(Self)
                }
            }
        }
    };
}

/// Expands its items only when the `serde` feature is enabled.
#[doc(hidden)]
#[cfg(feature = "serde")]
#[macro_export]
macro_rules! cfg_serde {
    ($($item:item)*) => { $($item)* };
}

#[doc(hidden)]
#[cfg(not(feature = "serde"))]
#[macro_export]
macro_rules! cfg_serde {
    ($($item:item)*) => {};
}
