use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::SnowflakeId;

/// Serializes as the native integer; deserializing rejects values that set
/// the reserved bit.
impl Serialize for SnowflakeId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        as_native::serialize(self, s)
    }
}

impl<'de> Deserialize<'de> for SnowflakeId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        as_native::deserialize(d)
    }
}

pub mod as_native {
    use super::{Deserialize, Deserializer, Serialize, Serializer, de};
    use crate::SnowflakeId;

    /// Serialize an ID as its native integer representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S: Serializer>(id: &SnowflakeId, s: S) -> Result<S::Ok, S::Error> {
        id.to_raw().serialize(s)
    }

    /// Deserialize an ID from its native integer representation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The underlying deserializer fails
    /// - The value sets the reserved bit
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SnowflakeId, D::Error> {
        let raw = u64::deserialize(d)?;
        SnowflakeId::try_from(raw).map_err(de::Error::custom)
    }
}

/// Use with `#[serde(with = "leaseflake::as_decimal_string")]` to carry an ID
/// as a decimal string, for consumers (JavaScript, JSON tooling) that lose
/// precision above 2^53.
pub mod as_decimal_string {
    use super::{Deserializer, Serializer, de};
    use crate::SnowflakeId;
    use core::fmt;

    /// Serialize an ID as a decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S: Serializer>(id: &SnowflakeId, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(id)
    }

    /// Deserialize an ID from a decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The underlying deserializer fails
    /// - The string is not a valid decimal `u64`
    /// - The value sets the reserved bit
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SnowflakeId, D::Error> {
        d.deserialize_str(DecimalVisitor)
    }

    struct DecimalVisitor;

    impl de::Visitor<'_> for DecimalVisitor {
        type Value = SnowflakeId;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal string holding a 63-bit identifier")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse().map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParseIdError;

    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Member {
        #[serde(with = "as_decimal_string")]
        id: SnowflakeId,
        email: String,
    }

    #[test]
    fn native_by_default() {
        let id = SnowflakeId::from_raw((1 << 53) | 1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "9007199254740993");
        assert_eq!(serde_json::from_str::<SnowflakeId>(&json).unwrap(), id);
    }

    #[test]
    fn native_rejects_reserved_bit() {
        let err = serde_json::from_str::<SnowflakeId>(&u64::MAX.to_string()).unwrap_err();
        assert!(err.to_string().contains(&ParseIdError::ReservedBitSet.to_string()));
    }

    #[test]
    fn decimal_string_field() {
        let member = Member {
            id: SnowflakeId::from_raw(9_007_199_254_740_993),
            email: "a@b.c".into(),
        };
        let json = serde_json::to_string(&member).unwrap();
        assert_eq!(json, r#"{"id":"9007199254740993","email":"a@b.c"}"#);
        assert_eq!(serde_json::from_str::<Member>(&json).unwrap(), member);
    }

    #[test]
    fn decimal_string_rejects_numbers_and_garbage() {
        assert!(serde_json::from_str::<Member>(r#"{"id":5,"email":""}"#).is_err());
        assert!(serde_json::from_str::<Member>(r#"{"id":"5x","email":""}"#).is_err());
    }
}
