use core::{fmt, str::FromStr};

/// A 64-bit Snowflake identifier.
///
/// The raw value is an unsigned integer whose most significant bit is always
/// zero. The remaining 63 bits are split into timestamp, worker id and
/// sequence according to a [`Layout`]; the ID itself does not carry its
/// layout, so decompose it with the same [`Layout`] that produced it.
///
/// IDs produced by one worker sort by creation time, which makes them usable
/// as clustering keys. When rendered as text they use plain decimal so that
/// consumers without native 64-bit integers do not lose precision.
///
/// # Example
///
/// ```
/// use leaseflake::{Layout, SnowflakeId};
///
/// let id = Layout::TWITTER.compose(100, 7, 0);
/// assert_eq!(id.to_raw(), (100 << 22) | (7 << 12));
/// assert_eq!(id.to_string().parse::<SnowflakeId>().unwrap(), id);
/// ```
///
/// [`Layout`]: crate::Layout
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct SnowflakeId {
    id: u64,
}

impl SnowflakeId {
    /// Mask of the reserved sign bit.
    pub const RESERVED_MASK: u64 = 1 << 63;

    /// Wraps a raw value without validation.
    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns the raw integer.
    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Returns `true` if the reserved bit is clear.
    pub const fn is_valid(&self) -> bool {
        self.id & Self::RESERVED_MASK == 0
    }

    /// Returns the ID as a zero-padded 20-digit string.
    ///
    /// Padded strings sort lexicographically in the same order as the IDs.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl From<SnowflakeId> for u64 {
    fn from(id: SnowflakeId) -> Self {
        id.id
    }
}

impl TryFrom<u64> for SnowflakeId {
    type Error = ParseIdError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        let id = Self::from_raw(raw);
        if !id.is_valid() {
            return Err(ParseIdError::ReservedBitSet);
        }
        Ok(id)
    }
}

impl FromStr for SnowflakeId {
    type Err = ParseIdError;

    /// Parses a decimal string. Leading zeros (as produced by
    /// [`SnowflakeId::to_padded_string`]) are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseIdError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseIdError::InvalidDigit);
        }
        let raw = s.parse::<u64>().map_err(|_| ParseIdError::OutOfRange)?;
        Self::try_from(raw)
    }
}

/// Errors from parsing a [`SnowflakeId`] out of its textual or raw form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ParseIdError {
    #[error("empty identifier")]
    Empty,

    #[error("identifier must contain only decimal digits")]
    InvalidDigit,

    #[error("identifier does not fit in 64 bits")]
    OutOfRange,

    /// The value sets bit 63, which no generator ever produces.
    #[error("identifier sets the reserved bit")]
    ReservedBitSet,
}
