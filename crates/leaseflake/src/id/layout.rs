use crate::{ConfigError, SnowflakeId};

/// The bit layout of a [`SnowflakeId`].
///
/// Widths are counted from the most significant usable bit (bit 62) down:
///
/// ```text
///  | reserved (1) | timestamp (T) | worker (W) | sequence (S) |   T + W + S = 63
/// ```
///
/// Every process sharing an ID space and a lease store must use the same
/// layout.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
    timestamp_bits: u8,
    worker_bits: u8,
    sequence_bits: u8,
}

/// The fields of a decomposed [`SnowflakeId`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parts {
    pub timestamp: u64,
    pub worker_id: u64,
    pub sequence: u64,
}

impl Default for Layout {
    fn default() -> Self {
        Self::TWITTER
    }
}

impl Layout {
    /// 41 bits of timestamp (~69 years), 10 bits of worker id, 12 bits of
    /// sequence.
    pub const TWITTER: Self = Self {
        timestamp_bits: 41,
        worker_bits: 10,
        sequence_bits: 12,
    };

    /// Builds a layout, checking the widths fill exactly 63 bits.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::LayoutWidth`] if the widths do not sum to 63.
    /// - [`ConfigError::NoSequenceBits`] if `sequence_bits` is zero.
    pub const fn new(
        timestamp_bits: u8,
        worker_bits: u8,
        sequence_bits: u8,
    ) -> Result<Self, ConfigError> {
        let total = timestamp_bits as u16 + worker_bits as u16 + sequence_bits as u16;
        if total != 63 {
            return Err(ConfigError::LayoutWidth {
                timestamp: timestamp_bits,
                worker: worker_bits,
                sequence: sequence_bits,
            });
        }
        if sequence_bits == 0 {
            return Err(ConfigError::NoSequenceBits);
        }
        Ok(Self {
            timestamp_bits,
            worker_bits,
            sequence_bits,
        })
    }

    pub const fn timestamp_bits(&self) -> u8 {
        self.timestamp_bits
    }

    pub const fn worker_bits(&self) -> u8 {
        self.worker_bits
    }

    pub const fn sequence_bits(&self) -> u8 {
        self.sequence_bits
    }

    const fn mask(bits: u8) -> u64 {
        if bits == 0 { 0 } else { u64::MAX >> (64 - bits as u32) }
    }

    const fn worker_shift(&self) -> u32 {
        self.sequence_bits as u32
    }

    const fn timestamp_shift(&self) -> u32 {
        self.sequence_bits as u32 + self.worker_bits as u32
    }

    /// Largest timestamp the layout can hold, in milliseconds since the epoch.
    pub const fn max_timestamp(&self) -> u64 {
        Self::mask(self.timestamp_bits)
    }

    /// Largest worker id the layout can hold.
    pub const fn max_worker_id(&self) -> u64 {
        Self::mask(self.worker_bits)
    }

    /// Largest per-millisecond sequence value.
    pub const fn max_sequence(&self) -> u64 {
        Self::mask(self.sequence_bits)
    }

    /// Number of distinct worker ids, i.e. `2^W`.
    pub const fn worker_capacity(&self) -> u64 {
        self.max_worker_id() + 1
    }

    /// Packs the three fields into an ID.
    ///
    /// Fields wider than their slot are truncated to it; callers are expected
    /// to have range-checked them (the generator does).
    pub const fn compose(&self, timestamp: u64, worker_id: u64, sequence: u64) -> SnowflakeId {
        debug_assert!(timestamp <= self.max_timestamp(), "timestamp overflow");
        debug_assert!(worker_id <= self.max_worker_id(), "worker_id overflow");
        debug_assert!(sequence <= self.max_sequence(), "sequence overflow");
        let timestamp = (timestamp & self.max_timestamp()) << self.timestamp_shift();
        let worker_id = (worker_id & self.max_worker_id()) << self.worker_shift();
        let sequence = sequence & self.max_sequence();
        SnowflakeId::from_raw(timestamp | worker_id | sequence)
    }

    /// Splits an ID back into its fields.
    pub const fn decompose(&self, id: SnowflakeId) -> Parts {
        let raw = id.to_raw();
        Parts {
            timestamp: (raw >> self.timestamp_shift()) & self.max_timestamp(),
            worker_id: (raw >> self.worker_shift()) & self.max_worker_id(),
            sequence: raw & self.max_sequence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twitter_layout_matches_reference_example() {
        let layout = Layout::TWITTER;
        let first = layout.compose(100, 7, 0);
        let second = layout.compose(100, 7, 1);

        assert_eq!(first.to_raw(), (100 << 22) | (7 << 12));
        assert_eq!(second.to_raw(), first.to_raw() + 1);
        assert_eq!(layout.worker_capacity(), 1024);
        assert_eq!(layout.max_sequence(), 4095);
        assert_eq!(layout.max_timestamp(), (1 << 41) - 1);
    }

    #[test]
    fn decompose_inverts_compose() {
        let layout = Layout::new(39, 8, 16).unwrap();
        let id = layout.compose(123_456_789, 200, 65_000);
        assert_eq!(
            layout.decompose(id),
            Parts {
                timestamp: 123_456_789,
                worker_id: 200,
                sequence: 65_000,
            }
        );
    }

    #[test]
    fn max_fields_never_touch_reserved_bit() {
        let layout = Layout::TWITTER;
        let id = layout.compose(
            layout.max_timestamp(),
            layout.max_worker_id(),
            layout.max_sequence(),
        );
        assert!(id.is_valid());
        assert_eq!(id.to_raw(), i64::MAX as u64);
    }

    #[test]
    fn zero_worker_bits_is_a_single_slot() {
        let layout = Layout::new(47, 0, 16).unwrap();
        assert_eq!(layout.worker_capacity(), 1);
        assert_eq!(layout.decompose(layout.compose(5, 0, 3)).worker_id, 0);
    }

    #[test]
    fn rejects_bad_widths() {
        assert_eq!(
            Layout::new(41, 10, 13),
            Err(ConfigError::LayoutWidth {
                timestamp: 41,
                worker: 10,
                sequence: 13,
            })
        );
        assert_eq!(Layout::new(53, 10, 0), Err(ConfigError::NoSequenceBits));
    }
}
