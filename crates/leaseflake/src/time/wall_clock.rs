use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::TimeSource;

/// Default epoch: Wednesday, January 1, 2020 00:00:00 UTC
pub const DEFAULT_EPOCH: Duration = Duration::from_millis(1_577_836_800_000);

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
pub const TWITTER_EPOCH: Duration = Duration::from_millis(1_288_834_974_657);

/// The system wall clock, offset to a custom epoch.
///
/// Each read is a `SystemTime::now()` call, so NTP steps and manual
/// adjustments show through; wrap it in a [`Clock`] to detect them. Readings
/// earlier than the epoch saturate to zero.
///
/// [`Clock`]: crate::Clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallClock {
    epoch_ms: u64,
}

impl Default for WallClock {
    /// Constructs a wall clock aligned to [`DEFAULT_EPOCH`].
    fn default() -> Self {
        Self::with_epoch(DEFAULT_EPOCH)
    }
}

impl WallClock {
    /// Constructs a wall clock whose zero is `epoch`, given as a [`Duration`]
    /// since 1970-01-01 UTC.
    pub const fn with_epoch(epoch: Duration) -> Self {
        let millis = epoch.as_millis();
        let epoch_ms = if millis > u64::MAX as u128 {
            u64::MAX
        } else {
            millis as u64
        };
        Self { epoch_ms }
    }

    /// The epoch, in milliseconds since the Unix epoch.
    pub const fn epoch_millis(&self) -> u64 {
        self.epoch_ms
    }

    /// Milliseconds since the Unix epoch, or zero if the system clock reads
    /// earlier than that.
    pub fn unix_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl TimeSource for WallClock {
    fn current_millis(&self) -> u64 {
        Self::unix_millis().saturating_sub(self.epoch_ms)
    }
}
