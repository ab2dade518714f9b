use core::time::Duration;

use crate::{ConfigError, DEFAULT_EPOCH, Layout, WallClock};

/// Deployment-wide generator settings.
///
/// Every process sharing an ID space and a lease store must run with the
/// same epoch and layout; the lease timings only need to be consistent
/// enough that `renew_interval < lease_ttl` everywhere.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use leaseflake::{Config, Layout};
///
/// let config = Config::default()
///     .with_layout(Layout::new(41, 8, 14).unwrap())
///     .with_lease_ttl(Duration::from_secs(15));
///
/// assert_eq!(config.renew_interval(), Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    #[cfg_attr(feature = "serde", serde(rename = "epoch_ms", with = "millis"))]
    epoch: Duration,
    layout: Layout,
    #[cfg_attr(feature = "serde", serde(rename = "lease_ttl_ms", with = "millis"))]
    lease_ttl: Duration,
    #[cfg_attr(feature = "serde", serde(rename = "renew_interval_ms", with = "millis"))]
    renew_interval: Duration,
    #[cfg_attr(feature = "serde", serde(rename = "clock_tolerance_ms", with = "millis"))]
    clock_tolerance: Duration,
    startup_attempts: u32,
    #[cfg_attr(feature = "serde", serde(rename = "startup_backoff_ms", with = "millis"))]
    startup_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            epoch: DEFAULT_EPOCH,
            layout: Layout::TWITTER,
            lease_ttl: Self::DEFAULT_LEASE_TTL,
            renew_interval: Self::DEFAULT_LEASE_TTL / 3,
            clock_tolerance: Self::DEFAULT_CLOCK_TOLERANCE,
            startup_attempts: 5,
            startup_backoff: Duration::from_millis(200),
        }
    }
}

impl Config {
    pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);

    /// Regressions up to this size are absorbed rather than refused. Five
    /// milliseconds covers routine NTP slews without letting a stepped-back
    /// clock replay a meaningful range of timestamps.
    pub const DEFAULT_CLOCK_TOLERANCE: Duration = Duration::from_millis(5);

    /// Sets the epoch, as a [`Duration`] since 1970-01-01 UTC.
    #[must_use]
    pub const fn with_epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }

    #[must_use]
    pub const fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the lease ttl and resets the renew interval to a third of it.
    /// Call [`Self::with_renew_interval`] afterwards to override.
    #[must_use]
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self.renew_interval = ttl / 3;
        self
    }

    #[must_use]
    pub const fn with_renew_interval(mut self, interval: Duration) -> Self {
        self.renew_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_clock_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_tolerance = tolerance;
        self
    }

    #[must_use]
    pub const fn with_startup_attempts(mut self, attempts: u32) -> Self {
        self.startup_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_startup_backoff(mut self, backoff: Duration) -> Self {
        self.startup_backoff = backoff;
        self
    }

    pub const fn epoch(&self) -> Duration {
        self.epoch
    }

    pub const fn layout(&self) -> Layout {
        self.layout
    }

    pub const fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    pub const fn renew_interval(&self) -> Duration {
        self.renew_interval
    }

    pub const fn clock_tolerance(&self) -> Duration {
        self.clock_tolerance
    }

    pub const fn startup_attempts(&self) -> u32 {
        self.startup_attempts
    }

    pub const fn startup_backoff(&self) -> Duration {
        self.startup_backoff
    }

    /// A wall clock anchored at this config's epoch.
    pub const fn wall_clock(&self) -> WallClock {
        WallClock::with_epoch(self.epoch)
    }

    /// Checks the settings are internally consistent and the epoch is not in
    /// the future.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Re-check the layout: deserialized layouts skip `Layout::new`.
        Layout::new(
            self.layout.timestamp_bits(),
            self.layout.worker_bits(),
            self.layout.sequence_bits(),
        )?;

        if self.lease_ttl.is_zero() {
            return Err(ConfigError::ZeroLeaseTtl);
        }
        if self.renew_interval.is_zero() || self.renew_interval >= self.lease_ttl {
            return Err(ConfigError::RenewInterval {
                renew_ms: self.renew_interval.as_millis(),
                ttl_ms: self.lease_ttl.as_millis(),
            });
        }
        if self.clock_tolerance >= self.lease_ttl {
            return Err(ConfigError::ClockTolerance {
                tolerance_ms: self.clock_tolerance.as_millis(),
                ttl_ms: self.lease_ttl.as_millis(),
            });
        }
        if self.startup_attempts == 0 {
            return Err(ConfigError::NoStartupAttempts);
        }

        let epoch_ms = u64::try_from(self.epoch.as_millis()).unwrap_or(u64::MAX);
        let unix_ms = WallClock::unix_millis();
        if epoch_ms > unix_ms {
            return Err(ConfigError::EpochInFuture {
                ahead_ms: epoch_ms - unix_ms,
            });
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod millis {
    use core::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.renew_interval(), Duration::from_secs(10));
        assert_eq!(config.clock_tolerance(), Duration::from_millis(5));
    }

    #[test]
    fn renew_must_be_shorter_than_ttl() {
        let config = Config::default()
            .with_lease_ttl(Duration::from_secs(3))
            .with_renew_interval(Duration::from_secs(3));
        assert_eq!(
            config.validate(),
            Err(ConfigError::RenewInterval {
                renew_ms: 3000,
                ttl_ms: 3000
            })
        );

        let config = config.with_renew_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RenewInterval { .. })
        ));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let config = Config::default().with_lease_ttl(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroLeaseTtl));
    }

    #[test]
    fn tolerance_must_be_below_ttl() {
        let config = Config::default().with_clock_tolerance(Duration::from_secs(60));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ClockTolerance { .. })
        ));
    }

    #[test]
    fn needs_a_startup_attempt() {
        let config = Config::default().with_startup_attempts(0);
        assert_eq!(config.validate(), Err(ConfigError::NoStartupAttempts));
    }

    #[test]
    fn epoch_in_future_is_rejected() {
        let future = Duration::from_millis(WallClock::unix_millis() + 60_000);
        let config = Config::default().with_epoch(future);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EpochInFuture { .. })
        ));
    }

    #[test]
    fn oversized_epoch_is_in_the_future_not_wrapped() {
        let config = Config::default().with_epoch(Duration::MAX);
        let upper = u64::MAX - WallClock::unix_millis();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EpochInFuture { ahead_ms }) if ahead_ms <= upper
                && ahead_ms > upper - 60_000
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn oversized_durations_serialize_clamped() {
        let config = Config::default().with_startup_backoff(Duration::MAX);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["startup_backoff_ms"], u64::MAX);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_partial_json_over_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "lease_ttl_ms": 9000, "renew_interval_ms": 3000 }"#)
                .unwrap();
        assert_eq!(config.lease_ttl(), Duration::from_secs(9));
        assert_eq!(config.renew_interval(), Duration::from_secs(3));
        assert_eq!(config.layout(), Layout::TWITTER);
        assert_eq!(config.validate(), Ok(()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialized_layout_is_revalidated() {
        let config: Config = serde_json::from_str(
            r#"{ "layout": { "timestamp_bits": 40, "worker_bits": 10, "sequence_bits": 12 } }"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LayoutWidth { .. })
        ));
    }
}
