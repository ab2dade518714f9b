use crate::SnowflakeId;

/// Represents the result of attempting to generate a new ID.
///
/// This type models the outcome of [`LeasedGenerator::try_poll_id`]:
///
/// - [`IdGenStatus::Ready`] indicates a new ID was successfully generated.
/// - [`IdGenStatus::Pending`] means the sequence for the current millisecond
///   is used up and no ID can be produced until the clock advances by
///   `yield_for` milliseconds.
///
/// This allows non-blocking generation loops and clean backoff strategies.
///
/// [`LeasedGenerator::try_poll_id`]: crate::LeasedGenerator::try_poll_id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique ID was generated and is ready to use.
    Ready {
        /// The generated ID.
        id: SnowflakeId,
    },
    /// The generator is throttled for the current tick.
    Pending {
        /// Milliseconds to wait before trying again.
        yield_for: u64,
    },
}
