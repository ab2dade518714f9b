use core::cmp::Ordering;

/// Outcome of stepping a [`SequenceState`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Sequenced {
    /// The next sequence number for the recorded timestamp.
    Ready {
        timestamp: u64,
        sequence: u64,
    },
    /// The sequence space for the recorded timestamp is used up; retry once
    /// the clock has advanced by `yield_for` milliseconds.
    Overflow { yield_for: u64 },
    /// The supplied timestamp is older than the recorded one.
    Behind { last: u64 },
}

/// Per-process `{last timestamp, sequence}` pair.
///
/// Owned by exactly one generator and only touched under its lock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SequenceState {
    last_timestamp: u64,
    sequence: u64,
    max_sequence: u64,
    // `false` until the first timestamp is recorded so that t = 0 still
    // starts at sequence 0.
    started: bool,
}

impl SequenceState {
    pub const fn new(max_sequence: u64) -> Self {
        Self {
            last_timestamp: 0,
            sequence: 0,
            max_sequence,
            started: false,
        }
    }

    /// A state in which every timestamp below `floor` is already used up.
    ///
    /// Issuance resumes once a timestamp of at least `floor` is supplied.
    pub const fn resume_below(max_sequence: u64, floor: u64) -> Self {
        if floor == 0 {
            return Self::new(max_sequence);
        }
        Self {
            last_timestamp: floor - 1,
            sequence: max_sequence,
            max_sequence,
            started: true,
        }
    }

    pub const fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the next sequence number for `timestamp`.
    ///
    /// - A newer timestamp resets the sequence to zero.
    /// - The same timestamp increments it, or reports
    ///   [`Sequenced::Overflow`] once the maximum has been handed out.
    /// - An older timestamp reports [`Sequenced::Behind`].
    ///
    /// Neither `Overflow` nor `Behind` modify the state.
    pub fn next(&mut self, timestamp: u64) -> Sequenced {
        if !self.started {
            self.started = true;
            return self.rollover(timestamp);
        }
        match timestamp.cmp(&self.last_timestamp) {
            Ordering::Greater => self.rollover(timestamp),
            Ordering::Equal => self.continue_at_last(),
            Ordering::Less => Sequenced::Behind {
                last: self.last_timestamp,
            },
        }
    }

    /// Issues the next sequence number for the recorded timestamp, regardless
    /// of the current clock reading.
    ///
    /// Used to ride out small clock regressions without ever reusing a
    /// `(timestamp, sequence)` pair.
    pub fn continue_at_last(&mut self) -> Sequenced {
        if !self.started {
            self.started = true;
            return self.rollover(self.last_timestamp);
        }
        if self.sequence < self.max_sequence {
            self.sequence += 1;
            Sequenced::Ready {
                timestamp: self.last_timestamp,
                sequence: self.sequence,
            }
        } else {
            Sequenced::Overflow { yield_for: 1 }
        }
    }

    fn rollover(&mut self, timestamp: u64) -> Sequenced {
        self.last_timestamp = timestamp;
        self.sequence = 0;
        Sequenced::Ready {
            timestamp,
            sequence: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_starts_at_zero_even_at_time_zero() {
        let mut state = SequenceState::new(3);
        assert_eq!(
            state.next(0),
            Sequenced::Ready {
                timestamp: 0,
                sequence: 0
            }
        );
        assert_eq!(
            state.next(0),
            Sequenced::Ready {
                timestamp: 0,
                sequence: 1
            }
        );
    }

    #[test]
    fn same_millisecond_increments_then_overflows() {
        let mut state = SequenceState::new(3);
        for expected in 0..=3 {
            assert_eq!(
                state.next(42),
                Sequenced::Ready {
                    timestamp: 42,
                    sequence: expected
                }
            );
        }
        assert_eq!(state.next(42), Sequenced::Overflow { yield_for: 1 });
        assert_eq!(state.sequence(), 3);
        assert_eq!(state.last_timestamp(), 42);
    }

    #[test]
    fn newer_millisecond_resets() {
        let mut state = SequenceState::new(3);
        state.next(42);
        state.next(42);
        assert_eq!(
            state.next(43),
            Sequenced::Ready {
                timestamp: 43,
                sequence: 0
            }
        );
    }

    #[test]
    fn older_millisecond_is_reported_without_reset() {
        let mut state = SequenceState::new(3);
        state.next(42);
        state.next(42);
        assert_eq!(state.next(41), Sequenced::Behind { last: 42 });
        assert_eq!(state.sequence(), 1);
        assert_eq!(state.last_timestamp(), 42);
    }

    #[test]
    fn continue_at_last_keeps_timestamp() {
        let mut state = SequenceState::new(2);
        state.next(42);
        assert_eq!(
            state.continue_at_last(),
            Sequenced::Ready {
                timestamp: 42,
                sequence: 1
            }
        );
        assert_eq!(
            state.continue_at_last(),
            Sequenced::Ready {
                timestamp: 42,
                sequence: 2
            }
        );
        assert_eq!(state.continue_at_last(), Sequenced::Overflow { yield_for: 1 });
    }

    #[test]
    fn resumed_state_waits_for_floor() {
        let mut state = SequenceState::resume_below(3, 100);
        assert_eq!(state.next(99), Sequenced::Overflow { yield_for: 1 });
        assert_eq!(state.continue_at_last(), Sequenced::Overflow { yield_for: 1 });
        assert_eq!(state.next(98), Sequenced::Behind { last: 99 });
        assert_eq!(
            state.next(100),
            Sequenced::Ready {
                timestamp: 100,
                sequence: 0
            }
        );
        assert_eq!(SequenceState::resume_below(3, 0), SequenceState::new(3));
    }
}
