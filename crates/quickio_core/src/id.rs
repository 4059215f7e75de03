//! Time-ordered record identifiers.
//!
//! An id packs three fields into 64 bits, high to low:
//!
//! | bits | field                                   |
//! |------|-----------------------------------------|
//! | 41   | milliseconds since [`EPOCH_MS`]         |
//! | 5    | datacenter id                           |
//! | 5    | worker id                               |
//! | 12   | sequence within the millisecond         |
//!
//! The sign bit stays clear for roughly 69 years after the epoch, so ids
//! sort the same as signed or unsigned integers and as big-endian bytes.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// 2022-01-01T00:00:00Z in Unix milliseconds.
pub const EPOCH_MS: u64 = 1_640_995_200_000;

const SEQUENCE_BITS: u32 = 12;
const WORKER_BITS: u32 = 5;
const DATACENTER_BITS: u32 = 5;

const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
const MAX_WORKER: u8 = (1 << WORKER_BITS) - 1;
const MAX_DATACENTER: u8 = (1 << DATACENTER_BITS) - 1;

const WORKER_SHIFT: u32 = SEQUENCE_BITS;
const DATACENTER_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS + DATACENTER_BITS;

/// Smallest value with 18 decimal digits.
const MIN_GENERATED: u64 = 100_000_000_000_000_000;

#[derive(Debug, Default)]
struct State {
    last_ms: u64,
    sequence: u64,
}

/// Generator of strictly increasing ids.
///
/// The sequence state sits behind a mutex, so one generator can be
/// shared by any number of threads.
#[derive(Debug)]
pub struct IdGenerator {
    datacenter_id: u64,
    worker_id: u64,
    clock: fn() -> u64,
    state: Mutex<State>,
}

impl IdGenerator {
    /// Creates a generator for the given datacenter and worker.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidWorkerId`] if either id is 32 or more.
    pub fn new(datacenter_id: u8, worker_id: u8) -> CoreResult<Self> {
        Self::with_clock(datacenter_id, worker_id, system_millis)
    }

    pub(crate) fn with_clock(
        datacenter_id: u8,
        worker_id: u8,
        clock: fn() -> u64,
    ) -> CoreResult<Self> {
        if datacenter_id > MAX_DATACENTER || worker_id > MAX_WORKER {
            return Err(CoreError::InvalidWorkerId {
                datacenter_id,
                worker_id,
            });
        }
        Ok(Self {
            datacenter_id: u64::from(datacenter_id),
            worker_id: u64::from(worker_id),
            clock,
            state: Mutex::new(State::default()),
        })
    }

    /// Returns the process-wide generator (datacenter 0, worker 0).
    pub fn shared() -> Arc<IdGenerator> {
        static SHARED: OnceLock<Arc<IdGenerator>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| {
            Arc::new(IdGenerator {
                datacenter_id: 0,
                worker_id: 0,
                clock: system_millis,
                state: Mutex::new(State::default()),
            })
        }))
    }

    /// Returns the next id.
    ///
    /// Within one millisecond the sequence is incremented; once it is
    /// exhausted the call waits for the next millisecond.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ClockMovedBackwards`] if the clock reads
    /// earlier than the last generated id (or earlier than [`EPOCH_MS`]).
    pub fn next_id(&self) -> CoreResult<u64> {
        let mut state = self.state.lock();
        let mut now = (self.clock)();

        if now < state.last_ms || now < EPOCH_MS {
            return Err(CoreError::ClockMovedBackwards {
                last_ms: state.last_ms.max(EPOCH_MS),
                now_ms: now,
            });
        }

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                now = self.wait_next_millis(state.last_ms);
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        Ok(((now - EPOCH_MS) << TIMESTAMP_SHIFT)
            | (self.datacenter_id << DATACENTER_SHIFT)
            | (self.worker_id << WORKER_SHIFT)
            | state.sequence)
    }

    fn wait_next_millis(&self, last_ms: u64) -> u64 {
        loop {
            let now = (self.clock)();
            if now > last_ms {
                return now;
            }
            std::hint::spin_loop();
        }
    }
}

/// Returns the Unix millisecond timestamp embedded in `id`.
#[must_use]
pub const fn timestamp_of(id: u64) -> u64 {
    (id >> TIMESTAMP_SHIFT) + EPOCH_MS
}

/// Returns true if `id` looks system-generated (at least 18 digits).
///
/// Anything shorter, zero included, is treated as unassigned.
#[must_use]
pub const fn is_generated(id: u64) -> bool {
    id >= MIN_GENERATED
}

#[allow(clippy::cast_possible_truncation)]
fn system_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
