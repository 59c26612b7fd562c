//! Monotonic, time-ordered file identifiers.
//!
//! Layout of a [`FileId`]:
//!
//! | bytes  | content                                   |
//! |--------|-------------------------------------------|
//! | 0..6   | unix milliseconds, 48-bit big-endian      |
//! | 6..8   | sequence within that millisecond, BE      |
//! | 8..16  | random                                    |
//!
//! Order comes from `(millis, sequence)`, which the generator keeps strictly
//! increasing under its mutex. The wall clock is only a hint: if it stalls
//! or runs backwards the generator keeps counting on top of the last
//! millisecond it issued, and borrows the next millisecond when the
//! sequence space is used up.

use std::sync::{Mutex, OnceLock, PoisonError};

use crate::constants::{ID_LEN, MAX_TIMESTAMP_MILLIS, SEQUENCE_BYTES, TAIL_OFFSET, TIMESTAMP_BYTES};
use crate::time;
use crate::types::FileId;

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        time::unix_millis()
    }
}

#[derive(Debug, Default)]
struct GenState {
    last_millis: u64,
    sequence: u16,
}

pub struct FileIdGenerator<C: Clock = SystemClock> {
    clock: C,
    state: Mutex<GenState>,
}

impl FileIdGenerator<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for FileIdGenerator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> FileIdGenerator<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            state: Mutex::new(GenState::default()),
        }
    }

    /// Issue the next identifier. Never fails, never repeats, never goes back.
    pub fn create(&self) -> FileId {
        let now = self.clock.now_millis().min(MAX_TIMESTAMP_MILLIS);

        let (millis, sequence) = {
            // The state is two integers; a panic elsewhere cannot leave it torn.
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if now > state.last_millis {
                state.last_millis = now;
                state.sequence = 0;
            } else if state.sequence == u16::MAX {
                // At the timestamp ceiling only the random tail separates ids.
                state.last_millis = (state.last_millis + 1).min(MAX_TIMESTAMP_MILLIS);
                state.sequence = 0;
            } else {
                state.sequence += 1;
            }
            (state.last_millis, state.sequence)
        };

        compose(millis, sequence, rand::random())
    }

    /// Identifier for an explicit instant. Does not advance the generator.
    pub fn create_at(&self, unix_millis: u64) -> FileId {
        compose(unix_millis.min(MAX_TIMESTAMP_MILLIS), 0, rand::random())
    }

    /// Millisecond component of the most recently issued identifier.
    pub fn last_issued_millis(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_millis
    }
}

/// Seconds embedded in an identifier.
pub fn timestamp_of(id: &FileId) -> u64 {
    id.unix_seconds()
}

pub(crate) fn compose(millis: u64, sequence: u16, tail: [u8; ID_LEN - TAIL_OFFSET]) -> FileId {
    let mut bytes = [0u8; ID_LEN];
    bytes[..TIMESTAMP_BYTES].copy_from_slice(&millis.to_be_bytes()[8 - TIMESTAMP_BYTES..]);
    bytes[TIMESTAMP_BYTES..TAIL_OFFSET].copy_from_slice(&sequence.to_be_bytes()[..SEQUENCE_BYTES]);
    bytes[TAIL_OFFSET..].copy_from_slice(&tail);
    FileId(bytes)
}

static GLOBAL: OnceLock<FileIdGenerator> = OnceLock::new();

/// Process-wide generator behind [`FileId::new`].
pub fn global() -> &'static FileIdGenerator {
    GLOBAL.get_or_init(FileIdGenerator::new)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn set(&self, millis: u64) {
            self.0.store(millis, AtomicOrdering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.0.load(AtomicOrdering::SeqCst)
        }
    }

    #[test]
    fn sequence_rollover_stays_under_timestamp_ceiling() {
        let gen = FileIdGenerator::with_clock(ManualClock(AtomicU64::new(MAX_TIMESTAMP_MILLIS)));
        // One more than the sequence space forces a rollover.
        let ids: Vec<FileId> = (0..u32::from(u16::MAX) + 2).map(|_| gen.create()).collect();
        let last = ids[ids.len() - 1];
        assert_eq!(last.unix_millis(), MAX_TIMESTAMP_MILLIS);
        assert!(ids.iter().all(|id| id.unix_millis() == MAX_TIMESTAMP_MILLIS));
    }

    #[test]
    fn sequential_ids_strictly_increase() {
        let gen = FileIdGenerator::new();
        let ids: Vec<FileId> = (0..100_000).map(|_| gen.create()).collect();
        for pair in ids.windows(2) {
            assert_eq!(FileId::compare(&pair[0], &pair[1]), std::cmp::Ordering::Less);
        }
    }

    #[test]
    fn concurrent_ids_never_tie() {
        let gen = Arc::new(FileIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gen = Arc::clone(&gen);
                thread::spawn(move || {
                    let ids: Vec<FileId> = (0..12_500).map(|_| gen.create()).collect();
                    // Each caller sees its own calls in order.
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                    ids
                })
            })
            .collect();

        let mut all: Vec<FileId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 100_000);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 100_000);
    }

    #[test]
    fn synchronized_callers_reproduce_generation_order() {
        let gen = Arc::new(FileIdGenerator::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = Arc::clone(&gen);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let mut log = log.lock().unwrap();
                        log.push(gen.create());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let log = log.lock().unwrap();
        let mut sorted = log.clone();
        sorted.sort_by(FileId::compare);
        assert_eq!(*log, sorted);
    }

    #[test]
    fn clock_regression_keeps_order() {
        let clock = Arc::new(ManualClock(AtomicU64::new(1_700_000_000_000)));
        let gen = FileIdGenerator::with_clock(Arc::clone(&clock));

        let a = gen.create();
        clock.set(1_600_000_000_000);
        let b = gen.create();
        let c = gen.create();
        clock.set(1_700_000_000_001);
        let d = gen.create();

        assert!(a < b && b < c && c < d);
        // Regressed calls stay pinned to the last issued millisecond.
        assert_eq!(b.unix_millis(), 1_700_000_000_000);
        assert_eq!(d.unix_millis(), 1_700_000_000_001);
    }

    #[test]
    fn sequence_overflow_borrows_next_millisecond() {
        let clock = Arc::new(ManualClock(AtomicU64::new(5_000)));
        let gen = FileIdGenerator::with_clock(Arc::clone(&clock));

        let mut prev = gen.create();
        for _ in 0..u16::MAX as u32 + 10 {
            let next = gen.create();
            assert!(prev < next);
            prev = next;
        }
        assert_eq!(prev.unix_millis(), 5_001);
        assert!(gen.last_issued_millis() >= 5_001);
    }

    #[test]
    fn timestamp_recovery_within_a_second() {
        let before = time::unix_seconds();
        let id = FileId::new();
        let after = time::unix_seconds();
        let ts = timestamp_of(&id);
        assert!(ts + 1 >= before && ts <= after + 1);
    }

    #[test]
    fn create_at_embeds_the_given_instant() {
        let gen = FileIdGenerator::new();
        let before = gen.last_issued_millis();
        let id = gen.create_at(1_234_567_890_123);
        assert_eq!(id.unix_millis(), 1_234_567_890_123);
        assert_eq!(gen.last_issued_millis(), before);
        assert!(FileId::lower_bound_at(1_234_567_890_123) <= id);
    }
}
