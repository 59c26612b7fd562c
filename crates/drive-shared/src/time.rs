//! Wall-clock helpers.
//!
//! Modification stamps come from [`unique_unix_millis`], which never hands
//! out the same value twice in one process, so "stamp taken after a write"
//! is always strictly greater than the write's own stamp.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

pub fn unix_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

pub fn unix_seconds() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

static LAST_UNIQUE_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Unix milliseconds, strictly increasing across all callers in the process.
pub fn unique_unix_millis() -> u64 {
    let now = unix_millis();
    let prev = LAST_UNIQUE_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(prev + 1)
}

pub fn datetime_from_millis(unix_millis: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(i64::try_from(unix_millis).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_millis_strictly_increase() {
        let mut prev = unique_unix_millis();
        for _ in 0..10_000 {
            let next = unique_unix_millis();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn unique_millis_track_wall_clock() {
        let wall = unix_millis();
        let stamp = unique_unix_millis();
        assert!(stamp >= wall);
    }

    #[test]
    fn datetime_conversion() {
        let dt = datetime_from_millis(86_400_000).unwrap();
        assert_eq!(dt.format("%Y/%m/%d").to_string(), "1970/01/02");
    }
}
