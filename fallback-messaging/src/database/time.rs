//! Timestamp helpers for the database layer.
//!
//! Timestamps are stored as `INTEGER` Unix epoch milliseconds (UTC).

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Current time as Unix epoch milliseconds (UTC).
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Epoch milliseconds `delay` from now, saturating on overflow.
#[inline]
pub fn ms_after(delay: Duration) -> i64 {
    let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
    now_ms().saturating_add(delay_ms)
}

/// Convert Unix epoch milliseconds to `DateTime<Utc>`.
///
/// Out-of-range values clamp to the nearest representable timestamp.
#[inline]
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    match Utc.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => {
            if ms.is_negative() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_after_is_in_future() {
        let before = now_ms();
        let later = ms_after(Duration::from_secs(300));
        assert!(later >= before + 300_000);
    }

    #[test]
    fn test_ms_after_saturates() {
        assert_eq!(ms_after(Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_ms_to_datetime_roundtrip() {
        let dt = ms_to_datetime(1_700_000_000_000);
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
    }
}
