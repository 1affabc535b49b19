use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds and sub-second microseconds since the unix epoch.
///
/// A clock set before the epoch reads as `(0, 0)`.
#[inline]
pub fn current_epoch_micros() -> (i64, u32) {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_secs() as i64, d.subsec_micros()))
        .unwrap_or((0, 0))
}

/// Whole seconds since the unix epoch.
#[inline]
pub fn current_epoch_seconds() -> i64 {
    current_epoch_micros().0
}
