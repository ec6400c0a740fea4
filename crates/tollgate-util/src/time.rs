//! Clock utilities for tollgate
//!
//! Token lifecycle math works on whole epoch seconds. Library code never
//! reads the clock itself; callers obtain "now" here once per request and
//! pass it down.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `TOLLGATE_MOCK_TIME` environment variable can be set
//! to shift the clock. This is useful for exercising expiry and daily window
//! behaviour without waiting for real time to pass.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (interpreted as UTC)
//!
//! Example:
//! ```bash
//! TOLLGATE_MOCK_TIME="2025-12-25 14:30:00" tollgated
//! ```

use chrono::{DateTime, Utc};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "TOLLGATE_MOCK_TIME";

pub const SECONDS_PER_HOUR: i64 = 3600;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Offset between mock time and real time, computed once at first use.
/// Mock time keeps advancing at the real rate from there.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // wraps Utc::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match chrono::NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => {
                        let mock_dt = naive_dt.and_utc();
                        let offset = mock_dt.signed_duration_since(Utc::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current wall-clock time, respecting mock time in debug builds.
#[allow(clippy::disallowed_methods)] // the one sanctioned wrapper around Utc::now()
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Current time as epoch seconds.
pub fn now_unix() -> i64 {
    now().timestamp()
}

/// Render epoch seconds for log output. Non-positive values are sentinels
/// (`0` unset, `-1` never) and are printed verbatim.
pub fn format_unix(ts: i64) -> String {
    if ts <= 0 {
        return ts.to_string();
    }
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_unix_tracks_now() {
        let a = now_unix();
        let b = now().timestamp();
        assert!((b - a).abs() <= 1);
    }

    #[test]
    fn format_unix_sentinels_verbatim() {
        assert_eq!(format_unix(-1), "-1");
        assert_eq!(format_unix(0), "0");
    }

    #[test]
    fn format_unix_real_timestamp() {
        assert_eq!(format_unix(86_400), "1970-01-02 00:00:00 UTC");
    }

    #[test]
    fn day_is_twenty_four_hours() {
        assert_eq!(SECONDS_PER_DAY, 24 * SECONDS_PER_HOUR);
    }
}
