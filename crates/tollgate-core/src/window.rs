//! Rolling 24-hour quota window

use tollgate_api::{DailyView, Token};
use tollgate_util::SECONDS_PER_DAY;

/// Display view of the token's daily window at `now`.
///
/// The window starts at the stored window start, falling back to the first
/// use. Usage is clamped into `[0, daily_quota_limit]` for display only; the
/// stored window is never rewritten here, an elapsed window is just flagged.
pub fn project(token: &Token, now: i64) -> DailyView {
    let limit = token.daily_quota_limit;
    if limit <= 0 {
        return DailyView::default();
    }

    let window_start = if token.day_window_start != 0 {
        token.day_window_start
    } else {
        token.first_used_time
    };
    let reset_at = if window_start > 0 {
        window_start.saturating_add(SECONDS_PER_DAY)
    } else {
        0
    };
    let used = token.day_used_quota.clamp(0, limit);

    DailyView {
        window_start,
        reset_at,
        used,
        remaining: limit - used,
        window_elapsed: reset_at > 0 && now >= reset_at,
    }
}
