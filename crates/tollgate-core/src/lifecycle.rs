//! Expiration lifecycle of a token
//!
//! Pure functions over a token snapshot and an explicit `now` (epoch
//! seconds). Nothing here reads the clock or touches the store.

use tollgate_api::{
    ExpirationState, ExpirationView, LifetimePolicy, Token, TokenDraft, TokenStatus,
    UnusableReason, NEVER_EXPIRES,
};
use tollgate_util::{SECONDS_PER_DAY, SECONDS_PER_HOUR};

/// Classify a token's expiration at `now`.
///
/// Precedence is fixed: a deferred token that has not been used is
/// `NotStarted` whatever its stored expiry says, then the never-expires
/// sentinel, then a concrete expiry.
pub fn evaluate(token: &Token, now: i64) -> ExpirationView {
    let (duration_days, duration_hours) = duration_breakdown(token.duration_seconds);

    let (state, display_expired_time, remaining_seconds) =
        if token.start_on_first_use && token.first_used_time == 0 {
            (ExpirationState::NotStarted, 0, 0)
        } else if token.expired_time == NEVER_EXPIRES {
            (ExpirationState::Never, NEVER_EXPIRES, NEVER_EXPIRES)
        } else {
            (
                ExpirationState::Timed,
                token.expired_time,
                (token.expired_time - now).max(0),
            )
        };

    ExpirationView {
        state,
        display_expired_time,
        is_started: state != ExpirationState::NotStarted,
        is_never_expire: state == ExpirationState::Never,
        remaining_seconds,
        plan_duration_seconds: token.duration_seconds,
        duration_days,
        duration_hours,
    }
}

/// Whole days and leftover hours of a duration; `(0, 0)` when non-positive
pub fn duration_breakdown(duration_seconds: i64) -> (i64, i64) {
    if duration_seconds <= 0 {
        return (0, 0);
    }
    (
        duration_seconds / SECONDS_PER_DAY,
        (duration_seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR,
    )
}

/// Seconds in `days` days plus `hours` hours. Negative parts count as zero.
pub fn duration_from_parts(days: i64, hours: i64) -> i64 {
    days.max(0)
        .saturating_mul(24)
        .saturating_add(hours.max(0))
        .saturating_mul(SECONDS_PER_HOUR)
}

/// Lifetime policy requested by a draft, with a days/hours pair taking
/// precedence over `duration_seconds`.
pub fn draft_policy(draft: &TokenDraft) -> LifetimePolicy {
    let duration_seconds = match (draft.duration_days, draft.duration_hours) {
        (None, None) => draft.duration_seconds,
        (days, hours) => duration_from_parts(days.unwrap_or(0), hours.unwrap_or(0)),
    };

    LifetimePolicy {
        expired_time: draft.expired_time,
        start_on_first_use: draft.start_on_first_use,
        duration_seconds,
    }
}

/// Expiry to store when `incoming` replaces the lifetime policy of `old`.
///
/// Only a deferred token that has already been used derives its expiry:
/// asking for "never" with a positive duration anchors the duration at the
/// first use.
pub fn recompute_expiry_on_update(old: &Token, incoming: &LifetimePolicy) -> i64 {
    if incoming.start_on_first_use
        && old.first_used_time != 0
        && incoming.expired_time == NEVER_EXPIRES
        && incoming.duration_seconds > 0
    {
        return old.first_used_time.saturating_add(incoming.duration_seconds);
    }
    incoming.expired_time
}

/// What [`extend_lifetime`] changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimeChange {
    /// Unused deferred token: its plan duration grew
    DurationExtended { duration_seconds: i64 },
    /// Finite expiry moved forward
    ExpiryExtended { expired_time: i64 },
    /// Never-expiring token or non-positive extension
    Unchanged,
}

/// Extend a token's lifetime by `seconds`, mutating it in place.
pub fn extend_lifetime(token: &mut Token, seconds: i64) -> LifetimeChange {
    if seconds <= 0 {
        return LifetimeChange::Unchanged;
    }

    if token.start_on_first_use && token.first_used_time == 0 {
        token.duration_seconds = token.duration_seconds.max(0).saturating_add(seconds);
        return LifetimeChange::DurationExtended {
            duration_seconds: token.duration_seconds,
        };
    }

    if token.expired_time == NEVER_EXPIRES {
        return LifetimeChange::Unchanged;
    }

    token.expired_time = token.expired_time.saturating_add(seconds);
    LifetimeChange::ExpiryExtended {
        expired_time: token.expired_time,
    }
}

/// Every reason the token cannot be used at `now`; empty when usable
pub fn unusable_reasons(token: &Token, now: i64) -> Vec<UnusableReason> {
    let mut reasons = Vec::new();

    if token.status != TokenStatus::Enabled {
        reasons.push(UnusableReason::Status {
            status: token.status,
        });
    }

    let view = evaluate(token, now);
    if view.state == ExpirationState::Timed && token.expired_time <= now {
        reasons.push(UnusableReason::Expired {
            expired_time: token.expired_time,
        });
    }

    if !token.unlimited_quota && token.remain_quota <= 0 {
        reasons.push(UnusableReason::QuotaExhausted);
    }

    reasons
}

pub fn is_usable(token: &Token, now: i64) -> bool {
    unusable_reasons(token, now).is_empty()
}
