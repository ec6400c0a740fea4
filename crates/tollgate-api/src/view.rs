//! Derived, non-persisted views of a token

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Token, TokenStatus};

/// Which expiration regime a token is in at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationState {
    /// Start-on-first-use token that has not been used yet
    NotStarted,
    /// Never expires
    Never,
    /// Has a concrete expiry timestamp
    Timed,
}

/// Expiration state of a token at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationView {
    pub state: ExpirationState,
    /// `0` while not started, `-1` when never expiring
    pub display_expired_time: i64,
    pub is_started: bool,
    pub is_never_expire: bool,
    /// Seconds until expiry, floored at zero. `-1` when never expiring.
    pub remaining_seconds: i64,
    pub plan_duration_seconds: i64,
    pub duration_days: i64,
    pub duration_hours: i64,
}

/// Display view of the rolling 24-hour quota window.
/// All zero when the token has no daily cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyView {
    pub window_start: i64,
    pub reset_at: i64,
    /// Stored window usage clamped into `[0, daily_quota_limit]`
    pub used: i64,
    pub remaining: i64,
    /// The stored window has run past its reset time and is awaiting rollover
    pub window_elapsed: bool,
}

/// A token together with its computed display fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenView {
    #[serde(flatten)]
    pub token: Token,
    pub expired_state: ExpirationState,
    pub display_expired_time: i64,
    pub duration_days: i64,
    pub duration_hours: i64,
    pub is_started: bool,
    pub is_never_expire: bool,
    pub remaining_seconds: i64,
    pub plan_duration_seconds: i64,
    pub daily_window_start: i64,
    pub daily_reset_at: i64,
    pub daily_used_quota: i64,
    pub daily_remain_quota: i64,
    pub daily_window_elapsed: bool,
}

impl TokenView {
    pub fn new(token: Token, expiration: ExpirationView, daily: DailyView) -> Self {
        Self {
            token,
            expired_state: expiration.state,
            display_expired_time: expiration.display_expired_time,
            duration_days: expiration.duration_days,
            duration_hours: expiration.duration_hours,
            is_started: expiration.is_started,
            is_never_expire: expiration.is_never_expire,
            remaining_seconds: expiration.remaining_seconds,
            plan_duration_seconds: expiration.plan_duration_seconds,
            daily_window_start: daily.window_start,
            daily_reset_at: daily.reset_at,
            daily_used_quota: daily.used,
            daily_remain_quota: daily.remaining,
            daily_window_elapsed: daily.window_elapsed,
        }
    }
}

impl TokenView {
    /// Same view with the secret key masked
    pub fn redacted(mut self) -> Self {
        self.token.key = mask_key(&self.token.key);
        self
    }
}

/// Mask a key for display: the first and last four characters stay, the
/// rest become `*`. Keys of eight characters or fewer are fully masked.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}

/// Why a token cannot currently be used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum UnusableReason {
    /// Status other than enabled
    Status { status: TokenStatus },
    /// Finite expiry already passed
    Expired { expired_time: i64 },
    /// No remaining quota and not unlimited
    QuotaExhausted,
}

/// Credit summary in the shape billing clients expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditSummary {
    pub object: String,
    pub total_granted: i64,
    pub total_used: i64,
    pub total_available: i64,
    /// Milliseconds since the epoch, `0` when never expiring
    pub expires_at: i64,
}

/// Usage summary looked up by key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub object: String,
    pub name: String,
    pub total_granted: i64,
    pub total_used: i64,
    pub total_available: i64,
    pub unlimited_quota: bool,
    pub model_limits: BTreeMap<String, bool>,
    pub model_limits_enabled: bool,
    /// Seconds since the epoch, `0` when never expiring
    pub expires_at: i64,
    pub usable: bool,
    pub reasons: Vec<UnusableReason>,
}

/// One page of an owner's tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPage {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<TokenView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_reason_serialization() {
        let reason = UnusableReason::Status {
            status: TokenStatus::Disabled,
        };

        let json = serde_json::to_string(&reason).unwrap();
        assert!(json.contains("\"code\":\"status\""));
        assert!(json.contains("\"status\":2"));
    }

    #[test]
    fn keys_are_masked() {
        assert_eq!(mask_key("0123456789abcdef"), "0123********cdef");
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key(""), "");
    }

    #[test]
    fn expiration_state_tags() {
        let json = serde_json::to_string(&ExpirationState::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
    }
}
