//! Checks and merges applied before a token mutation is persisted

use tollgate_api::{StatusRejection, Token, TokenStatus, TokenUpdate, NEVER_EXPIRES};

use crate::lifecycle::{draft_policy, recompute_expiry_on_update};
use crate::ValidationError;

/// How much of an update request is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Only `status` changes
    StatusOnly,
    /// Owner-editable fields change; status stays as stored
    Full,
}

/// Refuse re-enabling a token whose expiry or quota still blocks it.
///
/// Only a request for `Enabled` is checked. The caller must fix the
/// underlying condition (extend the expiry, add quota) first.
pub fn authorize_status_change(
    current: &Token,
    requested: TokenStatus,
    now: i64,
) -> Result<(), StatusRejection> {
    if requested != TokenStatus::Enabled {
        return Ok(());
    }

    if current.status == TokenStatus::Expired
        && current.expired_time != NEVER_EXPIRES
        && current.expired_time <= now
    {
        return Err(StatusRejection::Expired);
    }

    if current.status == TokenStatus::Exhausted
        && current.remain_quota <= 0
        && !current.unlimited_quota
    {
        return Err(StatusRejection::Exhausted);
    }

    Ok(())
}

/// Names are limited in bytes, not characters.
pub fn validate_name(name: &str, max_len: usize) -> Result<(), ValidationError> {
    if name.len() > max_len {
        return Err(ValidationError::NameTooLong {
            len: name.len(),
            max: max_len,
        });
    }
    Ok(())
}

/// Merge `incoming` into a copy of `current`.
///
/// Identity, ownership, key, timestamps, usage and window fields are
/// always carried over from `current`.
pub fn apply_update(current: &Token, incoming: &TokenUpdate, mode: UpdateMode) -> Token {
    let mut next = current.clone();

    match mode {
        UpdateMode::StatusOnly => {
            if let Some(status) = incoming.status {
                next.status = status;
            }
        }
        UpdateMode::Full => {
            let fields = &incoming.fields;
            let policy = draft_policy(fields);

            next.name = fields.name.clone();
            next.remain_quota = fields.remain_quota;
            next.unlimited_quota = fields.unlimited_quota;
            next.model_limits_enabled = fields.model_limits_enabled;
            next.model_limits = fields.model_limits.clone();
            next.allow_ips = fields.allow_ips.clone();
            next.group = fields.group.clone();
            next.start_on_first_use = policy.start_on_first_use;
            next.duration_seconds = policy.duration_seconds;
            next.daily_quota_limit = fields.daily_quota_limit;
            next.expired_time = recompute_expiry_on_update(current, &policy);
        }
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::token;
    use tollgate_api::TokenDraft;

    #[test]
    fn expired_token_cannot_be_enabled() {
        let mut t = token();
        t.status = TokenStatus::Expired;
        t.expired_time = 100;

        assert_eq!(
            authorize_status_change(&t, TokenStatus::Enabled, 200),
            Err(StatusRejection::Expired)
        );
        // Expiry moved past now
        t.expired_time = 300;
        assert!(authorize_status_change(&t, TokenStatus::Enabled, 200).is_ok());
    }

    #[test]
    fn expired_status_with_never_expiry_is_allowed() {
        let mut t = token();
        t.status = TokenStatus::Expired;
        t.expired_time = -1;
        assert!(authorize_status_change(&t, TokenStatus::Enabled, 200).is_ok());
    }

    #[test]
    fn exhausted_token_needs_quota() {
        let mut t = token();
        t.status = TokenStatus::Exhausted;
        t.remain_quota = 0;
        assert_eq!(
            authorize_status_change(&t, TokenStatus::Enabled, 200),
            Err(StatusRejection::Exhausted)
        );

        t.unlimited_quota = true;
        assert!(authorize_status_change(&t, TokenStatus::Enabled, 200).is_ok());

        t.unlimited_quota = false;
        t.remain_quota = 10;
        assert!(authorize_status_change(&t, TokenStatus::Enabled, 200).is_ok());
    }

    #[test]
    fn disabling_is_never_checked() {
        let mut t = token();
        t.status = TokenStatus::Expired;
        t.expired_time = 100;
        assert!(authorize_status_change(&t, TokenStatus::Disabled, 200).is_ok());
    }

    #[test]
    fn name_limit_counts_bytes() {
        assert!(validate_name("", 30).is_ok());
        assert!(validate_name(&"a".repeat(30), 30).is_ok());
        assert!(validate_name(&"a".repeat(31), 30).is_err());
        // 11 three-byte chars = 33 bytes
        assert_eq!(
            validate_name(&"令".repeat(11), 30),
            Err(ValidationError::NameTooLong { len: 33, max: 30 })
        );
    }

    #[test]
    fn status_only_touches_status() {
        let mut current = token();
        current.status = TokenStatus::Disabled;
        current.name = "keep".into();
        current.used_quota = 42;

        let incoming = TokenUpdate {
            id: current.id,
            status: Some(TokenStatus::Enabled),
            fields: TokenDraft {
                name: "ignored".into(),
                remain_quota: 1,
                ..TokenDraft::default()
            },
        };

        let next = apply_update(&current, &incoming, UpdateMode::StatusOnly);
        let mut expected = current.clone();
        expected.status = TokenStatus::Enabled;
        assert_eq!(next, expected);
    }

    #[test]
    fn full_update_keeps_status_and_usage() {
        let mut current = token();
        current.status = TokenStatus::Disabled;
        current.start_on_first_use = true;
        current.first_used_time = 1_000;
        current.used_quota = 42;
        current.day_used_quota = 7;

        let incoming = TokenUpdate {
            id: current.id,
            status: Some(TokenStatus::Enabled),
            fields: TokenDraft {
                name: "renamed".into(),
                remain_quota: 900,
                start_on_first_use: true,
                expired_time: -1,
                duration_seconds: 500,
                daily_quota_limit: 50,
                ..TokenDraft::default()
            },
        };

        let next = apply_update(&current, &incoming, UpdateMode::Full);
        assert_eq!(next.status, TokenStatus::Disabled);
        assert_eq!(next.name, "renamed");
        assert_eq!(next.remain_quota, 900);
        assert_eq!(next.expired_time, 1_500);
        assert_eq!(next.daily_quota_limit, 50);
        assert_eq!(next.used_quota, 42);
        assert_eq!(next.day_used_quota, 7);
        assert_eq!(next.key, current.key);
        assert_eq!(next.created_time, current.created_time);
    }
}
