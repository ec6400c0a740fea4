use tollgate_api::{Token, TokenStatus, NEVER_EXPIRES};
use tollgate_util::{TokenId, UserId};

/// Enabled, never-expiring token with quota left and no daily cap
pub(crate) fn token() -> Token {
    Token {
        id: TokenId::new(1),
        user_id: UserId::new(1),
        key: "test-key".into(),
        status: TokenStatus::Enabled,
        name: "test".into(),
        created_time: 100,
        accessed_time: 100,
        expired_time: NEVER_EXPIRES,
        remain_quota: 100,
        unlimited_quota: false,
        model_limits_enabled: false,
        model_limits: String::new(),
        allow_ips: None,
        used_quota: 0,
        group: String::new(),
        start_on_first_use: false,
        first_used_time: 0,
        duration_seconds: 0,
        daily_quota_limit: 0,
        day_window_start: 0,
        day_used_quota: 0,
    }
}
