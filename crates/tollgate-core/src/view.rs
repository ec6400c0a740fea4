//! Read-side projections of a token

use tollgate_api::{CreditSummary, Token, TokenUsage, TokenView, NEVER_EXPIRES};

use crate::lifecycle::{evaluate, unusable_reasons};
use crate::window::project;

/// Token plus its expiration and daily-window display fields
pub fn build_token_view(token: Token, now: i64) -> TokenView {
    let expiration = evaluate(&token, now);
    let daily = project(&token, now);
    TokenView::new(token, expiration, daily)
}

/// Billing-style summary. `expires_at` is in milliseconds.
pub fn credit_summary(token: &Token) -> CreditSummary {
    CreditSummary {
        object: "credit_summary".into(),
        total_granted: token.remain_quota,
        total_used: 0,
        total_available: token.remain_quota,
        expires_at: expiry_or_zero(token.expired_time).saturating_mul(1000),
    }
}

/// Usage summary for a key holder. `expires_at` is in seconds.
pub fn token_usage(token: &Token, now: i64) -> TokenUsage {
    let reasons = unusable_reasons(token, now);
    TokenUsage {
        object: "token_usage".into(),
        name: token.name.clone(),
        total_granted: token.remain_quota.saturating_add(token.used_quota),
        total_used: token.used_quota,
        total_available: token.remain_quota,
        unlimited_quota: token.unlimited_quota,
        model_limits: token.model_limits_map(),
        model_limits_enabled: token.model_limits_enabled,
        expires_at: expiry_or_zero(token.expired_time),
        usable: reasons.is_empty(),
        reasons,
    }
}

fn expiry_or_zero(expired_time: i64) -> i64 {
    if expired_time == NEVER_EXPIRES {
        0
    } else {
        expired_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::token;
    use tollgate_api::{ExpirationState, UnusableReason};

    #[test]
    fn view_carries_raw_and_derived_fields() {
        let mut t = token();
        t.expired_time = 2_000;
        t.daily_quota_limit = 100;
        t.day_window_start = 500;
        t.day_used_quota = 150;

        let view = build_token_view(t.clone(), 1_000);
        assert_eq!(view.token, t);
        assert_eq!(view.expired_state, ExpirationState::Timed);
        assert_eq!(view.remaining_seconds, 1_000);
        assert_eq!(view.daily_reset_at, 86_900);
        assert_eq!(view.daily_used_quota, 100);
        assert_eq!(view.daily_remain_quota, 0);
    }

    #[test]
    fn credit_summary_uses_milliseconds() {
        let mut t = token();
        t.remain_quota = 300;
        t.used_quota = 50;
        t.expired_time = 1_700_000_000;

        let summary = credit_summary(&t);
        assert_eq!(summary.object, "credit_summary");
        assert_eq!(summary.total_granted, 300);
        assert_eq!(summary.total_used, 0);
        assert_eq!(summary.total_available, 300);
        assert_eq!(summary.expires_at, 1_700_000_000_000);

        t.expired_time = -1;
        assert_eq!(credit_summary(&t).expires_at, 0);
    }

    #[test]
    fn usage_uses_seconds_and_model_map() {
        let mut t = token();
        t.name = "ci".into();
        t.remain_quota = 300;
        t.used_quota = 50;
        t.expired_time = 1_700_000_000;
        t.model_limits = "gpt-4, claude,".into();
        t.model_limits_enabled = true;

        let usage = token_usage(&t, 1_600_000_000);
        assert_eq!(usage.object, "token_usage");
        assert_eq!(usage.total_granted, 350);
        assert_eq!(usage.total_used, 50);
        assert_eq!(usage.total_available, 300);
        assert_eq!(usage.expires_at, 1_700_000_000);
        assert_eq!(usage.model_limits.len(), 2);
        assert_eq!(usage.model_limits.get("claude"), Some(&true));
        assert!(usage.usable);
        assert!(usage.reasons.is_empty());
    }

    #[test]
    fn usage_reports_unusable() {
        let mut t = token();
        t.remain_quota = 0;
        let usage = token_usage(&t, 0);
        assert!(!usage.usable);
        assert_eq!(usage.reasons, vec![UnusableReason::QuotaExhausted]);
        assert_eq!(usage.expires_at, 0);
    }
}
