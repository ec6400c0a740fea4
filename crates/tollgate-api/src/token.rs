//! The persisted token record and the request shapes that create or change it

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tollgate_util::{TokenId, UserId};

/// `expired_time` sentinel: the token never expires
pub const NEVER_EXPIRES: i64 = -1;

/// Token status. Serialized as its integer code, the same value the store
/// persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TokenStatus {
    Enabled,
    Disabled,
    Expired,
    Exhausted,
}

impl TokenStatus {
    /// Integer code used in the database
    pub fn as_code(self) -> i64 {
        match self {
            TokenStatus::Enabled => 1,
            TokenStatus::Disabled => 2,
            TokenStatus::Expired => 3,
            TokenStatus::Exhausted => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TokenStatus::Enabled),
            2 => Some(TokenStatus::Disabled),
            3 => Some(TokenStatus::Expired),
            4 => Some(TokenStatus::Exhausted),
            _ => None,
        }
    }
}

impl From<TokenStatus> for i64 {
    fn from(status: TokenStatus) -> Self {
        status.as_code()
    }
}

impl TryFrom<i64> for TokenStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        TokenStatus::from_code(code).ok_or_else(|| format!("unknown token status code {code}"))
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenStatus::Enabled => "enabled",
            TokenStatus::Disabled => "disabled",
            TokenStatus::Expired => "expired",
            TokenStatus::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// An API access token as stored.
///
/// All timestamps are epoch seconds. `expired_time` uses [`NEVER_EXPIRES`]
/// for tokens without an expiry; `first_used_time` and `day_window_start`
/// are `0` until set by the usage-recording path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub user_id: UserId,
    pub key: String,
    pub status: TokenStatus,
    pub name: String,
    pub created_time: i64,
    pub accessed_time: i64,
    pub expired_time: i64,
    pub remain_quota: i64,
    pub unlimited_quota: bool,
    pub model_limits_enabled: bool,
    /// Comma-separated model names
    pub model_limits: String,
    pub allow_ips: Option<String>,
    pub used_quota: i64,
    pub group: String,
    pub start_on_first_use: bool,
    pub first_used_time: i64,
    pub duration_seconds: i64,
    pub daily_quota_limit: i64,
    pub day_window_start: i64,
    pub day_used_quota: i64,
}

impl Token {
    /// The fields that decide when this token expires
    pub fn lifetime_policy(&self) -> LifetimePolicy {
        LifetimePolicy {
            expired_time: self.expired_time,
            start_on_first_use: self.start_on_first_use,
            duration_seconds: self.duration_seconds,
        }
    }

    /// Model limits as a set-like map (`{"gpt-4": true}`), empty entries skipped
    pub fn model_limits_map(&self) -> BTreeMap<String, bool> {
        self.model_limits
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| (m.to_string(), true))
            .collect()
    }
}

/// Lifecycle-affecting fields of a token or of an incoming change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimePolicy {
    pub expired_time: i64,
    pub start_on_first_use: bool,
    pub duration_seconds: i64,
}

/// Owner-editable token fields, used both to create a token and as the
/// payload of a full update.
///
/// The plan duration may be given either as `duration_seconds` or as a
/// `duration_days` / `duration_hours` pair; the pair wins when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenDraft {
    pub name: String,
    pub expired_time: i64,
    pub remain_quota: i64,
    pub unlimited_quota: bool,
    pub model_limits_enabled: bool,
    pub model_limits: String,
    pub allow_ips: Option<String>,
    pub group: String,
    pub start_on_first_use: bool,
    pub duration_seconds: i64,
    pub duration_days: Option<i64>,
    pub duration_hours: Option<i64>,
    pub daily_quota_limit: i64,
}

impl Default for TokenDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            expired_time: NEVER_EXPIRES,
            remain_quota: 0,
            unlimited_quota: false,
            model_limits_enabled: false,
            model_limits: String::new(),
            allow_ips: None,
            group: String::new(),
            start_on_first_use: false,
            duration_seconds: 0,
            duration_days: None,
            duration_hours: None,
            daily_quota_limit: 0,
        }
    }
}

/// An update request for an existing token.
///
/// `status` is only written in status-only mode; in a full update it is
/// still checked by the status guard when it asks for `enabled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUpdate {
    pub id: TokenId,
    #[serde(default)]
    pub status: Option<TokenStatus>,
    #[serde(flatten)]
    pub fields: TokenDraft,
}

/// Why a status transition was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum StatusRejection {
    #[error(
        "token has expired and cannot be enabled; extend its expiry or make it never expire first"
    )]
    Expired,

    #[error(
        "token quota is used up and it cannot be enabled; add remaining quota or make it unlimited first"
    )]
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in [
            TokenStatus::Enabled,
            TokenStatus::Disabled,
            TokenStatus::Expired,
            TokenStatus::Exhausted,
        ] {
            assert_eq!(TokenStatus::from_code(status.as_code()), Some(status));
        }
        assert_eq!(TokenStatus::from_code(0), None);
    }

    #[test]
    fn draft_defaults_to_never_expiring() {
        let draft: TokenDraft = serde_json::from_str(r#"{"name": "ci"}"#).unwrap();
        assert_eq!(draft.name, "ci");
        assert_eq!(draft.expired_time, NEVER_EXPIRES);
        assert_eq!(draft.duration_days, None);
    }

    #[test]
    fn update_flattens_draft_fields() {
        let update: TokenUpdate = serde_json::from_str(
            r#"{"id": 3, "status": 1, "name": "renamed", "remain_quota": 50}"#,
        )
        .unwrap();

        assert_eq!(update.id, TokenId::new(3));
        assert_eq!(update.status, Some(TokenStatus::Enabled));
        assert_eq!(update.fields.name, "renamed");
        assert_eq!(update.fields.remain_quota, 50);
        assert_eq!(update.fields.expired_time, NEVER_EXPIRES);
    }

    #[test]
    fn status_serializes_as_code() {
        assert_eq!(serde_json::to_string(&TokenStatus::Exhausted).unwrap(), "4");
        let parsed: TokenStatus = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, TokenStatus::Disabled);
        assert!(serde_json::from_str::<TokenStatus>("9").is_err());
        assert!(serde_json::from_str::<TokenStatus>("\"enabled\"").is_err());
    }

    #[test]
    fn rejection_messages_name_the_condition() {
        assert!(StatusRejection::Expired.to_string().contains("expired"));
        assert!(StatusRejection::Exhausted.to_string().contains("quota"));
    }
}
