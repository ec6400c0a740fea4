//! Command types for the tollgated protocol

use serde::{Deserialize, Serialize};
use tollgate_util::{ClientId, TokenId, UserId};

use crate::{
    ClientRole, CreditSummary, HealthStatus, PageQuery, TokenDraft, TokenPage, TokenUpdate,
    TokenUsage, TokenView, API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    ValidationFailed,
    TokenNotFound,
    PreconditionRejected,
    PermissionDenied,
    RateLimited,
    StoreError,
    InternalError,
}

/// All possible commands from clients.
///
/// Token commands carry the owning user; authenticating that user is the
/// job of whatever front end sits in front of the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    ListTokens {
        user_id: UserId,
        #[serde(default)]
        page: PageQuery,
    },

    SearchTokens {
        user_id: UserId,
        #[serde(default)]
        keyword: String,
        #[serde(default)]
        key: String,
    },

    GetToken { user_id: UserId, token_id: TokenId },

    GetCreditSummary { user_id: UserId, token_id: TokenId },

    /// Look up usage by key (with or without the `sk-` prefix)
    GetTokenUsage { key: String },

    CreateToken { user_id: UserId, token: TokenDraft },

    UpdateToken {
        user_id: UserId,
        update: TokenUpdate,
        /// Only apply `update.status`, leave every other field alone
        #[serde(default)]
        status_only: bool,
    },

    /// Push the expiry (or the deferred plan duration) forward
    ExtendToken {
        user_id: UserId,
        token_id: TokenId,
        seconds: i64,
    },

    DeleteToken { user_id: UserId, token_id: TokenId },

    DeleteTokens { user_id: UserId, ids: Vec<TokenId> },

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    GetHealth,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether the command changes stored state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::CreateToken { .. }
                | Command::UpdateToken { .. }
                | Command::ExtendToken { .. }
                | Command::DeleteToken { .. }
                | Command::DeleteTokens { .. }
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    TokenPage(TokenPage),
    Tokens { items: Vec<TokenView> },
    Token(TokenView),
    CreditSummary(CreditSummary),
    TokenUsage(TokenUsage),
    Created(TokenView),
    Updated(TokenView),
    Deleted { token_id: TokenId },
    BatchDeleted { count: u64 },
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenStatus;

    #[test]
    fn request_serialization() {
        let req = Request::new(1, Command::Ping);
        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 1);
        assert!(matches!(parsed.command, Command::Ping));
    }

    #[test]
    fn status_only_update_from_json() {
        let json = r#"{
            "request_id": 9,
            "api_version": 1,
            "command": {
                "type": "update_token",
                "user_id": 5,
                "status_only": true,
                "update": {"id": 12, "status": 2}
            }
        }"#;

        let parsed: Request = serde_json::from_str(json).unwrap();
        match parsed.command {
            Command::UpdateToken {
                user_id,
                update,
                status_only,
            } => {
                assert_eq!(user_id, UserId::new(5));
                assert_eq!(update.id, TokenId::new(12));
                assert_eq!(update.status, Some(TokenStatus::Disabled));
                assert!(status_only);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn mutations_are_flagged() {
        assert!(Command::DeleteTokens {
            user_id: UserId::new(1),
            ids: vec![],
        }
        .is_mutation());
        assert!(!Command::GetTokenUsage { key: "sk-x".into() }.is_mutation());
    }

    #[test]
    fn error_response_serialization() {
        let resp = Response::error(
            4,
            ErrorInfo::new(ErrorCode::PreconditionRejected, "token has expired"),
        );
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("precondition_rejected"));
    }
}
