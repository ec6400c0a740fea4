//! Audit event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_api::{StatusRejection, TokenStatus};
use tollgate_util::{TokenId, UserId};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    TokenCreated {
        token_id: TokenId,
        user_id: UserId,
        name: String,
    },

    /// Full-field update
    TokenUpdated {
        token_id: TokenId,
        user_id: UserId,
        expired_time: i64,
    },

    /// Status-only update
    TokenStatusChanged {
        token_id: TokenId,
        user_id: UserId,
        from: TokenStatus,
        to: TokenStatus,
    },

    /// Guard refused to re-enable a token
    StatusChangeRejected {
        token_id: TokenId,
        user_id: UserId,
        reason: StatusRejection,
    },

    TokenExtended {
        token_id: TokenId,
        user_id: UserId,
        seconds: i64,
        expired_time: i64,
        duration_seconds: i64,
    },

    TokenDeleted {
        token_id: TokenId,
        user_id: UserId,
    },

    TokensDeleted {
        user_id: UserId,
        requested: usize,
        deleted: u64,
    },

    /// Client connected
    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: tollgate_util::now(),
            event,
        }
    }
}
