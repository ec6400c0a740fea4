//! Event types for tollgated -> client streaming

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_util::{TokenId, UserId};

use crate::{TokenView, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: tollgate_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Broadcast to every subscriber, so the key is always masked
    TokenCreated(TokenView),

    /// Key masked, as for [`EventPayload::TokenCreated`]
    TokenUpdated(TokenView),

    TokenDeleted {
        user_id: UserId,
        token_id: TokenId,
    },

    /// Batch delete finished; `requested` may exceed `count` when some ids
    /// were unknown or owned by someone else
    TokensDeleted {
        user_id: UserId,
        requested: Vec<TokenId>,
        count: u64,
    },

    /// Service is shutting down
    Shutdown,
}
