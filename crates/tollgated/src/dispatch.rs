//! Command handling: maps protocol commands onto the token service

use tollgate_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, EventPayload, HealthStatus, Response,
    ResponsePayload, TokenView,
};
use tollgate_core::{CoreError, TokenService, UpdateMode};
use tollgate_util::ClientId;
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of one command: the reply plus an event to broadcast, if any
pub struct Outcome {
    pub response: Response,
    pub event: Option<EventPayload>,
}

impl Outcome {
    fn reply(response: Response) -> Self {
        Self {
            response,
            event: None,
        }
    }
}

/// Mint a fresh token key
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn error_info(err: &CoreError) -> ErrorInfo {
    let code = match err {
        CoreError::Validation(_) => ErrorCode::ValidationFailed,
        CoreError::NotFound(_) => ErrorCode::TokenNotFound,
        CoreError::Rejected(_) => ErrorCode::PreconditionRejected,
        CoreError::Store(_) => ErrorCode::StoreError,
    };
    ErrorInfo::new(code, err.to_string())
}

pub fn handle_command(
    tokens: &TokenService,
    role: ClientRole,
    client_id: &ClientId,
    request_id: u64,
    command: Command,
    now: i64,
) -> Outcome {
    if command.is_mutation() && !role.can_write() {
        debug!(client_id = %client_id, ?role, "Write refused for read-only client");
        return Outcome::reply(Response::error(
            request_id,
            ErrorInfo::new(ErrorCode::PermissionDenied, "read-only clients cannot change tokens"),
        ));
    }
    // Keys only reach clients that could change the token anyway
    let shown = |view: TokenView| {
        if role.can_write() {
            view
        } else {
            view.redacted()
        }
    };

    let result = match command {
        Command::ListTokens { user_id, page } => {
            tokens.list(user_id, page, now).map(|mut p| {
                p.items = p.items.into_iter().map(shown).collect();
                (ResponsePayload::TokenPage(p), None)
            })
        }

        Command::SearchTokens {
            user_id,
            keyword,
            key,
        } => tokens.search(user_id, &keyword, &key, now).map(|items| {
            let items = items.into_iter().map(shown).collect();
            (ResponsePayload::Tokens { items }, None)
        }),

        Command::GetToken { user_id, token_id } => tokens
            .get(user_id, token_id, now)
            .map(|view| (ResponsePayload::Token(shown(view)), None)),

        Command::GetCreditSummary { user_id, token_id } => tokens
            .credit_summary(user_id, token_id)
            .map(|summary| (ResponsePayload::CreditSummary(summary), None)),

        Command::GetTokenUsage { key } => tokens
            .usage_by_key(&key, now)
            .map(|usage| (ResponsePayload::TokenUsage(usage), None)),

        Command::CreateToken { user_id, token } => tokens
            .create(user_id, &token, generate_key(), now)
            .map(|view| {
                (
                    ResponsePayload::Created(view.clone()),
                    Some(EventPayload::TokenCreated(view.redacted())),
                )
            }),

        Command::UpdateToken {
            user_id,
            update,
            status_only,
        } => {
            let mode = if status_only {
                UpdateMode::StatusOnly
            } else {
                UpdateMode::Full
            };
            tokens.update(user_id, &update, mode, now).map(|view| {
                (
                    ResponsePayload::Updated(view.clone()),
                    Some(EventPayload::TokenUpdated(view.redacted())),
                )
            })
        }

        Command::ExtendToken {
            user_id,
            token_id,
            seconds,
        } => tokens
            .extend(user_id, token_id, seconds, now)
            .map(|(view, _)| {
                (
                    ResponsePayload::Updated(view.clone()),
                    Some(EventPayload::TokenUpdated(view.redacted())),
                )
            }),

        Command::DeleteToken { user_id, token_id } => {
            tokens.delete(user_id, token_id).map(|()| {
                (
                    ResponsePayload::Deleted { token_id },
                    Some(EventPayload::TokenDeleted { user_id, token_id }),
                )
            })
        }

        Command::DeleteTokens { user_id, ids } => {
            tokens.delete_batch(user_id, &ids).map(|count| {
                (
                    ResponsePayload::BatchDeleted { count },
                    Some(EventPayload::TokensDeleted {
                        user_id,
                        requested: ids,
                        count,
                    }),
                )
            })
        }

        Command::SubscribeEvents => Ok((
            ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            },
            None,
        )),

        Command::UnsubscribeEvents => Ok((ResponsePayload::Unsubscribed, None)),

        Command::GetHealth => {
            let store_ok = tokens.store().is_healthy();
            Ok((
                ResponsePayload::Health(HealthStatus {
                    live: true,
                    ready: store_ok,
                    store_ok,
                    mock_time: tollgate_util::is_mock_time_active(),
                }),
                None,
            ))
        }

        Command::Ping => Ok((ResponsePayload::Pong, None)),
    };

    match result {
        Ok((payload, event)) => Outcome {
            response: Response::success(request_id, payload),
            event,
        },
        Err(e) => {
            match &e {
                CoreError::Store(inner) => warn!(error = %inner, "Store failure"),
                other => debug!(error = %other, "Command refused"),
            }
            Outcome::reply(Response::error(request_id, error_info(&e)))
        }
    }
}
