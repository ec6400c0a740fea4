//! Token service: request-level operations over the store

use std::cell::Cell;
use std::sync::Arc;
use tollgate_api::{
    CreditSummary, PageQuery, Token, TokenDraft, TokenPage, TokenStatus, TokenUpdate,
    TokenUsage, TokenView,
};
use tollgate_config::TokenLimits;
use tollgate_store::{AuditEvent, AuditEventType, Store, StoreError, TokenColumns};
use tollgate_util::{TokenId, UserId};
use tracing::{debug, info, warn};

use crate::guard::{apply_update, authorize_status_change, validate_name, UpdateMode};
use crate::lifecycle::{draft_policy, extend_lifetime, LifetimeChange};
use crate::view::{build_token_view, credit_summary, token_usage};
use crate::{CoreError, CoreResult, ValidationError};

/// Prefix clients may put in front of a key when looking up usage
const KEY_PREFIX: &str = "sk-";

/// Owner-scoped token operations.
///
/// Every operation takes `now` (epoch seconds) from the caller.
pub struct TokenService {
    store: Arc<dyn Store>,
    limits: TokenLimits,
}

impl TokenService {
    pub fn new(store: Arc<dyn Store>, limits: TokenLimits) -> Self {
        info!(
            max_name_length = limits.max_name_length,
            default_page_size = limits.default_page_size,
            "Token service initialized"
        );
        Self { store, limits }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn list(&self, owner: UserId, page: PageQuery, now: i64) -> CoreResult<TokenPage> {
        let page = page.clamped(self.limits.default_page_size, self.limits.max_page_size);
        let (tokens, total) = self
            .store
            .list_by_owner(owner, page.offset(), page.page_size)?;

        Ok(TokenPage {
            page: page.page,
            page_size: page.page_size,
            total,
            items: tokens
                .into_iter()
                .map(|t| build_token_view(t, now))
                .collect(),
        })
    }

    pub fn search(
        &self,
        owner: UserId,
        keyword: &str,
        key: &str,
        now: i64,
    ) -> CoreResult<Vec<TokenView>> {
        let tokens = self.store.search_by_owner(owner, keyword, key)?;
        debug!(user_id = %owner, hits = tokens.len(), "Token search");
        Ok(tokens
            .into_iter()
            .map(|t| build_token_view(t, now))
            .collect())
    }

    pub fn get(&self, owner: UserId, id: TokenId, now: i64) -> CoreResult<TokenView> {
        let token = self.fetch_owned(owner, id)?;
        Ok(build_token_view(token, now))
    }

    pub fn credit_summary(&self, owner: UserId, id: TokenId) -> CoreResult<CreditSummary> {
        let token = self.fetch_owned(owner, id)?;
        Ok(credit_summary(&token))
    }

    /// Usage for a key holder; disabled tokens are not found
    pub fn usage_by_key(&self, key: &str, now: i64) -> CoreResult<TokenUsage> {
        let key = key.strip_prefix(KEY_PREFIX).unwrap_or(key);
        let token = self
            .store
            .fetch_by_key(key, false)?
            .ok_or_else(|| CoreError::NotFound("token for key".into()))?;
        Ok(token_usage(&token, now))
    }

    /// Create an enabled token for `owner` under the given key
    pub fn create(
        &self,
        owner: UserId,
        draft: &TokenDraft,
        key: String,
        now: i64,
    ) -> CoreResult<TokenView> {
        validate_name(&draft.name, self.limits.max_name_length)?;

        let policy = draft_policy(draft);
        let mut token = Token {
            id: TokenId::new(0),
            user_id: owner,
            key,
            status: TokenStatus::Enabled,
            name: draft.name.clone(),
            created_time: now,
            accessed_time: now,
            expired_time: policy.expired_time,
            remain_quota: draft.remain_quota,
            unlimited_quota: draft.unlimited_quota,
            model_limits_enabled: draft.model_limits_enabled,
            model_limits: draft.model_limits.clone(),
            allow_ips: draft.allow_ips.clone(),
            used_quota: 0,
            group: draft.group.clone(),
            start_on_first_use: policy.start_on_first_use,
            first_used_time: 0,
            duration_seconds: policy.duration_seconds,
            daily_quota_limit: draft.daily_quota_limit,
            day_window_start: 0,
            day_used_quota: 0,
        };

        token.id = self.store.insert(&token)?;
        info!(token_id = %token.id, user_id = %owner, name = %token.name, "Token created");

        self.audit(AuditEventType::TokenCreated {
            token_id: token.id,
            user_id: owner,
            name: token.name.clone(),
        });

        Ok(build_token_view(token, now))
    }

    /// Apply an update request.
    ///
    /// A request asking for `Enabled` is checked by the status guard, first
    /// against the fetched row and again inside the store transaction.
    /// Status-only mode writes the status column alone; full mode writes the
    /// editable fields and never the status.
    pub fn update(
        &self,
        owner: UserId,
        request: &TokenUpdate,
        mode: UpdateMode,
        now: i64,
    ) -> CoreResult<TokenView> {
        validate_name(&request.fields.name, self.limits.max_name_length)?;
        if mode == UpdateMode::StatusOnly && request.status.is_none() {
            return Err(ValidationError::MissingStatus.into());
        }

        let current = self.fetch_owned(owner, request.id)?;

        if let Some(requested) = request.status {
            if let Err(reason) = authorize_status_change(&current, requested, now) {
                return Err(self.rejected(&current, reason));
            }
        }

        let next = apply_update(&current, request, mode);
        let requested = request.status;
        let first_used_time = current.first_used_time;
        let columns = match mode {
            UpdateMode::StatusOnly => TokenColumns::Status,
            UpdateMode::Full => TokenColumns::Editable,
        };
        let stored_status = Cell::new(current.status);

        let result = self.store.update(&next, columns, &|fresh: &Token| {
            stored_status.set(fresh.status);
            if let Some(requested) = requested {
                authorize_status_change(fresh, requested, now).map_err(StoreError::Rejected)?;
            }
            // A full update derives expiry from the first use it saw
            if mode == UpdateMode::Full && fresh.first_used_time != first_used_time {
                return Err(StoreError::Conflict(
                    "token was first used while the update was in flight".into(),
                ));
            }
            Ok(())
        });

        match result {
            Ok(()) => {}
            Err(StoreError::Rejected(reason)) => return Err(self.rejected(&current, reason)),
            Err(e) => return Err(e.into()),
        }

        match mode {
            UpdateMode::StatusOnly => {
                let from = stored_status.get();
                info!(token_id = %next.id, %from, to = %next.status, "Token status changed");
                self.audit(AuditEventType::TokenStatusChanged {
                    token_id: next.id,
                    user_id: owner,
                    from,
                    to: next.status,
                });
            }
            UpdateMode::Full => {
                info!(token_id = %next.id, expired_time = next.expired_time, "Token updated");
                self.audit(AuditEventType::TokenUpdated {
                    token_id: next.id,
                    user_id: owner,
                    expired_time: next.expired_time,
                });
            }
        }

        let stored = self.store.fetch_by_id(next.id, owner)?.unwrap_or(next);
        Ok(build_token_view(stored, now))
    }

    /// Extend a token's lifetime by `seconds`
    pub fn extend(
        &self,
        owner: UserId,
        id: TokenId,
        seconds: i64,
        now: i64,
    ) -> CoreResult<(TokenView, LifetimeChange)> {
        if seconds <= 0 {
            return Err(ValidationError::NonPositiveExtension(seconds).into());
        }

        let current = self.fetch_owned(owner, id)?;
        let mut next = current.clone();
        let change = extend_lifetime(&mut next, seconds);

        if change == LifetimeChange::Unchanged {
            debug!(token_id = %id, "Token never expires; nothing to extend");
            return Ok((build_token_view(current, now), change));
        }

        let before = (current.lifetime_policy(), current.first_used_time);
        self.store.update(&next, TokenColumns::Lifetime, &|fresh: &Token| {
            if (fresh.lifetime_policy(), fresh.first_used_time) != before {
                return Err(StoreError::Conflict(
                    "token lifetime changed while the extension was in flight".into(),
                ));
            }
            Ok(())
        })?;

        info!(
            token_id = %id,
            seconds,
            ?change,
            expires = %tollgate_util::format_unix(next.expired_time),
            "Token lifetime extended"
        );
        self.audit(AuditEventType::TokenExtended {
            token_id: id,
            user_id: owner,
            seconds,
            expired_time: next.expired_time,
            duration_seconds: next.duration_seconds,
        });

        let stored = self.store.fetch_by_id(id, owner)?.unwrap_or(next);
        Ok((build_token_view(stored, now), change))
    }

    pub fn delete(&self, owner: UserId, id: TokenId) -> CoreResult<()> {
        if !self.store.delete_by_id(id, owner)? {
            return Err(CoreError::NotFound(format!("token {}", id)));
        }

        info!(token_id = %id, user_id = %owner, "Token deleted");
        self.audit(AuditEventType::TokenDeleted {
            token_id: id,
            user_id: owner,
        });
        Ok(())
    }

    /// Delete every listed token the owner has; others are skipped.
    /// Returns the number deleted.
    pub fn delete_batch(&self, owner: UserId, ids: &[TokenId]) -> CoreResult<u64> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }

        let deleted = self.store.delete_batch(ids, owner)?;
        info!(user_id = %owner, requested = ids.len(), deleted, "Tokens deleted");
        self.audit(AuditEventType::TokensDeleted {
            user_id: owner,
            requested: ids.len(),
            deleted,
        });
        Ok(deleted)
    }

    fn fetch_owned(&self, owner: UserId, id: TokenId) -> CoreResult<Token> {
        self.store
            .fetch_by_id(id, owner)?
            .ok_or_else(|| CoreError::NotFound(format!("token {}", id)))
    }

    fn rejected(&self, current: &Token, reason: tollgate_api::StatusRejection) -> CoreError {
        warn!(token_id = %current.id, ?reason, "Status change rejected");
        self.audit(AuditEventType::StatusChangeRejected {
            token_id: current.id,
            user_id: current.user_id,
            reason,
        });
        CoreError::Rejected(reason)
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}
