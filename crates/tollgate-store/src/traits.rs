//! Store trait definitions

use tollgate_api::Token;
use tollgate_util::{TokenId, UserId};

use crate::{AuditEvent, StoreResult};

/// Check run against the freshly read row inside the update transaction.
/// Returning an error aborts the write and leaves the row untouched.
pub type Precondition<'a> = &'a dyn Fn(&Token) -> StoreResult<()>;

/// Columns written by [`Store::update`]. Nothing outside the chosen set is
/// touched, so concurrent writers of other columns are never reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenColumns {
    /// `status` only
    Status,
    /// Owner-editable fields and expiry; `status` keeps its stored value
    Editable,
    /// `expired_time` and `duration_seconds`
    Lifetime,
}

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Tokens

    /// Token by id, only if owned by `owner`
    fn fetch_by_id(&self, id: TokenId, owner: UserId) -> StoreResult<Option<Token>>;

    /// Token by key. Without `include_disabled` only enabled tokens match.
    fn fetch_by_key(&self, key: &str, include_disabled: bool) -> StoreResult<Option<Token>>;

    /// One page of an owner's tokens, newest first, plus the owner's total count
    fn list_by_owner(
        &self,
        owner: UserId,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Token>, u64)>;

    /// Owner's tokens whose name starts with `keyword` and whose key starts
    /// with `key_prefix`. Empty strings match everything.
    fn search_by_owner(
        &self,
        owner: UserId,
        keyword: &str,
        key_prefix: &str,
    ) -> StoreResult<Vec<Token>>;

    /// Insert a new token; `token.id` is ignored and the assigned id returned
    fn insert(&self, token: &Token) -> StoreResult<TokenId>;

    /// Write the `columns` subset of `token`.
    ///
    /// The current row is re-read and passed to `precondition` in the same
    /// transaction as the write. Usage fields (`used_quota`,
    /// `first_used_time`, `day_window_start`, `day_used_quota`) are never
    /// written here; they belong to the usage-recording path.
    fn update(
        &self,
        token: &Token,
        columns: TokenColumns,
        precondition: Precondition<'_>,
    ) -> StoreResult<()>;

    /// Delete one token; `false` when nothing matched
    fn delete_by_id(&self, id: TokenId, owner: UserId) -> StoreResult<bool>;

    /// Delete every listed token owned by `owner`, skipping the rest.
    /// Returns the number of rows removed.
    fn delete_batch(&self, ids: &[TokenId], owner: UserId) -> StoreResult<u64>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
