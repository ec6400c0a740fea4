//! SQLite-based store implementation

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tollgate_api::{Token, TokenStatus};
use tollgate_util::{TokenId, UserId};
use tracing::{debug, warn};

use crate::{AuditEvent, Precondition, Store, StoreError, StoreResult, TokenColumns};

/// Column list matching [`token_from_row`]
const TOKEN_COLUMNS: &str = "id, user_id, token_key, status, name, created_time, \
    accessed_time, expired_time, remain_quota, unlimited_quota, model_limits_enabled, \
    model_limits, allow_ips, used_quota, token_group, start_on_first_use, first_used_time, \
    duration_seconds, daily_quota_limit, day_window_start, day_used_quota";

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    let code: i64 = row.get(3)?;
    let status = TokenStatus::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Integer,
            format!("unknown token status {code}").into(),
        )
    })?;

    Ok(Token {
        id: TokenId::new(row.get(0)?),
        user_id: UserId::new(row.get(1)?),
        key: row.get(2)?,
        status,
        name: row.get(4)?,
        created_time: row.get(5)?,
        accessed_time: row.get(6)?,
        expired_time: row.get(7)?,
        remain_quota: row.get(8)?,
        unlimited_quota: row.get(9)?,
        model_limits_enabled: row.get(10)?,
        model_limits: row.get(11)?,
        allow_ips: row.get(12)?,
        used_quota: row.get(13)?,
        group: row.get(14)?,
        start_on_first_use: row.get(15)?,
        first_used_time: row.get(16)?,
        duration_seconds: row.get(17)?,
        daily_quota_limit: row.get(18)?,
        day_window_start: row.get(19)?,
        day_used_quota: row.get(20)?,
    })
}

/// Escape `%`, `_` and the escape char itself for a `LIKE ... ESCAPE '\'` prefix match
fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Access tokens
            CREATE TABLE IF NOT EXISTS tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                token_key TEXT NOT NULL UNIQUE,
                status INTEGER NOT NULL DEFAULT 1,
                name TEXT NOT NULL DEFAULT '',
                created_time INTEGER NOT NULL DEFAULT 0,
                accessed_time INTEGER NOT NULL DEFAULT 0,
                expired_time INTEGER NOT NULL DEFAULT -1,
                remain_quota INTEGER NOT NULL DEFAULT 0,
                unlimited_quota INTEGER NOT NULL DEFAULT 0,
                model_limits_enabled INTEGER NOT NULL DEFAULT 0,
                model_limits TEXT NOT NULL DEFAULT '',
                allow_ips TEXT,
                used_quota INTEGER NOT NULL DEFAULT 0,
                token_group TEXT NOT NULL DEFAULT '',
                start_on_first_use INTEGER NOT NULL DEFAULT 0,
                first_used_time INTEGER NOT NULL DEFAULT 0,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                daily_quota_limit INTEGER NOT NULL DEFAULT 0,
                day_window_start INTEGER NOT NULL DEFAULT 0,
                day_used_quota INTEGER NOT NULL DEFAULT 0
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
            CREATE INDEX IF NOT EXISTS idx_tokens_name ON tokens(name);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.lock()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| tollgate_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn fetch_by_id(&self, id: TokenId, owner: UserId) -> StoreResult<Option<Token>> {
        let conn = self.lock()?;
        let token = conn
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ? AND user_id = ?"),
                params![id.get(), owner.get()],
                token_from_row,
            )
            .optional()?;
        Ok(token)
    }

    fn fetch_by_key(&self, key: &str, include_disabled: bool) -> StoreResult<Option<Token>> {
        let conn = self.lock()?;
        let token = if include_disabled {
            conn.query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_key = ?"),
                params![key],
                token_from_row,
            )
            .optional()?
        } else {
            conn.query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_key = ? AND status = ?"),
                params![key, TokenStatus::Enabled.as_code()],
                token_from_row,
            )
            .optional()?
        };
        Ok(token)
    }

    fn list_by_owner(
        &self,
        owner: UserId,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Token>, u64)> {
        let conn = self.lock()?;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE user_id = ?",
            params![owner.get()],
            |row| row.get(0),
        )?;

        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ? \
             ORDER BY id DESC LIMIT ? OFFSET ?"
        ))?;
        let tokens = stmt
            .query_map(params![owner.get(), i64::from(limit), offset], token_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(user_id = %owner, total, returned = tokens.len(), "Listed tokens");
        Ok((tokens, total.max(0) as u64))
    }

    fn search_by_owner(
        &self,
        owner: UserId,
        keyword: &str,
        key_prefix: &str,
    ) -> StoreResult<Vec<Token>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ? \
             AND name LIKE ? ESCAPE '\\' AND token_key LIKE ? ESCAPE '\\' \
             ORDER BY id DESC"
        ))?;
        let tokens = stmt
            .query_map(
                params![owner.get(), like_prefix(keyword), like_prefix(key_prefix)],
                token_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tokens)
    }

    fn insert(&self, token: &Token) -> StoreResult<TokenId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tokens (user_id, token_key, status, name, created_time, accessed_time, \
             expired_time, remain_quota, unlimited_quota, model_limits_enabled, model_limits, \
             allow_ips, used_quota, token_group, start_on_first_use, first_used_time, \
             duration_seconds, daily_quota_limit, day_window_start, day_used_quota) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                token.user_id.get(),
                token.key,
                token.status.as_code(),
                token.name,
                token.created_time,
                token.accessed_time,
                token.expired_time,
                token.remain_quota,
                token.unlimited_quota,
                token.model_limits_enabled,
                token.model_limits,
                token.allow_ips,
                token.used_quota,
                token.group,
                token.start_on_first_use,
                token.first_used_time,
                token.duration_seconds,
                token.daily_quota_limit,
                token.day_window_start,
                token.day_used_quota,
            ],
        )?;

        let id = TokenId::new(conn.last_insert_rowid());
        debug!(token_id = %id, user_id = %token.user_id, "Token inserted");
        Ok(id)
    }

    fn update(
        &self,
        token: &Token,
        columns: TokenColumns,
        precondition: Precondition<'_>,
    ) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = tx
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ? AND user_id = ?"),
                params![token.id.get(), token.user_id.get()],
                token_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("token {}", token.id)))?;

        // Dropping `tx` on the error path rolls back
        precondition(&current)?;

        let (id, owner) = (token.id.get(), token.user_id.get());
        match columns {
            TokenColumns::Status => tx.execute(
                "UPDATE tokens SET status = ? WHERE id = ? AND user_id = ?",
                params![token.status.as_code(), id, owner],
            )?,
            TokenColumns::Editable => tx.execute(
                "UPDATE tokens SET name = ?, expired_time = ?, remain_quota = ?, \
                 unlimited_quota = ?, model_limits_enabled = ?, model_limits = ?, \
                 allow_ips = ?, token_group = ?, start_on_first_use = ?, \
                 duration_seconds = ?, daily_quota_limit = ? \
                 WHERE id = ? AND user_id = ?",
                params![
                    token.name,
                    token.expired_time,
                    token.remain_quota,
                    token.unlimited_quota,
                    token.model_limits_enabled,
                    token.model_limits,
                    token.allow_ips,
                    token.group,
                    token.start_on_first_use,
                    token.duration_seconds,
                    token.daily_quota_limit,
                    id,
                    owner,
                ],
            )?,
            TokenColumns::Lifetime => tx.execute(
                "UPDATE tokens SET expired_time = ?, duration_seconds = ? \
                 WHERE id = ? AND user_id = ?",
                params![token.expired_time, token.duration_seconds, id, owner],
            )?,
        };
        tx.commit()?;

        debug!(token_id = %token.id, ?columns, "Token updated");
        Ok(())
    }

    fn delete_by_id(&self, id: TokenId, owner: UserId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM tokens WHERE id = ? AND user_id = ?",
            params![id.get(), owner.get()],
        )?;
        debug!(token_id = %id, user_id = %owner, affected, "Token delete");
        Ok(affected > 0)
    }

    fn delete_batch(&self, ids: &[TokenId], owner: UserId) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self.lock()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM tokens WHERE user_id = ? AND id IN ({placeholders})");
        let values = std::iter::once(owner.get()).chain(ids.iter().map(|id| id.get()));
        let affected = conn.execute(&sql, params_from_iter(values))?;

        debug!(user_id = %owner, requested = ids.len(), affected, "Batch delete");
        Ok(affected as u64)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;
    use tollgate_api::{StatusRejection, NEVER_EXPIRES};

    fn token(owner: i64, key: &str, name: &str) -> Token {
        Token {
            id: TokenId::new(0),
            user_id: UserId::new(owner),
            key: key.into(),
            status: TokenStatus::Enabled,
            name: name.into(),
            created_time: 1_700_000_000,
            accessed_time: 1_700_000_000,
            expired_time: NEVER_EXPIRES,
            remain_quota: 500,
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

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::TokenDeleted {
                token_id: TokenId::new(4),
                user_id: UserId::new(1),
            }))
            .unwrap();

        let events = store.recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, AuditEventType::TokenDeleted { .. }));
    }

    #[test]
    fn test_insert_and_fetch() {
        let store = SqliteStore::in_memory().unwrap();
        let mut t = token(1, "abc", "primary");
        t.allow_ips = Some("10.0.0.1".into());
        t.model_limits = "gpt-4,claude".into();

        let id = store.insert(&t).unwrap();
        let fetched = store.fetch_by_id(id, UserId::new(1)).unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.allow_ips.as_deref(), Some("10.0.0.1"));
        assert_eq!(fetched.model_limits, "gpt-4,claude");

        // Owner scoping
        assert!(store.fetch_by_id(id, UserId::new(2)).unwrap().is_none());
    }

    #[test]
    fn test_fetch_by_key_respects_status() {
        let store = SqliteStore::in_memory().unwrap();
        let mut t = token(1, "disabled-key", "off");
        t.status = TokenStatus::Disabled;
        store.insert(&t).unwrap();

        assert!(store.fetch_by_key("disabled-key", false).unwrap().is_none());
        assert!(store.fetch_by_key("disabled-key", true).unwrap().is_some());
        assert!(store.fetch_by_key("missing", true).unwrap().is_none());
    }

    #[test]
    fn test_list_is_newest_first_and_paged() {
        let store = SqliteStore::in_memory().unwrap();
        for i in 0..5 {
            store.insert(&token(1, &format!("k{i}"), &format!("t{i}"))).unwrap();
        }
        store.insert(&token(2, "other", "other")).unwrap();

        let (page, total) = store.list_by_owner(UserId::new(1), 0, 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "t4");
        assert_eq!(page[1].name, "t3");

        let (page, _) = store.list_by_owner(UserId::new(1), 4, 2).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "t0");
    }

    #[test]
    fn test_search_by_prefix() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&token(1, "sk1aaa", "prod-api")).unwrap();
        store.insert(&token(1, "sk1bbb", "prod-web")).unwrap();
        store.insert(&token(1, "zzz", "staging")).unwrap();
        store.insert(&token(2, "sk1ccc", "prod-other")).unwrap();

        let hits = store.search_by_owner(UserId::new(1), "prod", "").unwrap();
        assert_eq!(hits.len(), 2);

        let hits = store.search_by_owner(UserId::new(1), "prod", "sk1b").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "prod-web");

        let hits = store.search_by_owner(UserId::new(1), "", "").unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&token(1, "a", "50%_off")).unwrap();
        store.insert(&token(1, "b", "50 dollars")).unwrap();

        let hits = store.search_by_owner(UserId::new(1), "50%", "").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "50%_off");
    }

    #[test]
    fn test_update_writes_editable_fields_only() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.insert(&token(1, "k", "before")).unwrap();

        let mut edited = store.fetch_by_id(id, UserId::new(1)).unwrap().unwrap();
        edited.name = "after".into();
        edited.used_quota = 999;
        edited.status = TokenStatus::Disabled;
        store
            .update(&edited, TokenColumns::Editable, &|_| Ok(()))
            .unwrap();

        let stored = store.fetch_by_id(id, UserId::new(1)).unwrap().unwrap();
        assert_eq!(stored.name, "after");
        assert_eq!(stored.used_quota, 0);
        assert_eq!(stored.status, TokenStatus::Enabled);
    }

    #[test]
    fn test_status_write_keeps_other_columns() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.insert(&token(1, "k", "name")).unwrap();
        let snapshot = store.fetch_by_id(id, UserId::new(1)).unwrap().unwrap();

        // Another writer spends quota and extends after the snapshot was taken
        let mut moved = snapshot.clone();
        moved.remain_quota = 100;
        moved.expired_time = 2_000_000_000;
        store
            .update(&moved, TokenColumns::Editable, &|_| Ok(()))
            .unwrap();

        let mut disabled = snapshot;
        disabled.status = TokenStatus::Disabled;
        store
            .update(&disabled, TokenColumns::Status, &|_| Ok(()))
            .unwrap();

        let stored = store.fetch_by_id(id, UserId::new(1)).unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Disabled);
        assert_eq!(stored.remain_quota, 100);
        assert_eq!(stored.expired_time, 2_000_000_000);
    }

    #[test]
    fn test_lifetime_write_touches_expiry_only() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.insert(&token(1, "k", "name")).unwrap();

        let mut edited = store.fetch_by_id(id, UserId::new(1)).unwrap().unwrap();
        edited.expired_time = 1_800_000_000;
        edited.duration_seconds = 60;
        edited.remain_quota = 1;
        edited.name = "ignored".into();
        store
            .update(&edited, TokenColumns::Lifetime, &|_| Ok(()))
            .unwrap();

        let stored = store.fetch_by_id(id, UserId::new(1)).unwrap().unwrap();
        assert_eq!(stored.expired_time, 1_800_000_000);
        assert_eq!(stored.duration_seconds, 60);
        assert_eq!(stored.remain_quota, 500);
        assert_eq!(stored.name, "name");
    }

    #[test]
    fn test_update_precondition_sees_current_row() {
        let store = SqliteStore::in_memory().unwrap();
        let mut t = token(1, "k", "name");
        t.status = TokenStatus::Exhausted;
        t.remain_quota = 0;
        let id = store.insert(&t).unwrap();

        let mut edited = t.clone();
        edited.id = id;
        edited.status = TokenStatus::Enabled;

        let result = store.update(&edited, TokenColumns::Status, &|current| {
            if current.remain_quota <= 0 && !current.unlimited_quota {
                Err(StoreError::Rejected(StatusRejection::Exhausted))
            } else {
                Ok(())
            }
        });
        assert!(matches!(
            result,
            Err(StoreError::Rejected(StatusRejection::Exhausted))
        ));

        let stored = store.fetch_by_id(id, UserId::new(1)).unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Exhausted);
    }

    #[test]
    fn test_update_missing_row() {
        let store = SqliteStore::in_memory().unwrap();
        let mut t = token(1, "k", "name");
        t.id = TokenId::new(42);
        let result = store.update(&t, TokenColumns::Editable, &|_| Ok(()));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_by_id() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.insert(&token(1, "k", "name")).unwrap();

        assert!(!store.delete_by_id(id, UserId::new(2)).unwrap());
        assert!(store.delete_by_id(id, UserId::new(1)).unwrap());
        assert!(!store.delete_by_id(id, UserId::new(1)).unwrap());
    }

    #[test]
    fn test_delete_batch_skips_foreign_and_missing() {
        let store = SqliteStore::in_memory().unwrap();
        let a = store.insert(&token(1, "a", "a")).unwrap();
        let b = store.insert(&token(2, "b", "b")).unwrap();
        let c = store.insert(&token(1, "c", "c")).unwrap();

        let count = store
            .delete_batch(&[a, b, c, TokenId::new(999)], UserId::new(1))
            .unwrap();
        assert_eq!(count, 2);
        assert!(store.fetch_by_id(b, UserId::new(2)).unwrap().is_some());
        assert_eq!(store.delete_batch(&[], UserId::new(1)).unwrap(), 0);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&token(1, "persist", "kept")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.fetch_by_key("persist", false).unwrap().is_some());
    }
}
