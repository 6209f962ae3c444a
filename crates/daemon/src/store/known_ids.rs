use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::security::restrict_to_owner;

const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE known_queries (
    query_key       TEXT PRIMARY KEY,
    updated_at      TEXT NOT NULL
);

CREATE TABLE known_ids (
    query_key       TEXT NOT NULL,
    item_id         TEXT NOT NULL,
    rank            INTEGER NOT NULL,
    PRIMARY KEY (query_key, item_id)
);

CREATE INDEX known_ids_rank_idx
    ON known_ids (query_key, rank);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, MIGRATION_V1_SQL)];

/// Previously reported identifiers, keyed by [`tidewatch_common::Query::key`].
///
/// Ids are kept per key in recency order (rank 0 = most recent). Each
/// [`replace`](Self::replace) is one committed transaction, so there is no
/// separate flush step.
#[derive(Debug)]
pub struct KnownIdStore {
    conn: Connection,
}

impl KnownIdStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create known-id store directory `{}`", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open known-id store at `{}`", path.display()))?;
        let store = Self::from_connection(conn)?;
        restrict_to_owner(path)?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )
        .context("failed to configure sqlite pragmas for known-id store")?;

        ensure_migration_table(&conn)?;
        apply_pending_migrations(&mut conn)?;

        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> Result<i64> {
        current_schema_version(&self.conn)
    }

    /// Whether anything was ever recorded for `key`.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM known_queries WHERE query_key = ?1", params![key], |_| Ok(()))
            .optional()
            .context("failed to check known-id key")?;
        Ok(found.is_some())
    }

    /// Known ids for `key`, most recent first. An unknown key reads as an
    /// empty list; nothing is written.
    pub fn load(&self, key: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT item_id FROM known_ids WHERE query_key = ?1 ORDER BY rank ASC")
            .context("failed to prepare known-id query")?;
        let rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query known ids")?;
        rows.collect::<std::result::Result<Vec<_>, _>>().context("failed to collect known ids")
    }

    pub fn count(&self, key: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM known_ids WHERE query_key = ?1", params![key], |row| {
                row.get(0)
            })
            .context("failed to count known ids")?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT query_key FROM known_queries ORDER BY query_key ASC")
            .context("failed to prepare known-key query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to query known keys")?;
        rows.collect::<std::result::Result<Vec<_>, _>>().context("failed to collect known keys")
    }

    /// Overwrite the known ids for `key` with `ids` (most recent first).
    /// Duplicates after the first occurrence are dropped.
    pub fn replace<S: AsRef<str>>(&mut self, key: &str, ids: &[S]) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start known-id transaction")?;
        tx.execute("DELETE FROM known_ids WHERE query_key = ?1", params![key])
            .context("failed to clear known ids")?;
        {
            let mut insert = tx
                .prepare(
                    "INSERT OR IGNORE INTO known_ids (query_key, item_id, rank) \
                     VALUES (?1, ?2, ?3)",
                )
                .context("failed to prepare known-id insert")?;
            for (rank, id) in ids.iter().enumerate() {
                let rank = i64::try_from(rank).context("known-id rank overflow")?;
                insert
                    .execute(params![key, id.as_ref(), rank])
                    .context("failed to insert known id")?;
            }
        }
        tx.execute(
            "INSERT INTO known_queries (query_key, updated_at) VALUES (?1, datetime('now')) \
             ON CONFLICT(query_key) DO UPDATE SET updated_at = excluded.updated_at",
            params![key],
        )
        .context("failed to record known-id key")?;
        tx.commit().with_context(|| format!("failed to commit known ids for `{key}`"))
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, error)| error).context("failed to close known-id store")
    }
}

fn ensure_migration_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );
        ",
    )
    .context("failed to ensure schema_migrations table exists")
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))
        .context("failed to read current schema version")
}

fn apply_pending_migrations(conn: &mut Connection) -> Result<()> {
    let mut current_version = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }

        let tx = conn.transaction().context("failed to start migration transaction")?;
        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply known-id store migration v{version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            params![version],
        )
        .with_context(|| format!("failed to record migration v{version}"))?;
        tx.commit().with_context(|| format!("failed to commit migration v{version}"))?;
        current_version = *version;
    }

    Ok(())
}
