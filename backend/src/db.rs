//! sqlite mirror of the ledger's append-only event log, plus the outbox of pending calls.
//!
//! Coordinates and roots are stored as `0x`-prefixed 32-byte hex, values as decimal text.

use crate::errors::{ApiError, db_err};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use treasury_zk::commitment::LedgerCommitment;
use uuid::Uuid;

pub type Db = Pool<Sqlite>;

pub async fn connect(db_url: &str, max_connections: u32) -> Result<Db, ApiError> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .map_err(db_err)
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS leaves (
  leaf_index INTEGER PRIMARY KEY,
  commitment_json TEXT NOT NULL,
  leaf_hash TEXT NOT NULL,
  observed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roots (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  root TEXT NOT NULL,
  leaf_count INTEGER NOT NULL,
  observed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS spent (
  leaf_index INTEGER PRIMARY KEY,
  marked_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS outbox (
  id TEXT PRIMARY KEY,
  kind TEXT NOT NULL,
  payload_json TEXT NOT NULL,
  status TEXT NOT NULL,
  created_at TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(db_err)?;

    Ok(())
}

#[derive(Clone, Debug)]
pub struct StoredLeaf {
    pub index: u64,
    pub commitment: LedgerCommitment,
    pub leaf_hash: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct StoredRoot {
    pub root: String,
    pub leaf_count: u64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::Internal)
}

pub async fn count_leaves(db: &Db) -> Result<u64, ApiError> {
    let row = sqlx::query(r#"SELECT COUNT(*) AS c FROM leaves"#)
        .fetch_one(db)
        .await
        .map_err(db_err)?;
    let c: i64 = row.get("c");
    Ok(c as u64)
}

/// Appends a leaf. The ledger emits leaves in order, so `index` must be the next free position.
pub async fn insert_leaf(
    db: &Db,
    index: u64,
    commitment: &LedgerCommitment,
    leaf_hash: &str,
) -> Result<(), ApiError> {
    let commitment_json = serde_json::to_string(commitment).map_err(|_| ApiError::Internal)?;
    let mut tx = db.begin().await.map_err(db_err)?;

    let row = sqlx::query(r#"SELECT COUNT(*) AS c FROM leaves"#)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
    let next: i64 = row.get("c");
    if index != next as u64 {
        return Err(ApiError::Conflict(format!("expected leaf index {next}, got {index}")));
    }

    sqlx::query(
        r#"INSERT INTO leaves (leaf_index, commitment_json, leaf_hash, observed_at)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(index as i64)
    .bind(commitment_json)
    .bind(leaf_hash)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await
    .map_err(db_err)?;

    tx.commit().await.map_err(db_err)?;
    Ok(())
}

pub async fn list_leaves(db: &Db, offset: u64, limit: u64) -> Result<Vec<StoredLeaf>, ApiError> {
    let rows = sqlx::query(
        r#"SELECT leaf_index, commitment_json, leaf_hash, observed_at
           FROM leaves
           ORDER BY leaf_index
           LIMIT ? OFFSET ?"#,
    )
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(db)
    .await
    .map_err(db_err)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let index: i64 = row.get(0);
        let commitment_json: String = row.get(1);
        let leaf_hash: String = row.get(2);
        let observed_at: String = row.get(3);

        let commitment: LedgerCommitment =
            serde_json::from_str(&commitment_json).map_err(|_| ApiError::Internal)?;

        out.push(StoredLeaf {
            index: index as u64,
            commitment,
            leaf_hash,
            observed_at: parse_ts(&observed_at)?,
        });
    }
    Ok(out)
}

/// Every leaf in emission order.
pub async fn all_leaves(db: &Db) -> Result<Vec<StoredLeaf>, ApiError> {
    list_leaves(db, 0, i64::MAX as u64).await
}

pub async fn insert_root(db: &Db, root: &str, leaf_count: u64) -> Result<(), ApiError> {
    sqlx::query(r#"INSERT INTO roots (root, leaf_count, observed_at) VALUES (?, ?, ?)"#)
        .bind(root)
        .bind(leaf_count as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(db)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub async fn latest_root(db: &Db) -> Result<Option<StoredRoot>, ApiError> {
    let row = sqlx::query(r#"SELECT root, leaf_count, observed_at FROM roots ORDER BY id DESC LIMIT 1"#)
        .fetch_optional(db)
        .await
        .map_err(db_err)?;

    let Some(row) = row else { return Ok(None); };

    let root: String = row.get(0);
    let leaf_count: i64 = row.get(1);
    let observed_at: String = row.get(2);

    Ok(Some(StoredRoot { root, leaf_count: leaf_count as u64, observed_at: parse_ts(&observed_at)? }))
}

/// Returns `false` if the leaf was already marked.
pub async fn mark_spent(db: &Db, index: u64) -> Result<bool, ApiError> {
    let res = sqlx::query(r#"INSERT OR IGNORE INTO spent (leaf_index, marked_at) VALUES (?, ?)"#)
        .bind(index as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(db)
        .await
        .map_err(db_err)?;
    Ok(res.rows_affected() == 1)
}

pub async fn is_spent(db: &Db, index: u64) -> Result<bool, ApiError> {
    let row = sqlx::query(r#"SELECT COUNT(*) AS c FROM spent WHERE leaf_index = ?"#)
        .bind(index as i64)
        .fetch_one(db)
        .await
        .map_err(db_err)?;
    let c: i64 = row.get("c");
    Ok(c > 0)
}

pub async fn insert_outbox(
    db: &Db,
    id: Uuid,
    kind: &str,
    payload: &serde_json::Value,
) -> Result<DateTime<Utc>, ApiError> {
    let created_at = Utc::now();

    sqlx::query(
        r#"INSERT INTO outbox (id, kind, payload_json, status, created_at)
           VALUES (?, ?, ?, 'pending', ?)"#,
    )
    .bind(id.to_string())
    .bind(kind)
    .bind(payload.to_string())
    .bind(created_at.to_rfc3339())
    .execute(db)
    .await
    .map_err(db_err)?;

    Ok(created_at)
}

pub async fn list_outbox(db: &Db, status: Option<&str>) -> Result<Vec<OutboxEntry>, ApiError> {
    let rows = sqlx::query(
        r#"SELECT id, kind, payload_json, status, created_at
           FROM outbox
           WHERE (? IS NULL OR status = ?)
           ORDER BY created_at"#,
    )
    .bind(status)
    .bind(status)
    .fetch_all(db)
    .await
    .map_err(db_err)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get(0);
        let kind: String = row.get(1);
        let payload_json: String = row.get(2);
        let status: String = row.get(3);
        let created_at: String = row.get(4);

        out.push(OutboxEntry {
            id: Uuid::parse_str(&id).map_err(|_| ApiError::Internal)?,
            kind,
            payload: serde_json::from_str(&payload_json).map_err(|_| ApiError::Internal)?,
            status,
            created_at: parse_ts(&created_at)?,
        });
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) async fn test_db() -> Db {
    let db = connect("sqlite::memory:", 1).await.unwrap();
    init_schema(&db).await.unwrap();
    db
}
