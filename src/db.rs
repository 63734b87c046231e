use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Executor, PgConnection, PgPool, Row, Statement, TypeInfo};
use uuid::Uuid;

use crate::models::{Broadcast, LogEntry, RawTable, Snapshot, User};

/// Where dashboard snapshots come from.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn load(&self) -> anyhow::Result<Snapshot>;
}

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

#[derive(Clone, Debug)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotSource for PgSource {
    async fn load(&self) -> anyhow::Result<Snapshot> {
        fetch_snapshot(&self.pool).await
    }
}

/// Reads the four tables inside one read-only transaction so they describe the
/// same moment.
pub async fn fetch_snapshot(pool: &PgPool) -> anyhow::Result<Snapshot> {
    let mut tx = pool.begin().await.context("failed to open transaction")?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let users = fetch_users(&mut tx).await?;
    let logs = fetch_logs(&mut tx).await?;
    let broadcasts = fetch_broadcasts(&mut tx).await?;
    let admins = fetch_raw(&mut tx, "SELECT * FROM admins")
        .await
        .context("failed to read admins")?;

    tx.rollback().await?;

    Ok(Snapshot {
        users,
        logs,
        broadcasts,
        admins,
        fetched_at: Utc::now(),
    })
}

async fn fetch_users(conn: &mut PgConnection) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query("SELECT * FROM users")
        .fetch_all(&mut *conn)
        .await
        .context("failed to read users")?;

    let mut users = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        let Some(created_at) = timestamp(&row, "created_at")? else {
            skipped += 1;
            continue;
        };
        let id = row
            .try_column("id")
            .ok()
            .and_then(|column| cell_value(&row, column.ordinal()));
        users.push(User { id, created_at });
    }

    report_skipped("users", skipped);
    Ok(users)
}

async fn fetch_logs(conn: &mut PgConnection) -> anyhow::Result<Vec<LogEntry>> {
    let rows = sqlx::query("SELECT created_at, user_id::text AS user_id FROM logs")
        .fetch_all(&mut *conn)
        .await
        .context("failed to read logs")?;

    let mut logs = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        let Some(created_at) = timestamp(&row, "created_at")? else {
            skipped += 1;
            continue;
        };
        logs.push(LogEntry {
            created_at,
            user_id: row.try_get("user_id")?,
        });
    }

    report_skipped("logs", skipped);
    Ok(logs)
}

async fn fetch_broadcasts(conn: &mut PgConnection) -> anyhow::Result<Vec<Broadcast>> {
    // to_jsonb folds every array element type and json/jsonb into one shape.
    let rows =
        sqlx::query("SELECT created_at, to_jsonb(recipients) AS recipients FROM broadcasts")
            .fetch_all(&mut *conn)
            .await
            .context("failed to read broadcasts")?;

    let mut broadcasts = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        let Some(created_at) = timestamp(&row, "created_at")? else {
            skipped += 1;
            continue;
        };
        broadcasts.push(Broadcast {
            created_at,
            recipients: recipients_from_json(row.try_get("recipients")?)?,
        });
    }

    report_skipped("broadcasts", skipped);
    Ok(broadcasts)
}

/// Column names come from the prepared statement, so an empty table still
/// has a header.
async fn fetch_raw(conn: &mut PgConnection, query: &str) -> anyhow::Result<RawTable> {
    let statement = (&mut *conn).prepare(query).await?;
    let columns = statement
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();

    let rows = statement.query().fetch_all(&mut *conn).await?;
    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|idx| cell_text(row, idx)).collect())
        .collect();

    Ok(RawTable { columns, rows })
}

fn report_skipped(table: &str, skipped: usize) {
    if skipped > 0 {
        tracing::warn!(table, skipped, "dropped rows with NULL created_at");
    }
}

/// Accepts `timestamptz`, `timestamp` (read as UTC) and `date` (midnight UTC).
fn timestamp(row: &PgRow, column: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
    if let Ok(value) = row.try_get::<Option<DateTime<Utc>>, _>(column) {
        return Ok(value);
    }
    if let Ok(value) = row.try_get::<Option<NaiveDateTime>, _>(column) {
        return Ok(value.map(|naive| naive.and_utc()));
    }
    let value: Option<NaiveDate> = row
        .try_get(column)
        .with_context(|| format!("column {column} is not a timestamp"))?;
    Ok(value.and_then(|date| date.and_hms_opt(0, 0, 0)).map(|naive| naive.and_utc()))
}

/// Any JSON array; NULL reads as no recipients.
fn recipients_from_json(value: Option<serde_json::Value>) -> anyhow::Result<Vec<String>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => Ok(items.iter().map(json_text).collect()),
        Some(other) => bail!("recipients holds a non-array value: {other}"),
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

macro_rules! cell_as {
    ($row:expr, $idx:expr, $ty:ty, $render:expr) => {
        if let Ok(value) = $row.try_get::<Option<$ty>, _>($idx) {
            return value.map($render);
        }
    };
}

/// Renders any cell as text. `None` means SQL NULL.
fn cell_value(row: &PgRow, idx: usize) -> Option<String> {
    cell_as!(row, idx, String, |v: String| v);
    cell_as!(row, idx, i64, |v: i64| v.to_string());
    cell_as!(row, idx, i32, |v: i32| v.to_string());
    cell_as!(row, idx, i16, |v: i16| v.to_string());
    cell_as!(row, idx, bool, |v: bool| v.to_string());
    cell_as!(row, idx, f64, |v: f64| v.to_string());
    cell_as!(row, idx, f32, |v: f32| v.to_string());
    cell_as!(row, idx, DateTime<Utc>, |v: DateTime<Utc>| v.to_rfc3339());
    cell_as!(row, idx, NaiveDateTime, |v: NaiveDateTime| v.to_string());
    cell_as!(row, idx, NaiveDate, |v: NaiveDate| v.to_string());
    cell_as!(row, idx, Uuid, |v: Uuid| v.to_string());
    cell_as!(row, idx, serde_json::Value, |v: serde_json::Value| v.to_string());
    cell_as!(row, idx, Vec<i64>, |v: Vec<i64>| format!("{v:?}"));
    cell_as!(row, idx, Vec<i32>, |v: Vec<i32>| format!("{v:?}"));
    cell_as!(row, idx, Vec<String>, |v: Vec<String>| format!("{v:?}"));

    Some(format!("<{}>", row.column(idx).type_info().name()))
}

/// Verbatim display form; NULL becomes an empty string.
fn cell_text(row: &PgRow, idx: usize) -> String {
    cell_value(row, idx).unwrap_or_default()
}
