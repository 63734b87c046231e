use chrono::{DateTime, Utc};
use serde::Serialize;

/// Anything carrying the timestamp the dashboard buckets on.
pub trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One bot interaction. `user_id` keeps the column's text form, whatever its
/// SQL type, so distinct counts work on integer, text and uuid ids alike.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Broadcast {
    pub created_at: DateTime<Utc>,
    pub recipients: Vec<String>,
}

impl Broadcast {
    pub fn recipients_count(&self) -> u64 {
        self.recipients.len() as u64
    }
}

impl Timestamped for User {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for LogEntry {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Broadcast {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A table read verbatim: column names and stringified cells, row-major.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One immutable load of the four source tables.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub logs: Vec<LogEntry>,
    pub broadcasts: Vec<Broadcast>,
    pub admins: RawTable,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    #[cfg(test)]
    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        Self {
            users: Vec::new(),
            logs: Vec::new(),
            broadcasts: Vec::new(),
            admins: RawTable::default(),
            fetched_at,
        }
    }
}
