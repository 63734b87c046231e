use anyhow::Context;

use crate::models::{RawTable, Snapshot};
use crate::render::{broadcasts_table, logs_table, users_table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTable {
    Users,
    Logs,
    Broadcasts,
    Admins,
}

impl ExportTable {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "users" => Some(Self::Users),
            "logs" => Some(Self::Logs),
            "broadcasts" => Some(Self::Broadcasts),
            "admins" => Some(Self::Admins),
            _ => None,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Users => "users.csv",
            Self::Logs => "logs.csv",
            Self::Broadcasts => "broadcasts.csv",
            Self::Admins => "admins.csv",
        }
    }

    fn table(self, snapshot: &Snapshot) -> RawTable {
        match self {
            Self::Users => users_table(snapshot),
            Self::Logs => logs_table(snapshot),
            Self::Broadcasts => broadcasts_table(snapshot),
            Self::Admins => snapshot.admins.clone(),
        }
    }
}

pub fn to_csv(table: ExportTable, snapshot: &Snapshot) -> anyhow::Result<Vec<u8>> {
    let table = table.table(snapshot);
    let mut writer = csv::Writer::from_writer(Vec::new());
    if !table.columns.is_empty() {
        writer.write_record(&table.columns)?;
    }
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.into_inner().context("failed to flush CSV")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Broadcast;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_known_table_names_only() {
        assert_eq!(ExportTable::from_name("logs"), Some(ExportTable::Logs));
        assert_eq!(ExportTable::from_name("admins"), Some(ExportTable::Admins));
        assert_eq!(ExportTable::from_name("secrets"), None);
    }

    #[test]
    fn broadcasts_csv_quotes_recipient_lists() {
        let mut snapshot = Snapshot::empty(Utc::now());
        snapshot.broadcasts = vec![Broadcast {
            created_at: Utc.with_ymd_and_hms(2024, 3, 13, 8, 0, 0).unwrap(),
            recipients: vec!["10".into(), "11".into()],
        }];

        let csv = String::from_utf8(to_csv(ExportTable::Broadcasts, &snapshot).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("created_at,recipients,recipients_count,week,month"));
        assert_eq!(
            lines.next(),
            Some("2024-03-13T08:00:00+00:00,\"10, 11\",2,2024-03-11,2024-03-01")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_admins_export_has_no_rows() {
        let snapshot = Snapshot::empty(Utc::now());
        let csv = to_csv(ExportTable::Admins, &snapshot).unwrap();
        assert!(String::from_utf8(csv).unwrap().trim().is_empty());
    }

    #[test]
    fn admins_without_rows_keep_their_header() {
        let mut snapshot = Snapshot::empty(Utc::now());
        snapshot.admins = RawTable {
            columns: vec!["id".into(), "name".into()],
            rows: Vec::new(),
        };
        let csv = to_csv(ExportTable::Admins, &snapshot).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "id,name\n");
    }
}
