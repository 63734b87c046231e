use std::fmt::Write;

use crate::metrics::{outer_join, Dashboard, Series};

fn write_series(output: &mut String, heading: &str, series: &Series) {
    let _ = writeln!(output, "### {heading}");
    if series.is_empty() {
        let _ = writeln!(output, "No records in this snapshot.");
    } else {
        let _ = writeln!(output, "| period | value |");
        let _ = writeln!(output, "|---|---|");
        for (key, value) in series {
            let _ = writeln!(output, "| {key} | {value} |");
        }
    }
    let _ = writeln!(output);
}

fn write_joined(output: &mut String, heading: &str, weekly: &Series, monthly: &Series) {
    let _ = writeln!(output, "### {heading}");
    let joined = outer_join(weekly, monthly);
    if joined.is_empty() {
        let _ = writeln!(output, "No records in this snapshot.");
    } else {
        let _ = writeln!(output, "| period | week | month |");
        let _ = writeln!(output, "|---|---|---|");
        for (key, (week, month)) in joined {
            let _ = writeln!(
                output,
                "| {key} | {} | {} |",
                week.map(|v| v.to_string()).unwrap_or_default(),
                month.map(|v| v.to_string()).unwrap_or_default()
            );
        }
    }
    let _ = writeln!(output);
}

/// Markdown rendition of the dashboard views, minus the raw tables.
pub fn build_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();
    let totals = &dashboard.totals;

    let _ = writeln!(output, "# Bot Analytics Report");
    let _ = writeln!(
        output,
        "Snapshot taken {} UTC",
        dashboard.fetched_at.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Totals");
    let _ = writeln!(output, "- Users: {}", totals.users);
    let _ = writeln!(output, "- Interactions: {}", totals.actions);
    let _ = writeln!(output, "- Distinct active users: {}", totals.distinct_users);
    let _ = writeln!(output, "- Broadcasts: {}", totals.broadcasts);
    let _ = writeln!(output, "- Messages delivered: {}", totals.recipients);
    let _ = writeln!(output);

    let _ = writeln!(output, "## User Growth");
    write_series(&mut output, "New users by day", &dashboard.growth_day);
    write_series(&mut output, "New users by week", &dashboard.growth_week);
    write_series(&mut output, "New users by month", &dashboard.growth_month);

    let _ = writeln!(output, "## Activity");
    write_series(&mut output, "Interactions per day", &dashboard.actions_day);
    write_series(&mut output, "Unique users per day", &dashboard.active_day);
    write_joined(
        &mut output,
        "Interactions: week / month",
        &dashboard.actions_week,
        &dashboard.actions_month,
    );
    write_joined(
        &mut output,
        "Unique users: week / month",
        &dashboard.active_week,
        &dashboard.active_month,
    );

    let _ = writeln!(output, "## Broadcasts");
    write_joined(
        &mut output,
        "Broadcasts sent: week / month",
        &dashboard.broadcasts_sent_week,
        &dashboard.broadcasts_sent_month,
    );
    write_joined(
        &mut output,
        "Messages delivered: week / month",
        &dashboard.delivered_week,
        &dashboard.delivered_month,
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Broadcast, LogEntry, Snapshot, User};
    use chrono::{TimeZone, Utc};

    #[test]
    fn empty_snapshot_reports_no_records() {
        let dashboard = Dashboard::compute(&Snapshot::empty(Utc::now()));
        let report = build_report(&dashboard);
        assert!(report.starts_with("# Bot Analytics Report"));
        assert!(report.contains("- Users: 0"));
        assert_eq!(report.matches("No records in this snapshot.").count(), 9);
    }

    #[test]
    fn report_lists_bucketed_values() {
        let at = |d: u32| Utc.with_ymd_and_hms(2024, 2, d, 9, 30, 0).unwrap();
        let mut snapshot = Snapshot::empty(at(28));
        snapshot.users = vec![
            User { id: Some("1".into()), created_at: at(5) },
            User { id: Some("2".into()), created_at: at(5) },
        ];
        snapshot.logs = vec![LogEntry {
            created_at: at(6),
            user_id: Some("1".into()),
        }];
        snapshot.broadcasts = vec![Broadcast {
            created_at: at(7),
            recipients: vec!["1".into(), "2".into(), "3".into()],
        }];

        let report = build_report(&Dashboard::compute(&snapshot));
        assert!(report.contains("| 2024-02-05 | 2 |"));
        assert!(report.contains("| 2024-02-05 | 3 |  |"));
        assert!(report.contains("| 2024-02-01 |  | 3 |"));
        assert!(report.contains("- Messages delivered: 3"));
    }
}
