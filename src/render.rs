//! Server-side HTML for the login form and the four dashboard views.

use std::fmt::Write;

use crate::bucket::{bucket_key, Granularity};
use crate::chart::{self, ChartKind, ChartSeries};
use crate::metrics::{outer_join, zero_fill, Dashboard, Series};
use crate::models::{RawTable, Snapshot};

const TITLE: &str = "Bot Analytics";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Growth,
    Activity,
    Broadcasts,
    Tables,
}

impl View {
    pub const ALL: [View; 4] = [View::Growth, View::Activity, View::Broadcasts, View::Tables];

    /// Unknown or missing names fall back to the first view.
    pub fn from_query(name: Option<&str>) -> Self {
        match name {
            Some("activity") => View::Activity,
            Some("broadcasts") => View::Broadcasts,
            Some("tables") => View::Tables,
            _ => View::Growth,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            View::Growth => "growth",
            View::Activity => "activity",
            View::Broadcasts => "broadcasts",
            View::Tables => "tables",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            View::Growth => "User Growth",
            View::Activity => "Activity",
            View::Broadcasts => "Broadcasts",
            View::Tables => "Raw Tables",
        }
    }
}

/// Escape HTML special characters
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn styles() -> &'static str {
    r#"
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; background: #f5f5f5; color: #333; }
    header { background: #4a90d9; color: white; padding: 12px 24px; }
    header h1 { margin: 0; font-size: 1.4em; }
    main { padding: 16px 24px; }
    nav a { display: inline-block; padding: 8px 16px; margin-right: 4px; background: #e4e9f0; color: #333; text-decoration: none; border-radius: 4px 4px 0 0; }
    nav a.active { background: white; font-weight: bold; }
    section { background: white; padding: 16px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); margin-bottom: 20px; }
    .chart { width: 100%; max-width: 900px; height: auto; }
    details { margin: 8px 0 20px; }
    table { border-collapse: collapse; background: white; margin: 8px 0; }
    th, td { border: 1px solid #ddd; padding: 4px 10px; text-align: left; font-size: 0.9em; }
    th { background: #4a90d9; color: white; }
    tr:nth-child(even) { background: #f9f9f9; }
    .totals span { display: inline-block; margin-right: 24px; }
    .error { color: #cc0000; }
    .empty { color: #888; font-style: italic; }
    form.login { max-width: 320px; background: white; padding: 24px; margin: 48px auto; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
    form.login input { display: block; width: 100%; margin: 6px 0 14px; padding: 6px; box-sizing: border-box; }
    .footer { font-size: 0.8em; color: #888; text-align: center; margin: 20px; }
    "#
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{} - {TITLE}</title>\n<style>{}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_html(title),
        styles(),
    )
}

pub fn login_page(error: Option<&str>) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        "<header><h1>{TITLE}</h1></header>\n<form class=\"login\" method=\"post\" action=\"/login\">\n<h2>Sign in</h2>\n"
    );
    if let Some(error) = error {
        let _ = writeln!(body, "<p class=\"error\">{}</p>", escape_html(error));
    }
    body.push_str(
        "<label>Username<input name=\"username\" autocomplete=\"username\" required></label>\n\
         <label>Password<input name=\"password\" type=\"password\" autocomplete=\"current-password\" required></label>\n\
         <button type=\"submit\">Sign in</button>\n</form>\n",
    );
    page("Sign in", &body)
}

pub fn unavailable_page() -> String {
    let body = format!(
        "<header><h1>{TITLE}</h1></header>\n<main><section>\n<h2>Data unavailable</h2>\n\
         <p class=\"error\">The analytics database could not be read. Nothing is shown until it can be.</p>\n\
         <p><a href=\"/\">Retry</a></p>\n</section></main>\n"
    );
    page("Data unavailable", &body)
}

pub fn dashboard_page(
    view: View,
    dashboard: &Dashboard,
    snapshot: &Snapshot,
    zero_filled: bool,
) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<header><h1>{TITLE}</h1></header>\n<main>");
    write_totals(&mut body, dashboard);
    write_nav(&mut body, view);

    let _ = writeln!(body, "<section>\n<h2>{}</h2>", view.title());
    let plot = Plot { zero_filled };
    match view {
        View::Growth => write_growth(&mut body, dashboard, plot),
        View::Activity => write_activity(&mut body, dashboard, plot),
        View::Broadcasts => write_broadcasts(&mut body, dashboard, plot),
        View::Tables => write_tables(&mut body, snapshot),
    }
    body.push_str("</section>\n</main>\n");
    let _ = writeln!(
        body,
        "<p class=\"footer\">Snapshot taken {} UTC</p>",
        dashboard.fetched_at.format("%Y-%m-%d %H:%M:%S")
    );

    page(view.title(), &body)
}

fn write_totals(body: &mut String, dashboard: &Dashboard) {
    let totals = &dashboard.totals;
    let _ = writeln!(
        body,
        "<p class=\"totals\"><span>Users: <b>{}</b></span><span>Actions: <b>{}</b></span>\
         <span>Active users: <b>{}</b></span><span>Broadcasts: <b>{}</b></span>\
         <span>Messages delivered: <b>{}</b></span></p>",
        totals.users, totals.actions, totals.distinct_users, totals.broadcasts, totals.recipients
    );
}

fn write_nav(body: &mut String, active: View) {
    body.push_str("<nav>");
    for view in View::ALL {
        let class = if view == active { " class=\"active\"" } else { "" };
        let _ = write!(
            body,
            "<a href=\"/?view={}\"{class}>{}</a>",
            view.slug(),
            view.title()
        );
    }
    body.push_str("</nav>\n");
}

/// Chart-side rendering choices shared by the chart views.
#[derive(Clone, Copy)]
struct Plot {
    zero_filled: bool,
}

impl Plot {
    fn prepare(&self, series: &Series, granularity: Granularity) -> Series {
        if self.zero_filled {
            zero_fill(series, granularity)
        } else {
            series.clone()
        }
    }

    fn single(
        &self,
        body: &mut String,
        kind: ChartKind,
        label: &str,
        series: &Series,
        granularity: Granularity,
    ) {
        let plotted = self.prepare(series, granularity);
        body.push_str(&chart::render(kind, &[ChartSeries::new(label, &plotted)]));
        write_series_table(body, granularity.as_str(), label, series);
    }

    fn weekly_monthly(
        &self,
        body: &mut String,
        kind: ChartKind,
        weekly: &Series,
        monthly: &Series,
    ) {
        let week = self.prepare(weekly, Granularity::Week);
        let month = self.prepare(monthly, Granularity::Month);
        body.push_str(&chart::render(
            kind,
            &[ChartSeries::new("week", &week), ChartSeries::new("month", &month)],
        ));
        write_joined_table(body, weekly, monthly);
    }
}

fn write_growth(body: &mut String, dashboard: &Dashboard, plot: Plot) {
    let series = [
        (Granularity::Day, &dashboard.growth_day),
        (Granularity::Week, &dashboard.growth_week),
        (Granularity::Month, &dashboard.growth_month),
    ];
    for (granularity, values) in series {
        let _ = writeln!(body, "<h3>{}</h3>", granularity.label());
        plot.single(body, ChartKind::Bar, "new users", values, granularity);
    }
}

fn write_activity(body: &mut String, dashboard: &Dashboard, plot: Plot) {
    body.push_str("<h3>Interactions per day</h3>\n");
    plot.single(body, ChartKind::Line, "actions", &dashboard.actions_day, Granularity::Day);

    body.push_str("<h3>Unique users per day</h3>\n");
    plot.single(body, ChartKind::Line, "active users", &dashboard.active_day, Granularity::Day);

    body.push_str("<h3>Interactions: week / month</h3>\n");
    plot.weekly_monthly(body, ChartKind::Line, &dashboard.actions_week, &dashboard.actions_month);

    body.push_str("<h3>Unique users: week / month</h3>\n");
    plot.weekly_monthly(body, ChartKind::Line, &dashboard.active_week, &dashboard.active_month);
}

fn write_broadcasts(body: &mut String, dashboard: &Dashboard, plot: Plot) {
    body.push_str("<h3>Broadcasts sent: week / month</h3>\n");
    plot.weekly_monthly(
        body,
        ChartKind::Bar,
        &dashboard.broadcasts_sent_week,
        &dashboard.broadcasts_sent_month,
    );

    body.push_str("<h3>Messages delivered: week / month</h3>\n");
    plot.weekly_monthly(
        body,
        ChartKind::Bar,
        &dashboard.delivered_week,
        &dashboard.delivered_month,
    );
}

fn write_series_table(body: &mut String, key_label: &str, value_label: &str, series: &Series) {
    let _ = writeln!(
        body,
        "<details><summary>Data</summary><table><tr><th>{key_label}</th><th>{value_label}</th></tr>"
    );
    for (key, value) in series {
        let _ = writeln!(body, "<tr><td>{key}</td><td>{value}</td></tr>");
    }
    body.push_str("</table></details>\n");
}

fn write_joined_table(body: &mut String, weekly: &Series, monthly: &Series) {
    body.push_str(
        "<details><summary>Data</summary><table>\
         <tr><th>period</th><th>week</th><th>month</th></tr>\n",
    );
    for (key, (week, month)) in outer_join(weekly, monthly) {
        let _ = writeln!(
            body,
            "<tr><td>{key}</td><td>{}</td><td>{}</td></tr>",
            week.map(|v| v.to_string()).unwrap_or_default(),
            month.map(|v| v.to_string()).unwrap_or_default(),
        );
    }
    body.push_str("</table></details>\n");
}

fn write_tables(body: &mut String, snapshot: &Snapshot) {
    for (name, table) in [
        ("users", users_table(snapshot)),
        ("logs", logs_table(snapshot)),
        ("broadcasts", broadcasts_table(snapshot)),
        ("admins", snapshot.admins.clone()),
    ] {
        let _ = writeln!(
            body,
            "<h3>{name} <small>({} rows, <a href=\"/export/{name}\">CSV</a>)</small></h3>",
            table.len()
        );
        write_raw_table(body, &table);
    }
}

fn write_raw_table(body: &mut String, table: &RawTable) {
    if table.is_empty() {
        body.push_str("<p class=\"empty\">No rows.</p>\n");
        return;
    }

    body.push_str("<table><tr>");
    for column in &table.columns {
        let _ = write!(body, "<th>{}</th>", escape_html(column));
    }
    body.push_str("</tr>\n");
    for row in &table.rows {
        body.push_str("<tr>");
        for cell in row {
            let _ = write!(body, "<td>{}</td>", escape_html(cell));
        }
        body.push_str("</tr>\n");
    }
    body.push_str("</table>\n");
}

fn bucket_cells(ts: chrono::DateTime<chrono::Utc>, granularities: &[Granularity]) -> Vec<String> {
    granularities
        .iter()
        .map(|granularity| bucket_key(ts, *granularity).to_string())
        .collect()
}

/// Users with their derived bucket columns.
pub fn users_table(snapshot: &Snapshot) -> RawTable {
    RawTable {
        columns: ["id", "created_at", "day", "week", "month"].map(String::from).to_vec(),
        rows: snapshot
            .users
            .iter()
            .map(|user| {
                let mut row = vec![
                    user.id.clone().unwrap_or_default(),
                    user.created_at.to_rfc3339(),
                ];
                row.extend(bucket_cells(user.created_at, &Granularity::ALL));
                row
            })
            .collect(),
    }
}

pub fn logs_table(snapshot: &Snapshot) -> RawTable {
    RawTable {
        columns: ["created_at", "user_id", "day", "week", "month"].map(String::from).to_vec(),
        rows: snapshot
            .logs
            .iter()
            .map(|entry| {
                let mut row = vec![
                    entry.created_at.to_rfc3339(),
                    entry.user_id.clone().unwrap_or_default(),
                ];
                row.extend(bucket_cells(entry.created_at, &Granularity::ALL));
                row
            })
            .collect(),
    }
}

pub fn broadcasts_table(snapshot: &Snapshot) -> RawTable {
    RawTable {
        columns: ["created_at", "recipients", "recipients_count", "week", "month"]
            .map(String::from)
            .to_vec(),
        rows: snapshot
            .broadcasts
            .iter()
            .map(|broadcast| {
                let mut row = vec![
                    broadcast.created_at.to_rfc3339(),
                    broadcast.recipients.join(", "),
                    broadcast.recipients_count().to_string(),
                ];
                row.extend(bucket_cells(
                    broadcast.created_at,
                    &[Granularity::Week, Granularity::Month],
                ));
                row
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Broadcast, LogEntry, User};
    use chrono::{TimeZone, Utc};

    fn snapshot() -> Snapshot {
        let at = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap();
        let mut snapshot = Snapshot::empty(at(20));
        snapshot.users = vec![User { id: Some("1".into()), created_at: at(3) }];
        snapshot.logs = vec![
            LogEntry { created_at: at(3), user_id: Some("1".into()) },
            LogEntry { created_at: at(4), user_id: Some("1".into()) },
        ];
        snapshot.broadcasts = vec![Broadcast {
            created_at: at(5),
            recipients: vec!["1".into(), "2".into()],
        }];
        snapshot.admins = RawTable {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec!["1".into(), "<script>alert(1)</script>".into()]],
        };
        snapshot
    }

    #[test]
    fn unknown_view_falls_back_to_growth() {
        assert_eq!(View::from_query(None), View::Growth);
        assert_eq!(View::from_query(Some("nope")), View::Growth);
        for view in View::ALL {
            assert_eq!(View::from_query(Some(view.slug())), view);
        }
    }

    #[test]
    fn login_page_shows_escaped_error() {
        let html = login_page(Some("bad <login>"));
        assert!(html.contains("bad &lt;login&gt;"));
        assert!(html.contains("action=\"/login\""));
        assert!(!login_page(None).contains("class=\"error\""));
    }

    #[test]
    fn each_view_renders_its_sections() {
        let snapshot = snapshot();
        let dashboard = Dashboard::compute(&snapshot);

        let growth = dashboard_page(View::Growth, &dashboard, &snapshot, true);
        assert!(growth.contains("<h2>User Growth</h2>"));
        assert_eq!(growth.matches("<svg").count(), 3);

        let activity = dashboard_page(View::Activity, &dashboard, &snapshot, true);
        assert!(activity.contains("Unique users: week / month"));
        assert_eq!(activity.matches("<svg").count(), 4);

        let broadcasts = dashboard_page(View::Broadcasts, &dashboard, &snapshot, false);
        assert!(broadcasts.contains("Messages delivered: week / month"));
        assert!(broadcasts.contains("<tr><td>2024-01-01</td><td>2</td><td>2</td></tr>"));
    }

    #[test]
    fn tables_view_escapes_raw_cells() {
        let snapshot = snapshot();
        let dashboard = Dashboard::compute(&snapshot);
        let html = dashboard_page(View::Tables, &dashboard, &snapshot, true);

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("href=\"/export/admins\""));
        assert!(html.contains("<td>2024-01-01</td>"));
    }

    #[test]
    fn derived_columns_follow_buckets() {
        let table = broadcasts_table(&snapshot());
        assert_eq!(table.columns[2], "recipients_count");
        assert_eq!(table.rows[0][2], "2");
        assert_eq!(table.rows[0][3], "2024-01-01");
        assert_eq!(table.rows[0][4], "2024-01-01");
    }
}
