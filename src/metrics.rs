use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::bucket::{bucket_records, Granularity};
use crate::models::{Broadcast, LogEntry, Snapshot, Timestamped, User};

/// Per-bucket values ordered by bucket key. Buckets with no records are absent.
pub type Series = BTreeMap<NaiveDate, u64>;

/// Two series aligned on bucket key; a side is `None` where it has no bucket.
pub type JoinedSeries = BTreeMap<NaiveDate, (Option<u64>, Option<u64>)>;

fn count_per_bucket<T: Timestamped>(records: &[T], granularity: Granularity) -> Series {
    let mut series = Series::new();
    for (key, _) in bucket_records(records, granularity) {
        *series.entry(key).or_insert(0) += 1;
    }
    series
}

/// Registered users per bucket.
pub fn growth(users: &[User], granularity: Granularity) -> Series {
    count_per_bucket(users, granularity)
}

/// Logged bot interactions per bucket.
pub fn actions(logs: &[LogEntry], granularity: Granularity) -> Series {
    count_per_bucket(logs, granularity)
}

/// Distinct users with at least one interaction per bucket. Entries without a
/// user id never count towards a bucket, but the bucket still appears.
pub fn active_users(logs: &[LogEntry], granularity: Granularity) -> Series {
    let mut seen: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    for (key, entry) in bucket_records(logs, granularity) {
        let users = seen.entry(key).or_default();
        if let Some(user_id) = entry.user_id.as_deref() {
            users.insert(user_id);
        }
    }

    seen.into_iter()
        .map(|(key, users)| (key, users.len() as u64))
        .collect()
}

pub fn broadcasts_sent(broadcasts: &[Broadcast], granularity: Granularity) -> Series {
    count_per_bucket(broadcasts, granularity)
}

/// Sum of recipients over the broadcasts of each bucket.
pub fn broadcasts_delivered(broadcasts: &[Broadcast], granularity: Granularity) -> Series {
    let mut series = Series::new();
    for (key, broadcast) in bucket_records(broadcasts, granularity) {
        *series.entry(key).or_insert(0) += broadcast.recipients_count();
    }
    series
}

pub fn outer_join(left: &Series, right: &Series) -> JoinedSeries {
    let mut joined = JoinedSeries::new();
    for (key, value) in left {
        joined.entry(*key).or_insert((None, None)).0 = Some(*value);
    }
    for (key, value) in right {
        joined.entry(*key).or_insert((None, None)).1 = Some(*value);
    }
    joined
}

/// Fills every bucket between the first and last key with 0 so charts have
/// no gaps. Aggregates themselves stay sparse.
pub fn zero_fill(series: &Series, granularity: Granularity) -> Series {
    let (Some((&first, _)), Some((&last, _))) = (series.first_key_value(), series.last_key_value())
    else {
        return Series::new();
    };

    let mut filled = Series::new();
    let mut cursor = Some(first);
    while let Some(key) = cursor {
        if key > last {
            break;
        }
        filled.insert(key, series.get(&key).copied().unwrap_or(0));
        cursor = granularity.next(key);
    }
    filled
}

#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub users: u64,
    pub actions: u64,
    pub distinct_users: u64,
    pub broadcasts: u64,
    pub recipients: u64,
}

/// Every series the dashboard views draw from one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub fetched_at: DateTime<Utc>,
    pub totals: Totals,
    pub growth_day: Series,
    pub growth_week: Series,
    pub growth_month: Series,
    pub actions_day: Series,
    pub actions_week: Series,
    pub actions_month: Series,
    pub active_day: Series,
    pub active_week: Series,
    pub active_month: Series,
    pub broadcasts_sent_week: Series,
    pub broadcasts_sent_month: Series,
    pub delivered_week: Series,
    pub delivered_month: Series,
}

impl Dashboard {
    pub fn compute(snapshot: &Snapshot) -> Self {
        let distinct_users = snapshot
            .logs
            .iter()
            .filter_map(|entry| entry.user_id.as_deref())
            .collect::<BTreeSet<_>>()
            .len() as u64;

        let totals = Totals {
            users: snapshot.users.len() as u64,
            actions: snapshot.logs.len() as u64,
            distinct_users,
            broadcasts: snapshot.broadcasts.len() as u64,
            recipients: snapshot
                .broadcasts
                .iter()
                .map(Broadcast::recipients_count)
                .sum(),
        };

        Self {
            fetched_at: snapshot.fetched_at,
            totals,
            growth_day: growth(&snapshot.users, Granularity::Day),
            growth_week: growth(&snapshot.users, Granularity::Week),
            growth_month: growth(&snapshot.users, Granularity::Month),
            actions_day: actions(&snapshot.logs, Granularity::Day),
            actions_week: actions(&snapshot.logs, Granularity::Week),
            actions_month: actions(&snapshot.logs, Granularity::Month),
            active_day: active_users(&snapshot.logs, Granularity::Day),
            active_week: active_users(&snapshot.logs, Granularity::Week),
            active_month: active_users(&snapshot.logs, Granularity::Month),
            broadcasts_sent_week: broadcasts_sent(&snapshot.broadcasts, Granularity::Week),
            broadcasts_sent_month: broadcasts_sent(&snapshot.broadcasts, Granularity::Month),
            delivered_week: broadcasts_delivered(&snapshot.broadcasts, Granularity::Week),
            delivered_month: broadcasts_delivered(&snapshot.broadcasts, Granularity::Month),
        }
    }
}
