//! Read-time grouping of sessions for the history view.
//!
//! Nothing here is persisted. Merged rows are synthetic: they borrow the id
//! of their newest member and list every member in `merged_ids`, so deleting
//! a merged row has to go through [`SessionView::underlying_ids`].

use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
};

use chrono::{Local, NaiveDate, TimeZone};
use serde::Serialize;

use crate::db::Session;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_count: Option<usize>,
}

impl SessionView {
    fn single(session: Session) -> Self {
        Self {
            session,
            merged_ids: None,
            session_count: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.merged_ids.is_some()
    }

    /// Ids of the stored sessions behind this row.
    pub fn underlying_ids(&self) -> Vec<String> {
        match &self.merged_ids {
            Some(ids) => ids.clone(),
            None => vec![self.session.id.clone()],
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayGroup {
    pub date: NaiveDate,
    pub label: String,
    pub sessions: Vec<SessionView>,
    pub total_secs: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardTotal {
    pub card_id: String,
    pub board_id: String,
    pub card_title: String,
    pub board_name: String,
    pub total_secs: u64,
    pub session_count: usize,
}

pub fn total_duration(sessions: &[Session]) -> u64 {
    sessions
        .iter()
        .fold(0u64, |acc, session| acc.saturating_add(session.duration))
}

/// Bucket by `(card_id, board_id)`, keeping first-seen order.
fn bucket_by_card<'a, I>(sessions: I) -> Vec<Vec<&'a Session>>
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut buckets: Vec<Vec<&Session>> = Vec::new();
    for session in sessions {
        let key = (session.card_id.as_str(), session.board_id.as_str());
        match index.get(&key) {
            Some(&slot) => buckets[slot].push(session),
            None => {
                index.insert(key, buckets.len());
                buckets.push(vec![session]);
            }
        }
    }
    buckets
}

fn merge_bucket(bucket: &[&Session]) -> Option<SessionView> {
    let newest = bucket.iter().max_by_key(|session| session.start_time)?;
    if bucket.len() == 1 {
        return Some(SessionView::single((*newest).clone()));
    }

    let mut merged = (*newest).clone();
    merged.duration = bucket.iter().map(|s| s.duration).fold(0, u64::saturating_add);
    merged.start_time = bucket.iter().map(|s| s.start_time).min()?;
    merged.end_time = bucket.iter().filter_map(|s| s.end_time).max();
    merged.synced = bucket.iter().all(|s| s.synced);

    let mut ids: Vec<&Session> = bucket.to_vec();
    ids.sort_by_key(|s| s.start_time);
    Some(SessionView {
        session: merged,
        merged_ids: Some(ids.into_iter().map(|s| s.id.clone()).collect()),
        session_count: Some(bucket.len()),
    })
}

/// Collapse sessions on the same card and board into one row each.
/// Callers are expected to pass a single day's sessions.
pub fn merge_card_sessions(sessions: &[Session]) -> Vec<SessionView> {
    let mut views: Vec<SessionView> = bucket_by_card(sessions)
        .iter()
        .filter_map(|bucket| merge_bucket(bucket))
        .collect();
    views.sort_by(|a, b| b.session.start_time.cmp(&a.session.start_time));
    views
}

/// Group by local calendar day of `start_time`, newest day first.
pub fn group_by_date(sessions: &[Session]) -> Vec<DayGroup> {
    group_by_date_in(sessions, &Local)
}

pub fn group_by_date_in<Tz: TimeZone>(sessions: &[Session], tz: &Tz) -> Vec<DayGroup> {
    let mut days: HashMap<NaiveDate, Vec<Session>> = HashMap::new();
    for session in sessions {
        let date = session.start_time.with_timezone(tz).date_naive();
        days.entry(date).or_default().push(session.clone());
    }

    let mut groups: Vec<DayGroup> = days
        .into_iter()
        .map(|(date, day_sessions)| DayGroup {
            date,
            label: date.format("%a %b %-d %Y").to_string(),
            total_secs: total_duration(&day_sessions),
            sessions: merge_card_sessions(&day_sessions),
        })
        .collect();
    groups.sort_by(|a, b| b.date.cmp(&a.date));
    groups
}

/// Per-card totals across the whole list, largest first.
pub fn card_totals(sessions: &[Session]) -> Vec<CardTotal> {
    let mut totals: Vec<CardTotal> = bucket_by_card(sessions)
        .into_iter()
        .filter_map(|bucket| {
            let newest = bucket.iter().max_by_key(|session| session.start_time)?;
            Some(CardTotal {
                card_id: newest.card_id.clone(),
                board_id: newest.board_id.clone(),
                card_title: newest.card_title.clone(),
                board_name: newest.board_name.clone(),
                total_secs: bucket.iter().map(|s| s.duration).fold(0, u64::saturating_add),
                session_count: bucket.len(),
            })
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total_secs
            .cmp(&a.total_secs)
            .then_with(|| a.card_title.cmp(&b.card_title))
    });
    totals
}

/// Covers every field, so any edit to a stored session invalidates the cache.
fn fingerprint(sessions: &[Session]) -> u64 {
    let mut hasher = DefaultHasher::new();
    sessions.hash(&mut hasher);
    hasher.finish()
}

/// Memoizes [`group_by_date`] for an unchanged session list.
#[derive(Debug, Default)]
pub struct HistoryCache {
    key: Option<u64>,
    groups: Vec<DayGroup>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&mut self, sessions: &[Session]) -> &[DayGroup] {
        let key = fingerprint(sessions);
        if self.key != Some(key) {
            self.groups = group_by_date(sessions);
            self.key = Some(key);
        }
        &self.groups
    }

    pub fn is_fresh_for(&self, sessions: &[Session]) -> bool {
        self.key == Some(fingerprint(sessions))
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.groups.clear();
    }
}
