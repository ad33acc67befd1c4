//! Session record.
//!
//! A session is one focus interval against a card. Card and board fields are
//! copied at start time; `duration` is the authoritative elapsed seconds
//! measured by the timer and is not derived from `end_time - start_time`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// May point at an account that has since been removed.
    pub account_id: String,
    pub user_id: String,
    pub card_id: String,
    pub card_title: String,
    pub card_number: i64,
    pub board_id: String,
    pub board_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: u64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub synced: bool,
}
