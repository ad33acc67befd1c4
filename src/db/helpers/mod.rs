use std::convert::TryFrom;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_epoch_ms(value: &DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub fn parse_epoch_ms(value: i64, field: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value)
        .single()
        .ok_or_else(|| anyhow!("{field} holds out-of-range timestamp {value}"))
}

pub fn parse_optional_epoch_ms(value: Option<i64>, field: &str) -> Result<Option<DateTime<Utc>>> {
    value.map(|raw| parse_epoch_ms(raw, field)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_ms_round_trip_and_range() {
        let now = parse_epoch_ms(1_700_000_000_123, "start_time").unwrap();
        assert_eq!(to_epoch_ms(&now), 1_700_000_000_123);
        assert!(parse_epoch_ms(i64::MAX, "start_time").is_err());
        assert_eq!(parse_optional_epoch_ms(None, "end_time").unwrap(), None);
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(to_u64(-1, "duration").is_err());
        assert_eq!(to_i64(5).unwrap(), 5);
        assert!(to_i64(u64::MAX).is_err());
    }
}
