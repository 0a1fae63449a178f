//! Bounded per-day break history.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum number of days kept in the history.
pub const HISTORY_LIMIT: usize = 90;

/// Breaks per calendar day, newest `HISTORY_LIMIT` days only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyHistory {
    days: BTreeMap<NaiveDate, u32>,
}

impl DailyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<u32> {
        self.days.get(&date).copied()
    }

    /// Set the count for `date`, then drop the oldest days beyond the limit.
    pub fn upsert(&mut self, date: NaiveDate, count: u32) {
        self.days.insert(date, count);
        self.evict();
    }

    /// Newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.days.iter().rev().take(n).map(|(d, c)| (*d, *c))
    }

    /// Mean of the newest `window` entries; 0.0 when empty.
    pub fn average(&self, window: usize) -> f64 {
        let (sum, n) = self
            .recent(window)
            .fold((0u64, 0u32), |(sum, n), (_, c)| (sum + u64::from(c), n + 1));
        if n == 0 {
            return 0.0;
        }
        sum as f64 / f64::from(n)
    }

    pub fn oldest(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    fn evict(&mut self) {
        while self.days.len() > HISTORY_LIMIT {
            self.days.pop_first();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    #[test]
    fn never_exceeds_limit() {
        let mut history = DailyHistory::new();
        for n in 0..HISTORY_LIMIT as i64 {
            history.upsert(day(n), 1);
        }
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.oldest(), Some(day(0)));

        history.upsert(day(HISTORY_LIMIT as i64), 1);
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.oldest(), Some(day(1)));
        assert!(history.get(day(0)).is_none());
    }

    #[test]
    fn upsert_overwrites_same_day() {
        let mut history = DailyHistory::new();
        history.upsert(day(0), 1);
        history.upsert(day(0), 4);
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(day(0)), Some(4));
    }

    #[test]
    fn average_uses_most_recent_window() {
        let mut history = DailyHistory::new();
        assert_eq!(history.average(7), 0.0);

        // Ten days; the oldest three carry a large count that must be ignored.
        for n in 0..10 {
            history.upsert(day(n), if n < 3 { 100 } else { 2 });
        }
        assert_eq!(history.average(7), 2.0);

        let mut short = DailyHistory::new();
        short.upsert(day(0), 1);
        short.upsert(day(1), 4);
        assert_eq!(short.average(7), 2.5);
    }

    #[test]
    fn serializes_as_date_keyed_map() {
        let mut history = DailyHistory::new();
        history.upsert(day(0), 3);
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"{"2024-01-01":3}"#);
        let back: DailyHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
