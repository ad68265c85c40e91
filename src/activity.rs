// src/activity.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    /// Filled in by the connector, e.g. "tracker", "calendar".
    #[serde(default)]
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

impl Activity {
    pub fn new(source: impl Into<String>, timestamp: DateTime<Utc>, title: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timestamp,
            title: title.into(),
            url: None,
            kind: None,
        }
    }

    /// True when the activity falls on `date` (UTC calendar day).
    pub fn is_on(&self, date: NaiveDate) -> bool {
        self.timestamp.date_naive() == date
    }
}

/// Results arrive in completion order; sort here when output must be stable.
/// Ties on timestamp fall back to source, then title.
pub fn sort_chronologically(activities: &mut [Activity]) {
    activities.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.title.cmp(&b.title))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn sorts_by_time_then_source() {
        let mut v = vec![
            Activity::new("git", at(10, 0), "push"),
            Activity::new("calendar", at(9, 0), "standup"),
            Activity::new("calendar", at(10, 0), "review"),
        ];
        sort_chronologically(&mut v);
        let titles: Vec<_> = v.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["standup", "review", "push"]);
    }

    #[test]
    fn is_on_uses_utc_day() {
        let a = Activity::new("git", at(23, 59), "late commit");
        assert!(a.is_on(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()));
        assert!(!a.is_on(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
    }

    #[test]
    fn deserializes_with_optional_fields_missing() {
        let a: Activity =
            serde_json::from_str(r#"{"timestamp":"2024-03-14T09:30:00Z","title":"triage"}"#)
                .unwrap();
        assert_eq!(a.source, "");
        assert!(a.url.is_none());
        assert_eq!(a.timestamp, at(9, 30));
    }
}
