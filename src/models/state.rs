use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STATE_VERSION: u32 = 1;

/// When a first-occurrence rule last fired, and for which season instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    pub last_triggered_date: NaiveDate,
    pub season_year: i32,
}

/// Persisted first-occurrence history, keyed by rule name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub occurrences: BTreeMap<String, OccurrenceRecord>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for OccurrenceState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            occurrences: BTreeMap::new(),
        }
    }
}

impl OccurrenceState {
    pub fn get(&self, rule: &str) -> Option<&OccurrenceRecord> {
        self.occurrences.get(rule)
    }

    /// Whether `rule` already fired in the season instance starting `season_year`
    pub fn triggered_in_season(&self, rule: &str, season_year: i32) -> bool {
        self.get(rule)
            .map(|r| r.season_year == season_year)
            .unwrap_or(false)
    }

    pub fn record(&mut self, rule: &str, record: OccurrenceRecord) {
        self.occurrences.insert(rule.to_string(), record);
    }

    pub fn clear(&mut self, rule: &str) -> Option<OccurrenceRecord> {
        self.occurrences.remove(rule)
    }

    pub fn clear_all(&mut self) -> usize {
        let count = self.occurrences.len();
        self.occurrences.clear();
        count
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: i32) -> OccurrenceRecord {
        OccurrenceRecord {
            last_triggered_date: NaiveDate::from_ymd_opt(year, 10, 2).unwrap(),
            season_year: year,
        }
    }

    #[test]
    fn triggered_in_season_matches_year_only() {
        let mut state = OccurrenceState::default();
        state.record("First freeze", record(2025));
        assert!(state.triggered_in_season("First freeze", 2025));
        assert!(!state.triggered_in_season("First freeze", 2026));
        assert!(!state.triggered_in_season("Other", 2025));
    }

    #[test]
    fn deserializes_without_version() {
        let state: OccurrenceState = serde_json::from_str(
            r#"{"occurrences": {"First freeze": {"last_triggered_date": "2025-10-02", "season_year": 2025}}}"#,
        )
        .unwrap();
        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(state.get("First freeze"), Some(&record(2025)));
    }

    #[test]
    fn clear_removes_entries() {
        let mut state = OccurrenceState::default();
        state.record("a", record(2024));
        state.record("b", record(2025));
        assert!(state.clear("a").is_some());
        assert!(state.clear("a").is_none());
        assert_eq!(state.clear_all(), 1);
        assert!(state.is_empty());
    }
}
