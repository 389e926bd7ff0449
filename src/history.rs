use crate::domain::HistoryPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The point's total is derived from per-account values; the direct write was ignored.
    DerivedFromAccounts,
}

/// Sparse, `YYYY-MM` keyed series of actual balances.
///
/// Keys are compared as exact strings. Insertion order is preserved; use
/// [`History::chronological`] when order matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    points: Vec<HistoryPoint>,
}

impl History {
    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, date: &str) -> Option<&HistoryPoint> {
        self.points.iter().find(|p| p.date == date)
    }

    /// Sets the total for `date`, inserting a point when none exists.
    ///
    /// A point that carries per-account values keeps its derived total.
    pub fn upsert(&mut self, date: &str, value: f64) -> UpsertOutcome {
        match self.points.iter_mut().find(|p| p.date == date) {
            Some(point) if point.is_account_derived() => UpsertOutcome::DerivedFromAccounts,
            Some(point) => {
                point.value = value;
                UpsertOutcome::Updated
            }
            None => {
                self.points.push(HistoryPoint::new(date, value));
                UpsertOutcome::Inserted
            }
        }
    }

    /// Sets one account's value at `date` and recomputes the point's total
    /// as the sum of all its account values.
    pub fn upsert_account_value(&mut self, date: &str, account_id: &str, value: f64) -> UpsertOutcome {
        match self.points.iter_mut().find(|p| p.date == date) {
            Some(point) => {
                point
                    .account_values
                    .insert(account_id.to_string(), value);
                point.value = point.account_values.values().sum();
                UpsertOutcome::Updated
            }
            None => {
                let mut account_values = BTreeMap::new();
                account_values.insert(account_id.to_string(), value);
                self.points.push(HistoryPoint {
                    date: date.to_string(),
                    value,
                    account_values,
                });
                UpsertOutcome::Inserted
            }
        }
    }

    pub fn remove(&mut self, date: &str) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.date != date);
        self.points.len() != before
    }

    /// Points sorted by their `YYYY-MM` key.
    pub fn chronological(&self) -> Vec<&HistoryPoint> {
        let mut out: Vec<&HistoryPoint> = self.points.iter().collect();
        out.sort_by(|a, b| a.date.cmp(&b.date));
        out
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.iter().max_by(|a, b| a.date.cmp(&b.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_same_date_replaces_value_without_duplicates() {
        let mut h = History::default();
        assert_eq!(h.upsert("2025-01", 10.0), UpsertOutcome::Inserted);
        assert_eq!(h.upsert("2025-01", 20.0), UpsertOutcome::Updated);
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("2025-01").map(|p| p.value), Some(20.0));
    }

    #[test]
    fn account_values_sum_into_total() {
        let mut h = History::default();
        h.upsert_account_value("2025-01", "A", 100.0);
        h.upsert_account_value("2025-01", "B", 50.0);
        assert_eq!(h.len(), 1);
        let p = h.get("2025-01").expect("point");
        assert_eq!(p.value, 150.0);
        assert_eq!(p.account_values.get("A"), Some(&100.0));
        assert_eq!(p.account_values.get("B"), Some(&50.0));

        h.upsert_account_value("2025-01", "A", 70.0);
        assert_eq!(h.get("2025-01").map(|p| p.value), Some(120.0));
    }

    #[test]
    fn new_account_point_total_equals_single_entry() {
        let mut h = History::default();
        assert_eq!(h.upsert_account_value("2025-04", "A", 33.0), UpsertOutcome::Inserted);
        let p = h.get("2025-04").expect("point");
        assert_eq!(p.value, 33.0);
        assert_eq!(p.account_values.len(), 1);
    }

    #[test]
    fn account_values_join_an_existing_plain_point() {
        let mut h = History::default();
        h.upsert("2025-02", 999.0);
        h.upsert_account_value("2025-02", "A", 5.0);
        assert_eq!(h.get("2025-02").map(|p| p.value), Some(5.0));
    }

    #[test]
    fn direct_write_on_account_point_is_ignored() {
        let mut h = History::default();
        h.upsert_account_value("2025-01", "A", 100.0);
        assert_eq!(h.upsert("2025-01", 1.0), UpsertOutcome::DerivedFromAccounts);
        assert_eq!(h.get("2025-01").map(|p| p.value), Some(100.0));
    }

    #[test]
    fn keys_are_exact_strings() {
        let mut h = History::default();
        h.upsert("2025-03", 1.0);
        assert!(h.get("2025-3").is_none());
    }

    #[test]
    fn chronological_sorts_by_key() {
        let mut h = History::default();
        h.upsert("2025-11", 3.0);
        h.upsert("2024-12", 1.0);
        h.upsert("2025-02", 2.0);
        let dates: Vec<&str> = h.chronological().iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-12", "2025-02", "2025-11"]);
        assert_eq!(h.latest().map(|p| p.date.as_str()), Some("2025-11"));
    }

    #[test]
    fn remove_drops_point() {
        let mut h = History::default();
        h.upsert("2025-01", 1.0);
        assert!(h.remove("2025-01"));
        assert!(!h.remove("2025-01"));
        assert!(h.is_empty());
    }
}
