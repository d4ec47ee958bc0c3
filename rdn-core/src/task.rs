//! Demand unit circulating through the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

/// True iff two multisets share the same key set, ignoring counts. This is
/// the matching rule used throughout the network: a process "matches" a
/// task, and a task "matches" a task, when their requirement keys coincide.
pub fn key_set_eq(a: &HashMap<String, u32>, b: &HashMap<String, u32>) -> bool {
    a.len() == b.len() && a.keys().all(|k| b.contains_key(k))
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub requires: HashMap<String, u32>,
    pub label: Option<String>,
    pub client: Option<u64>,
    pub supplier: Option<u64>,
    pub earliest_start: Option<f64>,
    pub earliest_finish: Option<f64>,
    pub latest_start: Option<f64>,
    pub latest_finish: Option<f64>,
    pub duration: Option<f64>,
    pub cost: Option<f64>,
    pub scheduled_start: Option<f64>,
    pub scheduled_finish: Option<f64>,
    pub idle_time: f64,
}

impl Task {
    pub fn new(requires: impl Into<crate::multiset::MultisetSpec>) -> Self {
        Self {
            id: next_id(),
            requires: requires.into().resolve(),
            label: None,
            client: None,
            supplier: None,
            earliest_start: None,
            earliest_finish: None,
            latest_start: None,
            latest_finish: None,
            duration: None,
            cost: None,
            scheduled_start: None,
            scheduled_finish: None,
            idle_time: 0.0,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_client(mut self, client: u64) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_supplier(mut self, supplier: u64) -> Self {
        self.supplier = Some(supplier);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_window(mut self, earliest_start: f64, latest_finish: f64) -> Self {
        self.earliest_start = Some(earliest_start);
        self.latest_finish = Some(latest_finish);
        self
    }

    /// A task is committed once a resource has assigned it concrete start
    /// and finish times.
    pub fn is_committed(&self) -> bool {
        self.scheduled_start.is_some() && self.scheduled_finish.is_some()
    }

    /// Display label, falling back to `task-<id>` when none was given.
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| format!("task-{}", self.id))
    }

    pub fn matches_requirements(&self, other: &HashMap<String, u32>) -> bool {
        key_set_eq(&self.requires, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_task_is_not_committed() {
        let t = Task::new("steel");
        assert!(!t.is_committed());
    }

    #[test]
    fn committing_sets_both_times() {
        let mut t = Task::new("steel");
        t.scheduled_start = Some(0.0);
        t.scheduled_finish = Some(5.0);
        assert!(t.is_committed());
    }

    #[test]
    fn ids_are_distinct_and_ascending() {
        let a = Task::new("x");
        let b = Task::new("x");
        assert!(b.id > a.id);
    }

    #[test]
    fn key_set_match_ignores_counts() {
        let a = HashMap::from([("steel".to_string(), 1)]);
        let b = HashMap::from([("steel".to_string(), 4)]);
        assert!(key_set_eq(&a, &b));
    }

    #[test]
    fn key_set_mismatch_on_different_keys() {
        let a = HashMap::from([("steel".to_string(), 1)]);
        let b = HashMap::from([("wood".to_string(), 1)]);
        assert!(!key_set_eq(&a, &b));
    }

    #[test]
    fn display_label_falls_back_to_id() {
        let t = Task::new("x");
        assert_eq!(t.display_label(), format!("task-{}", t.id));
        let labeled = Task::new("x").with_label("cut-1");
        assert_eq!(labeled.display_label(), "cut-1");
    }
}
