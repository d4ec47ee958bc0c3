//! Transformation a resource can run: consumes `inputs`, produces `outputs`,
//! over a timeline of setup, run, and shutdown phases.

use std::collections::HashMap;

use crate::error::RdnError;
use crate::multiset::MultisetSpec;
use crate::task::{key_set_eq, Task};

#[derive(Debug, Clone)]
pub struct Process {
    pub inputs: HashMap<String, u32>,
    pub outputs: HashMap<String, u32>,
    pub setup_time: f64,
    pub run_time: f64,
    pub shutdown_time: f64,
    pub change_over_time: f64,
    pub cost: f64,
}

impl Process {
    /// `outputs` must be non-empty: a process with nothing to offer can
    /// never be matched to a task and has no reason to exist.
    pub fn new(
        inputs: impl Into<MultisetSpec>,
        outputs: impl Into<MultisetSpec>,
    ) -> Result<Self, RdnError> {
        let outputs = outputs.into().resolve();
        if outputs.is_empty() {
            return Err(RdnError::Type(
                "a process must produce at least one output".into(),
            ));
        }
        Ok(Self {
            inputs: inputs.into().resolve(),
            outputs,
            setup_time: 0.0,
            run_time: 0.0,
            shutdown_time: 0.0,
            change_over_time: 0.0,
            cost: 0.0,
        })
    }

    pub fn with_timing(mut self, setup_time: f64, run_time: f64, shutdown_time: f64) -> Self {
        self.setup_time = setup_time;
        self.run_time = run_time;
        self.shutdown_time = shutdown_time;
        self
    }

    pub fn with_change_over_time(mut self, change_over_time: f64) -> Self {
        self.change_over_time = change_over_time;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Total occupied time for one run, excluding any change-over penalty.
    pub fn duration(&self) -> f64 {
        self.setup_time + self.run_time + self.shutdown_time
    }

    /// A source process needs nothing to run: it has no inputs at all.
    pub fn is_source(&self) -> bool {
        self.inputs.is_empty()
    }

    /// A process matches a task when their key sets coincide: the process'
    /// outputs must cover exactly what the task requires.
    pub fn matches_task(&self, task: &Task) -> bool {
        key_set_eq(&self.outputs, &task.requires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_without_outputs_is_rejected() {
        let empty: HashMap<String, u32> = HashMap::new();
        assert!(matches!(
            Process::new("steel", empty),
            Err(RdnError::Type(_))
        ));
    }

    #[test]
    fn source_process_has_no_inputs() {
        let empty: HashMap<String, u32> = HashMap::new();
        let p = Process::new(empty, "steel").unwrap();
        assert!(p.is_source());
    }

    #[test]
    fn matches_task_ignores_counts() {
        let p = Process::new("ore", "steel").unwrap();
        let t = Task::new(HashMap::from([("steel".to_string(), 5)]));
        assert!(p.matches_task(&t));
    }

    #[test]
    fn duration_sums_three_phases() {
        let p = Process::new("ore", "steel").unwrap().with_timing(1.0, 2.0, 3.0);
        assert_eq!(p.duration(), 6.0);
    }
}
