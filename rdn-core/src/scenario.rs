//! Loads a network topology from a YAML scenario file and dumps the
//! resulting schedule back out, mirroring this workspace's existing habit
//! of driving simulation runs off YAML documents.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RdnError;
use crate::multiset::MultisetSpec;
use crate::network::ResourceDemandNetwork;
use crate::process::Process;
use crate::task::Task;

#[derive(Debug, Deserialize)]
pub struct ScenarioDocument {
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceSpec {
    pub id: String,
    pub processes: Vec<ProcessSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessSpec {
    #[serde(default = "serde_yaml::Value::default")]
    pub inputs: serde_yaml::Value,
    pub outputs: serde_yaml::Value,
    #[serde(default)]
    pub setup_time: f64,
    #[serde(default)]
    pub run_time: f64,
    #[serde(default)]
    pub shutdown_time: f64,
    #[serde(default)]
    pub change_over_time: f64,
    #[serde(default)]
    pub cost: f64,
}

#[derive(Debug, Deserialize)]
pub struct EdgeSpec {
    pub supplier: String,
    pub client: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskSpec {
    pub resource: String,
    pub requires: serde_yaml::Value,
    #[serde(default)]
    pub label: Option<String>,
}

/// The network built from a scenario document, plus the name a caller used
/// for each resource, so results can be reported back under the same names.
pub struct Scenario {
    pub network: ResourceDemandNetwork,
    pub resource_ids: HashMap<String, u64>,
    pub resource_names: HashMap<u64, String>,
    pub task_ids: Vec<u64>,
    task_resource: HashMap<u64, u64>,
}

pub fn load_scenario_str(yaml: &str) -> Result<Scenario, RdnError> {
    let document: ScenarioDocument =
        serde_yaml::from_str(yaml).map_err(|e| RdnError::Type(format!("invalid scenario document: {e}")))?;
    build_scenario(document)
}

pub fn load_scenario_file(path: impl AsRef<Path>) -> Result<Scenario, RdnError> {
    let contents = fs::read_to_string(path.as_ref())
        .map_err(|e| RdnError::Type(format!("cannot read {}: {e}", path.as_ref().display())))?;
    load_scenario_str(&contents)
}

fn build_scenario(document: ScenarioDocument) -> Result<Scenario, RdnError> {
    let network = ResourceDemandNetwork::new();
    let mut resource_ids = HashMap::new();
    let mut resource_names = HashMap::new();

    for resource_spec in document.resources {
        let mut processes = Vec::with_capacity(resource_spec.processes.len());
        for process_spec in resource_spec.processes {
            let inputs = MultisetSpec::from_yaml(&process_spec.inputs)?;
            let outputs = MultisetSpec::from_yaml(&process_spec.outputs)?;
            let process = Process::new(inputs, outputs)?
                .with_timing(process_spec.setup_time, process_spec.run_time, process_spec.shutdown_time)
                .with_change_over_time(process_spec.change_over_time)
                .with_cost(process_spec.cost);
            processes.push(process);
        }
        let id = network.add_resource(processes);
        resource_ids.insert(resource_spec.id.clone(), id);
        resource_names.insert(id, resource_spec.id);
    }

    for edge in document.edges {
        let supplier = *resource_ids
            .get(&edge.supplier)
            .ok_or_else(|| RdnError::Binding(format!("unknown resource {}", edge.supplier)))?;
        let client = *resource_ids
            .get(&edge.client)
            .ok_or_else(|| RdnError::Binding(format!("unknown resource {}", edge.client)))?;
        network.add_edge(supplier, client);
    }

    let mut task_ids = Vec::with_capacity(document.tasks.len());
    let mut task_resource = HashMap::new();
    for task_spec in document.tasks {
        let resource_id = *resource_ids
            .get(&task_spec.resource)
            .ok_or_else(|| RdnError::Binding(format!("unknown resource {}", task_spec.resource)))?;
        let requires = MultisetSpec::from_yaml(&task_spec.requires)?;
        let mut task = Task::new(requires);
        if let Some(label) = task_spec.label {
            task = task.with_label(label);
        }
        let task_id = network.add_task(resource_id, task)?;
        task_ids.push(task_id);
        task_resource.insert(task_id, resource_id);
    }

    Ok(Scenario {
        network,
        resource_ids,
        resource_names,
        task_ids,
        task_resource,
    })
}

#[derive(Debug, Serialize)]
pub struct TaskReport {
    pub id: u64,
    pub label: String,
    pub resource: String,
    pub start: Option<f64>,
    pub finish: Option<f64>,
    pub idle_time: f64,
}

#[derive(Debug, Serialize)]
pub struct ScheduleReport {
    pub makespan: f64,
    pub tasks: Vec<TaskReport>,
}

/// Builds a serializable report of every task the scenario created.
pub fn report(scenario: &Scenario) -> ScheduleReport {
    let mut tasks = Vec::with_capacity(scenario.task_ids.len());
    for &task_id in &scenario.task_ids {
        if let Some(task) = scenario.network.task(task_id) {
            let resource = scenario
                .task_resource
                .get(&task_id)
                .and_then(|id| scenario.resource_names.get(id))
                .cloned()
                .unwrap_or_else(|| format!("resource-of-{task_id}"));
            tasks.push(TaskReport {
                id: task.id,
                label: task.display_label(),
                resource,
                start: task.scheduled_start,
                finish: task.scheduled_finish,
                idle_time: task.idle_time,
            });
        }
    }
    ScheduleReport {
        makespan: scenario.network.makespan(),
        tasks,
    }
}

/// Serializes a [`ScheduleReport`] to a YAML string.
pub fn dump_report(report: &ScheduleReport) -> Result<String, RdnError> {
    serde_yaml::to_string(report).map_err(|e| RdnError::Type(format!("cannot serialize report: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
resources:
  - id: miner
    processes:
      - outputs: ore
        run_time: 1.0
  - id: mill
    processes:
      - inputs: ore
        outputs: steel
        run_time: 2.0
edges:
  - supplier: miner
    client: mill
tasks:
  - resource: mill
    requires: steel
    label: order-1
"#;

    #[test]
    fn loads_and_schedules_a_two_stage_scenario() {
        let scenario = load_scenario_str(SCENARIO).unwrap();
        scenario.network.schedule().unwrap();
        let report = report(&scenario);
        assert_eq!(report.tasks.len(), 1);
        assert!(report.tasks[0].finish.unwrap() >= 3.0);
    }

    #[test]
    fn unknown_resource_in_edge_is_a_binding_error() {
        let broken = SCENARIO.replace("supplier: miner", "supplier: nope");
        assert!(matches!(load_scenario_str(&broken), Err(RdnError::Binding(_))));
    }
}
