//! A resource runs one process at a time against a sequence of committed
//! tasks. Local scheduling proceeds in three phases each time the resource
//! is notified: drain newly arrived demand (A), lay out a sequence against
//! whatever supply has committed so far (B), and account for idle time (C).

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::error::RdnError;
use crate::network::RdnInner;
use crate::process::Process;
use crate::task::Task;

pub struct Resource {
    pub id: u64,
    pub processes: Vec<Process>,
    inbox: VecDeque<u64>,
    waiting_for_supply: Vec<u64>,
    sequence: Vec<u64>,
    /// True once this resource has fanned out supply for any task of its
    /// own. Pure source resources never set this, which is what gates the
    /// Phase A ascending sort.
    has_supply_dependency: bool,
    idle_time: f64,
    rdn: Option<Weak<RefCell<RdnInner>>>,
}

impl Resource {
    pub(crate) fn new(id: u64, processes: Vec<Process>, rdn: Weak<RefCell<RdnInner>>) -> Self {
        Self {
            id,
            processes,
            inbox: VecDeque::new(),
            waiting_for_supply: Vec::new(),
            sequence: Vec::new(),
            has_supply_dependency: false,
            idle_time: 0.0,
            rdn: Some(rdn),
        }
    }

    fn rdn(&self) -> Result<Rc<RefCell<RdnInner>>, RdnError> {
        self.rdn
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| RdnError::Binding(format!("resource {} is not attached to a network", self.id)))
    }

    pub fn add_process(&mut self, process: Process) {
        self.processes.push(process);
    }

    pub fn get_process(&self, requires: &HashMap<String, u32>) -> Option<&Process> {
        self.processes.iter().find(|p| crate::task::key_set_eq(&p.outputs, requires))
    }

    pub fn can_support(&self, requires: &HashMap<String, u32>) -> bool {
        self.get_process(requires).is_some()
    }

    /// The matched process' inputs for `task` — what this resource would
    /// demand upstream if it accepted `task`, without actually demanding it.
    pub fn supplies(&self, task: &Task) -> Option<&HashMap<String, u32>> {
        self.get_process(&task.requires).map(|p| &p.inputs)
    }

    pub fn task_sequence(&self) -> &[u64] {
        &self.sequence
    }

    pub fn idle_time(&self) -> f64 {
        self.idle_time
    }

    /// True iff this resource has no committed tasks, or its committed
    /// sequence has no idle gaps at all.
    pub fn perfect_schedule(&self) -> bool {
        self.sequence.is_empty() || self.idle_time == 0.0
    }

    pub fn finish_time(&self, rdn: &Rc<RefCell<RdnInner>>) -> f64 {
        let inner = rdn.borrow();
        self.sequence
            .last()
            .and_then(|id| inner.tasks.get(id))
            .and_then(|t| t.scheduled_finish)
            .unwrap_or(0.0)
    }

    /// Re-queues this resource for another local-scheduling pass without
    /// any task having arrived or left — used after a caller mutates
    /// something about this resource outside `add_task`/`remove_task`.
    pub fn notify(&self) -> Result<(), RdnError> {
        let rdn = self.rdn()?;
        RdnInner::notify(&rdn, self.id);
        Ok(())
    }

    /// Queues `task_id` for scheduling on `this` resource and wakes it up.
    /// Rejects the task immediately if no installed process matches its
    /// requirement key-set: the operation simply does not occur.
    pub fn add_task(this: &Rc<RefCell<Resource>>, task_id: u64) -> Result<(), RdnError> {
        let rdn = this.borrow().rdn()?;
        let id = this.borrow().id;
        let requires = rdn
            .borrow()
            .tasks
            .get(&task_id)
            .map(|t| t.requires.clone())
            .ok_or_else(|| RdnError::Scheduling(format!("unknown task {task_id}")))?;

        if !this.borrow().can_support(&requires) {
            return Err(RdnError::UnsupportedTask { resource: id });
        }

        this.borrow_mut().inbox.push_back(task_id);
        RdnInner::notify(&rdn, id);
        Ok(())
    }

    /// Removes `task_id` from this resource and recursively cancels any
    /// supply tasks it had emitted, re-notifying their suppliers. A no-op
    /// if `task_id` is unknown to this resource.
    pub fn remove_task(this: &Rc<RefCell<Resource>>, task_id: u64) -> Result<(), RdnError> {
        let rdn = this.borrow().rdn()?;
        {
            let mut r = this.borrow_mut();
            r.inbox.retain(|&id| id != task_id);
            r.waiting_for_supply.retain(|&id| id != task_id);
            r.sequence.retain(|&id| id != task_id);
        }

        let supply_ids = rdn.borrow_mut().supply_of.remove(&task_id).unwrap_or_default();
        for supply_id in supply_ids {
            let supplier_id = rdn.borrow().tasks.get(&supply_id).and_then(|t| t.supplier);
            let Some(supplier_id) = supplier_id else { continue };
            let supplier = rdn.borrow().resources.get(&supplier_id).cloned();
            if let Some(supplier) = supplier {
                Resource::remove_task(&supplier, supply_id)?;
                RdnInner::notify(&rdn, supplier_id);
            }
        }
        Ok(())
    }

    /// Upstream resources that can produce something matching `requires`.
    pub fn suppliers(this: &Rc<RefCell<Resource>>, requires: &HashMap<String, u32>) -> Result<Vec<u64>, RdnError> {
        let rdn = this.borrow().rdn()?;
        let id = this.borrow().id;
        let candidates = rdn.borrow().graph.nodes_to(&id);
        let inner = rdn.borrow();
        Ok(candidates
            .into_iter()
            .filter(|cand| {
                inner
                    .resources
                    .get(cand)
                    .is_some_and(|r| r.borrow().can_support(requires))
            })
            .collect())
    }

    /// Runs all three local-scheduling phases once. Called whenever this
    /// resource is woken by the driver loop.
    pub fn run_schedule(this: &Rc<RefCell<Resource>>) -> Result<(), RdnError> {
        Self::drain_inbox(this)?;
        Self::lay_out_sequence(this)?;
        Self::account(this)?;
        Ok(())
    }

    /// Phase A. Drains source tasks straight into the sequence. The first
    /// task that needs supply gets its supply fanned out and the call
    /// returns immediately, leaving any remaining inbox entries for the
    /// next notification. Once the inbox empties without ever touching
    /// supply, the newly-ready (uncommitted) portion of the sequence is
    /// sorted ascending by `(run_time, name, id)`.
    fn drain_inbox(this: &Rc<RefCell<Resource>>) -> Result<(), RdnError> {
        let rdn = this.borrow().rdn()?;
        let id = this.borrow().id;

        loop {
            let task_id = match this.borrow_mut().inbox.pop_front() {
                Some(t) => t,
                None => break,
            };

            let requires = rdn
                .borrow()
                .tasks
                .get(&task_id)
                .map(|t| t.requires.clone())
                .ok_or_else(|| RdnError::Scheduling(format!("unknown task {task_id}")))?;

            let process = this
                .borrow()
                .get_process(&requires)
                .cloned()
                .ok_or(RdnError::UnsupportedTask { resource: id })?;

            if process.is_source() {
                this.borrow_mut().sequence.push(task_id);
                continue;
            }

            this.borrow_mut().has_supply_dependency = true;
            let supplier_ids = Self::suppliers(this, &process.inputs)?;
            if supplier_ids.is_empty() {
                warn!(
                    "resource {id}: task {task_id} needs supply but has no suppliers for {:?}; scheduling as soon as possible",
                    process.inputs
                );
                this.borrow_mut().waiting_for_supply.push(task_id);
                return Ok(());
            }

            for supplier_id in supplier_ids {
                let supply_task_id = {
                    let mut inner = rdn.borrow_mut();
                    let mut supply_task = Task::new(process.inputs.clone())
                        .with_client(id)
                        .with_supplier(supplier_id);
                    supply_task.label = Some(format!("supply-for-{task_id}"));
                    let sid = supply_task.id;
                    inner.tasks.insert(sid, supply_task);
                    inner.supply_of.entry(task_id).or_default().push(sid);
                    sid
                };
                let supplier = rdn
                    .borrow()
                    .resources
                    .get(&supplier_id)
                    .cloned()
                    .expect("suppliers() only returns known resource ids");
                Resource::add_task(&supplier, supply_task_id)?;
            }
            this.borrow_mut().waiting_for_supply.push(task_id);
            return Ok(());
        }

        if !this.borrow().has_supply_dependency {
            Self::sort_ready_sequence(this, &rdn)?;
        }
        Ok(())
    }

    /// Sorts the uncommitted tail of the sequence ascending by
    /// `(run_time, name, id)`, leaving already-committed entries in place.
    fn sort_ready_sequence(this: &Rc<RefCell<Resource>>, rdn: &Rc<RefCell<RdnInner>>) -> Result<(), RdnError> {
        let sequence = this.borrow().sequence.clone();
        let mut committed = Vec::new();
        let mut uncommitted = Vec::new();
        for task_id in sequence {
            let is_committed = rdn.borrow().tasks.get(&task_id).is_some_and(|t| t.is_committed());
            if is_committed {
                committed.push(task_id);
            } else {
                uncommitted.push(task_id);
            }
        }

        let mut keyed: Vec<(f64, String, u64)> = Vec::with_capacity(uncommitted.len());
        for task_id in uncommitted {
            let requires = rdn.borrow().tasks[&task_id].requires.clone();
            let label = rdn.borrow().tasks[&task_id].label.clone();
            let run_time = this.borrow().get_process(&requires).map(|p| p.run_time).unwrap_or(0.0);
            let name = label.unwrap_or_else(|| {
                this.borrow()
                    .get_process(&requires)
                    .and_then(|p| p.outputs.keys().next().cloned())
                    .unwrap_or_default()
            });
            keyed.push((run_time, name, task_id));
        }
        keyed.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        let mut new_sequence = committed;
        new_sequence.extend(keyed.into_iter().map(|(_, _, task_id)| task_id));
        this.borrow_mut().sequence = new_sequence;
        Ok(())
    }

    /// Phase B. Tasks whose supply has fully committed get laid onto the
    /// end of the sequence. A matching predecessor folds its own shutdown
    /// down to a change-over after the fact, and the current task skips its
    /// own setup time.
    fn lay_out_sequence(this: &Rc<RefCell<Resource>>) -> Result<(), RdnError> {
        let rdn = this.borrow().rdn()?;
        let id = this.borrow().id;

        let still_waiting = this.borrow().waiting_for_supply.clone();
        let mut resolved = Vec::new();
        let mut remaining = Vec::new();

        for task_id in still_waiting {
            let supply_ids = rdn.borrow().supply_of.get(&task_id).cloned().unwrap_or_default();

            if supply_ids.is_empty() {
                resolved.push((task_id, None));
                continue;
            }

            let all_committed = {
                let inner = rdn.borrow();
                supply_ids.iter().all(|sid| inner.tasks.get(sid).is_some_and(|t| t.is_committed()))
            };
            if !all_committed {
                remaining.push(task_id);
                continue;
            }

            // Earliest-finishing supply task wins; every other one is surplus.
            let mut sorted_ids = supply_ids;
            {
                let inner = rdn.borrow();
                sorted_ids.sort_by(|a, b| {
                    let fa = inner.tasks[a].scheduled_finish.unwrap_or(f64::MAX);
                    let fb = inner.tasks[b].scheduled_finish.unwrap_or(f64::MAX);
                    fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
                });
            }
            let winner = sorted_ids[0];
            for surplus_id in &sorted_ids[1..] {
                let supplier_id = rdn.borrow().tasks.get(surplus_id).and_then(|t| t.supplier);
                if let Some(supplier_id) = supplier_id {
                    if let Some(supplier) = rdn.borrow().resources.get(&supplier_id).cloned() {
                        Resource::remove_task(&supplier, *surplus_id)?;
                        warn!("resource {id}: cancelled surplus supply task {surplus_id} on resource {supplier_id}");
                    }
                }
            }
            rdn.borrow_mut().supply_of.insert(task_id, vec![winner]);
            let supply_ready = rdn.borrow().tasks[&winner].scheduled_finish;
            resolved.push((task_id, supply_ready));
        }
        this.borrow_mut().waiting_for_supply = remaining;

        for (task_id, supply_ready) in resolved {
            let requires = rdn.borrow().tasks[&task_id].requires.clone();
            let process = this
                .borrow()
                .get_process(&requires)
                .cloned()
                .ok_or(RdnError::UnsupportedTask { resource: id })?;

            let previous_id = this.borrow().sequence.last().copied();
            let previous_finish = previous_id
                .map(|prev_id| rdn.borrow().tasks[&prev_id].scheduled_finish.unwrap_or(0.0))
                .unwrap_or(0.0);
            let previous_matches = previous_id
                .map(|prev_id| {
                    let prev_requires = rdn.borrow().tasks[&prev_id].requires.clone();
                    crate::task::key_set_eq(&prev_requires, &requires)
                })
                .unwrap_or(false);

            let start = match supply_ready {
                Some(ready) => previous_finish.max(ready),
                None => previous_finish,
            };
            let idle = supply_ready.map(|ready| (ready - previous_finish).max(0.0)).unwrap_or(0.0);
            let finish = if previous_matches {
                start + process.run_time + process.shutdown_time
            } else {
                start + process.setup_time + process.run_time + process.shutdown_time
            };

            {
                let mut inner = rdn.borrow_mut();
                let task = inner.tasks.get_mut(&task_id).expect("task exists");
                task.scheduled_start = Some(start);
                task.scheduled_finish = Some(finish);
                task.idle_time = idle;
            }

            // Retroactively fold the previous task's shutdown down to a
            // change-over now that we know it was followed by a match.
            if previous_matches {
                if let Some(prev_id) = previous_id {
                    let mut inner = rdn.borrow_mut();
                    if let Some(prev_task) = inner.tasks.get_mut(&prev_id) {
                        if let Some(prev_finish) = prev_task.scheduled_finish {
                            prev_task.scheduled_finish =
                                Some(prev_finish - (process.shutdown_time - process.change_over_time));
                        }
                    }
                }
            }

            this.borrow_mut().sequence.push(task_id);
            debug!("resource {id}: committed task {task_id} [{start}, {finish}]");

            let client = rdn.borrow().tasks[&task_id].client;
            if let Some(client_id) = client {
                if client_id != id {
                    RdnInner::notify(&rdn, client_id);
                }
            }
        }
        Ok(())
    }

    /// Phase C. `idle_time = finish_time - active`, where `active` sums
    /// each committed task's own `(finish - start)`. Then runs the
    /// improvement hook.
    fn account(this: &Rc<RefCell<Resource>>) -> Result<(), RdnError> {
        let rdn = this.borrow().rdn()?;
        let sequence = this.borrow().sequence.clone();

        let inner = rdn.borrow();
        let finish = sequence
            .last()
            .and_then(|id| inner.tasks.get(id))
            .and_then(|t| t.scheduled_finish)
            .unwrap_or(0.0);
        let active: f64 = sequence
            .iter()
            .filter_map(|id| {
                let t = inner.tasks.get(id)?;
                Some(t.scheduled_finish? - t.scheduled_start?)
            })
            .sum();
        drop(inner);

        this.borrow_mut().idle_time = finish - active;
        Self::improve_sequence(this)
    }

    /// No-op placeholder: resequencing for a lower makespan is not
    /// implemented, only the hook a future pass would use.
    fn improve_sequence(_this: &Rc<RefCell<Resource>>) -> Result<(), RdnError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ResourceDemandNetwork;

    #[test]
    fn source_task_schedules_immediately() {
        let net = ResourceDemandNetwork::new();
        let empty: HashMap<String, u32> = HashMap::new();
        let process = Process::new(empty, "steel").unwrap().with_timing(0.0, 2.0, 0.0);
        let r = net.add_resource(vec![process]);
        let task_id = net.add_task(r, Task::new("steel")).unwrap();
        net.schedule().unwrap();
        let task = net.task(task_id).unwrap();
        assert_eq!(task.scheduled_start, Some(0.0));
        assert_eq!(task.scheduled_finish, Some(2.0));
    }

    #[test]
    fn unsupported_task_is_rejected_immediately() {
        let net = ResourceDemandNetwork::new();
        let empty: HashMap<String, u32> = HashMap::new();
        let process = Process::new(empty, "steel").unwrap();
        let r = net.add_resource(vec![process]);
        let err = net.add_task(r, Task::new("wood"));
        assert!(matches!(err, Err(RdnError::UnsupportedTask { .. })));
    }

    #[test]
    fn task_with_supply_waits_for_supplier() {
        let net = ResourceDemandNetwork::new();
        let empty: HashMap<String, u32> = HashMap::new();
        let ore_process = Process::new(empty, "ore").unwrap().with_timing(0.0, 1.0, 0.0);
        let steel_process = Process::new("ore", "steel").unwrap().with_timing(0.0, 2.0, 0.0);
        let miner = net.add_resource(vec![ore_process]);
        let mill = net.add_resource(vec![steel_process]);
        net.add_edge(miner, mill);

        let task_id = net.add_task(mill, Task::new("steel")).unwrap();
        net.schedule().unwrap();

        let task = net.task(task_id).unwrap();
        assert!(task.is_committed());
        assert!(task.scheduled_start.unwrap() >= 1.0);
    }

    #[test]
    fn change_over_fold_skips_setup_on_repeated_process() {
        let net = ResourceDemandNetwork::new();
        let empty: HashMap<String, u32> = HashMap::new();
        let process = Process::new(empty, "x").unwrap().with_timing(1.0, 2.0, 1.0);
        let r = net.add_resource(vec![process]);
        let first = net.add_task(r, Task::new("x")).unwrap();
        let second = net.add_task(r, Task::new("x")).unwrap();
        net.schedule().unwrap();

        let first = net.task(first).unwrap();
        let second = net.task(second).unwrap();
        assert_eq!(first.scheduled_start, Some(0.0));
        assert_eq!(first.scheduled_finish, Some(3.0)); // 4 - (shutdown - change_over) = 4 - 1
        assert_eq!(second.scheduled_start, Some(4.0));
        assert_eq!(second.scheduled_finish, Some(7.0)); // 4 + run + shutdown, no setup
    }

    #[test]
    fn surplus_supplier_is_cancelled() {
        let net = ResourceDemandNetwork::new();
        let empty: HashMap<String, u32> = HashMap::new();
        let fast_supplier_process = Process::new(empty.clone(), "a").unwrap().with_timing(0.0, 1.0, 0.0);
        let slow_supplier_process = Process::new(empty, "a").unwrap().with_timing(0.0, 5.0, 0.0);
        let consumer_process = Process::new("a", "b").unwrap().with_timing(0.0, 1.0, 0.0);

        let fast = net.add_resource(vec![fast_supplier_process]);
        let slow = net.add_resource(vec![slow_supplier_process]);
        let consumer = net.add_resource(vec![consumer_process]);
        net.add_edge(fast, consumer);
        net.add_edge(slow, consumer);

        net.add_task(consumer, Task::new("b")).unwrap();
        net.schedule().unwrap();

        let fast_resource = net.resource(fast).unwrap();
        let slow_resource = net.resource(slow).unwrap();
        let fast_has_task = !fast_resource.borrow().task_sequence().is_empty();
        let slow_has_task = !slow_resource.borrow().task_sequence().is_empty();
        assert!(fast_has_task ^ slow_has_task, "exactly one supplier should retain its supply task");
    }

    #[test]
    fn notify_requeues_an_attached_resource() {
        let net = ResourceDemandNetwork::new();
        let empty: HashMap<String, u32> = HashMap::new();
        let process = Process::new(empty, "x").unwrap();
        let r = net.add_resource(vec![process]);
        let resource = net.resource(r).unwrap();
        assert!(resource.borrow().notify().is_ok());
    }
}
