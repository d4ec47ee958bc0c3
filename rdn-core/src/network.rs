//! The resource-demand network: owns every resource and task, wires the
//! supply graph between resources, and drives local scheduling to a
//! fixed point.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use crate::error::RdnError;
use crate::graph::Graph;
use crate::process::Process;
use crate::resource::Resource;
use crate::task::Task;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct RdnInner {
    pub resources: HashMap<u64, Rc<RefCell<Resource>>>,
    pub graph: Graph<u64>,
    pub tasks: HashMap<u64, Task>,
    /// Supply task ids fanned out on behalf of a client task, keyed by the
    /// client task's id.
    pub supply_of: HashMap<u64, Vec<u64>>,
    notify_queue: VecDeque<u64>,
    queued: HashSet<u64>,
    best_makespan: Option<f64>,
}

impl RdnInner {
    /// Queues `resource_id` for another local-scheduling pass, collapsing
    /// duplicates already pending.
    pub fn notify(this: &Rc<RefCell<Self>>, resource_id: u64) {
        let mut inner = this.borrow_mut();
        if inner.queued.insert(resource_id) {
            inner.notify_queue.push_back(resource_id);
        }
    }
}

/// Owning handle to a resource-demand network. Cheap to clone: it wraps a
/// single `Rc<RefCell<_>>`, since the scheduling model is cooperative and
/// single-threaded by design, not concurrent.
#[derive(Clone)]
pub struct ResourceDemandNetwork(Rc<RefCell<RdnInner>>);

impl Default for ResourceDemandNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceDemandNetwork {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(RdnInner {
            resources: HashMap::new(),
            graph: Graph::new(),
            tasks: HashMap::new(),
            supply_of: HashMap::new(),
            notify_queue: VecDeque::new(),
            queued: HashSet::new(),
            best_makespan: None,
        })))
    }

    pub fn add_resource(&self, processes: Vec<Process>) -> u64 {
        let id = next_resource_id();
        let resource = Rc::new(RefCell::new(Resource::new(id, processes, Rc::downgrade(&self.0))));
        let mut inner = self.0.borrow_mut();
        inner.resources.insert(id, resource);
        inner.graph.add_node(id);
        id
    }

    /// Registers `supplier` as able to feed `client`'s unmet demand.
    pub fn add_edge(&self, supplier: u64, client: u64) {
        self.0.borrow_mut().graph.add_edge(supplier, client, 1);
    }

    /// Hands `task` to `resource_id`'s inbox and wakes it for scheduling.
    pub fn add_task(&self, resource_id: u64, task: Task) -> Result<u64, RdnError> {
        let task_id = task.id;
        let resource = {
            let mut inner = self.0.borrow_mut();
            inner.tasks.insert(task_id, task);
            inner.resources.get(&resource_id).cloned()
        }
        .ok_or_else(|| RdnError::Binding(format!("no such resource {resource_id}")))?;
        Resource::add_task(&resource, task_id)?;
        Ok(task_id)
    }

    pub fn task(&self, id: u64) -> Option<Task> {
        self.0.borrow().tasks.get(&id).cloned()
    }

    pub fn resource_ids(&self) -> Vec<u64> {
        self.0.borrow().resources.keys().copied().collect()
    }

    pub fn resource(&self, id: u64) -> Option<Rc<RefCell<Resource>>> {
        self.0.borrow().resources.get(&id).cloned()
    }

    /// Makespan over every committed task across every resource.
    pub fn makespan(&self) -> f64 {
        self.0
            .borrow()
            .tasks
            .values()
            .filter_map(|t| t.scheduled_finish)
            .fold(0.0, f64::max)
    }

    pub fn best_makespan(&self) -> Option<f64> {
        self.0.borrow().best_makespan
    }

    /// Drives the network to a fixed point: repeatedly swaps out the
    /// pending-notification queue and runs each woken resource's local
    /// scheduling pass, until a full pass produces no further
    /// notifications (or every resource reports a perfect schedule).
    /// Fails immediately if the network has no resources at all.
    pub fn schedule(&self) -> Result<(), RdnError> {
        if self.0.borrow().resources.is_empty() {
            return Err(RdnError::Scheduling(
                "cannot schedule a network with no resources".into(),
            ));
        }

        loop {
            let batch: Vec<u64> = {
                let mut inner = self.0.borrow_mut();
                if inner.notify_queue.is_empty() {
                    break;
                }
                let batch: Vec<u64> = inner.notify_queue.drain(..).collect();
                for id in &batch {
                    inner.queued.remove(id);
                }
                batch
            };

            for resource_id in batch {
                let resource = self.0.borrow().resources.get(&resource_id).cloned();
                if let Some(resource) = resource {
                    Resource::run_schedule(&resource)?;
                }
            }

            // `perfect_schedule()` is vacuously true for a resource that
            // hasn't run at all yet (an empty sequence), so this can only
            // ever short-circuit safely once the queue has also drained on
            // its own: otherwise a resource sitting on fresh, unprocessed
            // notifications could be mistaken for "done" before it ever ran.
            let queue_settled = self.0.borrow().notify_queue.is_empty();
            let all_perfect = self
                .0
                .borrow()
                .resources
                .values()
                .all(|r| r.borrow().perfect_schedule());
            if queue_settled && all_perfect {
                break;
            }
        }

        let makespan = self.makespan();
        let mut inner = self.0.borrow_mut();
        inner.best_makespan = Some(match inner.best_makespan {
            Some(best) => best.min(makespan),
            None => makespan,
        });
        info!("schedule pass complete, makespan = {makespan}");
        Ok(())
    }
}
