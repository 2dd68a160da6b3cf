use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_std::channel;
use async_std::future;
use async_std::sync::Mutex;
use async_trait::async_trait;

use common::task::ChildTask;

use crate::arbiter::PeerHandle;
use crate::assign::{assign_task, NodeStat};
use crate::bucket::TaskStore;
use crate::events::{AbortCause, AbortEvent, DiedEvent, EventSink};
use crate::reassign::update_nodes;
use crate::scheduler;
use crate::types::{Decision, NodeId, Task, WorkerHandle};

/// Deadline the arbiter gives `ScheduleLocal`/`ScheduleRemote`/`GetStats`
/// before it gives up on this actor and asks it to die.
pub const SCHEDULE_DEADLINE: Duration = Duration::from_secs(30);

/// Deadline the arbiter gives a single peer's `GetEmptyNodes` call while
/// fanning out for a scheduling round. See [`crate::arbiter`].
pub const PEER_DEADLINE: Duration = Duration::from_millis(500);

/// Observes the lifetime of the job coordinator that owns this actor. The
/// actor terminates itself once the coordinator is gone: with no coordinator
/// there is nobody left to hand new tasks to it or to read its decisions.
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
    async fn wait_terminated(&self);
}

/// Observes the lifetime of a single running worker process, as registered
/// by [`JobScheduler::task_started`].
#[async_trait]
pub trait WorkerLifecycle: Send + Sync {
    async fn wait_terminated(&self);
}

/// Snapshot returned by `GetStats`. Deliberately thin: the per-worker
/// running map is not exposed past its aggregate count, since nothing
/// outside the actor needs worker-handle identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub queued_total: usize,
    pub running_count: usize,
}

enum ActorEvent {
    WorkerTerminated(WorkerHandle),
    CoordinatorTerminated,
    Die(String),
}

struct State {
    store: TaskStore,
    nodes: HashSet<NodeId>,
    running: HashMap<WorkerHandle, (NodeId, ChildTask)>,
    alive: bool,
}

struct Shared {
    job_name: String,
    event_sink: Arc<dyn EventSink>,
    state: Mutex<State>,
    event_tx: channel::Sender<ActorEvent>,
}

/// One job's placement actor: a `TaskStore` plus the cluster membership and
/// running-worker bookkeeping it needs to place and re-place tasks, wrapped
/// behind an `Arc` so handles can be cloned freely to every caller (the
/// coordinator, the worker-liveness watchers, the arbiter).
#[derive(Clone)]
pub struct JobScheduler {
    shared: Arc<Shared>,
}

impl JobScheduler {
    /// Creates a new actor and the background task that must be spawned to
    /// drive its event loop (worker/coordinator termination, `Die`). The
    /// caller owns that future's lifetime; dropping it without polling it to
    /// completion leaves worker-termination bookkeeping stuck, but places no
    /// correctness burden on already-made scheduling decisions.
    ///
    /// If `coordinator` is already dead by the time this is called, the
    /// returned actor terminates itself as soon as its event loop gets a
    /// turn to run. Detecting that race early enough to avoid constructing
    /// the actor at all (and substituting a no-op placeholder instead) is
    /// the caller's responsibility, since only the caller knows how to
    /// check coordinator liveness without consuming `coordinator`'s own
    /// one-shot termination signal.
    pub fn new(
        job_name: impl Into<String>,
        coordinator: Arc<dyn CoordinatorLink>,
        event_sink: Arc<dyn EventSink>,
    ) -> (Self, impl Future<Output = ()>) {
        let (event_tx, event_rx) = channel::unbounded();

        let shared = Arc::new(Shared {
            job_name: job_name.into(),
            event_sink,
            state: Mutex::new(State {
                store: TaskStore::new(),
                nodes: HashSet::new(),
                running: HashMap::new(),
                alive: true,
            }),
            event_tx,
        });

        let coordinator_watcher = {
            let tx = shared.event_tx.clone();
            ChildTask::spawn(async move {
                coordinator.wait_terminated().await;
                let _ = tx.send(ActorEvent::CoordinatorTerminated).await;
            })
        };

        let scheduler = Self {
            shared: shared.clone(),
        };
        let run_loop = run_event_loop(shared, event_rx, coordinator_watcher);

        (scheduler, run_loop)
    }

    pub fn job_name(&self) -> &str {
        &self.shared.job_name
    }

    pub async fn is_alive(&self) -> bool {
        self.shared.state.lock().await.alive
    }

    /// `NewTask`: places a freshly-arrived task, aborting the job if it
    /// turns out unschedulable. No-op once the job has already aborted.
    pub async fn new_task(&self, task: Task, node_stats: Vec<NodeStat>) {
        let mut state = self.shared.state.lock().await;
        if !state.alive {
            return;
        }

        let current_nodes = state.nodes.clone();
        if let Err((task, cause)) = assign_task(&mut state.store, task, node_stats, &current_nodes) {
            state.alive = false;
            drop(state);
            self.abort(task, cause).await;
        }
    }

    /// `UpdateNodes`: records the new cluster membership and re-places any
    /// task whose node left, aborting the job if one has nowhere left to go.
    pub async fn update_nodes(&self, new_nodes: Vec<NodeId>) {
        let mut state = self.shared.state.lock().await;
        if !state.alive {
            return;
        }

        state.nodes = new_nodes.iter().cloned().collect();
        if let Err((task, cause)) = update_nodes(&mut state.store, &new_nodes) {
            state.alive = false;
            drop(state);
            self.abort(task, cause).await;
        }
    }

    /// `TaskStarted`: registers `handle` as running on `node` and begins
    /// observing its liveness. Once `worker` reports termination the handle
    /// is dropped from the running set.
    ///
    /// Returns `Err` if `handle` is already registered as running: that is a
    /// coordinator bug (the same worker handle reported started twice), not
    /// an expected scheduling outcome, so it is reported as a genuine error
    /// rather than folded into `Decision`/`AbortCause`.
    pub async fn task_started(
        &self,
        node: NodeId,
        handle: WorkerHandle,
        worker: Arc<dyn WorkerLifecycle>,
    ) -> common::errors::Result<()> {
        let mut state = self.shared.state.lock().await;
        if state.running.contains_key(&handle) {
            return Err(common::errors::format_err!(
                "worker handle {:?} reported started while already running",
                handle
            ));
        }

        let watcher = {
            let tx = self.shared.event_tx.clone();
            let watched_handle = handle.clone();
            ChildTask::spawn(async move {
                worker.wait_terminated().await;
                let _ = tx.send(ActorEvent::WorkerTerminated(watched_handle)).await;
            })
        };

        state.running.insert(handle, (node, watcher));
        Ok(())
    }

    /// `GetStats`, deadline-bounded like the other synchronous calls.
    pub async fn get_stats(&self) -> Stats {
        let shared = self.shared.clone();
        let fut = async move {
            let state = shared.state.lock().await;
            if !state.alive {
                return Stats::default();
            }
            Stats {
                queued_total: state.store.queued_total(),
                running_count: state.running.len(),
            }
        };

        match future::timeout(SCHEDULE_DEADLINE, fut).await {
            Ok(stats) => stats,
            Err(_) => {
                self.die("GetStats exceeded its 30s deadline").await;
                Stats::default()
            }
        }
    }

    /// `GetEmptyNodes`. Unlike the other handlers this one is not
    /// self-deadlined: the 500 ms bound applies at the call site, when the
    /// arbiter polls a peer for it (see [`crate::arbiter::schedule`]).
    pub async fn get_empty_nodes(&self, available: &[NodeId]) -> Vec<NodeId> {
        let state = self.shared.state.lock().await;
        if !state.alive {
            return Vec::new();
        }
        scheduler::get_empty_nodes(&state.store, available)
    }

    /// `ScheduleLocal`, deadline-bounded.
    pub async fn schedule_local(&self, available: &[NodeId]) -> Decision {
        let shared = self.shared.clone();
        let available = available.to_vec();
        let fut = async move {
            let mut state = shared.state.lock().await;
            if !state.alive {
                return Decision::NoNodes;
            }
            scheduler::schedule_local(&mut state.store, &available)
        };

        match future::timeout(SCHEDULE_DEADLINE, fut).await {
            Ok(decision) => decision,
            Err(_) => {
                self.die("ScheduleLocal exceeded its 30s deadline").await;
                Decision::NoNodes
            }
        }
    }

    /// `ScheduleRemote`, deadline-bounded.
    pub async fn schedule_remote(&self, free_nodes: &[NodeId]) -> Decision {
        let shared = self.shared.clone();
        let free_nodes = free_nodes.to_vec();
        let fut = async move {
            let mut state = shared.state.lock().await;
            if !state.alive {
                return Decision::NoNodes;
            }
            scheduler::schedule_remote(&mut state.store, &free_nodes)
        };

        match future::timeout(SCHEDULE_DEADLINE, fut).await {
            Ok(decision) => decision,
            Err(_) => {
                self.die("ScheduleRemote exceeded its 30s deadline").await;
                Decision::NoNodes
            }
        }
    }

    /// Ends the actor with `reason`, logged via its `EventSink`. Called by a
    /// coordinator that wants to voluntarily tear a job down, and internally
    /// by the synchronous calls above when they miss their deadline.
    pub async fn die(&self, reason: impl Into<String>) {
        let _ = self.shared.event_tx.send(ActorEvent::Die(reason.into())).await;
    }

    async fn abort(&self, task: Task, cause: AbortCause) {
        self.shared
            .event_sink
            .abort(AbortEvent::new(&self.shared.job_name, &task, cause));
    }
}

#[async_trait]
impl PeerHandle for JobScheduler {
    async fn get_empty_nodes(&self, available: Vec<NodeId>) -> Vec<NodeId> {
        JobScheduler::get_empty_nodes(self, &available).await
    }
}

async fn run_event_loop(
    shared: Arc<Shared>,
    event_rx: channel::Receiver<ActorEvent>,
    _coordinator_watcher: ChildTask,
) {
    while let Ok(event) = event_rx.recv().await {
        match event {
            ActorEvent::WorkerTerminated(handle) => {
                let mut state = shared.state.lock().await;
                state.running.remove(&handle);
            }
            ActorEvent::CoordinatorTerminated => {
                let mut state = shared.state.lock().await;
                state.alive = false;
                break;
            }
            ActorEvent::Die(reason) => {
                let mut state = shared.state.lock().await;
                state.alive = false;
                drop(state);
                shared.event_sink.died(DiedEvent {
                    job_name: shared.job_name.clone(),
                    reason,
                });
                break;
            }
        }
    }
}
