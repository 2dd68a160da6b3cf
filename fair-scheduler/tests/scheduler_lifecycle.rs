use std::sync::Arc;

use async_std::channel;
use async_std::future;
use async_trait::async_trait;

use common::task::ChildTask;
use fair_scheduler::actor::{CoordinatorLink, JobScheduler};
use fair_scheduler::arbiter::{schedule, PeerHandle};
use fair_scheduler::assign::NodeStat;
use fair_scheduler::events::{AbortCause, AbortEvent, EventSink};
use fair_scheduler::types::{Decision, Input, NodeId, Task};

struct ManualCoordinator {
    rx: async_std::sync::Mutex<Option<channel::Receiver<()>>>,
}

impl ManualCoordinator {
    fn new() -> (Arc<Self>, channel::Sender<()>) {
        let (tx, rx) = channel::bounded(1);
        (
            Arc::new(Self {
                rx: async_std::sync::Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

#[async_trait]
impl CoordinatorLink for ManualCoordinator {
    async fn wait_terminated(&self) {
        let rx = self.rx.lock().await.take().expect("observed twice");
        let _ = rx.recv().await;
    }
}

struct NeverTerminates;

#[async_trait]
impl CoordinatorLink for NeverTerminates {
    async fn wait_terminated(&self) {
        future::pending::<()>().await;
    }
}

struct RecordingSink {
    last: async_std::sync::Mutex<Option<AbortEvent>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            last: async_std::sync::Mutex::new(None),
        })
    }
}

impl EventSink for RecordingSink {
    fn abort(&self, event: AbortEvent) {
        // Blocking lock is fine here: the sink is only ever called from the
        // actor's own mutex-guarded methods, never from inside the event
        // loop, so there is no deadlock hazard.
        if let Some(mut guard) = self.last.try_lock() {
            *guard = Some(event);
        }
    }
}

struct StaticPeer(Vec<NodeId>);

#[async_trait]
impl PeerHandle for StaticPeer {
    async fn get_empty_nodes(&self, _available: Vec<NodeId>) -> Vec<NodeId> {
        self.0.clone()
    }
}

fn node(id: &str) -> NodeId {
    NodeId::new(id)
}

#[async_std::test]
async fn blacklisted_task_is_skipped_for_its_sibling() {
    let (coordinator, _keep_alive) = ManualCoordinator::new();
    let (actor, run_loop) = JobScheduler::new("job-1", coordinator, RecordingSink::new());
    let _background = ChildTask::spawn(run_loop);

    let a = node("A");
    actor.update_nodes(vec![a.clone()]).await;

    let t1 = Task::new(1, "map", vec![Input::new("u1", a.clone())]).with_blacklist(vec![node("B")]);
    let t2 = Task::new(2, "map", vec![Input::new("u2", a.clone())]);

    // Push t2 first so t1 ends up at the bucket's head (newest-at-front),
    // matching the blacklist scenario this exercises.
    let stat = |id: u64| NodeStat {
        load: 1,
        input: Input::new(format!("u{}", id), a.clone()),
    };
    actor.new_task(t2.clone(), vec![stat(2)]).await;
    actor.new_task(t1.clone(), vec![stat(1)]).await;

    let decision = actor.schedule_remote(&[node("B")]).await;
    match decision {
        Decision::Run { node: target, task } => {
            assert_eq!(target, node("B"));
            assert_eq!(task.task_id, 2);
        }
        other => panic!("expected Run(B, t2), got {:?}", other),
    }

    assert_eq!(actor.get_stats().await.queued_total, 1);
}

#[async_std::test]
async fn force_remote_assignment_failure_terminates_the_job() {
    let (coordinator, _keep_alive) = ManualCoordinator::new();
    let sink = RecordingSink::new();
    let (actor, run_loop) = JobScheduler::new("job-1", coordinator, sink.clone());
    let _background = ChildTask::spawn(run_loop);

    actor.update_nodes(vec![node("H1")]).await;

    let task = Task::new(1, "map", vec![Input::new("u", node("H1"))]).with_force_remote();
    actor.new_task(task, vec![]).await;

    assert!(!actor.is_alive().await);
    let recorded = sink.last.lock().await.clone().expect("abort event recorded");
    assert_eq!(recorded.cause, AbortCause::ForcedRemoteUnsatisfiable);
    assert_eq!(recorded.task_id, 1);
}

#[async_std::test]
async fn topology_churn_preserves_surviving_bucket_and_reassigns_the_rest() {
    let (coordinator, _keep_alive) = ManualCoordinator::new();
    let (actor, run_loop) = JobScheduler::new("job-1", coordinator, RecordingSink::new());
    let _background = ChildTask::spawn(run_loop);

    actor.update_nodes(vec![node("H1"), node("H2")]).await;

    let stat = |host: &str| NodeStat {
        load: 1,
        input: Input::new("u", node(host)),
    };
    actor
        .new_task(Task::new(1, "map", vec![Input::new("u", node("H1"))]), vec![stat("H1")])
        .await;
    actor
        .new_task(Task::new(2, "map", vec![Input::new("u", node("H2"))]), vec![stat("H2")])
        .await;

    assert_eq!(actor.get_stats().await.queued_total, 2);

    actor.update_nodes(vec![node("H1"), node("H3")]).await;

    assert!(actor.is_alive().await);
    assert_eq!(actor.get_stats().await.queued_total, 2);

    // H1's task survives untouched; only H2's orphaned task was reshuffled.
    match actor.schedule_local(&[node("H1")]).await {
        Decision::Run { node: target, task } => {
            assert_eq!(target, node("H1"));
            assert_eq!(task.task_id, 1);
        }
        other => panic!("expected H1's original task back, got {:?}", other),
    }
}

#[async_std::test]
async fn arbiter_schedule_falls_through_to_peer_fanout_on_no_local() {
    let (actor, run_loop) = JobScheduler::new("job-1", Arc::new(NeverTerminates), RecordingSink::new());
    let _background = ChildTask::spawn(run_loop);

    actor.update_nodes(vec![node("A")]).await;
    actor
        .new_task(
            Task::new(1, "map", vec![Input::new("u", node("A"))]),
            vec![NodeStat { load: 1, input: Input::new("u", node("A")) }],
        )
        .await;

    let peers: Vec<Arc<dyn PeerHandle>> = vec![Arc::new(StaticPeer(vec![node("B")]))];
    let decision = schedule(&actor, &peers, &[node("B")]).await;
    match decision {
        Decision::Run { node: target, .. } => assert_eq!(target, node("B")),
        other => panic!("expected a remote Run on B, got {:?}", other),
    }
}
