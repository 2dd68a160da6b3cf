use std::collections::HashSet;

use rand::Rng;

use crate::assign::{assign_task, NodeStat};
use crate::bucket::TaskStore;
use crate::events::AbortCause;
use crate::types::{NodeId, Task};

/// Drops buckets for nodes that left the cluster (the NOPREF bucket is
/// always rebuilt fresh too) and re-assigns their
/// tasks against the new membership. Stops and reports the first task
/// that turns out to be unschedulable against the new topology; any tasks
/// behind it in the drain order are left unassigned, matching how a single
/// abort during `NewTask` ends the job before later tasks arrive.
pub fn update_nodes(
    store: &mut TaskStore,
    new_nodes: &[NodeId],
) -> Result<(), (Task, AbortCause)> {
    let keep: HashSet<NodeId> = new_nodes.iter().cloned().collect();
    let orphaned = store.retain_nodes_draining_rest(|node| keep.contains(node));

    let mut rng = rand::thread_rng();
    for task in orphaned {
        // Locality-driven re-placement with a random tiebreak: the caller
        // (here, the reassignment engine itself) synthesizes load samples
        // since no real per-node load signal survives a topology change.
        let node_stats: Vec<NodeStat> = task
            .inputs
            .iter()
            .filter(|input| keep.contains(&input.host))
            .map(|input| NodeStat {
                load: rng.gen_range(1..=100),
                input: input.clone(),
            })
            .collect();

        assign_task(store, task, node_stats, &keep)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Input;

    fn node(id: &str) -> NodeId {
        NodeId::new(id)
    }

    fn task(id: u64, host: &str) -> Task {
        Task::new(id, "map", vec![Input::new("u", node(host))])
    }

    #[test]
    fn kept_node_bucket_survives_with_its_lifetime_counter() {
        let mut store = TaskStore::new();
        store.node_mut_or_create(&node("H1")).push(task(1, "H1"));
        let lifetime_before = store.node(&node("H1")).unwrap().lifetime();

        update_nodes(&mut store, &[node("H1"), node("H3")]).unwrap();

        let bucket = store.node(&node("H1")).unwrap();
        assert_eq!(bucket.queued(), 1);
        assert_eq!(bucket.lifetime(), lifetime_before);
    }

    #[test]
    fn orphaned_node_and_nopref_tasks_are_reassigned() {
        let mut store = TaskStore::new();
        store.node_mut_or_create(&node("H1")).push(task(1, "H1"));
        store.node_mut_or_create(&node("H2")).push(task(2, "H2"));
        store.nopref_mut().push(task(3, "H3"));

        update_nodes(&mut store, &[node("H1"), node("H3")]).unwrap();

        assert_eq!(store.node(&node("H2")), None);
        assert_eq!(store.queued_total(), 3);
        // Task 3's input host (H3) is still in the cluster, so it finds a
        // fresh data-local home there instead of falling to NOPREF.
        assert_eq!(store.node(&node("H3")).unwrap().queued(), 1);
        // Task 2's only input host (H2) left the cluster, so it has
        // nowhere data-local to go and lands in the fresh NOPREF bucket.
        let nopref_ids: Vec<u64> = store.nopref().iter().map(|t| t.task_id).collect();
        assert_eq!(nopref_ids, vec![2]);
    }

    #[test]
    fn idempotent_topology_update_is_a_fixed_point() {
        let mut store = TaskStore::new();
        store.node_mut_or_create(&node("H1")).push(task(1, "H1"));
        store.node_mut_or_create(&node("H2")).push(task(2, "H2"));

        update_nodes(&mut store, &[node("H1"), node("H3")]).unwrap();
        let queued_after_first = store.queued_total();
        let h1_queued_after_first = store.node(&node("H1")).unwrap().queued();

        update_nodes(&mut store, &[node("H1"), node("H3")]).unwrap();

        assert_eq!(store.queued_total(), queued_after_first);
        assert_eq!(store.node(&node("H1")).unwrap().queued(), h1_queued_after_first);
    }

    #[test]
    fn unschedulable_orphan_aborts_with_its_cause() {
        let mut store = TaskStore::new();
        store
            .node_mut_or_create(&node("H1"))
            .push(task(1, "H1").with_force_local());

        let (failed, cause) = update_nodes(&mut store, &[node("H2")]).unwrap_err();
        assert_eq!(failed.task_id, 1);
        assert_eq!(cause, AbortCause::ForcedLocalUnsatisfiable);
    }
}
