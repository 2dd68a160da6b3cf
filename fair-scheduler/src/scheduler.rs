use std::cmp::Reverse;
use std::collections::HashSet;

use crate::bucket::TaskStore;
use crate::placement::choose_node;
use crate::types::{Decision, NodeId};

/// The subset of `available` this job holds no pending work for, or
/// nothing at all if NOPREF is non-empty (the job would rather keep an
/// idle node for its own remote work than hand it to a peer job).
pub fn get_empty_nodes(store: &TaskStore, available: &[NodeId]) -> Vec<NodeId> {
    if !store.nopref().is_empty() {
        return Vec::new();
    }

    available
        .iter()
        .filter(|node| store.node(node).map_or(true, |bucket| bucket.is_empty()))
        .cloned()
        .collect()
}

/// Prefers a node this job already has data-local work queued for, picking
/// the least-loaded such node. Falls back to moving a NOPREF task onto
/// `available` if there is no data-local work, or to `NoLocal` if there is
/// nothing to offer at all.
pub fn schedule_local(store: &mut TaskStore, available: &[NodeId]) -> Decision {
    let available_set: HashSet<&NodeId> = available.iter().collect();

    let least_loaded_local = store
        .iter_nodes()
        .filter(|(node, bucket)| available_set.contains(node) && !bucket.is_empty())
        .min_by_key(|(node, bucket)| (bucket.queued(), (*node).clone()))
        .map(|(node, _)| node.clone());

    if let Some(node) = least_loaded_local {
        let task = store
            .bucket_mut(Some(&node))
            .pop_head()
            .expect("selected local bucket was checked non-empty");
        return Decision::Run { node, task };
    }

    if store.nopref().is_empty() {
        return Decision::NoLocal;
    }

    pop_and_switch_node(store, &[None], available)
}

/// Displaces a task from whichever node-bucket is busiest onto one of
/// `free_nodes`.
pub fn schedule_remote(store: &mut TaskStore, free_nodes: &[NodeId]) -> Decision {
    let victims: Vec<Option<NodeId>> = store.nodes_with_work().cloned().map(Some).collect();
    pop_and_switch_node(store, &victims, free_nodes)
}

/// Victim selection: picks the busiest bucket among `nodes` (`None` denotes
/// NOPREF, ties broken by ascending node identity), tries to relocate its
/// head task onto `available`, and falls back to `pop_suitable` across all
/// of `nodes` if the head task itself has nowhere to go.
fn pop_and_switch_node(
    store: &mut TaskStore,
    nodes: &[Option<NodeId>],
    available: &[NodeId],
) -> Decision {
    if available.is_empty() {
        return Decision::NoNodes;
    }

    let busiest = nodes
        .iter()
        .filter(|key| !store.bucket(key.as_ref()).is_empty())
        .max_by_key(|key| (store.bucket(key.as_ref()).queued(), Reverse((*key).clone())))
        .cloned();

    let busiest = match busiest {
        Some(key) => key,
        None => return Decision::NoNodes,
    };

    let head = store
        .bucket(busiest.as_ref())
        .iter()
        .next()
        .cloned()
        .expect("busiest bucket was checked non-empty");

    if let Some(target) = choose_node(&head, available) {
        let task = store
            .bucket_mut(busiest.as_ref())
            .pop_head()
            .expect("bucket was checked non-empty above");
        return Decision::Run { node: target, task };
    }

    pop_suitable(store, nodes, available)
}

/// Linear scan over `nodes` in order, then over each bucket's tasks in
/// order, returning the first task that has anywhere to go on `available`.
fn pop_suitable(store: &mut TaskStore, nodes: &[Option<NodeId>], available: &[NodeId]) -> Decision {
    for key in nodes {
        let found = store
            .bucket(key.as_ref())
            .iter()
            .enumerate()
            .find_map(|(index, task)| choose_node(task, available).map(|target| (index, target)));

        if let Some((index, target)) = found {
            let task = store.bucket_mut(key.as_ref()).remove(index);
            return Decision::Run { node: target, task };
        }
    }

    Decision::NoNodes
}
