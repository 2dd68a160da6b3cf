use std::collections::HashSet;

use crate::bucket::TaskStore;
use crate::events::AbortCause;
use crate::types::{Input, NodeId, Task};

/// One `(load, input)` sample the coordinator supplies alongside a new
/// task: `load` is an opaque, smaller-is-less-loaded signal for the node
/// hosting `input`. Entries need not cover every input and may be supplied
/// in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStat {
    pub load: u64,
    pub input: Input,
}

/// Placing a task either succeeds (the `Ok` case covers both the
/// data-local and NOPREF paths, which is why it returns unit: the caller
/// doesn't need to know which bucket absorbed it) or determines the task
/// is unschedulable, in which case the job must abort. The task is handed
/// back on failure so the caller can build an abort event out of it
/// without having cloned it up front.
pub type AssignOutcome = Result<(), (Task, AbortCause)>;

/// Places a newly-arrived task into the correct bucket of `store`, given
/// the current cluster membership.
pub fn assign_task(
    store: &mut TaskStore,
    task: Task,
    node_stats: Vec<NodeStat>,
    current_nodes: &HashSet<NodeId>,
) -> AssignOutcome {
    if task.force_remote {
        let admissible: HashSet<NodeId> = current_nodes
            .iter()
            .filter(|node| !task.task_blacklist.contains(node))
            .cloned()
            .collect();

        let has_remote_candidate = admissible
            .iter()
            .any(|node| !task.input_hosts().any(|host| host == node));

        if !has_remote_candidate {
            return Err((task, AbortCause::ForcedRemoteUnsatisfiable));
        }

        return assign_nopref(store, task, &admissible);
    }

    let admissible: HashSet<NodeId> = current_nodes
        .iter()
        .filter(|node| !task.task_blacklist.contains(node))
        .cloned()
        .collect();

    findpref(store, task, node_stats, &admissible)
}

/// Prefers the admissible input host whose bucket is least full, breaking
/// ties by load and then by the order `node_stats` was supplied in.
fn findpref(
    store: &mut TaskStore,
    mut task: Task,
    node_stats: Vec<NodeStat>,
    admissible: &HashSet<NodeId>,
) -> AssignOutcome {
    let best = node_stats
        .into_iter()
        .enumerate()
        .filter(|(_, stat)| admissible.contains(&stat.input.host))
        .min_by_key(|(order, stat)| {
            let queued = store.node(&stat.input.host).map(|b| b.queued()).unwrap_or(0);
            (queued, stat.load, *order)
        })
        .map(|(_, stat)| stat);

    let best = match best {
        Some(stat) => stat,
        None => return assign_nopref(store, task, admissible),
    };

    task.chosen_input = Some(best.input.url.clone());
    store.node_mut_or_create(&best.input.host).push(task);
    Ok(())
}

/// The task has no admissible data-local host, so it goes to the NOPREF
/// bucket, bound to its first input's url.
fn assign_nopref(
    store: &mut TaskStore,
    mut task: Task,
    admissible: &HashSet<NodeId>,
) -> AssignOutcome {
    if admissible.is_empty() {
        return Err((task, AbortCause::ExhaustedOnAllNodes));
    }

    if task.force_local {
        return Err((task, AbortCause::ForcedLocalUnsatisfiable));
    }

    task.chosen_input = Some(task.inputs[0].url.clone());
    store.nopref_mut().push(task);
    Ok(())
}
