use crate::types::{NodeId, Task};

/// Feasibility predicate: can `task` run on any node in `available`, and if
/// so, which one.
///
/// `available`'s order is the tie-break: "return any element" always means
/// "return the first element that survives the filters, in the caller's
/// order". Callers that want load-aware target selection must pre-sort
/// `available` themselves before calling this.
pub fn choose_node(task: &Task, available: &[NodeId]) -> Option<NodeId> {
    // Force-local tasks are never moved by this path: they are only ever
    // dispatched by the local bucket scan in `schedule_local`, which never
    // consults `choose_node`.
    if task.force_local {
        return None;
    }

    let candidates: Vec<&NodeId> = available
        .iter()
        .filter(|node| !task.task_blacklist.contains(node))
        .collect();

    if candidates.is_empty() {
        return None;
    }

    if task.force_remote {
        return candidates
            .into_iter()
            .find(|node| !task.input_hosts().any(|host| host == *node))
            .cloned();
    }

    candidates.into_iter().next().cloned()
}
