use std::collections::HashSet;
use std::sync::Arc;

use async_std::future;
use async_trait::async_trait;

use crate::actor::{JobScheduler, PEER_DEADLINE};
use crate::types::{Decision, NodeId};

/// What the arbiter sees of a peer job actor: just enough to poll it for
/// empty nodes while fanning out a scheduling round. `JobScheduler` itself
/// implements this trait, so a live actor can stand in directly for one of
/// its own peers.
#[async_trait]
pub trait PeerHandle: Send + Sync {
    async fn get_empty_nodes(&self, available: Vec<NodeId>) -> Vec<NodeId>;
}

/// Cross-job empty-node set: the intersection of every peer's `GetEmptyNodes`
/// answer, starting from `available`. A peer that misses the 500 ms deadline
/// is treated as claiming all of `available` is empty for it, so a wedged
/// peer narrows the result rather than stalling the whole round.
pub async fn compute_free_nodes(peers: &[Arc<dyn PeerHandle>], available: &[NodeId]) -> Vec<NodeId> {
    let mut free: HashSet<NodeId> = available.iter().cloned().collect();

    for peer in peers {
        let peer_empty: HashSet<NodeId> =
            match future::timeout(PEER_DEADLINE, peer.get_empty_nodes(available.to_vec())).await {
                Ok(nodes) => nodes.into_iter().collect(),
                Err(_) => available.iter().cloned().collect(),
            };
        free = free.intersection(&peer_empty).cloned().collect();
    }

    let mut free: Vec<NodeId> = free.into_iter().collect();
    free.sort();
    free
}

/// The arbiter-level scheduling routine for one job: try `ScheduleLocal`
/// against `available`, and only if that comes back `NoLocal` compute the
/// cross-job free-node set and retry with `ScheduleRemote`. Runs in the
/// arbiter's own context rather than inside any job actor's handler, since
/// an actor calling out to its peers from within its own handler could
/// deadlock against a peer doing the same back to it.
pub async fn schedule(actor: &JobScheduler, peers: &[Arc<dyn PeerHandle>], available: &[NodeId]) -> Decision {
    match actor.schedule_local(available).await {
        Decision::NoLocal => {
            let free_nodes = compute_free_nodes(peers, available).await;
            actor.schedule_remote(&free_nodes).await
        }
        decision => decision,
    }
}
