use std::collections::{BTreeMap, VecDeque};

use crate::types::{NodeId, Task};

/// A per-node queue of pending tasks plus the two counters the fairness
/// arbiter reads as a load signal.
///
/// `tasks` keeps the newest task at the front: `push` inserts at the front,
/// `pop_front`/the `pop_suitable` walk both start from the front. This
/// ordering is preserved rather than "fixed" to a more familiar FIFO, since
/// nothing depends on it being one or the other and callers only ever
/// observe `queued`.
#[derive(Debug, Default, Clone)]
pub struct Bucket {
    lifetime: u64,
    tasks: VecDeque<Task>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> usize {
        self.tasks.len()
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Appends `task`, incrementing both counters. Used by the assignment
    /// engine when a task is newly placed.
    pub fn push(&mut self, task: Task) {
        self.lifetime += 1;
        self.tasks.push_front(task);
    }

    /// Removes and returns the head (most recently pushed) task, if any.
    /// Does not touch `lifetime`.
    pub fn pop_head(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Removes the task at `index` (as produced by `iter()`'s order).
    /// Does not touch `lifetime`.
    pub fn remove(&mut self, index: usize) -> Task {
        self.tasks
            .remove(index)
            .expect("index out of range for bucket")
    }
}

/// NOPREF bucket plus one bucket per node currently known to hold
/// data-local work for this job. The NOPREF bucket always exists; per-node
/// buckets are created lazily by the assignment engine and deleted by the
/// reassignment engine when their node leaves the cluster.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    nopref: Bucket,
    by_node: BTreeMap<NodeId, Bucket>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nopref(&self) -> &Bucket {
        &self.nopref
    }

    pub fn nopref_mut(&mut self) -> &mut Bucket {
        &mut self.nopref
    }

    pub fn node(&self, node: &NodeId) -> Option<&Bucket> {
        self.by_node.get(node)
    }

    pub fn node_mut_or_create(&mut self, node: &NodeId) -> &mut Bucket {
        self.by_node.entry(node.clone()).or_insert_with(Bucket::new)
    }

    /// Generic accessor over "NOPREF or a known node's bucket", used by the
    /// victim-selection machinery which treats NOPREF as just another
    /// candidate bucket. Panics if `node` is `Some` but has no bucket: all
    /// callers derive the key from an existing bucket first.
    pub fn bucket(&self, node: Option<&NodeId>) -> &Bucket {
        match node {
            None => &self.nopref,
            Some(n) => self.by_node.get(n).expect("bucket must already exist"),
        }
    }

    pub fn bucket_mut(&mut self, node: Option<&NodeId>) -> &mut Bucket {
        match node {
            None => &mut self.nopref,
            Some(n) => self.by_node.get_mut(n).expect("bucket must already exist"),
        }
    }

    /// Nodes with a bucket that currently holds data-local work, in
    /// ascending node-identity order (the deterministic tie-break order
    /// used throughout the scheduler).
    pub fn nodes_with_work(&self) -> impl Iterator<Item = &NodeId> {
        self.by_node
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(node, _)| node)
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (&NodeId, &Bucket)> {
        self.by_node.iter()
    }

    /// Total queued tasks across every bucket, including NOPREF. Backs
    /// `GetStats`.
    pub fn queued_total(&self) -> usize {
        self.nopref.queued() + self.by_node.values().map(Bucket::queued).sum::<usize>()
    }

    /// Drops every per-node bucket whose node is not in `keep`, replacing
    /// them with a fresh NOPREF bucket, and returns the flattened tasks
    /// that were orphaned (NOPREF's own tasks are always among them). The
    /// caller is responsible for re-assigning the returned tasks.
    pub fn retain_nodes_draining_rest(&mut self, keep: impl Fn(&NodeId) -> bool) -> Vec<Task> {
        let mut orphaned = Vec::new();

        for task in self.nopref.tasks.drain(..) {
            orphaned.push(task);
        }
        self.nopref = Bucket::new();

        let stale: Vec<NodeId> = self
            .by_node
            .keys()
            .filter(|node| !keep(node))
            .cloned()
            .collect();

        for node in stale {
            if let Some(mut bucket) = self.by_node.remove(&node) {
                orphaned.extend(bucket.tasks.drain(..));
            }
        }

        orphaned
    }
}
