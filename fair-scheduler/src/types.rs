use std::collections::HashSet;
use std::fmt;

/// Identity of a worker node in the cluster, as known to this job actor.
///
/// Node identities are opaque strings (hostnames or stable cluster-assigned
/// ids) to this crate; it never interprets them beyond equality/ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for NodeId {
    fn from(s: S) -> Self {
        NodeId::new(s)
    }
}

/// Opaque handle identifying a running worker process, as handed to the
/// actor by `TaskStarted`. The actor never dereferences this; it only uses
/// it as a map key and as the thing whose liveness it observes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerHandle(pub u64);

/// One input replica: a data url and the node that currently hosts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub url: String,
    pub host: NodeId,
}

impl Input {
    pub fn new<U: Into<String>, H: Into<NodeId>>(url: U, host: H) -> Self {
        Self {
            url: url.into(),
            host: host.into(),
        }
    }
}

/// Immutable-by-convention task descriptor. `chosen_input` is the one field
/// the scheduler is allowed to rewrite, and only while the task is not
/// visible to any caller (i.e. while it sits in a bucket between calls).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub task_id: u64,
    pub mode: String,
    pub inputs: Vec<Input>,
    pub task_blacklist: HashSet<NodeId>,
    pub force_local: bool,
    pub force_remote: bool,
    pub chosen_input: Option<String>,
}

impl Task {
    /// Builds a new unplaced task. Panics if `inputs` is empty or if both
    /// force flags are set: both are caller programming errors, not runtime
    /// conditions the scheduler needs to recover from.
    pub fn new(task_id: u64, mode: impl Into<String>, inputs: Vec<Input>) -> Self {
        assert!(!inputs.is_empty(), "task must have at least one input");
        Self {
            task_id,
            mode: mode.into(),
            inputs,
            task_blacklist: HashSet::new(),
            force_local: false,
            force_remote: false,
            chosen_input: None,
        }
    }

    pub fn with_blacklist(mut self, blacklist: impl IntoIterator<Item = NodeId>) -> Self {
        self.task_blacklist = blacklist.into_iter().collect();
        self
    }

    pub fn with_force_local(mut self) -> Self {
        assert!(!self.force_remote, "force_local and force_remote are exclusive");
        self.force_local = true;
        self
    }

    pub fn with_force_remote(mut self) -> Self {
        assert!(!self.force_local, "force_local and force_remote are exclusive");
        self.force_remote = true;
        self
    }

    /// Hosts of this task's input replicas, in input order.
    pub fn input_hosts(&self) -> impl Iterator<Item = &NodeId> {
        self.inputs.iter().map(|input| &input.host)
    }
}

/// Outcome of a scheduling call. There is no `Err` case here: a failure to
/// find a placement is an ordinary, expected value, not an exceptional one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run `task` on `node`.
    Run { node: NodeId, task: Task },
    /// The job has pending work but none of it can be placed on the given
    /// nodes.
    NoNodes,
    /// The job has no data-local work for the given nodes; the caller may
    /// retry with `ScheduleRemote` against an empty-node set.
    NoLocal,
}
