use std::fmt;

use crate::types::{Input, Task};

/// Why a job actor aborted. These are the only conditions under which the
/// actor terminates itself with a logged event rather than simply running
/// out of work to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortCause {
    /// `force_remote` was set but every admissible node also hosts one of
    /// the task's inputs.
    ForcedRemoteUnsatisfiable,
    /// `force_local` was set but no admissible node hosts any of the
    /// task's inputs (and NOPREF assignment was about to be used instead).
    ForcedLocalUnsatisfiable,
    /// Every node is either absent from the cluster or blacklisted for
    /// this task; there is no candidate left to try.
    ExhaustedOnAllNodes,
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AbortCause::ForcedRemoteUnsatisfiable => {
                "forced remote but no eligible node"
            }
            AbortCause::ForcedLocalUnsatisfiable => "forced local but no eligible node",
            AbortCause::ExhaustedOnAllNodes => "task failed on all available nodes",
        };
        f.write_str(msg)
    }
}

/// One line of context describing why a job was aborted, ready to hand to
/// an `EventSink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortEvent {
    pub job_name: String,
    pub task_mode: String,
    pub task_id: u64,
    pub cause: AbortCause,
    pub inputs: Vec<Input>,
}

impl AbortEvent {
    pub fn new(job_name: &str, task: &Task, cause: AbortCause) -> Self {
        Self {
            job_name: job_name.to_string(),
            task_mode: task.mode.clone(),
            task_id: task.task_id,
            cause,
            inputs: task.inputs.clone(),
        }
    }
}

impl fmt::Display for AbortEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {} task {} (#{}) aborted: {} (inputs: {})",
            self.job_name,
            self.task_mode,
            self.task_id,
            self.cause,
            self.inputs
                .iter()
                .map(|input| format!("{}@{}", input.url, input.host))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// One line of context describing why a job actor was terminated outright,
/// either by its own coordinator or by a missed deadline. Distinct from
/// [`AbortEvent`]: an abort is the scheduler's own decision that a task (and
/// with it, the job) cannot proceed; a `DiedEvent` is the job being killed
/// from outside, or by the actor giving up on an unresponsive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiedEvent {
    pub job_name: String,
    pub reason: String,
}

impl fmt::Display for DiedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} died: {}", self.job_name, self.reason)
    }
}

/// Outbound collaborator for the event log. The actor never owns a
/// concrete logging backend: it is handed one at construction, the way the
/// teacher's services take an `Arc<dyn ...>` collaborator for anything
/// external to the actor's own state.
pub trait EventSink: Send + Sync {
    fn abort(&self, event: AbortEvent);

    /// Called once when a job actor is terminated with a reason, via `Die`.
    /// Default no-op so existing sinks that only care about aborts don't
    /// need to change.
    fn died(&self, _event: DiedEvent) {}
}

/// Default sink: writes one line to stderr per event. Matches how the
/// teacher's own node/manager binaries report failures directly to the
/// process's standard streams instead of through a structured logging
/// framework.
#[derive(Debug, Default)]
pub struct StderrEventSink;

impl EventSink for StderrEventSink {
    fn abort(&self, event: AbortEvent) {
        eprintln!("{}", event);
    }

    fn died(&self, event: DiedEvent) {
        eprintln!("{}", event);
    }
}
