pub mod actor;
pub mod arbiter;
pub mod assign;
pub mod bucket;
pub mod events;
pub mod placement;
pub mod reassign;
pub mod scheduler;
pub mod types;

pub use actor::{CoordinatorLink, JobScheduler, WorkerLifecycle};
pub use arbiter::{schedule, PeerHandle};
pub use events::{AbortCause, AbortEvent, DiedEvent, EventSink, StderrEventSink};
pub use types::{Decision, Input, NodeId, Task, WorkerHandle};
