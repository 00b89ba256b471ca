/*!
 * Process Types
 * States, errors, and the process-info record
 */

use crate::core::limits::PROCINFO_MAX_ARGS;
use crate::core::types::{Pid, Tid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The process table is exhausted.
    #[error("No free process record")]
    NoResource,

    /// The pid does not name a process the caller may act on (for
    /// `wait_child`: a child of the caller).
    #[error("No such process: {0}")]
    NoSuchProcess(Pid),

    /// `wait_child(any)` with no children left to wait for.
    #[error("No children to wait for")]
    NoChildren,

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),
}

/// Thread errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadError {
    /// The tid does not name a thread of the caller's process (or the
    /// record has already been reclaimed).
    #[error("No such thread: {0}")]
    NoSuchThread(Tid),

    /// Joining a detached thread, or the target detached mid-join.
    #[error("Thread {0} is detached")]
    Detached(Tid),

    /// A thread cannot join itself.
    #[error("Thread cannot join itself")]
    JoinSelf,

    /// Detaching a thread that has already exited.
    #[error("Thread {0} has already exited")]
    AlreadyExited(Tid),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),
}

/// Lifecycle state of an allocated process record. Free records are not
/// represented; they live on the table's free-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// At least one thread is still running.
    Alive,
    /// All threads have exited; awaiting harvest by the parent.
    Zombie,
}

/// One record of the process-info stream (see `Kernel::open_info`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessInfo {
    pub pid: Pid,
    pub ppid: Option<Pid>,
    pub alive: bool,
    pub thread_count: usize,
    /// Argument block, truncated to [`PROCINFO_MAX_ARGS`] bytes.
    pub args: Vec<u8>,
}

impl ProcessInfo {
    pub(crate) fn truncate_args(mut self) -> Self {
        self.args.truncate(PROCINFO_MAX_ARGS);
        self
    }
}
