/*!
 * Process Management
 *
 * Process and thread lifecycle: the process table, creation and exit,
 * child harvesting, join/detach, and the process-info stream.
 */

pub(crate) mod info;
mod lifecycle;
pub(crate) mod table;
pub(crate) mod thread;
mod types;

pub use types::{ProcessError, ProcessInfo, ProcessResult, ProcessState, ThreadError};
