/*!
 * Core Module
 * Shared types, limits, configuration, errors, and synchronization
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod sync;
pub mod types;

pub use config::KernelConfig;
pub use errors::KernelError;
pub use types::{task, ExitCode, Fid, Pid, Port, Size, Task, Tid, NOPORT};
