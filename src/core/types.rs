/*!
 * Core Types
 * Common types used across the kernel
 */

use std::sync::Arc;

/// Process ID type: index into the process table
pub type Pid = u32;

/// Thread ID type: opaque to callers, unique for the kernel's lifetime
pub type Tid = u64;

/// File ID type: index into a process's handle table
pub type Fid = u32;

/// Socket port number (`NOPORT` = unbound)
pub type Port = u16;

/// Exit status of a process or thread
pub type ExitCode = i32;

/// Size type for buffer operations
pub type Size = usize;

/// The "no port" sentinel: a socket created on this port can connect but
/// never listen.
pub const NOPORT: Port = 0;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;

/// A schedulable unit of work. Receives the kernel it runs on and the
/// process's copied argument block; the return value becomes the thread's
/// exit status.
pub type Task = Arc<dyn Fn(&crate::kernel::Kernel, &[u8]) -> ExitCode + Send + Sync>;

/// Build a [`Task`] from a closure.
pub fn task<F>(f: F) -> Task
where
    F: Fn(&crate::kernel::Kernel, &[u8]) -> ExitCode + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Hash map keyed with ahash, used for all id-addressed kernel arenas.
pub(crate) type Map<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
