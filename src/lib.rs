/*!
 * Tiny OS Kernel
 *
 * The process, thread, and IPC core of a small teaching operating system,
 * simulated in userspace. One [`Kernel`] owns a process table, a handle
 * arena, and the pipe/socket control blocks; tasks run on real OS threads
 * and call back into the kernel through syscall-shaped methods.
 *
 * ## Quick start
 *
 * ```no_run
 * use tiny_os_kernel::{task, Kernel, KernelConfig};
 *
 * let kernel = Kernel::new(KernelConfig::default());
 * let status = kernel.boot(
 *     task(|k, _args| {
 *         let child = k.exec(Some(task(|_, _| 7)), &[]).unwrap();
 *         let (_, status) = k.wait_child(Some(child)).unwrap();
 *         status
 *     }),
 *     &[],
 * );
 * assert_eq!(status, 7);
 * ```
 *
 * `boot` returns when the init process (pid 1) exits; its status is the
 * run's result. Any zombies init leaves behind are harvested before then,
 * so a returned `boot` means a quiescent kernel.
 */

pub mod core;
pub mod handles;
pub mod ipc;
pub mod kernel;
pub mod process;

pub use crate::core::{
    config::KernelConfig,
    errors::KernelError,
    types::{task, ExitCode, Fid, Pid, Port, Size, Task, Tid, NOPORT},
};
pub use crate::handles::HandleError;
pub use crate::ipc::pipe::PipeError;
pub use crate::ipc::socket::{ShutdownMode, SocketError};
pub use crate::kernel::Kernel;
pub use crate::process::{ProcessError, ProcessInfo, ProcessState, ThreadError};
