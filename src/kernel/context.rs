/*!
 * Execution Contexts
 *
 * Each kernel thread runs on an OS thread through a trampoline that
 * installs the current-(pid, tid) context, runs the task, and routes the
 * return value into the thread-exit path.
 */

use super::Kernel;
use crate::core::types::{Pid, Tid};
use log::error;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::thread;

/// Identity of the kernel thread running on the current OS thread.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Current {
    pub pid: Pid,
    pub tid: Tid,
}

thread_local! {
    static CURRENT: Cell<Option<Current>> = const { Cell::new(None) };
}

/// The calling thread's kernel identity. Fatal outside a task: every
/// syscall that needs a caller must run on a kernel execution context.
pub(crate) fn current() -> Current {
    CURRENT
        .with(Cell::get)
        .unwrap_or_else(|| panic!("kernel call from outside a process context"))
}

fn set_current(ctx: Current) {
    CURRENT.with(|c| c.set(Some(ctx)));
}

/// Panic payload used to unwind a task after `exit`/`thread_exit` has done
/// its bookkeeping. Caught (and swallowed) by the trampoline.
pub(crate) struct ThreadExitUnwind;

/// Exit status recorded for a task that panicked instead of returning.
const TASK_PANIC_STATUS: i32 = -1;

static EXIT_HOOK: Once = Once::new();

/// Keep the default panic hook quiet about `ThreadExitUnwind` unwinds;
/// they are control flow, not failures.
pub(super) fn install_exit_hook() {
    EXIT_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().is::<ThreadExitUnwind>() {
                return;
            }
            previous(info);
        }));
    });
}

/// Spawn the OS thread backing a new kernel thread. The thread record must
/// already be registered; the caller still holds the kernel lock, so the
/// new context cannot observe a half-initialized record.
pub(crate) fn spawn_context(
    kernel: Arc<Kernel>,
    pid: Pid,
    tid: Tid,
) -> Result<(), std::io::Error> {
    thread::Builder::new()
        .name(format!("proc{pid}-thr{tid}"))
        .spawn(move || {
            set_current(Current { pid, tid });

            let (task, args, is_main) = {
                let st = kernel.lock();
                let proc = st
                    .procs
                    .get(pid)
                    .unwrap_or_else(|| panic!("spawned context for missing process {pid}"));
                let rec = proc
                    .threads
                    .get(&tid)
                    .unwrap_or_else(|| panic!("spawned context for missing thread {tid}"));
                (rec.task.clone(), rec.args.clone(), rec.is_main)
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(&kernel, &args)));
            match outcome {
                // Returning from the entry task exits the whole process;
                // returning from any other task exits just that thread.
                Ok(status) if is_main => kernel.finish_exit(status),
                Ok(status) => kernel.finish_thread(status),
                Err(payload) if payload.is::<ThreadExitUnwind>() => {
                    // exit/thread_exit already ran the bookkeeping
                }
                Err(payload) => {
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!("task of thread {} (pid {}) panicked: {}", tid, pid, msg);
                    kernel.finish_thread(TASK_PANIC_STATUS);
                }
            }
        })
        .map(|_| ())
}
