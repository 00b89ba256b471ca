/*!
 * Thread Lifecycle
 *
 * Per-process thread records with join/detach semantics. A record outlives
 * its thread while joiners still reference it; the last joiner reclaims it.
 */

use super::types::ThreadError;
use crate::core::types::{ExitCode, Task, Tid};
use crate::kernel::context::{self, current, ThreadExitUnwind};
use crate::kernel::{Kernel, WaitChannel, WaitClass};
use log::debug;

/// One thread-control record.
pub(crate) struct ThreadRecord {
    pub task: Task,
    /// Deep copy of the creation-time argument block.
    pub args: Vec<u8>,
    pub exited: bool,
    pub detached: bool,
    pub exitval: ExitCode,
    /// Joiners currently referencing this record.
    pub refcount: usize,
    /// The process's entry thread. Its normal return is a process exit,
    /// not just a thread exit.
    pub is_main: bool,
}

impl ThreadRecord {
    pub fn new(task: Task, args: Vec<u8>, is_main: bool) -> Self {
        Self {
            task,
            args,
            exited: false,
            detached: false,
            exitval: 0,
            refcount: 0,
            is_main,
        }
    }
}

impl Kernel {
    /// Create a new thread in the calling process and schedule it.
    pub fn create_thread(&self, task: Task, args: &[u8]) -> Result<Tid, ThreadError> {
        let me = current();
        let mut st = self.lock();

        let tid = st.alloc_tid();
        let proc = st
            .procs
            .get_mut(me.pid)
            .unwrap_or_else(|| panic!("caller's process record missing"));
        proc.threads
            .insert(tid, ThreadRecord::new(task, args.to_vec(), false));
        proc.thread_count += 1;

        // The new context blocks on the kernel lock we hold, so the record
        // is fully published before it can run.
        if let Err(e) = context::spawn_context(self.arc(), me.pid, tid) {
            let proc = st.procs.get_mut(me.pid).unwrap_or_else(|| unreachable!());
            proc.threads.remove(&tid);
            proc.thread_count -= 1;
            return Err(ThreadError::SpawnFailed(e.to_string()));
        }

        debug!("created thread {} in process {}", tid, me.pid);
        Ok(tid)
    }

    /// The calling thread's own id.
    pub fn thread_self(&self) -> Tid {
        current().tid
    }

    /// Wait for a thread of the calling process to exit and collect its
    /// exit value. The last joiner of an exited thread reclaims the record.
    pub fn thread_join(&self, tid: Tid) -> Result<ExitCode, ThreadError> {
        let me = current();
        if tid == me.tid {
            return Err(ThreadError::JoinSelf);
        }

        let mut st = self.lock();
        {
            let proc = st
                .procs
                .get_mut(me.pid)
                .unwrap_or_else(|| panic!("caller's process record missing"));
            let rec = proc
                .threads
                .get_mut(&tid)
                .ok_or(ThreadError::NoSuchThread(tid))?;
            if rec.detached {
                return Err(ThreadError::Detached(tid));
            }
            rec.refcount += 1;
        }

        loop {
            let rec = joined_record(&mut st, me.pid, tid);
            if rec.exited || rec.detached {
                break;
            }
            self.sleep_on(st, WaitChannel::ThreadExit(tid), WaitClass::User, None);
            st = self.lock();
        }

        let rec = joined_record(&mut st, me.pid, tid);
        rec.refcount -= 1;
        if rec.detached {
            return Err(ThreadError::Detached(tid));
        }
        let exitval = rec.exitval;
        if rec.refcount == 0 {
            let proc = st.procs.get_mut(me.pid).unwrap_or_else(|| unreachable!());
            proc.threads.remove(&tid);
            debug!("thread {} reclaimed by last joiner", tid);
        }
        Ok(exitval)
    }

    /// Mark a thread of the calling process detached. Blocked joiners are
    /// woken and fail their join.
    pub fn thread_detach(&self, tid: Tid) -> Result<(), ThreadError> {
        let me = current();
        let mut st = self.lock();
        let proc = st
            .procs
            .get_mut(me.pid)
            .unwrap_or_else(|| panic!("caller's process record missing"));
        let rec = proc
            .threads
            .get_mut(&tid)
            .ok_or(ThreadError::NoSuchThread(tid))?;
        if rec.exited {
            return Err(ThreadError::AlreadyExited(tid));
        }
        rec.detached = true;
        drop(st);
        self.wait.broadcast(WaitChannel::ThreadExit(tid));
        Ok(())
    }

    /// Terminate the calling thread. If it is the process's last live
    /// thread, the process undergoes the full exit cascade.
    pub fn thread_exit(&self, status: ExitCode) -> ! {
        self.finish_thread(status);
        std::panic::panic_any(ThreadExitUnwind)
    }

    /// Thread-exit bookkeeping, shared by `thread_exit` and the trampoline's
    /// normal-return path.
    pub(crate) fn finish_thread(&self, status: ExitCode) {
        let me = current();
        let mut st = self.lock();

        let proc = st
            .procs
            .get_mut(me.pid)
            .unwrap_or_else(|| panic!("exiting thread has no process record"));
        let rec = proc
            .threads
            .get_mut(&me.tid)
            .unwrap_or_else(|| panic!("exiting thread has no record"));
        assert!(!rec.exited, "thread exited twice");
        rec.exitval = status;
        rec.exited = true;
        proc.thread_count -= 1;
        let last = proc.thread_count == 0;

        self.wait.broadcast(WaitChannel::ThreadExit(me.tid));
        debug!("thread {} of process {} exited ({})", me.tid, me.pid, status);

        if last {
            self.finish_process(&mut st, me.pid);
        }
    }
}

/// A record a joiner holds a reference on. Its disappearance while
/// referenced is a structural invariant violation.
fn joined_record<'a>(
    st: &'a mut crate::kernel::KernelState,
    pid: crate::core::types::Pid,
    tid: Tid,
) -> &'a mut ThreadRecord {
    st.procs
        .get_mut(pid)
        .and_then(|p| p.threads.get_mut(&tid))
        .unwrap_or_else(|| panic!("thread record freed while a joiner references it"))
}
