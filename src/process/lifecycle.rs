/*!
 * Process Lifecycle
 *
 * Creation, exit, and harvest. Exit runs a cascade that reparents
 * unharvested children to init, hands over exited ones, notifies the
 * parent, and releases everything but the bare record; the record itself
 * is freed when the parent harvests it through `wait_child`.
 */

use super::thread::ThreadRecord;
use super::types::{ProcessError, ProcessState};
use crate::core::types::{ExitCode, Pid, Task};
use crate::kernel::context::{self, current, ThreadExitUnwind};
use crate::kernel::{Kernel, KernelState, WaitChannel, WaitClass};
use log::info;
use std::mem;

/// The init process: ancestor of last resort, pid 1.
const INIT: Pid = 1;

impl Kernel {
    /// Create a new process running `task` with a deep copy of `args`.
    ///
    /// The first two records of a fresh table go to the idle and init
    /// processes, which have no parent; every later process becomes a child
    /// of the caller and inherits its open handles.
    pub fn exec(&self, task: Option<Task>, args: &[u8]) -> Result<Pid, ProcessError> {
        let mut st = self.lock();
        let pid = st.procs.acquire().ok_or(ProcessError::NoResource)?;

        let parent = if pid > INIT {
            let parent = current().pid;
            let fidt = st
                .procs
                .get(parent)
                .unwrap_or_else(|| panic!("caller's process record missing"))
                .fidt
                .clone();
            for id in fidt.iter().flatten() {
                crate::handles::incref(&mut st, *id);
            }
            {
                let parent_rec = st.procs.get_mut(parent).unwrap_or_else(|| unreachable!());
                parent_rec.children.push(pid);
            }
            let proc = st.procs.get_mut(pid).unwrap_or_else(|| unreachable!());
            proc.parent = Some(parent);
            proc.fidt = fidt;
            Some(parent)
        } else {
            None
        };

        {
            let proc = st.procs.get_mut(pid).unwrap_or_else(|| unreachable!());
            proc.main_task = task.clone();
            proc.args = args.to_vec();
        }

        if let Some(task) = task {
            let tid = st.alloc_tid();
            let proc = st.procs.get_mut(pid).unwrap_or_else(|| unreachable!());
            proc.threads
                .insert(tid, ThreadRecord::new(task, args.to_vec(), true));
            proc.thread_count = 1;

            if let Err(e) = context::spawn_context(self.arc(), pid, tid) {
                self.unwind_exec(&mut st, pid, parent);
                return Err(ProcessError::SpawnFailed(e.to_string()));
            }
        }

        info!("created process {} (parent {:?})", pid, parent);
        Ok(pid)
    }

    /// Undo a half-built process record after its entry thread failed to
    /// spawn.
    fn unwind_exec(&self, st: &mut KernelState, pid: Pid, parent: Option<Pid>) {
        if let Some(parent) = parent {
            let parent_rec = st
                .procs
                .get_mut(parent)
                .unwrap_or_else(|| panic!("parent record vanished during exec"));
            parent_rec.children.retain(|&c| c != pid);
        }
        let fidt: Vec<_> = {
            let proc = st.procs.get_mut(pid).unwrap_or_else(|| unreachable!());
            proc.fidt.iter_mut().filter_map(Option::take).collect()
        };
        for id in fidt {
            self.fcb_decref(st, id);
        }
        st.procs.release(pid);
    }

    /// Terminate the calling process with the given status. Never returns.
    ///
    /// Init first harvests every remaining child, so no zombie outlives it.
    pub fn exit(&self, status: ExitCode) -> ! {
        self.finish_exit(status);
        std::panic::panic_any(ThreadExitUnwind)
    }

    /// Exit bookkeeping without the unwind, shared by `exit` and the
    /// trampoline's normal-return path for entry tasks.
    pub(crate) fn finish_exit(&self, status: ExitCode) {
        let me = current();
        {
            let mut st = self.lock();
            let proc = st
                .procs
                .get_mut(me.pid)
                .unwrap_or_else(|| panic!("exiting process has no record"));
            proc.exitval = status;
        }

        if me.pid == INIT {
            while self.wait_child(None).is_ok() {}
        }

        self.finish_thread(status);
    }

    /// Wait for a child to exit and collect its status, freeing its record.
    ///
    /// With `Some(pid)` the caller waits for that specific child; with
    /// `None`, for any child, harvesting the most recently exited first.
    pub fn wait_child(&self, which: Option<Pid>) -> Result<(Pid, ExitCode), ProcessError> {
        match which {
            Some(pid) => self.wait_specific(pid),
            None => self.wait_any(),
        }
    }

    fn wait_specific(&self, child: Pid) -> Result<(Pid, ExitCode), ProcessError> {
        let me = current();
        let mut st = self.lock();
        loop {
            let rec = st
                .procs
                .get(child)
                .filter(|c| c.parent == Some(me.pid))
                .ok_or(ProcessError::NoSuchProcess(child))?;
            if rec.state == ProcessState::Zombie {
                break;
            }
            self.sleep_on(st, WaitChannel::ChildExit(me.pid), WaitClass::User, None);
            st = self.lock();
        }
        let status = self.cleanup_zombie(&mut st, child);
        Ok((child, status))
    }

    fn wait_any(&self) -> Result<(Pid, ExitCode), ProcessError> {
        let me = current();
        let mut st = self.lock();
        loop {
            let proc = st
                .procs
                .get(me.pid)
                .unwrap_or_else(|| panic!("caller's process record missing"));
            if let Some(&head) = proc.exited.front() {
                let status = self.cleanup_zombie(&mut st, head);
                return Ok((head, status));
            }
            if proc.children.is_empty() {
                return Err(ProcessError::NoChildren);
            }
            self.sleep_on(st, WaitChannel::ChildExit(me.pid), WaitClass::User, None);
            st = self.lock();
        }
    }

    /// The calling process's id.
    pub fn getpid(&self) -> Pid {
        current().pid
    }

    /// The calling process's parent, if it has one.
    pub fn getppid(&self) -> Option<Pid> {
        let me = current();
        self.lock().procs.get(me.pid).and_then(|p| p.parent)
    }

    /// The exit cascade, run when the last thread of a process exits.
    /// The record becomes a zombie; only `cleanup_zombie` frees it.
    pub(crate) fn finish_process(&self, st: &mut KernelState, pid: Pid) {
        if pid != INIT {
            // Unharvested children are reparented to init, which inherits
            // the duty (and the wakeup) for any that already exited.
            let (kids, orphan_zombies, parent) = {
                let proc = st.procs.get_mut(pid).unwrap_or_else(|| unreachable!());
                (
                    mem::take(&mut proc.children),
                    mem::take(&mut proc.exited),
                    proc.parent,
                )
            };
            for &kid in &kids {
                let rec = st
                    .procs
                    .get_mut(kid)
                    .unwrap_or_else(|| panic!("child record vanished before reparenting"));
                rec.parent = Some(INIT);
            }
            if !kids.is_empty() {
                let init = st
                    .procs
                    .get_mut(INIT)
                    .unwrap_or_else(|| panic!("init process record missing"));
                init.children.extend(kids);
            }
            if !orphan_zombies.is_empty() {
                let init = st.procs.get_mut(INIT).unwrap_or_else(|| unreachable!());
                init.exited.extend(orphan_zombies);
                self.wait.broadcast(WaitChannel::ChildExit(INIT));
            }

            let parent = parent.unwrap_or_else(|| panic!("exiting process has no parent"));
            let parent_rec = st
                .procs
                .get_mut(parent)
                .unwrap_or_else(|| panic!("parent record vanished before notification"));
            parent_rec.exited.push_front(pid);
            self.wait.broadcast(WaitChannel::ChildExit(parent));
        }

        let fidt: Vec<_> = {
            let proc = st.procs.get_mut(pid).unwrap_or_else(|| unreachable!());
            proc.args = Vec::new();
            proc.main_task = None;
            // Exited thread records survive only while joiners hold them.
            proc.threads.retain(|_, rec| rec.refcount > 0);
            proc.state = ProcessState::Zombie;
            proc.fidt.iter_mut().filter_map(Option::take).collect()
        };
        for id in fidt {
            self.fcb_decref(st, id);
        }

        self.wait.broadcast(WaitChannel::ProcessGone(pid));
        info!("process {} is now a zombie", pid);
    }

    /// Harvest a zombie child: unlink it from its parent and free the
    /// record. Harvesting a live process is a structural invariant
    /// violation.
    fn cleanup_zombie(&self, st: &mut KernelState, pid: Pid) -> ExitCode {
        let (status, parent) = {
            let rec = st
                .procs
                .get(pid)
                .unwrap_or_else(|| panic!("harvesting a missing process record"));
            assert_eq!(rec.state, ProcessState::Zombie, "harvesting a live process");
            (rec.exitval, rec.parent)
        };
        if let Some(parent) = parent {
            let parent_rec = st
                .procs
                .get_mut(parent)
                .unwrap_or_else(|| panic!("harvested zombie's parent record missing"));
            parent_rec.children.retain(|&c| c != pid);
            parent_rec.exited.retain(|&c| c != pid);
        }
        st.procs.release(pid);
        info!("harvested zombie {} (status {})", pid, status);
        status
    }
}
