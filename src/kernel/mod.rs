/*!
 * Kernel Core
 *
 * The `Kernel` object: one lock over every control block, a keyed wait
 * queue for all blocking conditions, and the boot sequence that brings up
 * the idle and init processes.
 */

pub(crate) mod context;

use crate::core::config::KernelConfig;
use crate::core::sync::WaitQueue;
use crate::core::types::{ExitCode, Map, Pid, Port, Task, Tid};
use crate::handles::{Fcb, FcbId};
use crate::ipc::pipe::pipe::PipeCb;
use crate::ipc::pipe::PipeId;
use crate::ipc::socket::socket::{ConnRequest, SocketCb};
use crate::ipc::socket::{ReqId, SockId};
use crate::process::table::ProcessTable;
use crate::process::ProcessState;
use log::{info, trace};
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// A blocking condition, tied to the control block it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum WaitChannel {
    /// A child of the process exited.
    ChildExit(Pid),
    /// The thread exited or was detached.
    ThreadExit(Tid),
    /// Space became available in the pipe buffer.
    PipeSpace(PipeId),
    /// Data became available in the pipe buffer.
    PipeData(PipeId),
    /// A connection request was queued on the port's listener.
    ConnRequest(Port),
    /// The connection request was resolved (admitted or refused).
    ConnResolved(ReqId),
    /// The process became a zombie.
    ProcessGone(Pid),
}

/// What kind of activity a wait is attributed to. Bookkeeping only.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WaitClass {
    User,
    Pipe,
    Io,
}

/// Everything the kernel lock guards: the process table and every pipe,
/// socket, handle, and connection-request control block.
pub(crate) struct KernelState {
    pub procs: ProcessTable,
    pub fcbs: Map<FcbId, Fcb>,
    pub pipes: Map<PipeId, PipeCb>,
    pub sockets: Map<SockId, SocketCb>,
    pub requests: Map<ReqId, ConnRequest>,
    /// Registered listener per port; index 0 (`NOPORT`) is never used.
    pub port_map: Vec<Option<SockId>>,
    next_fcb: FcbId,
    next_pipe: PipeId,
    next_sock: SockId,
    next_req: ReqId,
    next_tid: Tid,
    booted: bool,
}

impl KernelState {
    fn new(config: &KernelConfig) -> Self {
        Self {
            procs: ProcessTable::new(config.max_processes, config.max_fileid),
            fcbs: Map::default(),
            pipes: Map::default(),
            sockets: Map::default(),
            requests: Map::default(),
            port_map: vec![None; config.max_port as usize + 1],
            next_fcb: 1,
            next_pipe: 1,
            next_sock: 1,
            next_req: 1,
            next_tid: 1,
            booted: false,
        }
    }

    pub fn alloc_fcb_id(&mut self) -> FcbId {
        let id = self.next_fcb;
        self.next_fcb += 1;
        id
    }

    pub fn alloc_pipe_id(&mut self) -> PipeId {
        let id = self.next_pipe;
        self.next_pipe += 1;
        id
    }

    pub fn alloc_sock_id(&mut self) -> SockId {
        let id = self.next_sock;
        self.next_sock += 1;
        id
    }

    pub fn alloc_req_id(&mut self) -> ReqId {
        let id = self.next_req;
        self.next_req += 1;
        id
    }

    pub fn alloc_tid(&mut self) -> Tid {
        let id = self.next_tid;
        self.next_tid += 1;
        id
    }
}

/// The kernel: a process table, an open-handle arena, and the pipe/socket
/// control blocks, all serialized by one lock.
///
/// Syscalls are methods on this type. Most of them identify the caller
/// through the per-thread current-process context installed by the kernel's
/// own execution contexts, so they must be invoked from inside a task (see
/// [`Kernel::boot`]).
pub struct Kernel {
    state: Mutex<KernelState>,
    pub(crate) wait: WaitQueue<WaitChannel>,
    pub(crate) config: KernelConfig,
    self_ref: Weak<Kernel>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Arc<Self> {
        context::install_exit_hook();
        Arc::new_cyclic(|weak| Self {
            state: Mutex::new(KernelState::new(&config)),
            wait: WaitQueue::new(),
            config,
            self_ref: weak.clone(),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, KernelState> {
        self.state.lock()
    }

    /// Strong handle to self, needed when spawning execution contexts.
    pub(crate) fn arc(&self) -> Arc<Self> {
        match self.self_ref.upgrade() {
            Some(arc) => arc,
            None => panic!("kernel dropped while still in use"),
        }
    }

    /// Release the kernel lock and sleep on `chan` until signaled or until
    /// `timeout` elapses. Returns `true` if woken. The caller re-locks.
    pub(crate) fn sleep_on(
        &self,
        guard: MutexGuard<'_, KernelState>,
        chan: WaitChannel,
        class: WaitClass,
        timeout: Option<Duration>,
    ) -> bool {
        let ticket = self.wait.prepare(chan);
        trace!("blocking on {:?} [{:?}]", chan, class);
        drop(guard);
        self.wait.wait(chan, ticket, timeout)
    }

    /// Bring the system up: create the idle process (pid 0, no task) and the
    /// init process (pid 1) running `task`, then block until init's record
    /// becomes a zombie and return its exit status.
    ///
    /// Init's record is never harvested; it persists as a zombie.
    pub fn boot(&self, task: Task, args: &[u8]) -> ExitCode {
        {
            let mut st = self.lock();
            assert!(!st.booted, "kernel already booted");
            st.booted = true;
        }

        let idle = match self.exec(None, &[]) {
            Ok(pid) => pid,
            Err(e) => panic!("boot: cannot create the idle process: {e}"),
        };
        assert_eq!(idle, 0, "the idle process must get pid 0");

        let init = match self.exec(Some(task), args) {
            Ok(pid) => pid,
            Err(e) => panic!("boot: cannot create the init process: {e}"),
        };
        assert_eq!(init, 1, "the init process must get pid 1");
        info!("boot: init process started");

        let mut st = self.lock();
        loop {
            let proc = st
                .procs
                .get(init)
                .unwrap_or_else(|| panic!("init process record vanished"));
            if proc.state == ProcessState::Zombie {
                let status = proc.exitval;
                info!("boot: init exited with status {}", status);
                return status;
            }
            self.sleep_on(st, WaitChannel::ProcessGone(init), WaitClass::User, None);
            st = self.lock();
        }
    }

    /// Number of allocated process records (alive or zombie).
    pub fn process_count(&self) -> usize {
        self.lock().procs.count()
    }

    /// Number of live pipe control blocks.
    pub fn pipe_count(&self) -> usize {
        self.lock().pipes.len()
    }

    /// Number of live socket control blocks.
    pub fn socket_count(&self) -> usize {
        self.lock().sockets.len()
    }

    /// Whether a listener is currently registered on `port`.
    pub fn port_bound(&self, port: Port) -> bool {
        let st = self.lock();
        st.port_map
            .get(port as usize)
            .map(|entry| entry.is_some())
            .unwrap_or(false)
    }
}
