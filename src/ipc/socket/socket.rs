/*!
 * Socket Control Blocks
 *
 * The socket arena entries, their shapes, and teardown. A block is pinned
 * by refcount while a blocked syscall references it; the last reference
 * frees the arena entry and closes whatever the shape still holds.
 */

use super::types::{ReqId, SockId};
use crate::core::types::{Port, NOPORT};
use crate::ipc::pipe::PipeId;
use crate::kernel::{Kernel, KernelState, WaitChannel};
use log::debug;
use std::collections::VecDeque;
use std::mem;

/// What a socket currently is. Every socket starts unbound; `listen` and
/// `accept`/`connect` move it forward. Shapes never move backward.
pub(crate) enum SocketShape {
    Unbound,
    Listener {
        /// Queued connection requests, oldest first.
        queue: VecDeque<ReqId>,
    },
    Peer {
        peer: SockId,
        /// `None` after the read direction is shut down.
        read_pipe: Option<PipeId>,
        /// `None` after the write direction is shut down.
        write_pipe: Option<PipeId>,
    },
}

/// One socket-control block.
pub(crate) struct SocketCb {
    /// References from the handle arena plus any blocked syscalls.
    pub refcount: usize,
    /// The port given at creation; `NOPORT` means connect-only.
    pub port: Port,
    pub shape: SocketShape,
}

impl SocketCb {
    pub fn new(port: Port) -> Self {
        Self {
            refcount: 1,
            port,
            shape: SocketShape::Unbound,
        }
    }
}

/// One pending connection, owned by the request arena. Only the connecting
/// side ever frees it, so a listener holding a queued id can always find
/// the entry.
pub(crate) struct ConnRequest {
    pub client: SockId,
    pub admitted: bool,
    pub resolved: bool,
}

impl Kernel {
    pub(crate) fn sock_incref(&self, st: &mut KernelState, sock: SockId) {
        let cb = st
            .sockets
            .get_mut(&sock)
            .unwrap_or_else(|| panic!("incref on a freed socket {sock}"));
        cb.refcount += 1;
    }

    /// Drop one reference; the last one frees the arena entry and closes
    /// any pipes the shape still holds.
    pub(crate) fn sock_decref(&self, st: &mut KernelState, sock: SockId) {
        let last = {
            let cb = st
                .sockets
                .get_mut(&sock)
                .unwrap_or_else(|| panic!("decref on a freed socket {sock}"));
            cb.refcount -= 1;
            cb.refcount == 0
        };
        if !last {
            return;
        }

        let cb = st
            .sockets
            .remove(&sock)
            .unwrap_or_else(|| unreachable!("present above"));
        if let SocketShape::Peer {
            peer,
            read_pipe,
            write_pipe,
        } = cb.shape
        {
            debug!("socket {} freed (peer of {})", sock, peer);
            if let Some(pipe) = read_pipe {
                self.pipe_close_reader(st, pipe);
            }
            if let Some(pipe) = write_pipe {
                self.pipe_close_writer(st, pipe);
            }
        } else {
            debug!("socket {} freed", sock);
        }
    }

    /// Tear down a socket when its handle closes. A listener refuses every
    /// queued request and frees its port; a peer closes both directions.
    /// The arena entry itself goes when the last reference drops.
    pub(crate) fn socket_close(&self, st: &mut KernelState, sock: SockId) {
        let (port, shape) = {
            let cb = st
                .sockets
                .get_mut(&sock)
                .unwrap_or_else(|| panic!("closing a freed socket {sock}"));
            (cb.port, mem::replace(&mut cb.shape, SocketShape::Unbound))
        };

        match shape {
            SocketShape::Unbound => {}
            SocketShape::Listener { queue } => {
                for req in queue {
                    self.refuse_request(st, req);
                }
                if port != NOPORT {
                    st.port_map[port as usize] = None;
                }
                // Accepts blocked on the port must observe the
                // deregistration.
                self.wait.broadcast(WaitChannel::ConnRequest(port));
                debug!("listener on port {} closed", port);
            }
            SocketShape::Peer {
                read_pipe,
                write_pipe,
                ..
            } => {
                if let Some(pipe) = read_pipe {
                    self.pipe_close_reader(st, pipe);
                }
                if let Some(pipe) = write_pipe {
                    self.pipe_close_writer(st, pipe);
                }
            }
        }

        self.sock_decref(st, sock);
    }

    /// Mark a request resolved-but-not-admitted and wake its connector.
    pub(crate) fn refuse_request(&self, st: &mut KernelState, req: ReqId) {
        let r = st
            .requests
            .get_mut(&req)
            .unwrap_or_else(|| panic!("refusing a freed connection request {req}"));
        r.resolved = true;
        r.admitted = false;
        self.wait.signal(WaitChannel::ConnResolved(req));
    }
}
