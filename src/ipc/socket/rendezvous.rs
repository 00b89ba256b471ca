/*!
 * Connection Rendezvous
 *
 * The listen/connect/accept handshake. A connector queues a request on the
 * port's listener and sleeps until an acceptor admits it, wiring both
 * sockets into peers over a fresh pair of pipes. Every exit path resolves
 * the request exactly once, and only the connector frees it.
 */

use super::socket::{ConnRequest, SocketCb, SocketShape};
use super::types::{ShutdownMode, SockId, SocketError};
use crate::core::errors::KernelError;
use crate::core::types::{Fid, Pid, Port, NOPORT};
use crate::handles::{reserve, HandleError, StreamObj};
use crate::ipc::pipe::pipe::PipeCb;
use crate::kernel::context::current;
use crate::kernel::{Kernel, KernelState, WaitChannel, WaitClass};
use log::{debug, info};
use std::time::{Duration, Instant};

impl Kernel {
    /// Create an unbound socket on `port` (`NOPORT` for a connect-only
    /// socket) and return its fid.
    pub fn socket(&self, port: Port) -> Result<Fid, KernelError> {
        if port > self.config.max_port {
            return Err(SocketError::InvalidPort(port).into());
        }
        let me = current();
        let mut st = self.lock();

        let sock = st.alloc_sock_id();
        st.sockets.insert(sock, SocketCb::new(port));
        match reserve(&mut st, me.pid, vec![StreamObj::Socket(sock)]) {
            Some(fids) => {
                debug!("socket {} created on port {}", sock, port);
                Ok(fids[0])
            }
            None => {
                st.sockets.remove(&sock);
                Err(HandleError::NoFreeSlots.into())
            }
        }
    }

    /// Turn an unbound socket into the listener for its port.
    pub fn listen(&self, fid: Fid) -> Result<(), KernelError> {
        let me = current();
        let mut st = self.lock();
        let sock = resolve_socket(&st, me.pid, fid)?;

        let port = {
            let cb = socket_cb(&mut st, sock);
            if cb.port == NOPORT {
                return Err(SocketError::InvalidPort(NOPORT).into());
            }
            cb.port
        };
        if st.port_map[port as usize].is_some() {
            return Err(SocketError::PortBusy(port).into());
        }

        let cb = socket_cb(&mut st, sock);
        if !matches!(cb.shape, SocketShape::Unbound) {
            return Err(SocketError::WrongShape.into());
        }
        cb.shape = SocketShape::Listener {
            queue: Default::default(),
        };
        st.port_map[port as usize] = Some(sock);
        info!("port {} bound to socket {}", port, sock);
        Ok(())
    }

    /// Connect an unbound socket to the listener on `port`, waiting up to
    /// `timeout` (forever if `None`) for an accept.
    pub fn connect(&self, fid: Fid, port: Port, timeout: Option<Duration>) -> Result<(), KernelError> {
        if port == NOPORT || port > self.config.max_port {
            return Err(SocketError::InvalidPort(port).into());
        }
        let me = current();
        let mut st = self.lock();
        let sock = resolve_socket(&st, me.pid, fid)?;

        let listener = st.port_map[port as usize].ok_or(SocketError::NoListener(port))?;
        if !matches!(socket_cb(&mut st, sock).shape, SocketShape::Unbound) {
            return Err(SocketError::WrongShape.into());
        }

        let req = st.alloc_req_id();
        st.requests.insert(
            req,
            ConnRequest {
                client: sock,
                admitted: false,
                resolved: false,
            },
        );
        match &mut socket_cb(&mut st, listener).shape {
            SocketShape::Listener { queue } => queue.push_back(req),
            _ => panic!("port {port} maps to a non-listener socket"),
        }
        // Pin our block: the acceptor will wire it while our fid could be
        // closing concurrently.
        self.sock_incref(&mut st, sock);
        self.wait.signal(WaitChannel::ConnRequest(port));
        debug!("connection request {} queued on port {}", req, port);

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let r = st
                .requests
                .get(&req)
                .unwrap_or_else(|| panic!("connection request {req} freed by another thread"));
            if r.resolved {
                break;
            }
            let remaining = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        break;
                    }
                    Some(d - now)
                }
                None => None,
            };
            self.sleep_on(st, WaitChannel::ConnResolved(req), WaitClass::Io, remaining);
            st = self.lock();
        }

        // Sole owner of the request from here: unlink and free it, then
        // report the outcome it carried.
        let r = st
            .requests
            .remove(&req)
            .unwrap_or_else(|| unreachable!("present above"));
        if let Some(cb) = st.sockets.get_mut(&listener) {
            if let SocketShape::Listener { queue } = &mut cb.shape {
                queue.retain(|&q| q != req);
            }
        }
        self.sock_decref(&mut st, sock);

        if r.admitted {
            debug!("connection request {} admitted", req);
            Ok(())
        } else if r.resolved {
            Err(SocketError::ConnectionRefused.into())
        } else {
            Err(SocketError::Timeout.into())
        }
    }

    /// Accept one queued connection on a listening socket, blocking until a
    /// request arrives. Returns the fid of the new connected peer socket.
    pub fn accept(&self, fid: Fid) -> Result<Fid, KernelError> {
        let me = current();
        let mut st = self.lock();
        let lsock = resolve_socket(&st, me.pid, fid)?;

        let port = {
            let cb = socket_cb(&mut st, lsock);
            match cb.shape {
                SocketShape::Listener { .. } => cb.port,
                _ => return Err(SocketError::WrongShape.into()),
            }
        };
        // Pin the listener for the duration of the block.
        self.sock_incref(&mut st, lsock);

        let req = loop {
            if st.port_map[port as usize] != Some(lsock) {
                self.sock_decref(&mut st, lsock);
                return Err(SocketError::Closed.into());
            }
            match &mut socket_cb(&mut st, lsock).shape {
                SocketShape::Listener { queue } => {
                    if let Some(req) = queue.pop_front() {
                        break req;
                    }
                }
                _ => {
                    self.sock_decref(&mut st, lsock);
                    return Err(SocketError::Closed.into());
                }
            }
            self.sleep_on(st, WaitChannel::ConnRequest(port), WaitClass::Io, None);
            st = self.lock();
        };

        // The connector frees its request only after we resolve it, so the
        // popped id is live.
        let client = st
            .requests
            .get(&req)
            .unwrap_or_else(|| panic!("queued connection request {req} has no record"))
            .client;

        let server = st.alloc_sock_id();
        st.sockets.insert(server, SocketCb::new(port));
        let Some(fids) = reserve(&mut st, me.pid, vec![StreamObj::Socket(server)]) else {
            st.sockets.remove(&server);
            self.refuse_request(&mut st, req);
            self.sock_decref(&mut st, lsock);
            return Err(HandleError::NoFreeSlots.into());
        };

        // One pipe per direction; the client reads where the server writes.
        let client_rx = st.alloc_pipe_id();
        let server_rx = st.alloc_pipe_id();
        st.pipes
            .insert(client_rx, PipeCb::new(self.config.pipe_capacity));
        st.pipes
            .insert(server_rx, PipeCb::new(self.config.pipe_capacity));

        socket_cb(&mut st, client).shape = SocketShape::Peer {
            peer: server,
            read_pipe: Some(client_rx),
            write_pipe: Some(server_rx),
        };
        socket_cb(&mut st, server).shape = SocketShape::Peer {
            peer: client,
            read_pipe: Some(server_rx),
            write_pipe: Some(client_rx),
        };

        {
            let r = st
                .requests
                .get_mut(&req)
                .unwrap_or_else(|| unreachable!("checked above"));
            r.admitted = true;
            r.resolved = true;
        }
        self.wait.signal(WaitChannel::ConnResolved(req));
        self.sock_decref(&mut st, lsock);
        info!("connection admitted on port {} (sockets {} <-> {})", port, client, server);
        Ok(fids[0])
    }

    /// Shut down one or both directions of a connected socket. The peer
    /// observes a write shutdown as end of stream and a read shutdown as a
    /// closed reader.
    pub fn shutdown(&self, fid: Fid, how: ShutdownMode) -> Result<(), KernelError> {
        let me = current();
        let mut st = self.lock();
        let sock = resolve_socket(&st, me.pid, fid)?;

        let (read_pipe, write_pipe) = match &mut socket_cb(&mut st, sock).shape {
            SocketShape::Peer {
                read_pipe,
                write_pipe,
                ..
            } => {
                let r = matches!(how, ShutdownMode::Read | ShutdownMode::Both)
                    .then(|| read_pipe.take())
                    .flatten();
                let w = matches!(how, ShutdownMode::Write | ShutdownMode::Both)
                    .then(|| write_pipe.take())
                    .flatten();
                (r, w)
            }
            _ => return Err(SocketError::NotConnected.into()),
        };

        if let Some(pipe) = read_pipe {
            self.pipe_close_reader(&mut st, pipe);
        }
        if let Some(pipe) = write_pipe {
            self.pipe_close_writer(&mut st, pipe);
        }
        Ok(())
    }
}

fn resolve_socket(st: &KernelState, pid: Pid, fid: Fid) -> Result<SockId, KernelError> {
    let id = st
        .procs
        .get(pid)
        .and_then(|p| p.fidt.get(fid as usize))
        .and_then(|slot| *slot)
        .ok_or(HandleError::BadFid(fid))?;
    match st.fcbs.get(&id).map(|f| f.stream) {
        Some(StreamObj::Socket(sock)) => Ok(sock),
        _ => Err(SocketError::NotSocket(fid).into()),
    }
}

/// A socket id obtained under the lock we still hold; its block must exist.
fn socket_cb(st: &mut KernelState, sock: SockId) -> &mut SocketCb {
    st.sockets
        .get_mut(&sock)
        .unwrap_or_else(|| panic!("socket {sock} vanished under the kernel lock"))
}
