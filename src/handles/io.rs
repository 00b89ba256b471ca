/*!
 * Handle I/O
 *
 * The read/write/close surface over open handles, dispatching on the
 * stream object behind each fid. Blocking pipe transfers pin the control
 * block with an extra reference so a concurrent close in the same process
 * cannot free the stream out from under them.
 */

use super::table::{incref, reserve, FcbId, StreamObj};
use super::types::HandleError;
use crate::core::errors::KernelError;
use crate::core::types::Fid;
use crate::ipc::pipe::PipeId;
use crate::ipc::socket::socket::SocketShape;
use crate::ipc::socket::{SockId, SocketError};
use crate::kernel::context::current;
use crate::kernel::{Kernel, KernelState};
use crate::process::info;

impl Kernel {
    /// Read from an open handle into `buf`, returning the bytes read.
    ///
    /// Pipe-backed handles block until data arrives or the write side
    /// closes; a process-info handle yields one serialized record per call.
    pub fn read(&self, fid: Fid, buf: &mut [u8]) -> Result<usize, KernelError> {
        let me = current();
        let mut st = self.lock();
        let id = resolve(&st, me.pid, fid)?;

        match stream_of(&st, id) {
            StreamObj::PipeRead(pipe) => {
                incref(&mut st, id);
                let res = self.pipe_read(st, pipe, buf);
                self.unpin(id);
                Ok(res?)
            }
            StreamObj::Socket(sock) => {
                let pipe = read_pipe_of(&st, sock)?;
                incref(&mut st, id);
                let res = self.pipe_read(st, pipe, buf);
                self.unpin(id);
                Ok(res?)
            }
            StreamObj::ProcInfo(_) => {
                let bytes = info::read_next(&mut st, id)?;
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            StreamObj::PipeWrite(_) => Err(HandleError::NotReadable(fid).into()),
        }
    }

    /// Write `buf` to an open handle, returning the bytes accepted.
    ///
    /// Pipe-backed handles block while the buffer is full; if the read side
    /// closes mid-transfer, the bytes accepted so far are returned.
    pub fn write(&self, fid: Fid, buf: &[u8]) -> Result<usize, KernelError> {
        let me = current();
        let mut st = self.lock();
        let id = resolve(&st, me.pid, fid)?;

        match stream_of(&st, id) {
            StreamObj::PipeWrite(pipe) => {
                incref(&mut st, id);
                let res = self.pipe_write(st, pipe, buf);
                self.unpin(id);
                Ok(res?)
            }
            StreamObj::Socket(sock) => {
                let pipe = write_pipe_of(&st, sock)?;
                incref(&mut st, id);
                let res = self.pipe_write(st, pipe, buf);
                self.unpin(id);
                Ok(res?)
            }
            StreamObj::PipeRead(_) | StreamObj::ProcInfo(_) => {
                Err(HandleError::NotWritable(fid).into())
            }
        }
    }

    /// Close a fid. The slot frees immediately; the stream behind it closes
    /// when its last reference drops.
    pub fn close(&self, fid: Fid) -> Result<(), KernelError> {
        let me = current();
        let mut st = self.lock();
        let id = {
            let proc = st
                .procs
                .get_mut(me.pid)
                .unwrap_or_else(|| panic!("caller's process record missing"));
            proc.fidt
                .get_mut(fid as usize)
                .and_then(Option::take)
                .ok_or(HandleError::BadFid(fid))?
        };
        self.fcb_decref(&mut st, id);
        Ok(())
    }

    /// Open a process-info stream. Each read yields one serialized
    /// [`crate::process::ProcessInfo`] record, starting from the init
    /// process; a zero-length read marks the end.
    pub fn open_info(&self) -> Result<Fid, KernelError> {
        let me = current();
        let mut st = self.lock();
        let fids = reserve(&mut st, me.pid, vec![StreamObj::ProcInfo(1)])
            .ok_or(HandleError::NoFreeSlots)?;
        Ok(fids[0])
    }

    /// Drop a pin taken for a blocking transfer. Re-locks.
    fn unpin(&self, id: FcbId) {
        let mut st = self.lock();
        self.fcb_decref(&mut st, id);
    }
}

fn resolve(st: &KernelState, pid: crate::core::types::Pid, fid: Fid) -> Result<FcbId, HandleError> {
    st.procs
        .get(pid)
        .and_then(|p| p.fidt.get(fid as usize))
        .and_then(|slot| *slot)
        .ok_or(HandleError::BadFid(fid))
}

fn stream_of(st: &KernelState, id: FcbId) -> StreamObj {
    st.fcbs
        .get(&id)
        .unwrap_or_else(|| panic!("handle {id} vanished while open"))
        .stream
}

fn read_pipe_of(st: &KernelState, sock: SockId) -> Result<PipeId, SocketError> {
    match st.sockets.get(&sock).map(|cb| &cb.shape) {
        Some(SocketShape::Peer {
            read_pipe: Some(pipe),
            ..
        }) => Ok(*pipe),
        _ => Err(SocketError::NotConnected),
    }
}

fn write_pipe_of(st: &KernelState, sock: SockId) -> Result<PipeId, SocketError> {
    match st.sockets.get(&sock).map(|cb| &cb.shape) {
        Some(SocketShape::Peer {
            write_pipe: Some(pipe),
            ..
        }) => Ok(*pipe),
        _ => Err(SocketError::NotConnected),
    }
}
